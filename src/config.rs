//! Configuration loading.
//!
//! Loads router configuration from `./caproute.toml` (or
//! `$CAPROUTE_CONFIG_PATH`). Every field has an explicit default spelled
//! out in its `Default` impl; environment variables override file values;
//! file values override defaults.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::router::DuplicatePolicy;

/// Top-level configuration.
///
/// Precedence: env vars > config file > defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CaprouteConfig {
    /// `[router]` table: registration behavior.
    pub router: RouterConfig,
    /// `[auth]` table: credential gating.
    pub auth: AuthConfig,
    /// `[logging]` table.
    pub logging: LoggingConfig,
}

/// Registration behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// What to do when a registration collides with an existing canonical
    /// name: `overwrite` (default) or `reject`.
    pub on_duplicate: DuplicatePolicy,
}

/// Credential gating.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// When true, every dispatch must present a known token.
    pub require_token: bool,
    /// Path to the token TOML file. Defaults to `~/.caproute/tokens.toml`
    /// when unset.
    pub token_file: Option<String>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
    /// When set, also write daily-rotated JSON logs to this directory.
    pub logs_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            logs_dir: None,
        }
    }
}

impl CaprouteConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// Config file path: `$CAPROUTE_CONFIG_PATH` or `./caproute.toml`. A
    /// missing file is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                toml::from_str(&contents).context("failed to parse config TOML")
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        env("CAPROUTE_CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("caproute.toml"))
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("CAPROUTE_ON_DUPLICATE") {
            match v.as_str() {
                "overwrite" => self.router.on_duplicate = DuplicatePolicy::Overwrite,
                "reject" => self.router.on_duplicate = DuplicatePolicy::Reject,
                _ => warn!(
                    var = "CAPROUTE_ON_DUPLICATE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("CAPROUTE_REQUIRE_TOKEN") {
            match v.parse() {
                Ok(b) => self.auth.require_token = b,
                Err(_) => warn!(
                    var = "CAPROUTE_REQUIRE_TOKEN",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }

        if let Some(v) = env("CAPROUTE_TOKEN_FILE") {
            self.auth.token_file = Some(v);
        }

        if let Some(v) = env("CAPROUTE_LOG_LEVEL") {
            self.logging.log_level = v;
        }

        if let Some(v) = env("CAPROUTE_LOGS_DIR") {
            self.logging.logs_dir = Some(v);
        }
    }

    /// Resolve the token file path: explicit config value, else
    /// `~/.caproute/tokens.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error when no home directory can be resolved.
    pub fn token_file_path(&self) -> Result<PathBuf> {
        if let Some(ref p) = self.auth.token_file {
            return Ok(PathBuf::from(p));
        }
        Ok(runtime_paths()?.token_file)
    }
}

/// Filesystem locations under the user's home directory.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    /// Base directory, `~/.caproute`.
    pub base_dir: PathBuf,
    /// Default token file, `~/.caproute/tokens.toml`.
    pub token_file: PathBuf,
    /// Log directory, `~/.caproute/logs`.
    pub logs_dir: PathBuf,
}

/// Resolve runtime paths under `~/.caproute`.
///
/// # Errors
///
/// Returns an error when the home directory cannot be determined.
pub fn runtime_paths() -> Result<RuntimePaths> {
    let base_dirs = directories::BaseDirs::new().context("could not determine home directory")?;
    let base_dir = base_dirs.home_dir().join(".caproute");
    Ok(RuntimePaths {
        token_file: base_dir.join("tokens.toml"),
        logs_dir: base_dir.join("logs"),
        base_dir,
    })
}
