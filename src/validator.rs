//! Credential validation — bearer tokens resolved to identities.
//!
//! The router consults a [`CredentialValidator`] before invoking any
//! handler when gating is enabled. The stock implementation is a static
//! in-memory token table, loaded once at startup from a TOML file and
//! immutable for the process lifetime.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::types::Identity;

/// Resolves a presented bearer credential to an [`Identity`], or rejects it.
///
/// Stateless per call. Implementations must not distinguish "empty" from
/// "unknown" in their observable behavior; both are a plain rejection, so
/// callers cannot probe which tokens exist.
pub trait CredentialValidator: Send + Sync {
    /// Exact-match, case-sensitive lookup of `credential`.
    fn validate(&self, credential: &str) -> Option<Identity>;
}

/// Fixed token → identity table backing the validator.
///
/// Loaded at startup; there is no mutation path afterwards. Lookup is a
/// plain `HashMap` probe, constant-time on average.
#[derive(Clone, Default)]
pub struct StaticTokenStore {
    tokens: HashMap<String, Identity>,
}

impl std::fmt::Debug for StaticTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys are the secrets here; never print them.
        f.debug_struct("StaticTokenStore")
            .field("tokens", &"[REDACTED]")
            .field("count", &self.tokens.len())
            .finish()
    }
}

/// On-disk shape of the token file.
#[derive(Debug, Deserialize)]
struct TokenFile {
    /// `[tokens.<bearer>]` tables, one per credential.
    #[serde(default)]
    tokens: HashMap<String, Identity>,
}

impl StaticTokenStore {
    /// Build a store from an in-memory map (used by tests and embedders).
    pub fn from_map(tokens: HashMap<String, Identity>) -> Self {
        Self { tokens }
    }

    /// Load the token table from a TOML file.
    ///
    /// Expected layout:
    ///
    /// ```toml
    /// [tokens.token1]
    /// user = "foo"
    /// email = "foo@bar.com"
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, readable by group/other on
    /// Unix, or not valid TOML.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "token file does not exist: {}",
                path.display()
            ));
        }

        validate_private_permissions(path)?;

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read token file {}", path.display()))?;
        let parsed: TokenFile = toml::from_str(&contents)
            .with_context(|| format!("failed to parse token file {}", path.display()))?;

        debug!(count = parsed.tokens.len(), path = %path.display(), "token store loaded");
        Ok(Self {
            tokens: parsed.tokens,
        })
    }

    /// Number of known tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True when no tokens are loaded (every gated dispatch would be rejected).
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl CredentialValidator for StaticTokenStore {
    fn validate(&self, credential: &str) -> Option<Identity> {
        if credential.is_empty() {
            return None;
        }
        self.tokens.get(credential).cloned()
    }
}

#[cfg(unix)]
fn validate_private_permissions(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to inspect token file {}", path.display()))?;
    let mode = metadata.permissions().mode() & 0o777;

    if mode & 0o077 != 0 {
        return Err(anyhow::anyhow!(
            "token file {} must be 0600, found {:o}",
            path.display(),
            mode
        ));
    }

    Ok(())
}

#[cfg(not(unix))]
fn validate_private_permissions(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}
