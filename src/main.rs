#![allow(missing_docs)]

//! Caproute CLI — a thin transport wrapper over the capability router.
//!
//! Maps command-line input into `(name, args, credential)`, dispatches,
//! and prints the handler's JSON result. Real hosts (HTTP servers, RPC
//! stubs) embed the library and do the same mapping for their protocol.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{debug, info};

use caproute::commands::register_builtins;
use caproute::config::CaprouteConfig;
use caproute::logging;
use caproute::router::{CapabilityRouter, DispatchError};
use caproute::types::ArgumentBag;
use caproute::validator::{CredentialValidator, StaticTokenStore};

/// Capability router: named commands with credential-gated dispatch.
#[derive(Debug, Parser)]
#[command(name = "caproute", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Dispatch a command by name and print its result.
    Call {
        /// Command name; canonicalized before lookup.
        name: String,
        /// Arguments as `key=value` pairs. Values parse as JSON when they
        /// can, otherwise as plain strings.
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,
        /// Bearer token presented to the credential gate.
        #[arg(long)]
        token: Option<String>,
    },
    /// List registered commands by canonical name.
    List,
    /// Show how many tokens the credential store knows.
    Tokens,
}

fn main() -> Result<()> {
    let config = CaprouteConfig::load().context("failed to load configuration")?;

    // File logging only when a logs dir is configured; the guard must
    // outlive all dispatches so buffered entries flush on exit.
    let _logging_guard = match config.logging.logs_dir {
        Some(ref dir) => Some(logging::init_production(
            std::path::Path::new(dir),
            &config.logging.log_level,
        )?),
        None => {
            logging::init_cli(&config.logging.log_level);
            None
        }
    };

    let cli = Cli::parse();

    let router = build_router(&config)?;
    register_builtins(&router).context("failed to register built-in commands")?;

    match cli.command {
        Command::Call { name, args, token } => {
            let bag = parse_args(&args)?;
            let value = router
                .dispatch(&name, &bag, token.as_deref())
                .map_err(describe_dispatch_error)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&value).context("failed to render result")?
            );
        }
        Command::List => {
            for name in router.command_names() {
                println!("{name}");
            }
        }
        Command::Tokens => {
            let path = config.token_file_path()?;
            let store = StaticTokenStore::load(&path)
                .with_context(|| format!("failed to load token store {}", path.display()))?;
            println!("{} token(s) loaded", store.len());
        }
    }

    Ok(())
}

/// Build the router, attaching the credential gate when configured.
fn build_router(config: &CaprouteConfig) -> Result<CapabilityRouter> {
    let validator: Option<Arc<dyn CredentialValidator>> = if config.auth.require_token {
        let path = config.token_file_path()?;
        let store = StaticTokenStore::load(&path)
            .with_context(|| format!("failed to load token store {}", path.display()))?;
        info!(tokens = store.len(), "credential gating enabled");
        Some(Arc::new(store))
    } else {
        debug!("credential gating disabled");
        None
    };

    Ok(CapabilityRouter::new(validator, config.router.on_duplicate))
}

/// Parse `key=value` pairs into an argument bag.
///
/// Values that parse as JSON keep their type (`count=3` is a number,
/// `flag=true` a bool); anything else is a plain string.
fn parse_args(pairs: &[String]) -> Result<ArgumentBag> {
    let mut bag = ArgumentBag::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("argument {pair:?} is not of the form key=value"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()));
        bag.insert(key.to_owned(), value);
    }
    Ok(bag)
}

/// Turn a dispatch error into a user-facing message, the way an HTTP host
/// would map it onto 401 / 404 / 500.
fn describe_dispatch_error(e: DispatchError) -> anyhow::Error {
    match e {
        DispatchError::Unauthorized => anyhow::anyhow!("unauthorized: credential rejected"),
        DispatchError::NotFound(name) => anyhow::anyhow!("no such command: {name}"),
        DispatchError::HandlerFailed(cause) => cause.context("command failed"),
    }
}
