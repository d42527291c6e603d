//! Built-in command set registered by the CLI binary.
//!
//! These are deliberately small: echo-style CRUD verbs, a liveness check,
//! and `whoami`, which reports the identity bound by the credential gate.
//! Library embedders register their own handlers instead.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::router::{CapabilityRouter, RegisterError};

/// Echo-style verbs that report their own name and arguments.
const ECHO_COMMANDS: [&str; 6] = ["create", "remove", "update", "delete", "detail", "search"];

/// Register the built-in command set on `router`.
///
/// # Errors
///
/// Returns [`RegisterError::DuplicateCommand`] when the router rejects
/// duplicates and one of the names is already taken.
pub fn register_builtins(router: &CapabilityRouter) -> Result<(), RegisterError> {
    router.register("ping", Arc::new(|_args, _identity| Ok(json!("pong"))))?;

    router.register(
        "echo",
        Arc::new(|args, _identity| Ok(Value::Object(args.clone()))),
    )?;

    // Reports who the credential gate says you are. Without gating there
    // is no identity to report.
    router.register(
        "whoami",
        Arc::new(|_args, identity| match identity {
            Some(identity) => Ok(serde_json::to_value(identity)?),
            None => Ok(json!({ "user": "anonymous" })),
        }),
    )?;

    for name in ECHO_COMMANDS {
        router.register(
            name,
            Arc::new(move |args, _identity| {
                Ok(json!({ "command": name, "args": Value::Object(args.clone()) }))
            }),
        )?;
    }

    Ok(())
}
