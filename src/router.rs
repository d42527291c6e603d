//! Capability router — named handlers with credential-gated dispatch.
//!
//! The router owns a map from canonical command name to handler. Callers
//! present `(name, args, optional credential)`; the router canonicalizes
//! the name, runs the credential check when gating is enabled, and invokes
//! the matched handler. Handler faults (error returns and panics) are
//! caught at the dispatch boundary and never crash the router.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ArgumentBag, Identity};
use crate::validator::CredentialValidator;

/// A registered unit of behavior invoked by [`CapabilityRouter::dispatch`].
///
/// Receives the caller's argument bag verbatim, plus the identity bound by
/// the credential check when the router is gated. Handlers run concurrently
/// if dispatched concurrently; one that mutates shared state beyond its own
/// arguments owns its own locking.
pub type Handler =
    Arc<dyn Fn(&ArgumentBag, Option<&Identity>) -> anyhow::Result<Value> + Send + Sync>;

/// What `register` does when the canonical name is already taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Silently replace the existing handler (logged at `debug`).
    #[default]
    Overwrite,
    /// Refuse the registration with [`RegisterError::DuplicateCommand`].
    Reject,
}

/// Registration failure, reported synchronously to the registrant.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The canonical name is already registered and the router is in
    /// [`DuplicatePolicy::Reject`] mode.
    #[error("command {0:?} is already registered")]
    DuplicateCommand(String),
}

/// Dispatch failure taxonomy.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Gating is enabled and the credential was missing or unrecognized.
    /// The two cases are deliberately indistinguishable to the caller.
    #[error("unauthorized")]
    Unauthorized,
    /// No command matches the canonical form of the requested name.
    /// Carries the raw name as the caller presented it.
    #[error("command {0:?} not found")]
    NotFound(String),
    /// The matched handler itself failed, by error return or panic.
    #[error("handler failed: {0}")]
    HandlerFailed(#[source] anyhow::Error),
}

/// Reduce a raw command name to its canonical lookup key.
///
/// Keeps ASCII letters, digits, and underscores, drops everything else
/// (no substitution character), then lowercases. Applied identically at
/// registration and dispatch, so the two always agree. An empty result is
/// a legal key.
pub fn canonical_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Registry of named commands with optional credential gating.
///
/// Explicitly constructed and shared by reference; there is no global
/// instance. The command map sits behind an [`RwLock`] so concurrent
/// dispatches proceed in parallel while registration serializes against
/// them — hot-registration after traffic starts is supported.
pub struct CapabilityRouter {
    commands: RwLock<HashMap<String, Handler>>,
    validator: Option<Arc<dyn CredentialValidator>>,
    duplicates: DuplicatePolicy,
}

impl std::fmt::Debug for CapabilityRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRouter")
            .field("commands", &self.command_names())
            .field("gated", &self.validator.is_some())
            .field("duplicates", &self.duplicates)
            .finish()
    }
}

impl Default for CapabilityRouter {
    fn default() -> Self {
        Self::new(None, DuplicatePolicy::default())
    }
}

impl CapabilityRouter {
    /// Create a router.
    ///
    /// With a validator every dispatch is gated: the credential must
    /// resolve to an identity before any handler runs. Without one,
    /// credentials are ignored.
    pub fn new(
        validator: Option<Arc<dyn CredentialValidator>>,
        duplicates: DuplicatePolicy,
    ) -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
            validator,
            duplicates,
        }
    }

    /// Register `handler` under the canonical form of `raw_name`.
    ///
    /// Two raw names that canonicalize identically collide by design.
    /// Safe to call concurrently with dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::DuplicateCommand`] when the key is taken
    /// and the router is in [`DuplicatePolicy::Reject`] mode.
    pub fn register(&self, raw_name: &str, handler: Handler) -> Result<(), RegisterError> {
        let key = canonical_name(raw_name);

        // Handlers never run under this lock, so a poisoned guard still
        // holds a consistent map; recover it rather than degrade.
        let mut map = self
            .commands
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        match self.duplicates {
            DuplicatePolicy::Reject => {
                if map.contains_key(&key) {
                    return Err(RegisterError::DuplicateCommand(key));
                }
                map.insert(key, handler);
            }
            DuplicatePolicy::Overwrite => {
                if map.insert(key.clone(), handler).is_some() {
                    debug!(command = %key, "re-registration replaced existing handler");
                }
            }
        }
        Ok(())
    }

    /// Dispatch `name` with `args`, presenting `credential` if the caller
    /// has one.
    ///
    /// Lookup uses the same canonicalization as registration, so callers
    /// need not pre-normalize. When gating is enabled the credential check
    /// runs first and a failure means the handler is never invoked — a
    /// hard guarantee, not best-effort. The handler's value is returned
    /// verbatim.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Unauthorized`] when gating rejects the credential,
    /// [`DispatchError::NotFound`] when nothing matches the canonical name,
    /// [`DispatchError::HandlerFailed`] when the matched handler errors or
    /// panics. The router remains usable after any of these.
    pub fn dispatch(
        &self,
        name: &str,
        args: &ArgumentBag,
        credential: Option<&str>,
    ) -> Result<Value, DispatchError> {
        // Gate before touching the command map.
        let identity = match &self.validator {
            Some(validator) => match validator.validate(credential.unwrap_or("")) {
                Some(identity) => Some(identity),
                None => {
                    debug!(command = %name, "dispatch rejected: credential missing or unknown");
                    return Err(DispatchError::Unauthorized);
                }
            },
            None => None,
        };

        let key = canonical_name(name);
        let handler = {
            let map = self.commands.read().unwrap_or_else(PoisonError::into_inner);
            map.get(&key).cloned()
        };
        let handler = handler.ok_or_else(|| DispatchError::NotFound(name.to_owned()))?;

        // Invoked outside the lock so dispatches to other commands are not
        // blocked, and a panicking handler cannot poison the map.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(args, identity.as_ref())));

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                debug!(command = %key, error = %e, "handler returned an error");
                Err(DispatchError::HandlerFailed(e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(command = %key, panic = %message, "handler panicked during dispatch");
                Err(DispatchError::HandlerFailed(anyhow::anyhow!(
                    "handler panicked: {message}"
                )))
            }
        }
    }

    /// Canonical names of all registered commands, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let map = self.commands.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered commands.
    pub fn count(&self) -> usize {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Best-effort extraction of a panic payload's message.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
