//! Caproute — a capability router.
//!
//! A registry of named commands invoked by string key, optionally gated by
//! a bearer-credential check before invocation. Command names are
//! canonicalized (ASCII alphanumerics and underscores, lowercased) so
//! registration and dispatch agree on spelling; handler faults are caught
//! at the dispatch boundary.
//!
//! See `DESIGN.md` for architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod commands;
pub mod config;
pub mod logging;
pub mod router;
pub mod types;
pub mod validator;
