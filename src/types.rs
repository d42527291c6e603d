//! Shared dispatch types: argument bags and identities.

use serde::{Deserialize, Serialize};

/// Unordered string-keyed payload passed verbatim to a handler.
///
/// The router never inspects its contents; each handler pulls out the keys
/// it cares about. Values are dynamically typed JSON (string, number, bool,
/// list, mapping).
pub type ArgumentBag = serde_json::Map<String, serde_json::Value>;

/// The record a valid credential resolves to.
///
/// Opaque context from the router's point of view: it is bound into the
/// call and forwarded to the handler, never read by the router itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Username the credential belongs to.
    pub user: String,
    /// Contact email, if the store records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Contact phone, if the store records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Identity {
    /// Build an identity carrying only a username.
    pub fn named(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            email: None,
            phone: None,
        }
    }
}
