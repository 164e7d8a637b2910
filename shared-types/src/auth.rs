use serde::{Deserialize, Serialize};

/// Contacts permission state for the current process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// Access has not been requested yet.
    NotDetermined,
    /// Policy restrictions prevent access.
    Restricted,
    /// The user denied access.
    Denied,
    /// Access is granted.
    Authorized,
}

impl AuthStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthStatus::Authorized)
    }
}
