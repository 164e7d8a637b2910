use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifies failures reported by the contacts primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authorization to the contacts store is missing.
    PermissionDenied,
    /// A referenced contact or group does not exist.
    NotFound,
    /// Write conflicts, or post-write state that does not match the request.
    Conflict,
    /// Invalid input, detected before any store access.
    Validation,
    /// A storage or automation backend failure.
    Store,
    /// An unmapped failure.
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Conflict => "conflict",
            ErrorCode::Validation => "validation",
            ErrorCode::Store => "store",
            ErrorCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed error shared by every primitive and collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("contacts: {code}{}", message_suffix(.message))]
pub struct ContactsError {
    pub code: ErrorCode,
    #[serde(default)]
    pub message: String,
}

fn message_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

impl ContactsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into().trim().to_string(),
        }
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PermissionDenied, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Store, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unknown, message)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

pub type ContactsResult<T> = Result<T, ContactsError>;
