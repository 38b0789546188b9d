//! Error types for the session layer
//!
//! `Error` is what library calls return. `ErrorKind` is the user-facing
//! taxonomy that SDK failures are sorted into; `ErrorKind::classify` is the
//! single place raw SDK error text is inspected.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication failed ({kind}): {message}")]
    Auth { kind: ErrorKind, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed auth or dispatch call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No wallet identity is committed
    NotAuthenticated,
    /// The user abandoned the passkey prompt or rejected the request
    UserCancelled,
    /// The wallet cannot cover the transfer or fee
    InsufficientFunds,
    /// The SDK reports a connection the local session does not know about
    StateDrift,
    Unknown,
}

/// Message fragments that mark a user-initiated cancellation
const CANCELLED_MARKERS: &[&str] = &[
    "cancel",
    "notallowederror",
    "not allowed",
    "user rejected",
    "user denied",
    "rejected by user",
    "aborterror",
    "operation was aborted",
    "closed by user",
];

const DRIFT_MARKERS: &[&str] = &["already connected"];

const INSUFFICIENT_MARKERS: &[&str] = &["insufficient"];

/// System Program custom error 1 (`ResultWithNegativeLamports`, i.e. not enough SOL)
const SYSTEM_INSUFFICIENT_CODE: &str = "custom program error: 0x1";

impl ErrorKind {
    /// Sort a raw SDK error message into a kind.
    ///
    /// Cancellation wins over drift, and drift over insufficient funds, so a
    /// message like "user cancelled: already connected" never triggers a
    /// refresh.
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();

        if CANCELLED_MARKERS.iter().any(|m| lowered.contains(m)) {
            return ErrorKind::UserCancelled;
        }
        if DRIFT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return ErrorKind::StateDrift;
        }
        if INSUFFICIENT_MARKERS.iter().any(|m| lowered.contains(m))
            || contains_code(&lowered, SYSTEM_INSUFFICIENT_CODE)
        {
            return ErrorKind::InsufficientFunds;
        }

        ErrorKind::Unknown
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::NotAuthenticated => "not_authenticated",
            ErrorKind::UserCancelled => "user_cancelled",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::StateDrift => "state_drift",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// True if `code` appears in `haystack` and is not the prefix of a longer hex code
fn contains_code(haystack: &str, code: &str) -> bool {
    haystack.match_indices(code).any(|(start, _)| {
        haystack[start + code.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_hexdigit())
    })
}
