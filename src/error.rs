//! Error types for davlock
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, bad config, session offline)
//! - 3: Lock conflict (file locked by someone, unlock refused)
//! - 4: Operation failed (transport, journal, server error)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the davlock CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const CONFLICT: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for davlock operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Account is not connected")]
    NotConnected,

    // Lock conflicts (exit code 3)
    #[error("File {path} is locked by {holder}")]
    AlreadyLocked { path: String, holder: String },

    #[error("File {path} is locked by {holder} and cannot be unlocked")]
    ForeignLock { path: String, holder: String },

    #[error("Server refused to unlock {path}")]
    UnlockRejected { path: String },

    // Operation failures (exit code 4)
    #[error("Lock request for {path} failed: {message}")]
    Transport {
        path: String,
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Journal lock acquisition failed: {0}")]
    JournalLocked(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidConfig(_) | Error::InvalidArgument(_) | Error::NotConnected => {
                exit_codes::USER_ERROR
            }

            Error::AlreadyLocked { .. }
            | Error::ForeignLock { .. }
            | Error::UnlockRejected { .. } => exit_codes::CONFLICT,

            Error::Transport { .. }
            | Error::Http(_)
            | Error::Url(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::JournalLocked(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// True when the server rejected the transition because of an existing lock
    pub fn is_conflict(&self) -> bool {
        self.exit_code() == exit_codes::CONFLICT
    }

    /// Structured details for JSON output, when the error carries any
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::AlreadyLocked { path, holder } | Error::ForeignLock { path, holder } => {
                Some(serde_json::json!({ "path": path, "holder": holder }))
            }
            Error::UnlockRejected { path } => Some(serde_json::json!({ "path": path })),
            Error::Transport { path, status, .. } => {
                Some(serde_json::json!({ "path": path, "status": status }))
            }
            _ => None,
        }
    }
}

/// Result type alias for davlock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
