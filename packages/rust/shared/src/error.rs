//! Error types for leadscout.
//!
//! Library crates use [`LeadscoutError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all leadscout operations.
#[derive(Debug, thiserror::Error)]
pub enum LeadscoutError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while talking to a search, news, or page source.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or API response parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The ledger's backing store could not be read, written, or timed out.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A single ledger row could not be parsed.
    #[error("malformed record at row {row}: {message}")]
    MalformedRecord { row: usize, message: String },

    /// Language-model call or reply interpretation error.
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Mail delivery or CRM submission error.
    #[error("notification error: {0}")]
    Notification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A run task panicked or was cancelled before reporting.
    #[error("run task failed: {0}")]
    Task(String),

    /// Data validation error (bad input, unexpected format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LeadscoutError>;

impl LeadscoutError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a storage error from any displayable message.
    pub fn storage(msg: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(msg.to_string())
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
