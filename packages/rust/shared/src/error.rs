//! Error types for contractsync.
//!
//! Library crates use [`ContractSyncError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Most failures in the sync pipeline degrade to partial data instead of
//! surfacing here; see the crate docs of `contractsync-fetch` and
//! `contractsync-enrich`. The one error that is meant to halt a run is
//! [`ContractSyncError::Validation`] raised by the cleaning stage.

use std::path::PathBuf;

/// Top-level error type for all contractsync operations.
#[derive(Debug, thiserror::Error)]
pub enum ContractSyncError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// HTTP client construction or request setup error.
    #[error("network error: {0}")]
    Network(String),

    /// Record store read/write error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Detail-page enrichment error.
    #[error("enrichment error: {0}")]
    Enrichment(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (column set mismatch, invalid value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ContractSyncError>;

impl ContractSyncError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
