//! Error types for snapsync-core

use thiserror::Error;

/// Result type alias using snapsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in snapsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image not found
    #[error("Image not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request never produced a usable response (unreachable, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side answered with a non-success status
    #[error("Sync API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// A payload crossing the wire did not match the expected shape
    #[error("Data anomaly: {0}")]
    DataAnomaly(String),

    /// Another reconciliation round is still running
    #[error("A sync round is already in progress")]
    SyncInProgress,
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::DataAnomaly(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}
