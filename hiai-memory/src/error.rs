//! Error types for hiai-memory.

use thiserror::Error;

/// Result type alias using hiai-memory's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during memory store operations.
///
/// Absent keys and dangling link endpoints are not errors: those are reported
/// through `Option`/`bool` return values.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage driver failure (permission, disk full, corruption)
    #[error("Memory storage error: {0}")]
    MemoryStorage(String),

    /// Filesystem error while preparing the storage location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown ranking strategy name
    #[error("Unknown search strategy: {0}")]
    InvalidStrategy(String),

    /// Malformed caller input (bad tool arguments, non-finite weight, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Tool name not present in the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the error came from the storage layer rather than the caller.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::MemoryStorage(_) | Self::Io(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::MemoryStorage(err.to_string())
    }
}
