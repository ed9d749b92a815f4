//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing service rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// A path could not be used for the requested operation.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
