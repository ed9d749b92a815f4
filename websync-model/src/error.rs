//! Error types for models.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by models or while interpreting model data.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A record lacked a field the model needs.
    #[error("missing field: {0}")]
    MissingField(String),

    /// A record or schema entry had an unexpected shape.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The source system could not be read.
    #[error("source error: {0}")]
    Source(String),

    /// A token or content type name was malformed.
    #[error(transparent)]
    Types(#[from] websync_types::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
