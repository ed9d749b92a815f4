//! Core type definitions for websync.
//!
//! The document store has no foreign keys, so relationships between records
//! are encoded as strings. This crate gives those strings a structure:
//! - [`RelationToken`]: `"{content_type} {key}"`, one entry of a relationship list
//! - [`ReverseKey`]: `"{source_type}_{relationship_key}"`, the field a back-reference lives in
//! - [`SyncRootName`]: the timestamped name of a run-scoped staging namespace

mod sync_root;
mod token;

pub use sync_root::SyncRootName;
pub use token::{RelationToken, ReverseKey, TOKEN_SEPARATOR};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid relation token: {0:?}")]
    InvalidToken(String),

    #[error("invalid content type name: {0:?}")]
    InvalidContentType(String),
}

/// Validates a content type name for use inside tokens and store paths.
///
/// Content type names are single path segments and never contain the token
/// separator, which is what keeps [`RelationToken`] parsing unambiguous.
pub fn validate_content_type(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.contains(TOKEN_SEPARATOR)
        && !name.contains('/')
        && !name.chars().any(char::is_whitespace);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidContentType(name.to_string()))
    }
}
