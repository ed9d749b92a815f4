//! Content model for websync.
//!
//! Defines the types the sync engine and its models agree on:
//! - [`ContentType`] / [`Control`]: the store's content type schema
//! - [`ContentTypeKeyPath`]: key-path algebra over a schema, including grids
//! - [`RelationshipDescriptor`]: what a record wants related, produced per record by a model
//! - [`SyncModel`]: the capability interface a source must implement to be synced
//! - [`MapModel`]: the capability interface for in-place record mapping
//!
//! Records themselves are plain JSON objects ([`Record`]); the schema is only
//! consulted by callers that need key paths.

mod descriptor;
mod error;
mod key_path;
mod model;
mod record;
mod schema;

pub use descriptor::RelationshipDescriptor;
pub use error::{ModelError, ModelResult};
pub use key_path::{
    content_type_key_paths, related_key_paths, ContentTypeKeyPath, ControlKeys, KeyPathControl,
    KeyPathSegment,
};
pub use model::{MapModel, SourceStream, SyncModel};
pub use record::{is_truthy, Record};
pub use schema::{content_types_from_value, ContentType, Control, ControlMeta, ControlType};
