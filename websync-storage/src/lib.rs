//! Document store layer for websync.
//!
//! The store is a hierarchical key/value tree: every value lives at a
//! `/`-separated path and objects nest arbitrarily. It offers single-shot
//! reads and writes only; there are no transactions and no multi-path
//! atomicity, so consistency is the sync engine's job.
//!
//! # Architecture
//!
//! - [`Store`] is the client contract the engine is written against
//! - [`StorePath`] addresses nodes as segment lists
//! - [`MemoryStore`] is a complete in-process implementation, used for tests
//!   and for dry runs against exported snapshots

mod error;
mod memory;
mod path;
mod store;

pub use error::{StorageError, StorageResult};
pub use memory::{MemoryStore, StoreStats};
pub use path::StorePath;
pub use store::{generate_key, Store};
