//! Sync engine for websync.
//!
//! Pulls every row of an external source into the store's `data` namespace,
//! then resolves the relationships records declare between content types,
//! in both directions.
//!
//! # Architecture
//!
//! The store offers single-shot reads and writes only. A run therefore works
//! in a scratch namespace (the *sync root*, `{prefix}--YYYY-MM-DD--HH-MM-SS`)
//! and removes it when done.
//!
//! ## Components
//!
//! - **Protocol**: Validates a model once and lays out its store paths
//! - **Stages**: Staging, reconcile and prune against the target namespace
//! - **Forward**: Rebuilds each record's relationship fields and fills the reverse index
//! - **Reverse**: Writes back-references onto related records, clears stale ones
//! - **Orchestrator**: Runs every source, then the report, signals and finalize
//!
//! ## Sync Process
//!
//! 1. **Create root**: Reset the sync root, including the reverse index
//! 2. **Stage**: List the source into `{syncRoot}/{type}/{key}`
//! 3. **Reconcile**: Upsert staged rows into `data/{type}` by business key
//! 4. **Prune**: Remove target records the source no longer lists
//! 5. **Forward**: Resolve each (record, descriptor) pair
//! 6. **Reverse**: Write back-reference arrays, clear stale fields
//! 7. **Report / signal / finalize**
//!
//! A source that fails a stage skips the rest; other sources carry on.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use websync_storage::MemoryStore;
//! use websync_sync::{SyncConfig, SyncOrchestrator};
//!
//! let config = SyncConfig {
//!     site_name: Some("my-site".to_string()),
//!     ..Default::default()
//! };
//! let orchestrator = SyncOrchestrator::new(Arc::new(MemoryStore::new()), config).unwrap();
//! assert_eq!(orchestrator.executor().limit(), 10);
//! ```

mod cache;
mod config;
pub mod drain;
mod error;
mod executor;
pub mod forward;
pub mod map;
mod orchestrator;
pub mod protocol;
pub mod report;
pub mod reverse;
mod reverse_index;
pub mod search;
pub mod signal;
mod source;
pub mod staging;

pub use cache::RelatedDataCache;
pub use config::{RetryPolicy, SyncConfig};
pub use drain::{wait_for_interrupt, Drain, DrainReport};
pub use error::{Stage, SyncError, SyncResult};
pub use executor::BoundedExecutor;
pub use forward::{ForwardOutcome, ForwardResolver, ResolutionUnit};
pub use map::{MapCoordinator, MapOutcome, MappedControl, RelatedControl};
pub use orchestrator::{SyncOrchestrator, SyncRun};
pub use protocol::{Combination, SyncPaths, SyncProtocol, REVERSE_ROOT};
pub use report::{Report, ReportEntry, ReportPublisher};
pub use reverse::{FieldAddress, ReverseEntry, ReverseOutcome, ReverseResolver};
pub use reverse_index::ReverseIndex;
pub use search::{NoopIndex, RetryingIndex, SearchIndex};
pub use signal::{Signal, SignalKind, SignalPayload};
pub use source::SyncSource;
pub use staging::{SourceStages, StageCounts};
