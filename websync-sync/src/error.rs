//! Error types for the sync layer.

use std::fmt;
use thiserror::Error;
use websync_model::ModelError;
use websync_storage::StorageError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// The per-source stages of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Source rows are written into the run's staging namespace.
    StageSource,
    /// Staged rows are upserted into the target namespace.
    Reconcile,
    /// Target records missing from the source are removed.
    Prune,
    /// Forward relationships are resolved record by record.
    ForwardResolve,
    /// Back-references are written onto related records.
    ReverseResolve,
}

impl Stage {
    /// Every stage, in the order the orchestrator runs them.
    pub const ALL: [Stage; 5] = [
        Stage::StageSource,
        Stage::Reconcile,
        Stage::Prune,
        Stage::ForwardResolve,
        Stage::ReverseResolve,
    ];

    /// The message recorded when this stage fails or is skipped.
    pub fn failure_message(&self) -> &'static str {
        match self {
            Stage::StageSource => "Could not get source data.",
            Stage::Reconcile => "Could not add source data to webhook data.",
            Stage::Prune => "Could not remove from webhook based on source.",
            Stage::ForwardResolve => "Could not resolve relationships.",
            Stage::ReverseResolve => "Could not resolve reverse relationships.",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StageSource => "stage-source",
            Stage::Reconcile => "reconcile",
            Stage::Prune => "prune",
            Stage::ForwardResolve => "forward-resolve",
            Stage::ReverseResolve => "reverse-resolve",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Model error (listing, keying, descriptors).
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Malformed token, reverse key or content type name.
    #[error(transparent)]
    Types(#[from] websync_types::Error),

    /// A stage failed or was skipped because of earlier errors.
    #[error("{}", .stage.failure_message())]
    Stage { stage: Stage },

    /// The source listed no rows.
    #[error("No source data. Sync stopped.")]
    NoSourceData,

    /// A model failed validation when its protocol adapter was built.
    #[error("model does not conform to sync protocol: {0}")]
    Protocol(String),

    /// Descriptor resolution failed for a single record.
    #[error("could not list relationships for record {key}: {source}")]
    Descriptor { key: String, source: ModelError },

    /// Search index collaborator failure.
    #[error("search index error: {0}")]
    Index(String),

    /// Signal collaborator failure.
    #[error("signal error: {0}")]
    Signal(String),

    /// Report collaborator failure.
    #[error("report error: {0}")]
    Report(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Shorthand for a stage failure.
    pub fn stage(stage: Stage) -> Self {
        Self::Stage { stage }
    }
}
