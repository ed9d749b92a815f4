//! Graceful shutdown of outstanding collaborators.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;

/// A collaborator with work that must finish before the process exits.
#[async_trait]
pub trait Drain: Send + Sync {
    /// Name used in logs and the drain report.
    fn name(&self) -> &str;

    /// Completes outstanding work.
    async fn drain(&self) -> SyncResult<()>;
}

/// Outcome of draining every registered collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub drained: Vec<String>,
    pub failed: Vec<String>,
    pub timed_out: Vec<String>,
}

impl DrainReport {
    /// Whether everything finished cleanly.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

/// Resolves when the process receives an interrupt.
pub async fn wait_for_interrupt() -> SyncResult<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| SyncError::Config(format!("could not listen for interrupt: {e}")))
}
