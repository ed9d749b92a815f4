//! Search index collaborator.

use crate::config::RetryPolicy;
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// A search index kept in step with the target namespace.
///
/// Failures are reported back to the pipeline as warnings; they never stop a
/// sync.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Indexes (or re-indexes) one record.
    async fn add_to_index(
        &self,
        content_type: &str,
        document: &Value,
        id: &str,
        one_off: bool,
    ) -> SyncResult<()>;

    /// Removes one record from the index.
    async fn remove_from_index(&self, content_type: &str, id: &str) -> SyncResult<()>;
}

#[async_trait]
impl<I: SearchIndex + ?Sized> SearchIndex for Arc<I> {
    async fn add_to_index(
        &self,
        content_type: &str,
        document: &Value,
        id: &str,
        one_off: bool,
    ) -> SyncResult<()> {
        (**self)
            .add_to_index(content_type, document, id, one_off)
            .await
    }

    async fn remove_from_index(&self, content_type: &str, id: &str) -> SyncResult<()> {
        (**self).remove_from_index(content_type, id).await
    }
}

/// An index that accepts everything and stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopIndex;

#[async_trait]
impl SearchIndex for NoopIndex {
    async fn add_to_index(&self, _: &str, _: &Value, _: &str, _: bool) -> SyncResult<()> {
        Ok(())
    }

    async fn remove_from_index(&self, _: &str, _: &str) -> SyncResult<()> {
        Ok(())
    }
}

/// Retries a flaky index with capped exponential backoff and jitter.
pub struct RetryingIndex<I> {
    inner: I,
    policy: RetryPolicy,
}

impl<I: SearchIndex> RetryingIndex<I> {
    pub fn new(inner: I, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    async fn pause(&self, operation: &str, attempt: u32, error: &SyncError) {
        let delay = self.policy.delay(attempt);
        debug!(
            "{} failed (attempt {}/{}), retrying in {:?}: {}",
            operation,
            attempt + 1,
            self.policy.max_attempts + 1,
            delay,
            error
        );
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl<I: SearchIndex> SearchIndex for RetryingIndex<I> {
    async fn add_to_index(
        &self,
        content_type: &str,
        document: &Value,
        id: &str,
        one_off: bool,
    ) -> SyncResult<()> {
        let mut attempt = 0;
        loop {
            match self
                .inner
                .add_to_index(content_type, document, id, one_off)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.max_attempts => {
                    self.pause("add_to_index", attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Giving up indexing {}/{}: {}", content_type, id, e);
                    return Err(e);
                }
            }
        }
    }

    async fn remove_from_index(&self, content_type: &str, id: &str) -> SyncResult<()> {
        let mut attempt = 0;
        loop {
            match self.inner.remove_from_index(content_type, id).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.policy.max_attempts => {
                    self.pause("remove_from_index", attempt, &e).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Giving up removing {}/{} from index: {}", content_type, id, e);
                    return Err(e);
                }
            }
        }
    }
}
