//! Bounded concurrency for independent store operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Runs independent tasks with a fixed ceiling on how many are outstanding.
///
/// Clones share the same ceiling. Tasks beyond it queue in submission order.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl BoundedExecutor {
    /// Creates an executor allowing `limit` simultaneous tasks (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// The concurrency ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }

    /// Runs one task once a slot is free.
    pub async fn run<F: Future>(&self, task: F) -> F::Output {
        // The semaphore is never closed, so a permit always arrives.
        let _permit = self.semaphore.acquire().await.ok();
        task.await
    }

    /// Runs every task, at most `limit` at a time, and waits for all of them
    /// to settle. Results are returned in submission order.
    pub async fn run_all<I>(&self, tasks: I) -> Vec<<I::Item as Future>::Output>
    where
        I: IntoIterator,
        I::Item: Future,
    {
        futures::future::join_all(tasks.into_iter().map(|task| self.run(task))).await
    }

    /// Like [`BoundedExecutor::run_all`], then returns the first error, if any.
    /// Every task has finished by the time an error is reported.
    pub async fn try_run_all<I, T, E>(&self, tasks: I) -> Result<Vec<T>, E>
    where
        I: IntoIterator,
        I::Item: Future<Output = Result<T, E>>,
    {
        self.run_all(tasks).await.into_iter().collect()
    }

    /// Waits for every in-flight task to finish, up to `timeout`.
    /// Returns false if tasks were still running when the wait ended.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let limit = u32::try_from(self.limit).unwrap_or(u32::MAX);
        match tokio::time::timeout(timeout, self.semaphore.acquire_many(limit)).await {
            Ok(_) => {
                debug!("Executor drained");
                true
            }
            Err(_) => {
                warn!("Executor drain timed out with {} tasks in flight", self.in_flight());
                false
            }
        }
    }
}
