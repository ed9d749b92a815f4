//! Sync configuration.

use crate::error::{SyncError, SyncResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry schedule for integration collaborators.
///
/// Attempt `n` (zero-based) waits `min(base * 2^n, max) + uniform(0, jitter)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first failure before giving up.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 32_000,
            jitter_ms: 10,
        }
    }
}

impl RetryPolicy {
    /// The delay before retry `attempt`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// The delay before retry `attempt`, with jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(jitter)
    }
}

/// Configuration for a sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Prefix of the run-scoped staging namespace.
    pub sync_node: String,
    /// Root of the target namespace.
    pub data_root: String,
    /// Where per-content-type report entries are kept.
    pub report_path: String,
    /// Where signals are written for downstream processes.
    pub commands_path: String,
    /// Content type schema namespace.
    pub content_type_root: String,
    /// Site the signals are addressed to.
    pub site_name: Option<String>,
    /// User recorded on signal payloads.
    pub signal_user: Option<String>,
    /// Maximum simultaneous outstanding store operations.
    pub concurrency: usize,
    /// Bounded wait per outstanding task when draining.
    pub drain_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_node: "sync".to_string(),
            data_root: "data".to_string(),
            report_path: "syncReport".to_string(),
            commands_path: "management/commands".to_string(),
            content_type_root: "contentType".to_string(),
            site_name: None,
            signal_user: None,
            concurrency: 10,
            drain_timeout_ms: 5_000,
            retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overlaid with `SYNC_NODE`, `SITE_NAME`, `SITE_USER` and
    /// `SYNC_CONCURRENCY` from the environment.
    pub fn from_env() -> SyncResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`SyncConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> SyncResult<Self> {
        let mut config = Self::default();
        if let Some(node) = lookup("SYNC_NODE").filter(|v| !v.trim().is_empty()) {
            config.sync_node = node.trim().to_string();
        }
        config.site_name = lookup("SITE_NAME").filter(|v| !v.is_empty());
        config.signal_user = lookup("SITE_USER").filter(|v| !v.is_empty());
        if let Some(raw) = lookup("SYNC_CONCURRENCY") {
            config.concurrency = raw
                .trim()
                .parse()
                .map_err(|_| SyncError::Config(format!("SYNC_CONCURRENCY is not a number: {raw}")))?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the engine cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.concurrency == 0 {
            return Err(SyncError::Config("concurrency must be at least 1".into()));
        }
        if self.sync_node.is_empty() || self.sync_node.contains('/') {
            return Err(SyncError::Config(format!(
                "sync node must be a single path segment: {:?}",
                self.sync_node
            )));
        }
        if self.data_root.is_empty() {
            return Err(SyncError::Config("data root must not be empty".into()));
        }
        Ok(())
    }

    /// The drain timeout as a duration.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}
