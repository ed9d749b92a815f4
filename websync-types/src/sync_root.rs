//! Run-scoped staging namespace names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the staging namespace created at the start of a sync run,
/// e.g. `sync--2024-03-01--14-05-09`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncRootName(String);

impl SyncRootName {
    /// Creates a sync root name from `prefix` and the current time.
    #[must_use]
    pub fn now(prefix: &str) -> Self {
        Self::at(prefix, Utc::now())
    }

    /// Creates a sync root name from `prefix` and a fixed instant.
    #[must_use]
    pub fn at(prefix: &str, instant: DateTime<Utc>) -> Self {
        Self(format!("{prefix}--{}", instant.format("%Y-%m-%d--%H-%M-%S")))
    }

    /// Returns the name as a store path segment.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SyncRootName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
