//! Signals written to the commands node for downstream processes.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use websync_storage::{Store, StorePath};

/// Kinds of signal a run can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// Rebuild the site.
    Build,
    /// Rebuild the site's search index.
    SiteSearchReindex,
}

impl SignalKind {
    /// The node name under the commands path.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Build => "build",
            SignalKind::SiteSearchReindex => "siteSearchReindex",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a signal writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalPayload {
    /// Unique, time-ordered identifier of this signal.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
    pub sitename: String,
}

/// Sends signals for one site.
pub struct Signal {
    store: Arc<dyn Store>,
    commands: StorePath,
    site_name: String,
    user: Option<String>,
}

impl Signal {
    pub fn new(
        store: Arc<dyn Store>,
        commands: StorePath,
        site_name: impl Into<String>,
        user: Option<String>,
    ) -> Self {
        Self {
            store,
            commands,
            site_name: site_name.into(),
            user,
        }
    }

    /// Builds a signal from configuration. Fails if no site name is set.
    pub fn from_config(store: Arc<dyn Store>, config: &SyncConfig) -> SyncResult<Self> {
        let site_name = config
            .site_name
            .clone()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| SyncError::Signal("no site name configured".into()))?;
        Ok(Self::new(
            store,
            StorePath::parse(&config.commands_path),
            site_name,
            config.signal_user.clone(),
        ))
    }

    /// Writes `{commands}/{kind}/{site}` and returns what was written.
    pub async fn send(&self, kind: SignalKind) -> SyncResult<SignalPayload> {
        let payload = SignalPayload {
            id: Uuid::now_v7().to_string(),
            userid: self.user.clone(),
            sitename: self.site_name.clone(),
        };
        let path = self.commands.child(kind.as_str()).child(self.site_name.clone());
        self.store
            .write(&path, serde_json::to_value(&payload)?)
            .await
            .map_err(|e| SyncError::Signal(format!("{kind}: {e}")))?;
        info!("Sent {} signal for {}", kind, self.site_name);
        Ok(payload)
    }
}
