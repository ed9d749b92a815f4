//! The run-scoped reverse index.
//!
//! Layout under `{syncRoot}/reverseRelationships`:
//!
//! ```text
//! {targetType}/{targetKey}/{reverseKey}/{token} = true   collection target
//! {targetType}/{reverseKey}/{token} = true               one-off target
//! ```

use crate::error::SyncResult;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::trace;
use websync_storage::{Store, StorePath};
use websync_types::{RelationToken, ReverseKey};

/// Writes into the reverse index, creating its scaffolding nodes on demand.
///
/// One instance is shared by every source of a run so that scaffolding
/// checks and creations never interleave.
pub struct ReverseIndex {
    store: Arc<dyn Store>,
    root: StorePath,
    ensured: Mutex<HashSet<StorePath>>,
}

impl ReverseIndex {
    pub fn new(store: Arc<dyn Store>, root: StorePath) -> Self {
        Self {
            store,
            root,
            ensured: Mutex::new(HashSet::new()),
        }
    }

    pub fn root(&self) -> &StorePath {
        &self.root
    }

    /// `{root}/{targetType}`
    pub fn target_node(&self, target_content_type: &str) -> StorePath {
        self.root.child(target_content_type)
    }

    /// `{root}/{targetType}[/{targetKey}]/{reverseKey}`
    pub fn key_node(
        &self,
        target_content_type: &str,
        target_key: Option<&str>,
        reverse_key: &ReverseKey,
    ) -> StorePath {
        let node = self.target_node(target_content_type);
        let node = match target_key {
            Some(key) => node.child(key),
            None => node,
        };
        node.child(reverse_key.to_string())
    }

    /// Creates `path` as an empty node if it does not exist yet.
    pub async fn ensure(&self, path: &StorePath) -> SyncResult<()> {
        let mut ensured = self.ensured.lock().await;
        if ensured.contains(path) {
            return Ok(());
        }
        if self.store.read(path).await?.is_none() {
            trace!("Creating reverse index node {}", path);
            self.store.write(path, json!({})).await?;
        }
        ensured.insert(path.clone());
        Ok(())
    }

    /// Ensures the root and the target type node.
    pub async fn ensure_target(&self, target_content_type: &str) -> SyncResult<()> {
        self.ensure(&self.root).await?;
        self.ensure(&self.target_node(target_content_type)).await
    }

    /// Records that `token` relates to the target entry as `reverse_key`.
    pub async fn record(
        &self,
        target_content_type: &str,
        target_key: Option<&str>,
        reverse_key: &ReverseKey,
        token: &RelationToken,
    ) -> SyncResult<()> {
        if let Some(key) = target_key {
            self.ensure(&self.target_node(target_content_type).child(key))
                .await?;
        }
        let node = self.key_node(target_content_type, target_key, reverse_key);
        self.ensure(&node).await?;
        self.store
            .write(&node.child(token.to_string()), Value::Bool(true))
            .await?;
        Ok(())
    }

    /// Reads everything recorded for a target type.
    pub async fn read_target(&self, target_content_type: &str) -> SyncResult<Option<Value>> {
        Ok(self.store.read(&self.target_node(target_content_type)).await?)
    }
}
