//! Per-stage cache of related content type data.

use crate::error::SyncResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;
use websync_storage::{Store, StorePath};

/// Reads each content type under the data root at most once.
///
/// Concurrent callers asking for the same type share a single read. Callers
/// get their own copy of the data and may mutate it freely. The cache lives
/// as long as the stage that created it.
pub struct RelatedDataCache {
    store: Arc<dyn Store>,
    data_root: StorePath,
    entries: Mutex<HashMap<String, Arc<OnceCell<Option<Value>>>>>,
}

impl RelatedDataCache {
    pub fn new(store: Arc<dyn Store>, data_root: StorePath) -> Self {
        Self {
            store,
            data_root,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a copy of `data/{content_type}`, reading the store on first use.
    pub async fn get(&self, content_type: &str) -> SyncResult<Option<Value>> {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries
                .entry(content_type.to_string())
                .or_default()
                .clone()
        };
        let value = cell
            .get_or_try_init(|| async {
                debug!("Fetching related data for {}", content_type);
                self.store
                    .read(&self.data_root.child(content_type))
                    .await
            })
            .await?;
        Ok(value.clone())
    }

    /// Number of content types requested so far.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
