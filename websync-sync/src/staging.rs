//! Staging, reconcile and prune stages.
//!
//! Source rows land under `{syncRoot}/{type}/{keyFromSource}` first. Reconcile
//! then folds them into `data/{type}`, matching on business key, and prune
//! removes target records the source no longer lists.

use crate::error::{SyncError, SyncResult};
use crate::executor::BoundedExecutor;
use crate::protocol::SyncProtocol;
use crate::search::SearchIndex;
use futures::StreamExt;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use websync_model::Record;
use websync_storage::{Store, StorePath};

/// What a stage did, for logging and the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub rows: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    /// Records missing from the source that the model chose to keep.
    pub kept: usize,
}

/// Runs the store-facing stages of one source.
pub struct SourceStages<'a> {
    store: Arc<dyn Store>,
    protocol: &'a SyncProtocol,
    index: &'a dyn SearchIndex,
    executor: &'a BoundedExecutor,
}

impl<'a> SourceStages<'a> {
    pub fn new(
        store: Arc<dyn Store>,
        protocol: &'a SyncProtocol,
        index: &'a dyn SearchIndex,
        executor: &'a BoundedExecutor,
    ) -> Self {
        Self {
            store,
            protocol,
            index,
            executor,
        }
    }

    /// Lists the source and writes every row into staging.
    ///
    /// Rows sharing a key within the run are combined with the model's
    /// `merge_staged`. A listing that yields no rows returns
    /// [`SyncError::NoSourceData`].
    pub async fn stage_source(&self) -> SyncResult<StageCounts> {
        let model = self.protocol.model();
        let staging = &self.protocol.paths().staging;
        let mut rows = model.list_source();
        let mut staged_keys = HashSet::new();
        let mut counts = StageCounts::default();

        while let Some(row) = rows.next().await {
            let row = row?;
            let key = model.key_from_source(&row)?;
            let path = staging.child(key.clone());
            let row = if staged_keys.insert(key) {
                row
            } else {
                match self.executor.run(self.store.read(&path)).await? {
                    Some(Value::Object(existing)) => model.merge_staged(existing, row),
                    _ => row,
                }
            };
            self.executor
                .run(self.store.write(&path, Value::Object(row)))
                .await?;
            counts.rows += 1;
        }

        if counts.rows == 0 {
            return Err(SyncError::NoSourceData);
        }
        info!(
            "Staged {} rows ({} keys) for {}",
            counts.rows,
            staged_keys.len(),
            self.protocol.content_type()
        );
        Ok(counts)
    }

    /// Upserts every staged row into the target namespace.
    ///
    /// Index failures come back as warnings alongside the counts.
    pub async fn reconcile(&self) -> SyncResult<(StageCounts, Vec<SyncError>)> {
        let model = self.protocol.model();
        let paths = self.protocol.paths();
        let staged = self.read(&paths.staging).await?;
        let targets = self.read(&paths.target).await?;

        let mut by_business_key: HashMap<String, (String, Record)> = HashMap::new();
        for (target_key, value) in targets {
            if let Value::Object(record) = value {
                if let Some(business_key) = model.key_from_target(&record) {
                    by_business_key.insert(business_key, (target_key, record));
                }
            }
        }

        let mut upserts = Vec::with_capacity(staged.len());
        for row in staged.into_values() {
            let Value::Object(row) = row else { continue };
            let business_key = model.key_from_source(&row)?;
            let (target_key, existing, created) = match by_business_key.remove(&business_key) {
                Some((target_key, record)) => (target_key, record, false),
                None => {
                    let key = self
                        .executor
                        .run(self.store.append_generated_key(&paths.target))
                        .await?;
                    (key, Record::new(), true)
                }
            };
            let merged = model.merge_source_into_target(existing, &row);
            upserts.push((target_key, Value::Object(merged), created));
        }

        let results = self
            .executor
            .run_all(upserts.iter().map(|(key, record, _)| self.upsert(key, record)))
            .await;

        let mut counts = StageCounts::default();
        let mut warnings = Vec::new();
        for ((_, _, created), result) in upserts.iter().zip(results) {
            if let Some(warning) = result? {
                warnings.push(warning);
            }
            counts.rows += 1;
            if *created {
                counts.created += 1;
            } else {
                counts.updated += 1;
            }
        }
        info!(
            "Reconciled {} into target: {} created, {} updated",
            self.protocol.content_type(),
            counts.created,
            counts.updated
        );
        Ok((counts, warnings))
    }

    async fn read(&self, path: &StorePath) -> SyncResult<Map<String, Value>> {
        self.executor
            .run(read_object(self.store.as_ref(), path))
            .await
    }

    async fn upsert(&self, target_key: &str, record: &Value) -> SyncResult<Option<SyncError>> {
        let content_type = self.protocol.content_type();
        self.store
            .write(&self.protocol.paths().target.child(target_key), record.clone())
            .await?;
        match self
            .index
            .add_to_index(content_type, record, target_key, false)
            .await
        {
            Ok(()) => Ok(None),
            Err(e) => {
                warn!("Could not index {}/{}: {}", content_type, target_key, e);
                Ok(Some(e))
            }
        }
    }

    /// Handles target records whose business key no longer appears in
    /// staging. The model's `target_not_in_source` decides, per record,
    /// whether it is removed and unindexed or rewritten and kept.
    pub async fn prune(&self) -> SyncResult<(StageCounts, Vec<SyncError>)> {
        let model = self.protocol.model();
        let paths = self.protocol.paths();
        let staged = self.read(&paths.staging).await?;
        let mut source_keys = HashSet::with_capacity(staged.len());
        for row in staged.values() {
            if let Value::Object(row) = row {
                source_keys.insert(model.key_from_source(row)?);
            }
        }

        let targets = self.read(&paths.target).await?;
        let stale: Vec<(String, Option<Record>)> = targets
            .into_iter()
            .filter(|(_, value)| {
                value
                    .as_object()
                    .and_then(|record| model.key_from_target(record))
                    .is_none_or(|key| !source_keys.contains(&key))
            })
            .map(|(target_key, value)| {
                let kept = match value {
                    Value::Object(record) => model.target_not_in_source(record),
                    _ => None,
                };
                (target_key, kept)
            })
            .collect();

        let results = self
            .executor
            .run_all(stale.iter().map(|(key, kept)| async move {
                match kept {
                    Some(record) => self.keep(key, record).await.map(|()| None),
                    None => self.remove(key).await,
                }
            }))
            .await;
        let mut warnings = Vec::new();
        for result in results {
            if let Some(warning) = result? {
                warnings.push(warning);
            }
        }

        let kept = stale.iter().filter(|(_, kept)| kept.is_some()).count();
        let counts = StageCounts {
            removed: stale.len() - kept,
            kept,
            ..StageCounts::default()
        };
        debug!(
            "Pruned {} records from {} ({} kept by the model)",
            counts.removed,
            self.protocol.content_type(),
            counts.kept
        );
        Ok((counts, warnings))
    }

    async fn keep(&self, target_key: &str, record: &Record) -> SyncResult<()> {
        self.store
            .write(
                &self.protocol.paths().target.child(target_key),
                Value::Object(record.clone()),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, target_key: &str) -> SyncResult<Option<SyncError>> {
        let content_type = self.protocol.content_type();
        self.store
            .remove(&self.protocol.paths().target.child(target_key))
            .await?;
        match self.index.remove_from_index(content_type, target_key).await {
            Ok(()) => Ok(None),
            Err(e) => {
                warn!("Could not unindex {}/{}: {}", content_type, target_key, e);
                Ok(Some(e))
            }
        }
    }
}

/// Reads an object node, treating absence (or a non-object) as empty.
pub(crate) async fn read_object(
    store: &dyn Store,
    path: &StorePath,
) -> SyncResult<Map<String, Value>> {
    match store.read(path).await? {
        Some(Value::Object(map)) => Ok(map),
        _ => Ok(Map::new()),
    }
}
