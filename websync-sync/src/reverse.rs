//! Reverse relationship resolution.
//!
//! Reads back what the forward stage recorded in the reverse index, writes
//! each entry as an array field on the related record, then clears the field
//! on related records that no longer have any back-references.

use crate::error::SyncResult;
use crate::executor::BoundedExecutor;
use crate::protocol::{Combination, SyncProtocol};
use crate::reverse_index::ReverseIndex;
use crate::staging::read_object;
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use websync_storage::{Store, StorePath};

/// One back-reference field to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseEntry {
    pub target_content_type: String,
    /// `None` for a one-off target.
    pub record_key: Option<String>,
    pub field: String,
    pub tokens: Vec<String>,
}

impl ReverseEntry {
    fn address(&self) -> FieldAddress {
        (
            self.target_content_type.clone(),
            self.record_key.clone(),
            self.field.clone(),
        )
    }
}

/// (target type, record key, field) of a written back-reference.
pub type FieldAddress = (String, Option<String>, String);

/// What the reverse stage did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReverseOutcome {
    pub combinations: usize,
    pub written: usize,
    pub cleared: usize,
}

/// Resolves the reverse relationships of one source.
pub struct ReverseResolver<'a> {
    store: Arc<dyn Store>,
    protocol: &'a SyncProtocol,
    reverse_index: &'a ReverseIndex,
    executor: &'a BoundedExecutor,
}

impl<'a> ReverseResolver<'a> {
    pub fn new(
        store: Arc<dyn Store>,
        protocol: &'a SyncProtocol,
        reverse_index: &'a ReverseIndex,
        executor: &'a BoundedExecutor,
    ) -> Self {
        Self {
            store,
            protocol,
            reverse_index,
            executor,
        }
    }

    /// Writes every back-reference field, then runs the unset pass once all
    /// writes have settled.
    pub async fn run(&self) -> SyncResult<ReverseOutcome> {
        let combinations = self.protocol.combinations()?;

        let entries: Vec<ReverseEntry> = self
            .executor
            .try_run_all(combinations.iter().map(|c| self.format(c)))
            .await?
            .into_iter()
            .flatten()
            .collect();

        self.executor
            .try_run_all(entries.iter().map(|entry| self.save(entry)))
            .await?;
        let written: HashSet<FieldAddress> = entries.iter().map(ReverseEntry::address).collect();

        // `unset` takes a slot per store call itself.
        let cleared: usize = join_all(combinations.iter().map(|c| self.unset(c, &written)))
            .await
            .into_iter()
            .collect::<SyncResult<Vec<usize>>>()?
            .into_iter()
            .sum();

        let outcome = ReverseOutcome {
            combinations: combinations.len(),
            written: entries.len(),
            cleared,
        };
        info!(
            "Resolved reverse relationships for {}: {} written, {} cleared",
            self.protocol.content_type(),
            outcome.written,
            outcome.cleared
        );
        Ok(outcome)
    }

    /// Turns the reverse index of one combination's target into entries,
    /// keeping only the combination's own reverse key.
    pub async fn format(&self, combination: &Combination) -> SyncResult<Vec<ReverseEntry>> {
        let target = &combination.target_content_type;
        let field = combination.reverse_key.to_string();
        let Some(Value::Object(recorded)) = self.reverse_index.read_target(target).await? else {
            return Ok(Vec::new());
        };

        let entry = |record_key: Option<&str>, node: Option<&Value>| {
            let tokens: Vec<String> = node?
                .as_object()?
                .iter()
                .filter(|(_, present)| present.as_bool().unwrap_or(false))
                .map(|(token, _)| token.clone())
                .collect();
            Some(ReverseEntry {
                target_content_type: target.clone(),
                record_key: record_key.map(str::to_string),
                field: field.clone(),
                tokens,
            })
        };

        let entries = if combination.multiple {
            recorded
                .iter()
                .filter_map(|(record_key, node)| {
                    entry(Some(record_key.as_str()), node.get(&field))
                })
                .collect()
        } else {
            entry(None, recorded.get(&field)).into_iter().collect()
        };
        Ok(entries)
    }

    async fn save(&self, entry: &ReverseEntry) -> SyncResult<()> {
        let path = self.field_path(
            &entry.target_content_type,
            entry.record_key.as_deref(),
            &entry.field,
        );
        let tokens = entry.tokens.iter().cloned().map(Value::String).collect();
        self.store.write(&path, Value::Array(tokens)).await?;
        Ok(())
    }

    /// Clears the combination's field to `""` wherever it is set but nothing
    /// was written this run. Returns the number of fields cleared.
    pub async fn unset(
        &self,
        combination: &Combination,
        written: &HashSet<FieldAddress>,
    ) -> SyncResult<usize> {
        let target = &combination.target_content_type;
        let field = combination.reverse_key.to_string();
        let data_path = self.protocol.paths().data_root.child(target);

        let stale: Vec<Option<String>> = if combination.multiple {
            self.executor
                .run(read_object(self.store.as_ref(), &data_path))
                .await?
                .into_iter()
                .filter(|(key, record)| {
                    needs_clearing(record, &field)
                        && !written.contains(&(target.clone(), Some(key.clone()), field.clone()))
                })
                .map(|(key, _)| Some(key))
                .collect()
        } else {
            let data = self.executor.run(self.store.read(&data_path)).await?;
            let stale = data.is_some_and(|record| needs_clearing(&record, &field))
                && !written.contains(&(target.clone(), None, field.clone()));
            if stale { vec![None] } else { Vec::new() }
        };

        self.executor
            .try_run_all(stale.iter().map(|key| {
                let path = self.field_path(target, key.as_deref(), &field);
                async move { self.store.write(&path, Value::String(String::new())).await }
            }))
            .await?;
        if !stale.is_empty() {
            debug!("Cleared {} stale {} fields on {}", stale.len(), field, target);
        }
        Ok(stale.len())
    }

    fn field_path(&self, target: &str, record_key: Option<&str>, field: &str) -> StorePath {
        let node = self.protocol.paths().data_root.child(target);
        let node = match record_key {
            Some(key) => node.child(key),
            None => node,
        };
        node.child(field)
    }
}

/// A field needs clearing when it is present and not already `""`.
fn needs_clearing(record: &Value, field: &str) -> bool {
    record
        .get(field)
        .is_some_and(|value| value.as_str() != Some(""))
}
