//! Per-content-type run report.

use crate::error::{SyncError, SyncResult};
use crate::source::SyncSource;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use websync_storage::{Store, StorePath};

/// The last run of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(skip)]
    pub content_type: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Renders and ships the report somewhere people can read it.
#[async_trait]
pub trait ReportPublisher: Send + Sync {
    /// Publishes every entry, newest first.
    async fn publish(&self, entries: &[ReportEntry]) -> SyncResult<()>;
}

/// Keeps `{report_path}/{type} = { date, errors }` and republishes after each
/// update.
pub struct Report {
    store: Arc<dyn Store>,
    path: StorePath,
    publisher: Option<Arc<dyn ReportPublisher>>,
}

impl Report {
    pub fn new(
        store: Arc<dyn Store>,
        path: StorePath,
        publisher: Option<Arc<dyn ReportPublisher>>,
    ) -> Self {
        Self {
            store,
            path,
            publisher,
        }
    }

    /// Creates the report node if it is missing.
    pub async fn ensure(&self) -> SyncResult<()> {
        if self.store.read(&self.path).await?.is_none() {
            self.store.write(&self.path, json!({})).await?;
        }
        Ok(())
    }

    /// Records `source`'s outcome and republishes the whole report.
    pub async fn update(&self, source: &SyncSource) -> SyncResult<Vec<ReportEntry>> {
        self.update_at(source, Utc::now()).await
    }

    /// Like [`Report::update`], stamped with `date`.
    pub async fn update_at(
        &self,
        source: &SyncSource,
        date: DateTime<Utc>,
    ) -> SyncResult<Vec<ReportEntry>> {
        let Some(publisher) = &self.publisher else {
            return Err(SyncError::Report(
                "Could not write report, no publisher configured.".into(),
            ));
        };

        let entry = ReportEntry {
            content_type: source.content_type().to_string(),
            date,
            errors: source.messages(),
        };
        let mut partial = Map::new();
        partial.insert(entry.content_type.clone(), serde_json::to_value(&entry)?);
        self.store.update(&self.path, partial).await?;

        let entries = self.entries().await?;
        publisher.publish(&entries).await?;
        debug!("Published report with {} entries", entries.len());
        Ok(entries)
    }

    /// Every stored entry, newest first. Entries that cannot be read are
    /// skipped.
    pub async fn entries(&self) -> SyncResult<Vec<ReportEntry>> {
        let Some(Value::Object(stored)) = self.store.read(&self.path).await? else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<ReportEntry> = stored
            .into_iter()
            .filter_map(|(content_type, value)| {
                match serde_json::from_value::<ReportEntry>(value) {
                    Ok(entry) => Some(ReportEntry {
                        content_type,
                        ..entry
                    }),
                    Err(e) => {
                        warn!("Skipping unreadable report entry {}: {}", content_type, e);
                        None
                    }
                }
            })
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(entries)
    }
}
