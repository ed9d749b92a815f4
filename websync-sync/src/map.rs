//! In-place mapping of a content type and the relation controls that point
//! at it.

use crate::cache::RelatedDataCache;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::executor::BoundedExecutor;
use crate::signal::{Signal, SignalKind, SignalPayload};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use websync_model::{content_types_from_value, related_key_paths, ContentTypeKeyPath, MapModel};
use websync_storage::{Store, StorePath};
use websync_types::validate_content_type;

/// A relation control value found elsewhere in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedControl {
    /// Absolute key path (item placeholder resolved).
    pub key_path: ContentTypeKeyPath,
    /// The top-level control value, `None` if unset.
    pub control: Option<Value>,
}

/// A mapped control value and where it was saved.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedControl {
    pub key_path: ContentTypeKeyPath,
    pub value: Value,
}

/// Result of a map run.
#[derive(Debug, Clone, PartialEq)]
pub struct MapOutcome {
    /// The mapped data of the content type as written.
    pub data: Value,
    /// Related controls rewritten by `map_related`.
    pub related: Vec<MappedControl>,
    /// The reindex signal, when related controls were mapped and a site is
    /// configured.
    pub signal: Option<SignalPayload>,
}

/// Applies a [`MapModel`] to the store.
pub struct MapCoordinator {
    store: Arc<dyn Store>,
    data_root: StorePath,
    content_type_root: StorePath,
    executor: BoundedExecutor,
    signal: Option<Signal>,
}

impl MapCoordinator {
    pub fn new(store: Arc<dyn Store>, config: &SyncConfig) -> Self {
        let signal = Signal::from_config(Arc::clone(&store), config).ok();
        Self {
            data_root: StorePath::parse(&config.data_root),
            content_type_root: StorePath::parse(&config.content_type_root),
            executor: BoundedExecutor::new(config.concurrency),
            store,
            signal,
        }
    }

    /// Maps every record of the model's content type, then (if the model
    /// asks for it) every relation control that points at that type.
    pub async fn run(&self, model: &dyn MapModel) -> SyncResult<MapOutcome> {
        let content_type = model.webhook_content_type();
        validate_content_type(content_type)?;

        let one_off = self.is_one_off(content_type).await?;
        let data = self.apply_map(model, content_type, one_off).await?;
        if !model.maps_related() {
            return Ok(MapOutcome {
                data,
                related: Vec::new(),
                signal: None,
            });
        }

        let key_paths = self.related_key_paths(content_type).await?;
        let controls = self.controls_for(&key_paths).await?;
        let mapped: Vec<MappedControl> = controls
            .into_iter()
            .filter_map(|related| {
                let keys = related.key_path.control_keys()?;
                let value =
                    model.map_related(related.control.as_ref(), keys.leaf(), keys.in_grid(), &data)?;
                Some(MappedControl {
                    key_path: related.key_path.clone(),
                    value,
                })
            })
            .collect();
        self.save_related(&mapped).await?;
        info!(
            "Mapped {} and {} related controls",
            content_type,
            mapped.len()
        );

        let signal = match &self.signal {
            Some(signal) => Some(signal.send(SignalKind::SiteSearchReindex).await?),
            None => {
                debug!("No site configured, skipping reindex signal");
                None
            }
        };
        Ok(MapOutcome {
            data,
            related: mapped,
            signal,
        })
    }

    async fn is_one_off(&self, content_type: &str) -> SyncResult<bool> {
        let path = self.content_type_root.child(content_type).child("oneOff");
        Ok(self
            .store
            .read(&path)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }

    async fn apply_map(
        &self,
        model: &dyn MapModel,
        content_type: &str,
        one_off: bool,
    ) -> SyncResult<Value> {
        let path = self.data_root.child(content_type);
        let data = self.store.read(&path).await?;
        let mapped = if one_off {
            model.map_record(data.unwrap_or(Value::Null))
        } else {
            let records = match data {
                Some(Value::Object(records)) => records,
                _ => Map::new(),
            };
            Value::Object(
                records
                    .into_iter()
                    .map(|(key, record)| (key, model.map_record(record)))
                    .collect(),
            )
        };
        self.store.write(&path, mapped.clone()).await?;
        Ok(mapped)
    }

    async fn related_key_paths(&self, content_type: &str) -> SyncResult<Vec<ContentTypeKeyPath>> {
        let schema = self.store.read(&self.content_type_root).await?;
        let content_types = content_types_from_value(schema.as_ref())?;
        Ok(related_key_paths(&content_types, content_type)
            .into_iter()
            .map(|pair| pair.key_path)
            .collect())
    }

    /// Fetches the control values at every key path, reading each content
    /// type once.
    pub async fn controls_for(
        &self,
        key_paths: &[ContentTypeKeyPath],
    ) -> SyncResult<Vec<RelatedControl>> {
        let cache = RelatedDataCache::new(Arc::clone(&self.store), self.data_root.clone());
        let cache = &cache;
        let per_path = self
            .executor
            .try_run_all(key_paths.iter().map(|key_path| async move {
                let data = cache.get(key_path.content_type()).await?;
                Ok::<_, SyncError>(absolute_controls(key_path, data))
            }))
            .await?;
        Ok(per_path.into_iter().flatten().collect())
    }

    async fn save_related(&self, mapped: &[MappedControl]) -> SyncResult<()> {
        self.executor
            .try_run_all(mapped.iter().filter_map(|control| {
                let path = StorePath::from_segments(control.key_path.save_path()?);
                let path = self.data_root.join(&path);
                Some(async move { self.store.write(&path, control.value.clone()).await })
            }))
            .await?;
        Ok(())
    }
}

/// Resolves a key path against its content type's data: one entry per item
/// for a relative collection path, or a single entry for a resolved item or a
/// one-off.
fn absolute_controls(key_path: &ContentTypeKeyPath, data: Option<Value>) -> Vec<RelatedControl> {
    let Some(keys) = key_path.control_keys() else {
        return Vec::new();
    };
    if key_path.is_relative() {
        let Some(Value::Object(items)) = data else {
            return Vec::new();
        };
        return items
            .iter()
            .map(|(item_key, item)| RelatedControl {
                key_path: key_path.with_item_key(item_key),
                control: item.get(keys.control).cloned(),
            })
            .collect();
    }
    let record = match key_path.item_key() {
        Some(item_key) => data.as_ref().and_then(|d| d.get(item_key)),
        None => data.as_ref(),
    };
    vec![RelatedControl {
        key_path: key_path.clone(),
        control: record.and_then(|r| r.get(keys.control)).cloned(),
    }]
}
