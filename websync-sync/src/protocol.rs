//! Adapter binding a model to the store layout of one run.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use websync_model::{RelationshipDescriptor, SyncModel};
use websync_storage::StorePath;
use websync_types::{validate_content_type, ReverseKey, SyncRootName};

/// Store locations a source reads and writes during one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    /// Root of the target namespace (`data`).
    pub data_root: StorePath,
    /// The content type's target records (`data/{type}`).
    pub target: StorePath,
    /// The run-scoped namespace (`{syncRoot}`).
    pub sync_root: StorePath,
    /// The content type's staging node (`{syncRoot}/{type}`).
    pub staging: StorePath,
    /// Root of the reverse index (`{syncRoot}/reverseRelationships`).
    pub reverse: StorePath,
}

impl SyncPaths {
    /// Lays out the paths of `content_type` under `sync_root`.
    pub fn new(config: &SyncConfig, sync_root: &SyncRootName, content_type: &str) -> Self {
        let data_root = StorePath::parse(&config.data_root);
        let sync_root = StorePath::root().child(sync_root.as_str());
        Self {
            target: data_root.child(content_type),
            staging: sync_root.child(content_type),
            reverse: sync_root.child(REVERSE_ROOT),
            data_root,
            sync_root,
        }
    }
}

/// Name of the reverse index node under a sync root.
pub const REVERSE_ROOT: &str = "reverseRelationships";

/// A distinct (target, reverse key, cardinality) triple of a model's static
/// relationship list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination {
    pub target_content_type: String,
    pub reverse_key: ReverseKey,
    pub multiple: bool,
}

/// A [`SyncModel`] checked against the sync protocol, with its paths for the
/// current run.
///
/// Validation happens once, here: the content type name and every static
/// relationship must address the store.
pub struct SyncProtocol {
    model: Arc<dyn SyncModel>,
    content_type: String,
    relationships: Vec<RelationshipDescriptor>,
    paths: SyncPaths,
}

impl SyncProtocol {
    /// Validates `model` and binds it to `sync_root`.
    pub fn new(
        model: Arc<dyn SyncModel>,
        config: &SyncConfig,
        sync_root: &SyncRootName,
    ) -> SyncResult<Self> {
        let content_type = model.webhook_content_type().to_string();
        validate_content_type(&content_type)
            .map_err(|e| SyncError::Protocol(format!("{content_type:?}: {e}")))?;

        let relationships = model.relationships_to_resolve();
        let problems: Vec<String> = relationships
            .iter()
            .filter_map(|descriptor| descriptor.validate().err())
            .map(|e| e.to_string())
            .collect();
        if !problems.is_empty() {
            return Err(SyncError::Protocol(format!(
                "{content_type}: {}",
                problems.join("; ")
            )));
        }

        let paths = SyncPaths::new(config, sync_root, &content_type);
        Ok(Self {
            model,
            content_type,
            relationships,
            paths,
        })
    }

    pub fn model(&self) -> &dyn SyncModel {
        self.model.as_ref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn paths(&self) -> &SyncPaths {
        &self.paths
    }

    /// The model's static relationship list, as validated.
    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    /// Distinct combinations of the static relationship list, in first-seen
    /// order.
    pub fn combinations(&self) -> SyncResult<Vec<Combination>> {
        let mut seen = HashSet::new();
        let mut combinations = Vec::new();
        for descriptor in &self.relationships {
            let combination = Combination {
                target_content_type: descriptor.target_content_type.clone(),
                reverse_key: descriptor.reverse_key(&self.content_type)?,
                multiple: descriptor.multiple,
            };
            if seen.insert(combination.clone()) {
                combinations.push(combination);
            }
        }
        Ok(combinations)
    }
}

impl fmt::Debug for SyncProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncProtocol")
            .field("content_type", &self.content_type)
            .field("relationships", &self.relationships.len())
            .field("paths", &self.paths)
            .finish()
    }
}
