//! In-memory store.

use crate::error::StorageResult;
use crate::path::StorePath;
use crate::store::Store;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Operation counters, for asserting how much traffic a stage generates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
    pub updates: u64,
    pub removes: u64,
}

/// A [`Store`] backed by a single JSON tree.
///
/// Unlike hosted document stores, empty objects and arrays are kept as
/// written; only `null` removes a node.
#[derive(Debug, Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
    reads: AtomicU64,
    writes: AtomicU64,
    updates: AtomicU64,
    removes: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_data(Value::Object(Map::new()))
    }

    /// Creates a store holding `data` at its root.
    pub fn with_data(data: Value) -> Self {
        Self {
            root: RwLock::new(data),
            ..Default::default()
        }
    }

    /// Returns a copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    /// Returns operation counts since creation.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }
}

fn lookup<'a>(root: &'a Value, path: &StorePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| node.as_object()?.get(segment))
}

fn set(root: &mut Value, path: &StorePath, value: Value) {
    if value.is_null() {
        unset(root, path);
        return;
    }
    let mut node = root;
    for segment in path.segments() {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            return;
        };
        node = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    *node = value;
}

fn unset(root: &mut Value, path: &StorePath) {
    let Some((last, parents)) = path.segments().split_last() else {
        *root = Value::Object(Map::new());
        return;
    };
    let mut node = root;
    for segment in parents {
        match node.as_object_mut().and_then(|m| m.get_mut(segment)) {
            Some(next) => node = next,
            None => return,
        }
    }
    if let Some(map) = node.as_object_mut() {
        map.remove(last);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, path: &StorePath) -> StorageResult<Option<Value>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let root = self.root.read().await;
        Ok(lookup(&root, path).filter(|v| !v.is_null()).cloned())
    }

    async fn write(&self, path: &StorePath, value: Value) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("write {}", path);
        let mut root = self.root.write().await;
        set(&mut root, path, value);
        Ok(())
    }

    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StorageResult<()> {
        self.updates.fetch_add(1, Ordering::Relaxed);
        debug!("update {} ({} keys)", path, partial.len());
        let mut root = self.root.write().await;
        for (key, value) in partial {
            set(&mut root, &path.join(&StorePath::parse(&key)), value);
        }
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StorageResult<()> {
        self.removes.fetch_add(1, Ordering::Relaxed);
        debug!("remove {}", path);
        let mut root = self.root.write().await;
        unset(&mut root, path);
        Ok(())
    }
}
