use crate::error::StorageResult;
use crate::path::StorePath;
use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Store client contract.
///
/// Every operation is single-shot. Writing `null` removes the node.
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the value at `path`, `None` if nothing is stored there.
    async fn read(&self, path: &StorePath) -> StorageResult<Option<Value>>;

    /// Replaces the value at `path`.
    async fn write(&self, path: &StorePath, value: Value) -> StorageResult<()>;

    /// Writes each entry of `partial` beneath `path`, leaving siblings alone.
    /// Entry keys may themselves be `/`-separated paths.
    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StorageResult<()>;

    /// Removes the node at `path` and everything beneath it.
    async fn remove(&self, path: &StorePath) -> StorageResult<()>;

    /// Returns a fresh, time-ordered child key for `path`. Nothing is written.
    async fn append_generated_key(&self, path: &StorePath) -> StorageResult<String> {
        let _ = path;
        Ok(generate_key())
    }
}

/// A unique key that sorts by creation time.
pub fn generate_key() -> String {
    format!("-{}", Uuid::now_v7().simple())
}
