#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use websync_model::{ModelError, ModelResult, Record, RelationshipDescriptor, SourceStream, SyncModel};
use websync_storage::{MemoryStore, StorageResult, Store, StorePath};
use websync_sync::{
    ReportEntry, ReportPublisher, RetryPolicy, SearchIndex, SyncConfig, SyncError, SyncResult,
};
use websync_types::SyncRootName;

/// Installs a test subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("websync_sync=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}

// ── Models ───────────────────────────────────────────────────────

/// Courses from a catalogue, related to employees (by `employee_id`) and to
/// the one-off homepage.
pub struct CoursesModel {
    rows: Vec<Record>,
    fail_listing: bool,
    archive_missing: bool,
}

impl CoursesModel {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows: rows.into_iter().map(into_record).collect(),
            fail_listing: false,
            archive_missing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            rows: Vec::new(),
            fail_listing: true,
            archive_missing: false,
        }
    }

    /// Courses dropped from the catalogue are flagged `archived` instead of
    /// being removed.
    pub fn archiving(mut self) -> Self {
        self.archive_missing = true;
        self
    }
}

impl SyncModel for CoursesModel {
    fn webhook_content_type(&self) -> &str {
        "courses"
    }

    fn key_from_source(&self, row: &Record) -> ModelResult<String> {
        row.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::MissingField("id".into()))
    }

    fn key_from_target(&self, record: &Record) -> Option<String> {
        record.get("id").and_then(Value::as_str).map(str::to_string)
    }

    fn merge_source_into_target(&self, mut target: Record, source: &Record) -> Record {
        for (field, value) in source {
            target.insert(field.clone(), value.clone());
        }
        target
    }

    fn list_source(&self) -> SourceStream<'_> {
        if self.fail_listing {
            return stream::iter(vec![Err(ModelError::Source("catalogue offline".into()))]).boxed();
        }
        stream::iter(self.rows.clone().into_iter().map(Ok)).boxed()
    }

    fn relationships_to_resolve(&self) -> Vec<RelationshipDescriptor> {
        vec![
            RelationshipDescriptor::collection("related_employees", "employees", "employee_id"),
            RelationshipDescriptor::one_off("featured", "homepage"),
        ]
    }

    fn descriptors_for_record(&self, record: &Record) -> ModelResult<Vec<RelationshipDescriptor>> {
        if record.get("broken").is_some_and(|b| b == &json!(true)) {
            return Err(ModelError::InvalidRecord("unreadable instructors".into()));
        }
        let mut employees =
            RelationshipDescriptor::collection("related_employees", "employees", "employee_id");
        for instructor in record
            .get("instructors")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            employees = employees.relate(instructor.clone());
        }
        let featured = RelationshipDescriptor::one_off("featured", "homepage")
            .relate(record.get("featured").cloned().unwrap_or(Value::Bool(false)));
        Ok(vec![employees, featured])
    }

    /// A course listed under several departments arrives once per
    /// department; instructors accumulate.
    fn merge_staged(&self, mut existing: Record, incoming: Record) -> Record {
        let mut instructors = existing
            .remove("instructors")
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default();
        for instructor in incoming
            .get("instructors")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
        {
            if !instructors.contains(instructor) {
                instructors.push(instructor.clone());
            }
        }
        let mut merged = self.merge_source_into_target(existing, &incoming);
        merged.insert("instructors".into(), Value::Array(instructors));
        merged
    }

    fn target_not_in_source(&self, mut record: Record) -> Option<Record> {
        if !self.archive_missing {
            return None;
        }
        record.insert("archived".into(), Value::Bool(true));
        Some(record)
    }
}

/// A source with no relationships.
pub struct PlainModel {
    content_type: String,
    rows: Vec<Record>,
}

impl PlainModel {
    pub fn new(content_type: &str, rows: Vec<Value>) -> Self {
        Self {
            content_type: content_type.into(),
            rows: rows.into_iter().map(into_record).collect(),
        }
    }
}

impl SyncModel for PlainModel {
    fn webhook_content_type(&self) -> &str {
        &self.content_type
    }

    fn key_from_source(&self, row: &Record) -> ModelResult<String> {
        row.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::MissingField("id".into()))
    }

    fn key_from_target(&self, record: &Record) -> Option<String> {
        record.get("id").and_then(Value::as_str).map(str::to_string)
    }

    fn merge_source_into_target(&self, _target: Record, source: &Record) -> Record {
        source.clone()
    }

    fn list_source(&self) -> SourceStream<'_> {
        stream::iter(self.rows.clone().into_iter().map(Ok)).boxed()
    }

    fn relationships_to_resolve(&self) -> Vec<RelationshipDescriptor> {
        Vec::new()
    }

    fn descriptors_for_record(&self, _record: &Record) -> ModelResult<Vec<RelationshipDescriptor>> {
        Ok(Vec::new())
    }
}

pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

pub fn course(id: &str, instructors: &[&str]) -> Value {
    json!({ "id": id, "name": format!("Course {id}"), "instructors": instructors, "featured": false })
}

pub fn featured_course(id: &str) -> Value {
    json!({ "id": id, "name": format!("Course {id}"), "instructors": [], "featured": true })
}

pub fn models(courses: CoursesModel) -> Vec<Arc<dyn SyncModel>> {
    vec![Arc::new(courses)]
}

// ── Store ────────────────────────────────────────────────────────

/// Three employees and a homepage.
pub fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_data(json!({
        "data": {
            "employees": {
                "emp1": { "employee_id": "E1", "name": "Ada" },
                "emp2": { "employee_id": "E2", "name": "Grace" },
                "emp3": { "employee_id": "E3", "name": "Edsger" }
            },
            "homepage": { "title": "Home" }
        }
    })))
}

pub fn config() -> SyncConfig {
    SyncConfig {
        site_name: Some("test-site".into()),
        signal_user: Some("sync-bot".into()),
        retry: RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 4,
            jitter_ms: 0,
        },
        ..SyncConfig::default()
    }
}

pub fn fixed_root() -> SyncRootName {
    SyncRootName::at("sync", Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap())
}

pub async fn read(store: &MemoryStore, path: &str) -> Option<Value> {
    store.read(&StorePath::parse(path)).await.unwrap()
}

/// The generated target key of the course with business key `id`.
pub async fn course_key(store: &MemoryStore, id: &str) -> String {
    let courses = read(store, "data/courses").await.expect("no courses");
    courses
        .as_object()
        .unwrap()
        .iter()
        .find(|(_, record)| record["id"] == json!(id))
        .map(|(key, _)| key.clone())
        .unwrap_or_else(|| panic!("course {id} not found"))
}

/// Sorted string items of an array field.
pub fn sorted_strings(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = value
        .as_array()
        .unwrap_or_else(|| panic!("not an array: {value}"))
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    items.sort();
    items
}

// ── Collaborators ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<Vec<ReportEntry>>>,
}

#[async_trait]
impl ReportPublisher for RecordingPublisher {
    async fn publish(&self, entries: &[ReportEntry]) -> SyncResult<()> {
        self.published.lock().unwrap().push(entries.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingIndex {
    pub fail: bool,
    /// Calls that fail before the index starts accepting them.
    pub transient_failures: AtomicUsize,
    pub calls: AtomicUsize,
    pub added: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl RecordingIndex {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn flaky(failures: usize) -> Self {
        Self {
            transient_failures: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    fn check(&self) -> SyncResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SyncError::Index("cluster unavailable".into()));
        }
        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if transient.is_ok() {
            return Err(SyncError::Index("transient".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchIndex for RecordingIndex {
    async fn add_to_index(&self, content_type: &str, _: &Value, id: &str, _: bool) -> SyncResult<()> {
        self.check()?;
        self.added.lock().unwrap().push(format!("{content_type}/{id}"));
        Ok(())
    }

    async fn remove_from_index(&self, content_type: &str, id: &str) -> SyncResult<()> {
        self.check()?;
        self.removed.lock().unwrap().push(format!("{content_type}/{id}"));
        Ok(())
    }
}

/// Wraps a [`MemoryStore`], counting how many calls are outstanding at once.
/// Each call yields to the runtime so that concurrent callers overlap.
pub struct CountingStore {
    pub inner: Arc<MemoryStore>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn max(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn track<T>(&self, call: impl std::future::Future<Output = T>) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        let out = call.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn read(&self, path: &StorePath) -> StorageResult<Option<Value>> {
        self.track(self.inner.read(path)).await
    }

    async fn write(&self, path: &StorePath, value: Value) -> StorageResult<()> {
        self.track(self.inner.write(path, value)).await
    }

    async fn update(&self, path: &StorePath, partial: Map<String, Value>) -> StorageResult<()> {
        self.track(self.inner.update(path, partial)).await
    }

    async fn remove(&self, path: &StorePath) -> StorageResult<()> {
        self.track(self.inner.remove(path)).await
    }

    async fn append_generated_key(&self, path: &StorePath) -> StorageResult<String> {
        self.track(self.inner.append_generated_key(path)).await
    }
}
