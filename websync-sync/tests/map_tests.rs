mod common;

use common::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use websync_model::{content_types_from_value, related_key_paths, MapModel};
use websync_storage::MemoryStore;
use websync_sync::{MapCoordinator, SyncConfig};

/// Adds a display name to every employee and drops relation tokens that
/// point at employees that no longer exist.
struct EmployeesMapper {
    related: bool,
}

fn live_tokens(tokens: Option<&Value>, employees: &Value) -> Value {
    let kept = tokens
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|token| {
            token
                .as_str()
                .and_then(|t| t.strip_prefix("employees "))
                .is_some_and(|key| employees.get(key).is_some())
        })
        .cloned()
        .collect();
    Value::Array(kept)
}

impl MapModel for EmployeesMapper {
    fn webhook_content_type(&self) -> &str {
        "employees"
    }

    fn map_record(&self, mut record: Value) -> Value {
        let name = record["name"].as_str().unwrap_or_default().to_uppercase();
        record["display_name"] = json!(name);
        record
    }

    fn maps_related(&self) -> bool {
        self.related
    }

    fn map_related(
        &self,
        control: Option<&Value>,
        control_key: &str,
        in_grid: bool,
        mapped: &Value,
    ) -> Option<Value> {
        let control = control?;
        if !in_grid {
            return Some(live_tokens(Some(control), mapped));
        }
        let rows = control
            .as_array()?
            .iter()
            .map(|row| {
                let mut row = row.clone();
                row[control_key] = live_tokens(row.get(control_key), mapped);
                row
            })
            .collect();
        Some(Value::Array(rows))
    }
}

struct HomepageMapper;

impl MapModel for HomepageMapper {
    fn webhook_content_type(&self) -> &str {
        "homepage"
    }

    fn map_record(&self, mut record: Value) -> Value {
        record["title"] = json!("Welcome");
        record
    }
}

fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_data(json!({
        "contentType": {
            "employees": { "oneOff": false, "controls": [{ "name": "name", "controlType": "textfield" }] },
            "courses": {
                "oneOff": false,
                "controls": [
                    { "name": "instructors", "controlType": "relation", "meta": { "contentTypeId": "employees" } },
                    { "name": "sessions", "controlType": "grid", "controls": [
                        { "name": "lead", "controlType": "relation", "meta": { "contentTypeId": "employees" } }
                    ] }
                ]
            },
            "homepage": {
                "oneOff": true,
                "controls": [
                    { "name": "featured_employee", "controlType": "relation", "meta": { "contentTypeId": "employees" } }
                ]
            }
        },
        "data": {
            "employees": { "emp1": { "name": "ada" } },
            "courses": {
                "c1": {
                    "instructors": ["employees emp1", "employees gone"],
                    "sessions": [{ "lead": ["employees gone"] }, { "lead": ["employees emp1"] }]
                },
                "c2": { "name": "Unstaffed" }
            },
            "homepage": { "title": "Home", "featured_employee": ["employees gone"] }
        }
    })))
}

#[tokio::test]
async fn maps_collection_records_in_place() {
    let store = store();
    let outcome = MapCoordinator::new(store.clone(), &config())
        .run(&EmployeesMapper { related: false })
        .await
        .unwrap();

    assert_eq!(outcome.data["emp1"]["display_name"], json!("ADA"));
    assert_eq!(read(&store, "data/employees/emp1/display_name").await, Some(json!("ADA")));
    assert!(outcome.related.is_empty());
    assert_eq!(outcome.signal, None);
}

#[tokio::test]
async fn maps_one_off_records() {
    let store = store();
    let outcome = MapCoordinator::new(store.clone(), &config())
        .run(&HomepageMapper)
        .await
        .unwrap();

    assert_eq!(outcome.data["title"], json!("Welcome"));
    assert_eq!(read(&store, "data/homepage/title").await, Some(json!("Welcome")));
    assert_eq!(
        read(&store, "data/homepage/featured_employee").await,
        Some(json!(["employees gone"]))
    );
}

#[tokio::test]
async fn rewrites_related_controls_including_grids() {
    let store = store();
    let outcome = MapCoordinator::new(store.clone(), &config())
        .run(&EmployeesMapper { related: true })
        .await
        .unwrap();

    assert_eq!(
        read(&store, "data/courses/c1/instructors").await,
        Some(json!(["employees emp1"]))
    );
    assert_eq!(
        read(&store, "data/courses/c1/sessions").await,
        Some(json!([{ "lead": [] }, { "lead": ["employees emp1"] }]))
    );
    assert_eq!(read(&store, "data/homepage/featured_employee").await, Some(json!([])));
    assert_eq!(read(&store, "data/courses/c2").await, Some(json!({ "name": "Unstaffed" })));

    let mut saved: Vec<String> = outcome.related.iter().map(|c| c.key_path.to_string()).collect();
    saved.sort();
    assert_eq!(
        saved,
        vec![
            "courses/c1/instructors",
            "courses/c1/sessions/[]/lead",
            "homepage/featured_employee",
        ]
    );

    let signal = outcome.signal.expect("reindex signal");
    assert_eq!(signal.sitename, "test-site");
    assert!(read(&store, "management/commands/siteSearchReindex/test-site").await.is_some());
}

#[tokio::test]
async fn related_mapping_without_site_skips_the_signal() {
    let store = store();
    let outcome = MapCoordinator::new(store.clone(), &SyncConfig::default())
        .run(&EmployeesMapper { related: true })
        .await
        .unwrap();

    assert_eq!(outcome.related.len(), 3);
    assert_eq!(outcome.signal, None);
    assert_eq!(read(&store, "management").await, None);
}

#[tokio::test]
async fn resolved_item_paths_address_a_single_record() {
    let store = store();
    let schema = read(&store, "contentType").await;
    let content_types = content_types_from_value(schema.as_ref()).unwrap();
    let instructors = related_key_paths(&content_types, "employees")
        .into_iter()
        .map(|pair| pair.key_path)
        .find(|path| {
            path.content_type() == "courses"
                && path.control_keys().is_some_and(|keys| !keys.in_grid())
        })
        .unwrap();
    let coordinator = MapCoordinator::new(store.clone(), &config());

    let every_course = coordinator
        .controls_for(std::slice::from_ref(&instructors))
        .await
        .unwrap();
    assert_eq!(every_course.len(), 2);

    let one_course = coordinator
        .controls_for(&[instructors.with_item_key("c1")])
        .await
        .unwrap();
    assert_eq!(one_course.len(), 1);
    assert_eq!(one_course[0].key_path.item_key(), Some("c1"));
    assert_eq!(one_course[0].control, Some(json!(["employees emp1", "employees gone"])));
}
