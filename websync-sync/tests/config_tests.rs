use pretty_assertions::assert_eq;
use std::collections::HashMap;
use websync_sync::{RetryPolicy, SyncConfig, SyncError};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.sync_node, "sync");
    assert_eq!(config.data_root, "data");
    assert_eq!(config.report_path, "syncReport");
    assert_eq!(config.commands_path, "management/commands");
    assert_eq!(config.concurrency, 10);
    assert_eq!(config.site_name, None);
    assert_eq!(config.retry, RetryPolicy::default());
    assert!(config.validate().is_ok());
}

#[test]
fn environment_overrides_defaults() {
    let config = SyncConfig::from_lookup(lookup(&[
        ("SYNC_NODE", "nightly"),
        ("SITE_NAME", "campus"),
        ("SITE_USER", "ops@example.edu"),
        ("SYNC_CONCURRENCY", "4"),
    ]))
    .unwrap();

    assert_eq!(config.sync_node, "nightly");
    assert_eq!(config.site_name.as_deref(), Some("campus"));
    assert_eq!(config.signal_user.as_deref(), Some("ops@example.edu"));
    assert_eq!(config.concurrency, 4);
}

#[test]
fn blank_values_fall_back() {
    let config = SyncConfig::from_lookup(lookup(&[("SYNC_NODE", " "), ("SITE_NAME", "")])).unwrap();
    assert_eq!(config.sync_node, "sync");
    assert_eq!(config.site_name, None);
}

#[test]
fn rejects_unusable_values() {
    assert!(matches!(
        SyncConfig::from_lookup(lookup(&[("SYNC_CONCURRENCY", "lots")])),
        Err(SyncError::Config(_))
    ));
    assert!(matches!(
        SyncConfig::from_lookup(lookup(&[("SYNC_CONCURRENCY", "0")])),
        Err(SyncError::Config(_))
    ));
    assert!(matches!(
        SyncConfig::from_lookup(lookup(&[("SYNC_NODE", "a/b")])),
        Err(SyncError::Config(_))
    ));
}

#[test]
fn deserializes_partial_config() {
    let config: SyncConfig = serde_json::from_str(
        r#"{ "site_name": "campus", "concurrency": 3, "retry": { "max_attempts": 2 } }"#,
    )
    .unwrap();
    assert_eq!(config.site_name.as_deref(), Some("campus"));
    assert_eq!(config.concurrency, 3);
    assert_eq!(config.retry.max_attempts, 2);
    assert_eq!(config.retry.base_delay_ms, 1_000);
    assert_eq!(config.data_root, "data");
}

#[test]
fn jitter_covers_the_full_configured_range() {
    let policy: RetryPolicy = serde_json::from_value(serde_json::json!({
        "base_delay_ms": 0,
        "jitter_ms": u64::MAX,
    }))
    .unwrap();
    assert_eq!(policy.backoff(3), std::time::Duration::ZERO);
    for _ in 0..100 {
        let _ = policy.delay(3);
    }
}
