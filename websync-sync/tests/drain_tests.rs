use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use websync_storage::MemoryStore;
use websync_sync::{Drain, SyncConfig, SyncError, SyncOrchestrator, SyncResult};

struct Collaborator {
    name: &'static str,
    takes: Duration,
    fails: bool,
}

#[async_trait]
impl Drain for Collaborator {
    fn name(&self) -> &str {
        self.name
    }

    async fn drain(&self) -> SyncResult<()> {
        tokio::time::sleep(self.takes).await;
        if self.fails {
            Err(SyncError::Index("flush rejected".into()))
        } else {
            Ok(())
        }
    }
}

#[tokio::test(start_paused = true)]
async fn drain_reports_each_collaborator() {
    let config = SyncConfig {
        drain_timeout_ms: 100,
        ..SyncConfig::default()
    };
    let orchestrator = SyncOrchestrator::new(Arc::new(MemoryStore::new()), config)
        .unwrap()
        .with_drain(Arc::new(Collaborator {
            name: "search",
            takes: Duration::from_millis(20),
            fails: false,
        }))
        .with_drain(Arc::new(Collaborator {
            name: "report",
            takes: Duration::from_millis(500),
            fails: false,
        }))
        .with_drain(Arc::new(Collaborator {
            name: "signal",
            takes: Duration::ZERO,
            fails: true,
        }));

    let report = orchestrator.drain().await;

    assert_eq!(report.drained, vec!["search"]);
    assert_eq!(report.timed_out, vec!["report"]);
    assert_eq!(report.failed, vec!["signal"]);
    assert!(!report.is_clean());
}

#[tokio::test]
async fn drain_with_nothing_registered_is_clean() {
    let orchestrator =
        SyncOrchestrator::new(Arc::new(MemoryStore::new()), SyncConfig::default()).unwrap();
    assert!(orchestrator.drain().await.is_clean());
}
