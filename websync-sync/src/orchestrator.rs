//! Sync orchestrator: drives every source through the pipeline and owns all
//! store I/O for a run.
//!
//! ```text
//! create root ─┬─ source A: stage → reconcile → prune → forward → reverse ─┬─ report → signals → finalize
//!              └─ source B: stage → reconcile → prune → forward → reverse ─┘
//! ```
//!
//! Stages of one source run in order. Once a source has an error, its later
//! stages are skipped and recorded as failed. Sources run concurrently and
//! share one concurrency ceiling.

use crate::config::SyncConfig;
use crate::drain::{wait_for_interrupt, Drain, DrainReport};
use crate::error::{Stage, SyncError, SyncResult};
use crate::executor::BoundedExecutor;
use crate::forward::ForwardResolver;
use crate::protocol::{SyncProtocol, REVERSE_ROOT};
use crate::report::{Report, ReportPublisher};
use crate::reverse::ReverseResolver;
use crate::reverse_index::ReverseIndex;
use crate::search::{NoopIndex, RetryingIndex, SearchIndex};
use crate::signal::{Signal, SignalKind, SignalPayload};
use crate::source::SyncSource;
use crate::staging::SourceStages;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use websync_model::SyncModel;
use websync_storage::{Store, StorePath};
use websync_types::SyncRootName;

/// The outcome of one sync run.
#[derive(Debug)]
pub struct SyncRun {
    pub sync_root: SyncRootName,
    pub sources: Vec<SyncSource>,
    /// Signals sent after the sources finished.
    pub signals: Vec<SignalPayload>,
    /// Run-level problems (signals, report node, finalize).
    pub warnings: Vec<SyncError>,
}

impl SyncRun {
    /// Whether every source finished without errors.
    pub fn is_success(&self) -> bool {
        self.sources.iter().all(SyncSource::is_healthy)
    }

    /// The source for `content_type`, if it took part in the run.
    pub fn source(&self, content_type: &str) -> Option<&SyncSource> {
        self.sources.iter().find(|s| s.content_type() == content_type)
    }
}

/// Runs sync models against a store.
pub struct SyncOrchestrator {
    store: Arc<dyn Store>,
    config: SyncConfig,
    executor: BoundedExecutor,
    index: Arc<dyn SearchIndex>,
    publisher: Option<Arc<dyn ReportPublisher>>,
    drains: Vec<Arc<dyn Drain>>,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with no search index and no report publisher.
    pub fn new(store: Arc<dyn Store>, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            executor: BoundedExecutor::new(config.concurrency),
            store,
            config,
            index: Arc::new(NoopIndex),
            publisher: None,
            drains: Vec::new(),
        })
    }

    /// Keeps `index` in step with reconcile and prune. Calls are retried per
    /// the configured [`RetryPolicy`](crate::RetryPolicy) before they surface
    /// as warnings.
    #[must_use]
    pub fn with_search_index(mut self, index: Arc<dyn SearchIndex>) -> Self {
        self.index = Arc::new(RetryingIndex::new(index, self.config.retry));
        self
    }

    /// Publishes the run report through `publisher`.
    #[must_use]
    pub fn with_report_publisher(mut self, publisher: Arc<dyn ReportPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Registers a collaborator to drain on shutdown.
    #[must_use]
    pub fn with_drain(mut self, drain: Arc<dyn Drain>) -> Self {
        self.drains.push(drain);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn executor(&self) -> &BoundedExecutor {
        &self.executor
    }

    /// Runs every model under a fresh, timestamped sync root.
    pub async fn run(&self, models: Vec<Arc<dyn SyncModel>>) -> SyncResult<SyncRun> {
        self.run_at(models, SyncRootName::now(&self.config.sync_node))
            .await
    }

    /// Runs every model under `sync_root`.
    ///
    /// Fails outright only if a model does not conform to the protocol or the
    /// sync root cannot be created. Everything else is recorded on the
    /// returned [`SyncRun`].
    pub async fn run_at(
        &self,
        models: Vec<Arc<dyn SyncModel>>,
        sync_root: SyncRootName,
    ) -> SyncResult<SyncRun> {
        let protocols = models
            .into_iter()
            .map(|model| SyncProtocol::new(model, &self.config, &sync_root))
            .collect::<SyncResult<Vec<_>>>()?;

        let root = StorePath::root().child(sync_root.as_str());
        self.executor.run(self.store.write(&root, json!({}))).await?;
        info!("Starting sync run {} with {} sources", sync_root, protocols.len());

        let reverse_index = ReverseIndex::new(Arc::clone(&self.store), root.child(REVERSE_ROOT));
        let sources = futures::future::join_all(
            protocols
                .iter()
                .map(|protocol| self.run_source(protocol, &reverse_index)),
        )
        .await;

        let mut run = SyncRun {
            sync_root,
            sources,
            signals: Vec::new(),
            warnings: Vec::new(),
        };
        self.report(&mut run).await;
        self.signal(&mut run).await;
        self.finalize(&root, &mut run).await;

        info!(
            "Sync run {} finished: {}/{} sources healthy",
            run.sync_root,
            run.sources.iter().filter(|s| s.is_healthy()).count(),
            run.sources.len()
        );
        Ok(run)
    }

    /// Runs one source through every stage.
    pub async fn run_source(
        &self,
        protocol: &SyncProtocol,
        reverse_index: &ReverseIndex,
    ) -> SyncSource {
        let mut source = SyncSource::new(protocol.content_type());
        for stage in Stage::ALL {
            if !source.is_healthy() {
                debug!("Skipping {} for {}", stage, source.content_type());
                source.fail(stage, None);
                continue;
            }
            match self
                .run_stage(stage, protocol, reverse_index, &mut source)
                .await
            {
                Ok(()) => source.complete(stage),
                Err(SyncError::NoSourceData) => {
                    warn!("No source data for {}", source.content_type());
                    source.errors.push(SyncError::NoSourceData);
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", stage, source.content_type(), e);
                    source.fail(stage, Some(e));
                }
            }
        }
        source
    }

    async fn run_stage(
        &self,
        stage: Stage,
        protocol: &SyncProtocol,
        reverse_index: &ReverseIndex,
        source: &mut SyncSource,
    ) -> SyncResult<()> {
        let store = Arc::clone(&self.store);
        let stages = SourceStages::new(
            Arc::clone(&store),
            protocol,
            self.index.as_ref(),
            &self.executor,
        );
        match stage {
            Stage::StageSource => {
                stages.stage_source().await?;
            }
            Stage::Reconcile => {
                let (_, warnings) = stages.reconcile().await?;
                source.warnings.extend(warnings);
            }
            Stage::Prune => {
                let (_, warnings) = stages.prune().await?;
                source.warnings.extend(warnings);
            }
            Stage::ForwardResolve => {
                let outcome = ForwardResolver::new(store, protocol, reverse_index, &self.executor)
                    .run()
                    .await?;
                source.warnings.extend(outcome.descriptor_errors);
            }
            Stage::ReverseResolve => {
                ReverseResolver::new(store, protocol, reverse_index, &self.executor)
                    .run()
                    .await?;
            }
        }
        Ok(())
    }

    async fn report(&self, run: &mut SyncRun) {
        let report = Report::new(
            Arc::clone(&self.store),
            StorePath::parse(&self.config.report_path),
            self.publisher.clone(),
        );
        if let Err(e) = report.ensure().await {
            warn!("Could not prepare report node: {}", e);
            run.warnings.push(e);
        }
        for source in &mut run.sources {
            if let Err(e) = report.update(source).await {
                warn!("Could not report {}: {}", source.content_type(), e);
                source.warn(e);
            }
        }
    }

    /// Sends the build and reindex signals once if any source succeeded.
    async fn signal(&self, run: &mut SyncRun) {
        if !run.sources.iter().any(SyncSource::is_healthy) {
            info!("No source synced cleanly, not signalling");
            return;
        }
        let signal = match Signal::from_config(Arc::clone(&self.store), &self.config) {
            Ok(signal) => signal,
            Err(e) => {
                warn!("Not signalling: {}", e);
                run.warnings.push(e);
                return;
            }
        };
        for kind in [SignalKind::Build, SignalKind::SiteSearchReindex] {
            match signal.send(kind).await {
                Ok(payload) => run.signals.push(payload),
                Err(e) => {
                    warn!("Could not send {} signal: {}", kind, e);
                    run.warnings.push(e);
                }
            }
        }
    }

    /// Removes the sync root. Failure is logged and recorded, never fatal.
    async fn finalize(&self, root: &StorePath, run: &mut SyncRun) {
        match self.executor.run(self.store.remove(root)).await {
            Ok(()) => debug!("Removed sync root {}", root),
            Err(e) => {
                warn!("Could not remove sync root {}: {}", root, e);
                run.warnings.push(e.into());
            }
        }
    }

    /// Drains registered collaborators and the executor, waiting at most the
    /// configured drain timeout for each.
    pub async fn drain(&self) -> DrainReport {
        let timeout = self.config.drain_timeout();
        let mut report = DrainReport::default();
        for drain in &self.drains {
            let name = drain.name().to_string();
            match tokio::time::timeout(timeout, drain.drain()).await {
                Ok(Ok(())) => report.drained.push(name),
                Ok(Err(e)) => {
                    warn!("Drain of {} failed: {}", name, e);
                    report.failed.push(name);
                }
                Err(_) => {
                    warn!("Drain of {} timed out after {:?}", name, timeout);
                    report.timed_out.push(name);
                }
            }
        }
        if !self.executor.drain(timeout).await {
            report.timed_out.push("executor".to_string());
        }
        report
    }

    /// Runs every model until `shutdown` resolves. On shutdown the current
    /// run gets the drain timeout to settle, then collaborators are drained.
    /// Returns `None` if the run did not settle in time.
    pub async fn run_until<F>(
        &self,
        models: Vec<Arc<dyn SyncModel>>,
        shutdown: F,
    ) -> SyncResult<Option<SyncRun>>
    where
        F: Future<Output = ()>,
    {
        let run = self.run(models);
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => result.map(Some),
            () = shutdown => {
                warn!("Shutdown requested, letting the current run settle");
                let settled = tokio::time::timeout(self.config.drain_timeout(), &mut run).await;
                let report = self.drain().await;
                if !report.is_clean() {
                    warn!("Drain incomplete: {:?}", report);
                }
                match settled {
                    Ok(result) => result.map(Some),
                    Err(_) => Ok(None),
                }
            }
        }
    }

    /// [`SyncOrchestrator::run_until`] the process is interrupted.
    pub async fn run_until_interrupt(
        &self,
        models: Vec<Arc<dyn SyncModel>>,
    ) -> SyncResult<Option<SyncRun>> {
        self.run_until(models, async {
            if let Err(e) = wait_for_interrupt().await {
                warn!("{}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}
