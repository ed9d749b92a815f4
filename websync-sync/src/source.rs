//! Per-source state that flows through the pipeline.

use crate::error::{Stage, SyncError};

/// A content type's passage through one sync run.
///
/// `errors` are sticky: once any is recorded, every later stage is skipped
/// for this source. `warnings` (integration failures, per-record descriptor
/// failures) are reported but never stop the pipeline.
#[derive(Debug)]
pub struct SyncSource {
    content_type: String,
    pub errors: Vec<SyncError>,
    pub warnings: Vec<SyncError>,
    completed: Vec<Stage>,
}

impl SyncSource {
    /// Creates a source with no errors.
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            errors: Vec::new(),
            warnings: Vec::new(),
            completed: Vec::new(),
        }
    }

    /// The content type being synced.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Whether no error has been recorded.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    /// Stages that ran to completion, in order.
    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// Whether `stage` ran to completion.
    pub fn has_completed(&self, stage: Stage) -> bool {
        self.completed.contains(&stage)
    }

    /// Records a failed or skipped stage, with its cause if there is one.
    pub fn fail(&mut self, stage: Stage, cause: Option<SyncError>) {
        self.errors.push(SyncError::stage(stage));
        self.errors.extend(cause);
    }

    /// Records a non-fatal problem.
    pub fn warn(&mut self, warning: SyncError) {
        self.warnings.push(warning);
    }

    pub(crate) fn complete(&mut self, stage: Stage) {
        self.completed.push(stage);
    }

    /// Every error and warning message, errors first.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .map(ToString::to_string)
            .collect()
    }
}
