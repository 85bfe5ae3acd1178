//! Progress reporting hooks for long runs.

use tracing::info;

use crate::summary::RunSummary;

/// Progress callback invoked after each item is resolved.
pub trait ProgressCallback: Send + Sync {
    /// Called with the running totals after item `index` was resolved.
    fn on_progress(&self, index: usize, summary: &RunSummary);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _index: usize, _summary: &RunSummary) {}
}

/// A callback that logs progress at info level every `every` items.
pub struct LoggingProgressCallback {
    every: usize,
}

impl LoggingProgressCallback {
    /// Create a new logging progress callback.
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, index: usize, summary: &RunSummary) {
        let resolved = summary.resolved();
        if resolved % self.every == 0 || resolved == summary.total {
            info!(
                index = index,
                resolved = resolved,
                total = summary.total,
                skipped = summary.skipped,
                succeeded = summary.succeeded,
                exhausted = summary.exhausted,
                "Ingestion progress"
            );
        }
    }
}
