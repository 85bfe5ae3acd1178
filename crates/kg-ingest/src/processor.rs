//! Resumable batch processor.
//!
//! Drives every item of a run through transform-then-commit, one item at
//! a time in ascending index order. Progress is checkpointed after each
//! committed item, so a restarted run skips everything that already
//! reached the graph store and only re-attempts the rest.
//!
//! Per-item failures are retried according to the [`RetryPolicy`] and
//! never abort the run. Only checkpoint load/save failures do.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use kg_types::Item;

use crate::checkpoint::{CheckpointKey, CheckpointStore};
use crate::error::{AttemptError, ProcessError};
use crate::progress::{NoOpProgressCallback, ProgressCallback};
use crate::retry::{AttemptOutcome, RetryPolicy};
use crate::sink::GraphSink;
use crate::summary::{ItemFailure, RunSummary};
use crate::transform::ItemTransformer;

/// Configuration for the batch processor.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Attempts and delays per item
    pub retry: RetryPolicy,
    /// Ask the sink to attach source passages
    pub include_source: bool,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            include_source: true,
        }
    }
}

impl ProcessorConfig {
    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set whether sources are attached on commit.
    pub fn with_include_source(mut self, include_source: bool) -> Self {
        self.include_source = include_source;
        self
    }
}

/// Terminal state of one item within a run.
enum Resolution {
    Committed { units: usize, attempts: u32 },
    Exhausted(ItemFailure),
}

/// Checkpointed transform-then-commit driver.
///
/// Callers must present the same items in the same order for a given
/// checkpoint key on every run, and must not run two processors against
/// the same key concurrently. Neither is validated.
pub struct BatchProcessor {
    transformer: Arc<dyn ItemTransformer>,
    sink: Arc<dyn GraphSink>,
    checkpoints: Arc<dyn CheckpointStore>,
    config: ProcessorConfig,
    progress: Box<dyn ProgressCallback>,
}

impl BatchProcessor {
    /// Create a new processor.
    pub fn new(
        transformer: Arc<dyn ItemTransformer>,
        sink: Arc<dyn GraphSink>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            transformer,
            sink,
            checkpoints,
            config,
            progress: Box::new(NoOpProgressCallback),
        }
    }

    /// Report progress after each resolved item.
    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Process `items`, resuming from the checkpoint stored under `key`.
    ///
    /// Returns the run statistics. Fails only when the checkpoint cannot
    /// be loaded or saved; in that case no further items are attempted.
    pub async fn run(
        &self,
        items: &[Item],
        key: &CheckpointKey,
    ) -> Result<RunSummary, ProcessError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(items.len());

        if items.is_empty() {
            debug!(checkpoint = %key, "No items to process");
            return Ok(summary);
        }

        let mut committed = self.checkpoints.load(key)?;

        let stale = committed.range(items.len()..).count();
        if stale > 0 {
            warn!(
                checkpoint = %key,
                stale = stale,
                total = items.len(),
                "Checkpoint holds indices beyond the item sequence; was the input reordered?"
            );
        }

        info!(
            checkpoint = %key,
            total = items.len(),
            already_committed = committed.len() - stale,
            transformer = %self.transformer.name(),
            sink = %self.sink.name(),
            max_attempts = self.config.retry.max_attempts(),
            "Starting ingestion run"
        );

        for (index, item) in items.iter().enumerate() {
            if committed.contains(&index) {
                summary.record_skip();
                self.progress.on_progress(index, &summary);
                continue;
            }

            match self.process_item(index, item).await {
                Resolution::Committed { units, attempts } => {
                    committed.insert(index);
                    self.checkpoints.save(key, &committed)?;
                    summary.record_success(units);
                    debug!(
                        index = index,
                        units = units,
                        attempts = attempts,
                        "Item committed"
                    );
                }
                Resolution::Exhausted(failure) => {
                    warn!(
                        index = failure.index,
                        attempts = failure.attempts,
                        permanent = failure.permanent,
                        error = %failure.error,
                        "Giving up on item"
                    );
                    summary.record_failure(failure);
                }
            }

            self.progress.on_progress(index, &summary);
        }

        summary.committed = committed;
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            checkpoint = %key,
            skipped = summary.skipped,
            succeeded = summary.succeeded,
            exhausted = summary.exhausted,
            units = summary.units_committed,
            elapsed_ms = summary.elapsed_ms,
            "Ingestion run complete"
        );

        Ok(summary)
    }

    /// Attempt one item until it commits, fails permanently, or runs out
    /// of attempts.
    async fn process_item(&self, index: usize, item: &Item) -> Resolution {
        let max_attempts = self.config.retry.max_attempts();
        let mut schedule = self.config.retry.schedule();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(index = index, attempt = attempt, "Processing item");

            match self.attempt(item).await {
                AttemptOutcome::Committed { units } => {
                    return Resolution::Committed {
                        units,
                        attempts: attempt,
                    }
                }
                AttemptOutcome::Permanent(e) => {
                    return Resolution::Exhausted(ItemFailure {
                        index,
                        attempts: attempt,
                        error: e.to_string(),
                        permanent: true,
                    })
                }
                AttemptOutcome::Retryable(e) => {
                    if attempt >= max_attempts {
                        return Resolution::Exhausted(ItemFailure {
                            index,
                            attempts: attempt,
                            error: e.to_string(),
                            permanent: false,
                        });
                    }

                    let delay = schedule.next_delay();
                    warn!(
                        index = index,
                        attempt = attempt,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One transform-then-commit attempt.
    async fn attempt(&self, item: &Item) -> AttemptOutcome {
        AttemptOutcome::classify(self.transform_and_commit(item).await)
    }

    async fn transform_and_commit(&self, item: &Item) -> Result<usize, AttemptError> {
        let units = self.transformer.transform(item).await?;
        self.sink
            .commit(&units, self.config.include_source)
            .await?;
        Ok(units.len())
    }
}
