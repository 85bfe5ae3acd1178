//! Run statistics.

use std::collections::BTreeSet;

use serde::Serialize;

/// An item that did not reach the graph store in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    /// Attempts made before giving up
    pub attempts: u32,
    /// Last error seen
    pub error: String,
    /// Whether the last error was classified as permanent
    pub permanent: bool,
}

/// Result of one processor run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items in the run's sequence
    pub total: usize,
    /// Items already committed by an earlier run
    pub skipped: usize,
    /// Items committed by this run
    pub succeeded: usize,
    /// Items that failed every permitted attempt
    pub exhausted: usize,
    /// Graph documents written by this run
    pub units_committed: usize,
    /// Committed indices after the run
    pub committed: BTreeSet<usize>,
    pub failures: Vec<ItemFailure>,
    pub elapsed_ms: u64,
}

impl RunSummary {
    /// Create an empty summary for a sequence of `total` items.
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Record an already-committed item.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Record a newly committed item.
    pub fn record_success(&mut self, units: usize) {
        self.succeeded += 1;
        self.units_committed += units;
    }

    /// Record an exhausted item.
    pub fn record_failure(&mut self, failure: ItemFailure) {
        self.exhausted += 1;
        self.failures.push(failure);
    }

    /// Items resolved so far (skipped, committed or exhausted).
    pub fn resolved(&self) -> usize {
        self.skipped + self.succeeded + self.exhausted
    }

    /// True when every item of the sequence is committed.
    pub fn is_complete(&self) -> bool {
        self.exhausted == 0 && self.skipped + self.succeeded == self.total
    }

    /// Indices that were exhausted in this run.
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total={} skipped={} succeeded={} exhausted={} units={} elapsed={}ms",
            self.total,
            self.skipped,
            self.succeeded,
            self.exhausted,
            self.units_committed,
            self.elapsed_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_new() {
        let summary = RunSummary::new(5);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.resolved(), 0);
        assert!(!summary.is_complete());
        assert!(RunSummary::new(0).is_complete());
    }

    #[test]
    fn test_summary_record() {
        let mut summary = RunSummary::new(4);
        summary.record_skip();
        summary.record_success(3);
        summary.record_success(0);
        summary.record_failure(ItemFailure {
            index: 3,
            attempts: 3,
            error: "transform failed: Timeout waiting for response".to_string(),
            permanent: false,
        });

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.units_committed, 3);
        assert_eq!(summary.resolved(), 4);
        assert_eq!(summary.failed_indices(), vec![3]);
        assert!(!summary.is_complete());
    }

    #[test]
    fn test_summary_display() {
        let mut summary = RunSummary::new(2);
        summary.record_success(1);
        summary.record_skip();
        summary.elapsed_ms = 12;
        assert_eq!(
            summary.to_string(),
            "total=2 skipped=1 succeeded=1 exhausted=0 units=1 elapsed=12ms"
        );
        assert!(summary.is_complete());
    }
}
