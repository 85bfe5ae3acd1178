//! In-memory graph sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use kg_ingest::{GraphSink, SinkError};
use kg_types::GraphDocument;

/// Keeps committed documents in memory. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryGraphSink {
    documents: Mutex<Vec<GraphDocument>>,
    closed: AtomicBool,
}

impl MemoryGraphSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything committed so far.
    pub fn documents(&self) -> Vec<GraphDocument> {
        self.documents
            .lock()
            .map(|docs| docs.clone())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.documents().iter().map(|d| d.nodes.len()).sum()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphSink for MemoryGraphSink {
    async fn commit(
        &self,
        units: &[GraphDocument],
        _include_source: bool,
    ) -> Result<(), SinkError> {
        if self.is_closed() {
            return Err(SinkError::Closed);
        }
        let mut docs = self
            .documents
            .lock()
            .map_err(|_| SinkError::Connection("memory sink poisoned".to_string()))?;
        docs.extend_from_slice(units);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
