//! Graph sink trait.
//!
//! Sinks persist graph documents to a store. A commit is all or
//! nothing: either every document in the call is durable or the call
//! fails and the processor treats the attempt as failed.

use async_trait::async_trait;

use kg_types::GraphDocument;

use crate::error::SinkError;

/// Durable destination for graph documents.
#[async_trait]
pub trait GraphSink: Send + Sync {
    /// Persist `units`. An empty slice is a no-op.
    ///
    /// With `include_source` the sink also records each document's
    /// source passage and links it to the extracted nodes.
    async fn commit(
        &self,
        units: &[GraphDocument],
        include_source: bool,
    ) -> Result<(), SinkError>;

    /// Release the underlying connection or file handle.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Name used in logs.
    fn name(&self) -> &str;
}
