//! Graph sinks for committing extracted documents.
//!
//! - [`JsonlGraphSink`]: append-only JSON lines file, one document per line
//! - [`Neo4jHttpSink`]: Neo4j via the HTTP transaction endpoint
//! - [`MemoryGraphSink`]: in-process store for dry runs and tests
//!
//! Sinks are constructed explicitly and handed to the batch processor;
//! call [`GraphSink::close`] when the run is over.

pub mod cypher;
mod jsonl;
mod memory;
mod neo4j;

pub use jsonl::{read_documents, JsonlGraphSink};
pub use memory::MemoryGraphSink;
pub use neo4j::{Neo4jConfig, Neo4jHttpSink};

use std::path::Path;
use std::sync::Arc;

use kg_ingest::{GraphSink, SinkError};
use kg_types::{GraphBackend, GraphSettings};

/// Open the sink described by configuration.
///
/// `jsonl_path` is the already-expanded output path for the jsonl backend.
pub async fn sink_from_settings(
    settings: &GraphSettings,
    jsonl_path: &Path,
) -> Result<Arc<dyn GraphSink>, SinkError> {
    match settings.backend {
        GraphBackend::Jsonl => Ok(Arc::new(JsonlGraphSink::open(jsonl_path).await?)),
        GraphBackend::Neo4j => {
            let config = Neo4jConfig::from_settings(settings);
            Ok(Arc::new(Neo4jHttpSink::connect(config).await?))
        }
    }
}
