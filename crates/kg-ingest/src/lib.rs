//! Resumable ingestion pipeline for the talent knowledge graph.
//!
//! This crate turns an ordered sequence of items into graph documents
//! and commits them to a graph store, one item at a time, with bounded
//! retries and a durable checkpoint of committed items.
//!
//! ## Key Components
//!
//! - [`CheckpointStore`]: Durable set of committed item indices
//! - [`FileCheckpointStore`]: JSON-file checkpoints with atomic replace
//! - [`MemoryCheckpointStore`]: In-memory checkpoints for dry runs
//! - [`RetryPolicy`]: Attempts per item and the delay between them
//! - [`ItemTransformer`]: Trait for item-to-graph extraction
//! - [`GraphSink`]: Trait for graph stores
//! - [`BatchProcessor`]: Drives items through transform and commit
//! - [`RunSummary`]: Skipped/succeeded/exhausted counts of a run
//!
//! ## Example
//!
//! ```ignore
//! use kg_ingest::{
//!     BatchProcessor, CheckpointKey, FileCheckpointStore, ProcessorConfig, RetryPolicy,
//! };
//!
//! let config = ProcessorConfig::default()
//!     .with_retry(RetryPolicy::fixed(3, Duration::from_secs(2)));
//! let processor = BatchProcessor::new(extractor, sink, Arc::new(FileCheckpointStore), config);
//!
//! let key = CheckpointKey::for_input(&input, Some("Warrior"), None);
//! let summary = processor.run(&items, &key).await?;
//! println!("{summary}");
//! ```

pub mod checkpoint;
pub mod error;
pub mod processor;
pub mod progress;
pub mod retry;
pub mod sink;
pub mod summary;
pub mod transform;

pub use checkpoint::{CheckpointKey, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use error::{AttemptError, CheckpointError, ProcessError, SinkError, TransformError};
pub use processor::{BatchProcessor, ProcessorConfig};
pub use progress::{LoggingProgressCallback, NoOpProgressCallback, ProgressCallback};
pub use retry::{AttemptOutcome, DelayStrategy, RetryPolicy, RetrySchedule};
pub use sink::GraphSink;
pub use summary::{ItemFailure, RunSummary};
pub use transform::ItemTransformer;
