//! End-to-end test infrastructure for the talent graph builder.
//!
//! Provides a shared TestHarness and helper transformers for E2E tests
//! covering the full catalog-to-graph pipeline.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kg_extract::PassthroughExtractor;
use kg_graph::JsonlGraphSink;
use kg_ingest::{
    BatchProcessor, CheckpointKey, FileCheckpointStore, ItemTransformer, ProcessorConfig,
    RetryPolicy, TransformError,
};
use kg_types::{GraphDocument, Item};

/// Catalog with two classes, nested and flat subcategories.
pub const SAMPLE_CATALOG: &str = r#"{
    "Warrior": {
        "class_nodes": [
            ["Charge", "Charge to an enemy, generating Rage."],
            ["Pummel", "Interrupt the target's spellcasting."],
            ["Execute", "Attempt to finish off a wounded foe."]
        ],
        "Arms": [
            [["Mortal Strike", "A vicious strike that reduces healing."]],
            [["Overpower", "Overpower the enemy, dealing damage."]]
        ]
    },
    "Mage": {
        "class_nodes": [
            ["Blink", "Teleport forward 20 yards."],
            ["Frost Nova", "Freeze nearby enemies in place."]
        ]
    }
}"#;

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding the catalog, the graph output and the
/// checkpoint files.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Catalog file
    pub catalog_path: PathBuf,
    /// JSON lines graph output
    pub graph_path: PathBuf,
}

impl TestHarness {
    /// Create a harness with [`SAMPLE_CATALOG`] written to disk.
    pub fn new() -> Self {
        Self::with_catalog(SAMPLE_CATALOG)
    }

    /// Create a harness with the given catalog text.
    pub fn with_catalog(catalog: &str) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let catalog_path = temp_dir.path().join("talents.json");
        std::fs::write(&catalog_path, catalog).expect("Failed to write catalog");
        let graph_path = temp_dir.path().join("graph.jsonl");

        Self {
            _temp_dir: temp_dir,
            catalog_path,
            graph_path,
        }
    }

    /// Checkpoint key for a run over the catalog.
    pub fn checkpoint_key(&self, category: Option<&str>) -> CheckpointKey {
        CheckpointKey::for_input(&self.catalog_path, category, None)
    }

    /// Raw checkpoint file content, if any.
    pub fn checkpoint_text(&self, category: Option<&str>) -> Option<String> {
        std::fs::read_to_string(self.checkpoint_key(category).path()).ok()
    }

    /// Committed indices as stored on disk.
    pub fn checkpoint_indices(&self, category: Option<&str>) -> BTreeSet<usize> {
        self.checkpoint_text(category)
            .map(|text| serde_json::from_str(&text).expect("Checkpoint is not a JSON array"))
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self._temp_dir.path()
    }

    /// Processor committing to the harness's JSON lines file.
    pub async fn processor(
        &self,
        transformer: Arc<dyn ItemTransformer>,
        max_attempts: u32,
    ) -> (BatchProcessor, Arc<JsonlGraphSink>) {
        let sink = Arc::new(
            JsonlGraphSink::open(&self.graph_path)
                .await
                .expect("Failed to open graph output"),
        );
        let config = ProcessorConfig::default()
            .with_retry(RetryPolicy::fixed(max_attempts, Duration::ZERO));
        let processor = BatchProcessor::new(
            transformer,
            sink.clone(),
            Arc::new(FileCheckpointStore),
            config,
        );
        (processor, sink)
    }

    /// Documents written to the graph output so far.
    pub fn documents(&self) -> Vec<GraphDocument> {
        kg_graph::read_documents(&self.graph_path).unwrap_or_default()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Transformer that fails chosen items a set number of times before
/// delegating to [`PassthroughExtractor`].
pub struct ScriptedExtractor {
    inner: PassthroughExtractor,
    remaining_failures: Mutex<HashMap<usize, u32>>,
    permanent: BTreeSet<usize>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            inner: PassthroughExtractor::new(),
            remaining_failures: Mutex::new(HashMap::new()),
            permanent: BTreeSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail item `index` with a retryable error `times` times.
    pub fn fail_times(self, index: usize, times: u32) -> Self {
        self.remaining_failures
            .lock()
            .expect("lock poisoned")
            .insert(index, times);
        self
    }

    /// Always reject item `index`.
    pub fn reject(mut self, index: usize) -> Self {
        self.permanent.insert(index);
        self
    }

    /// Number of transform calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ItemTransformer for ScriptedExtractor {
    async fn transform(&self, item: &Item) -> Result<Vec<GraphDocument>, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.permanent.contains(&item.index) {
            return Err(TransformError::Rejected(format!("item {} rejected", item.index)));
        }

        {
            let mut remaining = self.remaining_failures.lock().expect("lock poisoned");
            if let Some(left) = remaining.get_mut(&item.index) {
                if *left > 0 {
                    *left -= 1;
                    return Err(TransformError::Api(format!("item {} unavailable", item.index)));
                }
            }
        }

        self.inner.transform(item).await
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
