//! CLI command implementations.
//!
//! Handles:
//! - Ingesting a catalog through the batch processor
//! - Listing catalog categories
//! - Showing and resetting checkpoints

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use kg_extract::extractor_from_settings;
use kg_graph::{sink_from_settings, MemoryGraphSink};
use kg_ingest::{
    BatchProcessor, CheckpointError, CheckpointKey, CheckpointStore, FileCheckpointStore,
    GraphSink, ItemTransformer, LoggingProgressCallback, MemoryCheckpointStore, ProcessError,
    ProcessorConfig, RetryPolicy, RunSummary,
};
use kg_types::{Item, Settings, TalentCatalog};

use crate::cli::{CheckpointCommands, IngestArgs};

/// Install the global tracing subscriber unless one is already set.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
    if installed.is_err() {
        debug!("Tracing subscriber already installed");
    }
}

/// Apply `ingest` flags on top of loaded settings.
fn apply_overrides(settings: &mut Settings, log_level: Option<&str>, args: &IngestArgs) {
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(max_attempts) = args.max_attempts {
        settings.retry.max_attempts = max_attempts;
    }
    if let Some(delay_ms) = args.retry_delay_ms {
        settings.retry.delay_ms = delay_ms;
    }
    if let Some(backend) = args.backend {
        settings.graph.backend = backend.into();
    }
    if let Some(output) = &args.output {
        settings.graph.jsonl_path = output.clone();
    }
    if let Some(provider) = &args.provider {
        settings.extractor.provider = provider.clone();
    }
    if args.no_source {
        settings.graph.include_source = false;
    }
}

/// Where a run's checkpoint lives.
///
/// An explicit path wins; otherwise it is derived from the input file,
/// the category and the configured checkpoint directory.
pub fn resolve_checkpoint_key(
    settings: &Settings,
    input: &Path,
    category: Option<&str>,
    explicit: Option<&Path>,
) -> CheckpointKey {
    match explicit {
        Some(path) => CheckpointKey::from_path(path),
        None => {
            let dir = settings.expanded_checkpoint_dir();
            CheckpointKey::for_input(input, category, dir.as_deref())
        }
    }
}

fn checkpoint_failure(err: CheckpointError, key: &CheckpointKey) -> anyhow::Error {
    match err {
        CheckpointError::Corrupt { .. } => anyhow::Error::new(err).context(format!(
            "Checkpoint {} is unreadable; inspect it or run \
             `kg-builder checkpoint reset` to start over",
            key
        )),
        CheckpointError::Io { .. } => {
            anyhow::Error::new(err).context(format!("Checkpoint {} is not accessible", key))
        }
    }
}

/// Load settings, apply `ingest` flags and run [`ingest`].
pub async fn handle_ingest(
    config_path: Option<&str>,
    log_level: Option<&str>,
    args: IngestArgs,
) -> Result<RunSummary> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut settings, log_level, &args);
    settings.validate().context("Invalid configuration")?;

    init_logging(&settings.log_level);

    let extractor =
        extractor_from_settings(&settings.extractor).context("Failed to build extractor")?;
    ingest(&settings, &args, extractor).await
}

/// Run the batch processor over a catalog.
///
/// Fails when the checkpoint cannot be read or written, or when any item
/// exhausted its attempts (a rerun retries exactly those items).
pub async fn ingest(
    settings: &Settings,
    args: &IngestArgs,
    extractor: Arc<dyn ItemTransformer>,
) -> Result<RunSummary> {
    let catalog = TalentCatalog::from_path(&args.input)?;
    let items = catalog.items(args.category.as_deref())?;
    let key = resolve_checkpoint_key(
        settings,
        &args.input,
        args.category.as_deref(),
        args.checkpoint.as_deref(),
    );

    info!(
        input = %args.input.display(),
        category = args.category.as_deref().unwrap_or("*"),
        items = items.len(),
        checkpoint = %key,
        "Starting ingestion"
    );

    let memory_sink = Arc::new(MemoryGraphSink::new());
    let sink: Arc<dyn GraphSink>;
    let store: Arc<dyn CheckpointStore>;
    if args.dry_run {
        let existing = FileCheckpointStore
            .load(&key)
            .map_err(|e| checkpoint_failure(e, &key))?;
        warn!("Dry run: nothing will be written to the graph store or the checkpoint");
        sink = memory_sink.clone();
        store = Arc::new(MemoryCheckpointStore::seeded(&key, existing));
    } else {
        sink = sink_from_settings(&settings.graph, &settings.expanded_jsonl_path())
            .await
            .context("Failed to open graph store")?;
        store = Arc::new(FileCheckpointStore);
    }

    let config = ProcessorConfig::default()
        .with_retry(RetryPolicy::from_settings(&settings.retry))
        .with_include_source(settings.graph.include_source);
    let processor = BatchProcessor::new(extractor, sink.clone(), store, config)
        .with_progress(Box::new(LoggingProgressCallback::new(args.progress_every)));

    let summary = match run_and_close(&processor, sink.as_ref(), &items, &key).await {
        Ok(summary) => summary,
        Err(ProcessError::Checkpoint(e)) => return Err(checkpoint_failure(e, &key)),
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        print_summary(&summary);
        if args.dry_run {
            println!(
                "Dry run extracted {} nodes in {} documents",
                memory_sink.node_count(),
                memory_sink.documents().len()
            );
        }
    }

    if summary.exhausted > 0 {
        anyhow::bail!(
            "{} item(s) exhausted their retries: {:?}; rerun to retry them",
            summary.exhausted,
            summary.failed_indices()
        );
    }

    Ok(summary)
}

/// Run the processor, then close the sink whatever the outcome.
async fn run_and_close(
    processor: &BatchProcessor,
    sink: &dyn GraphSink,
    items: &[Item],
    key: &CheckpointKey,
) -> Result<RunSummary, ProcessError> {
    let result = processor.run(items, key).await;
    if let Err(e) = sink.close().await {
        warn!(sink = sink.name(), error = %e, "Failed to close graph store");
    }
    result
}

fn print_summary(summary: &RunSummary) {
    println!("Ingestion finished: {}", summary);
    for failure in &summary.failures {
        println!(
            "  item {} failed after {} attempt(s){}: {}",
            failure.index,
            failure.attempts,
            if failure.permanent { " (permanent)" } else { "" },
            failure.error
        );
    }
}

/// List categories and entry counts.
pub fn handle_categories(input: &Path) -> Result<()> {
    let catalog = TalentCatalog::from_path(input)?;
    let categories = catalog.categories();
    if categories.is_empty() {
        println!("No categories in {}", input.display());
        return Ok(());
    }

    println!("{:<30} ENTRIES", "CATEGORY");
    for category in categories {
        println!("{:<30} {}", category, catalog.entry_count(category));
    }
    Ok(())
}

/// Show or reset a checkpoint.
pub fn handle_checkpoint(config_path: Option<&str>, command: CheckpointCommands) -> Result<()> {
    let settings = Settings::load(config_path).context("Failed to load configuration")?;
    let store = FileCheckpointStore;

    match command {
        CheckpointCommands::Show {
            input,
            category,
            checkpoint,
        } => {
            let key = checkpoint_key(&settings, &input, category.as_deref(), checkpoint);
            let committed = store
                .load(&key)
                .with_context(|| format!("Failed to read checkpoint {}", key))?;

            println!("Checkpoint: {}", key);
            println!("Committed items: {}", committed.len());
            if !committed.is_empty() {
                let indices: Vec<String> = committed.iter().map(|i| i.to_string()).collect();
                println!("Indices: {}", indices.join(", "));
            }
        }
        CheckpointCommands::Reset {
            input,
            category,
            checkpoint,
        } => {
            let key = checkpoint_key(&settings, &input, category.as_deref(), checkpoint);
            if store.reset(&key)? {
                println!("Removed checkpoint {}", key);
            } else {
                println!("No checkpoint at {}", key);
            }
        }
    }

    Ok(())
}

fn checkpoint_key(
    settings: &Settings,
    input: &Path,
    category: Option<&str>,
    explicit: Option<PathBuf>,
) -> CheckpointKey {
    resolve_checkpoint_key(settings, input, category, explicit.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::BackendArg;
    use async_trait::async_trait;
    use kg_ingest::TransformError;
    use kg_types::{GraphBackend, GraphDocument};
    use tempfile::TempDir;

    const CATALOG: &str = r#"{
        "Mage": {
            "class_nodes": [
                ["Blink", "Teleport forward 20 yards."],
                ["Frost Nova", "Freeze nearby enemies in place."]
            ]
        }
    }"#;

    /// Temp directory holding a catalog and a config file that keeps the
    /// checkpoint next to the catalog.
    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("talents.json"), CATALOG).unwrap();
            std::fs::write(
                dir.path().join("config.toml"),
                "log_level = \"warn\"\n\n[retry]\ndelay_ms = 0\n",
            )
            .unwrap();
            Self { dir }
        }

        fn config(&self) -> String {
            self.dir.path().join("config.toml").display().to_string()
        }

        fn input(&self) -> PathBuf {
            self.dir.path().join("talents.json")
        }

        fn graph(&self) -> PathBuf {
            self.dir.path().join("graph.jsonl")
        }

        fn checkpoint(&self) -> PathBuf {
            self.dir.path().join("run.checkpoint.json")
        }

        fn ingest_args(&self) -> IngestArgs {
            IngestArgs {
                input: self.input(),
                category: None,
                checkpoint: Some(self.checkpoint()),
                output: Some(self.graph().display().to_string()),
                provider: Some("passthrough".to_string()),
                ..args()
            }
        }

        fn settings(&self) -> Settings {
            let mut settings = Settings::load(Some(&self.config())).unwrap();
            apply_overrides(&mut settings, None, &self.ingest_args());
            settings
        }
    }

    struct RejectingExtractor;

    #[async_trait]
    impl ItemTransformer for RejectingExtractor {
        async fn transform(&self, _item: &Item) -> Result<Vec<GraphDocument>, TransformError> {
            Err(TransformError::Rejected("content policy".to_string()))
        }

        fn name(&self) -> &str {
            "rejecting"
        }
    }

    fn args() -> IngestArgs {
        IngestArgs {
            input: PathBuf::from("/data/talents.json"),
            category: Some("Warrior".to_string()),
            checkpoint: None,
            max_attempts: None,
            retry_delay_ms: None,
            backend: None,
            output: None,
            provider: None,
            no_source: false,
            dry_run: false,
            json: false,
            progress_every: 25,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut settings = Settings::default();
        let args = IngestArgs {
            max_attempts: Some(7),
            retry_delay_ms: Some(10),
            backend: Some(BackendArg::Neo4j),
            output: Some("/tmp/out.jsonl".to_string()),
            provider: Some("passthrough".to_string()),
            no_source: true,
            ..args()
        };
        apply_overrides(&mut settings, Some("debug"), &args);

        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.retry.max_attempts, 7);
        assert_eq!(settings.retry.delay_ms, 10);
        assert_eq!(settings.graph.backend, GraphBackend::Neo4j);
        assert_eq!(settings.graph.jsonl_path, "/tmp/out.jsonl");
        assert_eq!(settings.extractor.provider, "passthrough");
        assert!(!settings.graph.include_source);
    }

    #[test]
    fn test_no_overrides_keeps_settings() {
        let mut settings = Settings::default();
        apply_overrides(&mut settings, None, &args());
        assert_eq!(settings.retry.max_attempts, 3);
        assert!(settings.graph.include_source);
    }

    #[test]
    fn test_checkpoint_key_resolution() {
        let settings = Settings::default();
        let key = resolve_checkpoint_key(
            &settings,
            Path::new("/data/talents.json"),
            Some("Warrior"),
            None,
        );
        assert_eq!(key.path(), Path::new("/data/talents.warrior.checkpoint.json"));

        let key = resolve_checkpoint_key(
            &settings,
            Path::new("/data/talents.json"),
            Some("Warrior"),
            Some(Path::new("/tmp/explicit.json")),
        );
        assert_eq!(key.path(), Path::new("/tmp/explicit.json"));

        let settings = Settings {
            checkpoint_dir: Some("/var/kg".to_string()),
            ..Settings::default()
        };
        let key = resolve_checkpoint_key(&settings, Path::new("/data/talents.json"), None, None);
        assert_eq!(key.path(), Path::new("/var/kg/talents.checkpoint.json"));
    }

    #[test]
    fn test_categories_missing_file() {
        let err = handle_categories(Path::new("/nonexistent/talents.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read catalog"));
    }

    #[tokio::test]
    async fn test_ingest_runs_twice_in_one_process() {
        let ws = Workspace::new();

        let first = handle_ingest(Some(&ws.config()), None, ws.ingest_args()).await.unwrap();
        assert_eq!(first.succeeded, 2);
        assert_eq!(std::fs::read_to_string(ws.checkpoint()).unwrap().trim(), "[0,1]");

        let second = handle_ingest(Some(&ws.config()), None, ws.ingest_args()).await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.succeeded, 0);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_checkpoint_and_graph_untouched() {
        let ws = Workspace::new();
        std::fs::write(ws.checkpoint(), "[0]").unwrap();

        let args = IngestArgs {
            dry_run: true,
            ..ws.ingest_args()
        };
        let summary = handle_ingest(Some(&ws.config()), None, args).await.unwrap();

        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(std::fs::read_to_string(ws.checkpoint()).unwrap(), "[0]");
        assert!(!ws.graph().exists());
    }

    #[tokio::test]
    async fn test_exhausted_items_fail_the_command() {
        let ws = Workspace::new();
        let args = IngestArgs {
            max_attempts: Some(2),
            ..ws.ingest_args()
        };
        let mut settings = ws.settings();
        apply_overrides(&mut settings, None, &args);

        let err = ingest(&settings, &args, Arc::new(RejectingExtractor))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exhausted"), "{}", err);
        assert!(!ws.checkpoint().exists());
    }

    #[tokio::test]
    async fn test_corrupt_checkpoint_suggests_reset() {
        let ws = Workspace::new();
        std::fs::write(ws.checkpoint(), "{not a checkpoint").unwrap();

        let err = handle_ingest(Some(&ws.config()), None, ws.ingest_args())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("checkpoint reset"), "{}", err);

        let args = IngestArgs {
            dry_run: true,
            ..ws.ingest_args()
        };
        let err = handle_ingest(Some(&ws.config()), None, args).await.unwrap_err();
        assert!(err.to_string().contains("checkpoint reset"), "{}", err);

        assert_eq!(
            std::fs::read_to_string(ws.checkpoint()).unwrap(),
            "{not a checkpoint"
        );
    }

    #[tokio::test]
    async fn test_sink_closed_when_run_fails() {
        let ws = Workspace::new();
        std::fs::write(ws.checkpoint(), "{not a checkpoint").unwrap();

        let sink = Arc::new(MemoryGraphSink::new());
        let processor = BatchProcessor::new(
            Arc::new(RejectingExtractor),
            sink.clone(),
            Arc::new(FileCheckpointStore),
            ProcessorConfig::default(),
        );
        let items = TalentCatalog::from_path(&ws.input())
            .unwrap()
            .items(None)
            .unwrap();
        let key = CheckpointKey::from_path(ws.checkpoint());

        let result = run_and_close(&processor, sink.as_ref(), &items, &key).await;
        assert!(matches!(result, Err(ProcessError::Checkpoint(_))));
        assert!(sink.is_closed());
    }

    #[tokio::test]
    async fn test_checkpoint_show_and_reset() {
        let ws = Workspace::new();
        handle_ingest(Some(&ws.config()), None, ws.ingest_args()).await.unwrap();
        assert!(ws.checkpoint().exists());

        let show = CheckpointCommands::Show {
            input: ws.input(),
            category: None,
            checkpoint: Some(ws.checkpoint()),
        };
        handle_checkpoint(Some(&ws.config()), show).unwrap();

        let reset = CheckpointCommands::Reset {
            input: ws.input(),
            category: None,
            checkpoint: Some(ws.checkpoint()),
        };
        handle_checkpoint(Some(&ws.config()), reset.clone()).unwrap();
        assert!(!ws.checkpoint().exists());

        // Resetting twice is fine
        handle_checkpoint(Some(&ws.config()), reset).unwrap();
    }

    #[test]
    fn test_checkpoint_show_rejects_corrupt_file() {
        let ws = Workspace::new();
        std::fs::write(ws.checkpoint(), "[1, \"two\"]").unwrap();

        let show = CheckpointCommands::Show {
            input: ws.input(),
            category: None,
            checkpoint: Some(ws.checkpoint()),
        };
        let err = handle_checkpoint(Some(&ws.config()), show).unwrap_err();
        assert!(err.to_string().contains("Failed to read checkpoint"));
    }
}
