//! Interrupted and partially failed runs resume from the checkpoint.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{ScriptedExtractor, TestHarness};
use kg_types::{items_from_passages, TalentCatalog};

/// Five items; item 2 keeps failing in the first run and succeeds in the
/// second. The first run must leave `[0,1,3,4]` on disk, the second
/// `[0,1,2,3,4]`, and the graph must hold each item exactly once.
#[tokio::test]
async fn test_exhausted_item_is_retried_by_next_run() {
    let harness = TestHarness::new();
    let items = items_from_passages(["Charge", "Pummel", "Execute", "Slam", "Whirlwind"]);
    let key = harness.checkpoint_key(None);

    let first = Arc::new(ScriptedExtractor::new().fail_times(2, 3));
    let (processor, _sink) = harness.processor(first.clone(), 3).await;
    let summary = processor.run(&items, &key).await.unwrap();

    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.exhausted, 1);
    assert_eq!(summary.failed_indices(), vec![2]);
    assert_eq!(summary.failures[0].attempts, 3);
    assert!(!summary.failures[0].permanent);
    assert_eq!(first.calls(), 7);
    assert_eq!(harness.checkpoint_text(None).unwrap(), "[0,1,3,4]");

    let second = Arc::new(ScriptedExtractor::new());
    let (processor, _sink) = harness.processor(second.clone(), 3).await;
    let summary = processor.run(&items, &key).await.unwrap();

    assert_eq!(summary.skipped, 4);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.exhausted, 0);
    assert_eq!(second.calls(), 1);
    assert_eq!(harness.checkpoint_text(None).unwrap(), "[0,1,2,3,4]");

    let mut payload_ids: Vec<String> = harness
        .documents()
        .iter()
        .map(|d| d.source.id.clone())
        .collect();
    payload_ids.sort();
    assert_eq!(
        payload_ids,
        vec!["item#0", "item#1", "item#2", "item#3", "item#4"]
    );
}

#[tokio::test]
async fn test_flaky_item_recovers_within_run() {
    let harness = TestHarness::new();
    let items = TalentCatalog::from_path(&harness.catalog_path)
        .unwrap()
        .items(Some("Warrior"))
        .unwrap();
    let key = harness.checkpoint_key(Some("Warrior"));

    let extractor = Arc::new(ScriptedExtractor::new().fail_times(1, 2).fail_times(4, 1));
    let (processor, _sink) = harness.processor(extractor.clone(), 3).await;
    let summary = processor.run(&items, &key).await.unwrap();

    assert!(summary.is_complete());
    assert_eq!(extractor.calls(), 5 + 2 + 1);
    assert_eq!(harness.checkpoint_indices(Some("Warrior")).len(), 5);
}

#[tokio::test]
async fn test_rejected_item_is_not_retried() {
    let harness = TestHarness::new();
    let items = items_from_passages(["a", "b", "c"]);
    let key = harness.checkpoint_key(None);

    let extractor = Arc::new(ScriptedExtractor::new().reject(0));
    let (processor, _sink) = harness.processor(extractor.clone(), 5).await;
    let summary = processor.run(&items, &key).await.unwrap();

    assert_eq!(summary.exhausted, 1);
    assert!(summary.failures[0].permanent);
    assert_eq!(summary.failures[0].attempts, 1);
    assert_eq!(extractor.calls(), 3);
    assert_eq!(harness.checkpoint_text(None).unwrap(), "[1,2]");
}

/// A checkpoint written by an interrupted run is honored even when the
/// graph output was produced by a different process.
#[tokio::test]
async fn test_resume_from_existing_checkpoint_file() {
    let harness = TestHarness::new();
    let items = items_from_passages(["a", "b", "c", "d"]);
    let key = harness.checkpoint_key(None);
    std::fs::write(key.path(), "[0,1]").unwrap();

    let extractor = Arc::new(ScriptedExtractor::new());
    let (processor, _sink) = harness.processor(extractor.clone(), 1).await;
    let summary = processor.run(&items, &key).await.unwrap();

    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(extractor.calls(), 2);
    assert_eq!(harness.checkpoint_text(None).unwrap(), "[0,1,2,3]");
}
