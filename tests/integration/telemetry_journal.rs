//! Loader telemetry persisted to the sled journal.

use std::sync::Arc;

use tempfile::TempDir;

use atelier::asset::{AssetChain, HeadlessRenderer, PlaceholderShape, ResilientAssetLoader};
use atelier::telemetry::{Component, Outcome, SharedSink, TelemetryJournal};

use super::support::{fast_policy, valid_glb, FakeFetcher, Fetch};

#[tokio::test(start_paused = true)]
async fn test_resolution_events_survive_reopening_the_journal() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("telemetry");

    {
        let journal = TelemetryJournal::open(&path).unwrap();
        let sink: SharedSink = Arc::new(journal.clone());
        let fetcher = Arc::new(
            FakeFetcher::new()
                .on("https://a/body.glb", Fetch::NotFound)
                .on("https://b/body.glb", Fetch::Payload(valid_glb())),
        );
        let loader = ResilientAssetLoader::new(
            fetcher,
            Arc::new(HeadlessRenderer::default()),
            fast_policy("fetch", 2, &sink),
            Arc::clone(&sink),
        );
        let chain = AssetChain::from_references(
            ["https://a/body.glb", "https://b/body.glb"],
            PlaceholderShape::Body,
        );
        let resolution = loader.resolve(&chain).await;
        assert_eq!(resolution.selected, 1);
        journal.flush().unwrap();
    }

    let journal = TelemetryJournal::open(&path).unwrap();
    let loader_events: Vec<_> = journal
        .read_all()
        .unwrap()
        .into_iter()
        .filter(|e| e.component == Component::Loader)
        .map(|e| (e.outcome, e.reference))
        .collect();
    assert_eq!(
        loader_events,
        vec![
            (Outcome::CandidateFailed, Some("https://a/body.glb".to_string())),
            (Outcome::CandidateSelected, Some("https://b/body.glb".to_string())),
        ]
    );

    let recent = journal.read_recent(1).unwrap();
    assert_eq!(recent[0].outcome, Outcome::CandidateSelected);

    let before = journal.len();
    assert_eq!(journal.prune(1).unwrap(), before - 1);
    assert_eq!(journal.len(), 1);
}
