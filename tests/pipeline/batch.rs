use std::collections::BTreeMap;

use hearth::config::PipelineConfig;
use hearth::core::listing::{FailureKind, ListingStore};
use hearth::core::pipeline::{OutcomeStatus, Quadrant, Stage};
use hearth::core::taste::{PreferenceStore, TasteModel};

use super::pipeline_harness::{harness, harness_with, listing};

#[tokio::test]
async fn batch_continues_past_a_failing_listing() {
    let h = harness().await;
    let mut ids = Vec::new();
    for n in 1..=5 {
        ids.push(h.ingest(&format!("{n} Elm Street"), 3).await);
    }
    h.describer.fail_transient(&ids[2], 2);

    let report = h.orchestrator.run_batch(&ids).await;

    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.scored(), 4);
    assert_eq!(report.failed(), 1);
    let ordered: Vec<&str> = report.outcomes.iter().map(|o| o.listing_id.as_str()).collect();
    assert_eq!(ordered, ids.iter().map(String::as_str).collect::<Vec<_>>());

    let failed = report.outcome(&ids[2]).unwrap();
    assert_eq!(failed.status, OutcomeStatus::Failed);
    assert_eq!(failed.failed_stage, Some(Stage::Vision));

    let record = h.listings.get(&ids[2]).await.unwrap().unwrap();
    let failure = &record.stage_failures[&Stage::Vision];
    assert_eq!(failure.kind, FailureKind::Provider);
    assert_eq!(failure.attempts, 2);
    assert!(record.present_fit.is_none());

    for id in ids.iter().filter(|id| *id != &ids[2]) {
        let record = h.listings.get(id).await.unwrap().unwrap();
        assert!(record.brief.is_some(), "{id} should have a brief");
        assert!(record.is_current(1));
    }
}

#[tokio::test]
async fn failed_listing_is_picked_up_on_the_next_run() {
    let h = harness().await;
    let ok = h.ingest("10 Birch Lane", 2).await;
    let flaky = h.ingest("11 Birch Lane", 2).await;
    h.describer.fail_transient(&flaky, 2);

    let first = h.orchestrator.run_pending().await.unwrap();
    assert_eq!((first.scored(), first.failed()), (1, 1));
    assert_eq!(h.orchestrator.pending_listings().await.unwrap(), vec![flaky.clone()]);

    let second = h.orchestrator.run_pending().await.unwrap();
    assert_eq!(second.scored(), 1);
    assert_eq!(second.outcomes[0].listing_id, flaky);

    let record = h.listings.get(&flaky).await.unwrap().unwrap();
    assert!(record.stage_failures.is_empty());
    assert!(h.orchestrator.pending_listings().await.unwrap().is_empty());
    assert!(h.listings.get(&ok).await.unwrap().unwrap().is_current(1));
}

#[tokio::test]
async fn single_transient_failure_recovers_within_the_run() {
    let h = harness().await;
    let id = h.ingest("7 Cedar Court", 1).await;
    h.describer.fail_transient(&id, 1);

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Scored);
    assert_eq!(h.describer.calls(), 2);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let h = harness().await;
    let id = h.ingest("8 Cedar Court", 1).await;
    h.describer.fail_permanent(&id);

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(h.describer.calls(), 1);
    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(record.stage_failures[&Stage::Vision].attempts, 1);
}

#[tokio::test]
async fn listing_without_images_is_skipped() {
    let h = harness().await;
    let id = h.ingest("3 Bare Street", 0).await;

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Skipped);
    assert!(outcome.stages_run.is_empty());
    assert_eq!(h.describer.calls(), 0);
    assert!(h.orchestrator.pending_listings().await.unwrap().is_empty());

    let status = h.orchestrator.status().await.unwrap();
    assert_eq!((status.total, status.without_images), (1, 1));
}

#[tokio::test]
async fn weighted_signals_produce_expected_present_fit() {
    let mut seed = TasteModel::bootstrap();
    seed.weighted_dimensions = BTreeMap::from([
        ("natural_light".to_string(), 0.6),
        ("kitchen_quality".to_string(), 0.4),
    ]);
    let h = harness_with(seed, PipelineConfig::default()).await;
    h.describer
        .with_signals("42 Sunny Road", &[("natural_light", 90.0), ("kitchen_quality", 40.0)]);
    let id = h.ingest("42 Sunny Road", 4).await;

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(
        outcome.stages_run,
        vec![Stage::Vision, Stage::PresentFit, Stage::Potential, Stage::Brief]
    );
    let record = h.listings.get(&id).await.unwrap().unwrap();
    let fit = record.present_fit.as_ref().unwrap();
    assert!((fit.score - 70.0).abs() < 1e-6, "got {}", fit.score);
    assert!(fit.passed);
    assert_eq!(fit.taste_version, 1);
    assert!(record.potential.is_some());
    assert_eq!(record.brief.as_ref().unwrap().taste_version, 1);
}

#[tokio::test]
async fn concurrent_batch_scores_everything_once() {
    let h = harness_with(
        TasteModel::bootstrap(),
        PipelineConfig {
            batch_concurrency: 4,
            ..PipelineConfig::default()
        },
    )
    .await;
    let mut ids = Vec::new();
    for n in 0..8 {
        ids.push(h.ingest(&format!("{n} Parallel Avenue"), 2).await);
    }

    let report = h.orchestrator.run_batch(&ids).await;

    assert_eq!(report.scored(), 8);
    assert_eq!(h.describer.calls(), 8);
    assert_eq!(h.narrator.calls(), 8);
    assert_eq!(report.outcomes[5].listing_id, ids[5]);
}

#[tokio::test]
async fn ingest_dedupes_by_normalized_address() {
    let h = harness().await;
    let first = h.orchestrator.ingest(listing("12 Oak St.", 2)).await.unwrap();
    let again = h.orchestrator.ingest(listing("12 oak street", 5)).await.unwrap();

    assert!(first.created);
    assert!(!again.created);
    assert_eq!(first.listing_id, again.listing_id);
    assert_eq!(h.listings.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn deleted_listing_leaves_rankings_and_can_return() {
    let h = harness().await;
    let gone = h.ingest("30 Cedar Court", 2).await;
    let kept = h.ingest("31 Cedar Court", 2).await;
    h.orchestrator.run_pending().await.unwrap();

    h.orchestrator.delete_listing(&gone).await.unwrap();

    let ids: Vec<String> = h
        .orchestrator
        .all_listings()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.listing_id)
        .collect();
    assert_eq!(ids, vec![kept.clone()]);
    let ranked = h.orchestrator.rankings().await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].listing_id, kept);
    assert!(h.orchestrator.delete_listing(&gone).await.is_err());

    let back = h.orchestrator.ingest(listing("30 Cedar Court", 2)).await.unwrap();
    assert!(back.created);
    assert_eq!(back.listing_id, gone);
}

#[tokio::test]
async fn blank_address_is_rejected() {
    let h = harness().await;
    assert!(h.orchestrator.ingest(listing("  ", 1)).await.is_err());
}

#[tokio::test]
async fn rankings_order_by_present_fit() {
    let h = harness().await;
    h.describer
        .with_signals("1 High Street", &[("natural_light", 95.0), ("kitchen_quality", 95.0)]);
    h.describer
        .with_signals("2 Low Street", &[("natural_light", 10.0), ("kitchen_quality", 10.0)]);
    let high = h.ingest("1 High Street", 2).await;
    let low = h.ingest("2 Low Street", 2).await;
    h.ingest("3 Unscored Street", 0).await;
    h.orchestrator.run_pending().await.unwrap();

    let ranked = h.orchestrator.rankings().await.unwrap();

    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].listing_id, high);
    assert_eq!(ranked[1].listing_id, low);
    assert!(ranked[0].present_fit > ranked[1].present_fit);
    assert!(ranked.iter().all(|r| !r.is_stale() && r.quadrant.is_some()));
    assert!(matches!(
        ranked[1].quadrant,
        Some(Quadrant::Pass | Quadrant::DiamondInTheRough)
    ));
    assert_eq!(h.prefs.current().version, 1);
}
