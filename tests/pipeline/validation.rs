use hearth::core::listing::{FailureKind, ListingStore, VisionDescriptor};
use hearth::core::pipeline::{OutcomeStatus, Stage};

use super::pipeline_harness::harness;

#[tokio::test]
async fn empty_descriptor_fails_vision_without_retry() {
    let h = harness().await;
    h.describer.with_descriptor("3 Blank Row", VisionDescriptor::default());
    let id = h.ingest("3 Blank Row", 2).await;

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Vision));
    assert!(outcome.present_fit.is_none());
    assert_eq!(h.describer.calls(), 1);

    let record = h.listings.get(&id).await.unwrap().unwrap();
    let failure = &record.stage_failures[&Stage::Vision];
    assert_eq!(failure.kind, FailureKind::Validation);
    assert_eq!(failure.attempts, 1);
    assert!(record.vision_descriptor.is_none());
    assert!(record.present_fit.is_none());
    assert_eq!(h.narrator.calls(), 0);
}

#[tokio::test]
async fn non_finite_signal_is_rejected_and_record_stays_readable() {
    let h = harness().await;
    h.describer.with_signals(
        "4 Blank Row",
        &[("natural_light", f64::NAN), ("kitchen_quality", 60.0)],
    );
    let id = h.ingest("4 Blank Row", 2).await;

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.failed_stage, Some(Stage::Vision));
    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(record.stage_failures[&Stage::Vision].kind, FailureKind::Validation);
    assert!(record.present_fit.is_none());
    assert!(h.orchestrator.rankings().await.is_ok());
    assert_eq!(h.orchestrator.pending_listings().await.unwrap(), vec![id]);
}

#[tokio::test]
async fn empty_brief_fails_brief_stage_and_keeps_scores() {
    let h = harness().await;
    let id = h.ingest("5 Blank Row", 2).await;
    h.narrator.blank_brief(&id);

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.failed_stage, Some(Stage::Brief));
    assert_eq!(h.narrator.calls(), 1);
    let record = h.listings.get(&id).await.unwrap().unwrap();
    let failure = &record.stage_failures[&Stage::Brief];
    assert_eq!((failure.kind, failure.attempts), (FailureKind::Validation, 1));
    assert!(record.brief.is_none());
    assert!(record.present_fit.is_some() && record.potential.is_some());
}

#[tokio::test]
async fn batch_scores_the_rest_when_one_descriptor_is_malformed() {
    let h = harness().await;
    h.describer.with_descriptor("2 Valid Way", VisionDescriptor::default());
    let mut ids = Vec::new();
    for n in 1..=3 {
        ids.push(h.ingest(&format!("{n} Valid Way"), 2).await);
    }

    let report = h.orchestrator.run_batch(&ids).await;

    assert_eq!((report.scored(), report.failed()), (2, 1));
    let failed = report.outcome(&ids[1]).unwrap();
    assert_eq!(failed.failed_stage, Some(Stage::Vision));
    assert_eq!(h.describer.calls(), 3);
    for id in [&ids[0], &ids[2]] {
        assert!(h.listings.get(id).await.unwrap().unwrap().is_current(1));
    }
}
