use hearth::core::listing::ListingStore;
use hearth::core::pipeline::{OutcomeStatus, Stage};

use super::pipeline_harness::harness;

#[tokio::test]
async fn rerun_of_current_listing_writes_nothing() {
    let h = harness().await;
    let id = h.ingest("5 Quiet Place", 3).await;
    h.orchestrator.run_listing(&id).await.unwrap();
    let before = h.listings.get(&id).await.unwrap().unwrap();

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.status, OutcomeStatus::Scored);
    assert!(outcome.stages_run.is_empty());
    assert_eq!(outcome.taste_version, Some(1));
    assert_eq!((h.describer.calls(), h.narrator.calls()), (1, 1));

    let after = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(after.stage_completed_at, before.stage_completed_at);
    assert_eq!(after.present_fit, before.present_fit);
    assert!(after.present_fit_history.is_empty());
}

#[tokio::test]
async fn brief_failure_keeps_scores_and_resumes_at_brief() {
    let h = harness().await;
    let id = h.ingest("6 Quiet Place", 3).await;
    h.narrator.fail_permanent(&id);

    let failed = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(failed.status, OutcomeStatus::Failed);
    assert_eq!(failed.failed_stage, Some(Stage::Brief));
    assert_eq!(
        failed.stages_run,
        vec![Stage::Vision, Stage::PresentFit, Stage::Potential]
    );
    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert!(record.present_fit.is_some() && record.potential.is_some());
    assert!(record.brief.is_none());
    assert!(record.stage_failures.contains_key(&Stage::Brief));

    h.narrator.heal(&id);
    let resumed = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(resumed.status, OutcomeStatus::Scored);
    assert_eq!(resumed.stages_run, vec![Stage::Brief]);
    assert_eq!(h.describer.calls(), 1);
    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert!(record.stage_failures.is_empty());
    assert!(record.is_current(1));
}

#[tokio::test]
async fn verdict_and_annotation_survive_rescoring() {
    let h = harness().await;
    let id = h.ingest("9 Quiet Place", 2).await;
    h.orchestrator.run_listing(&id).await.unwrap();

    h.orchestrator
        .record_verdict(&id, "liked".parse().unwrap(), "love the porch")
        .await
        .unwrap();
    h.orchestrator.annotate(&id, "ask about the roof").await.unwrap();
    h.bump_taste("Porches matter").await;
    h.orchestrator.run_listing(&id).await.unwrap();

    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(record.user_verdict.as_ref().unwrap().note, "love the porch");
    let notes: Vec<&str> = record.annotations.iter().map(|a| a.text.as_str()).collect();
    assert_eq!(notes, vec!["love the porch", "ask about the roof"]);
    assert!(h.orchestrator.annotate(&id, "   ").await.is_err());
}

#[tokio::test]
async fn unknown_listing_is_not_found() {
    let h = harness().await;
    assert!(h.orchestrator.run_listing("no-such-listing").await.is_err());
    let report = h.orchestrator.run_batch(&["no-such-listing".to_string()]).await;
    assert_eq!(report.failed(), 1);
    assert_eq!(report.outcomes[0].failed_stage, None);
}
