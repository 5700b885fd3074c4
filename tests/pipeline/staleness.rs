use hearth::core::listing::ListingStore;
use hearth::core::pipeline::Stage;
use hearth::core::taste::PreferenceStore;

use super::pipeline_harness::harness;

#[tokio::test]
async fn version_bump_rescores_present_fit_and_brief_only() {
    let h = harness().await;
    h.bump_taste("Original detail over flips").await;
    assert_eq!(h.bump_taste("South light in the kitchen").await, 3);
    let id = h.ingest("14 Orchard Road", 3).await;
    h.orchestrator.run_listing(&id).await.unwrap();
    let scored_v3 = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(scored_v3.taste_model_version_used(), Some(3));

    assert_eq!(h.bump_taste("No open-concept kitchens").await, 4);

    assert_eq!(h.orchestrator.pending_listings().await.unwrap(), vec![id.clone()]);
    let ranked = h.orchestrator.rankings().await.unwrap();
    let warning = ranked[0].stale.as_ref().unwrap();
    assert_eq!((warning.scored_version, warning.current_version), (3, 4));
    let status = h.orchestrator.status().await.unwrap();
    assert_eq!((status.stale, status.pending, status.current), (1, 1, 0));

    let outcome = h.orchestrator.run_listing(&id).await.unwrap();

    assert_eq!(outcome.stages_run, vec![Stage::PresentFit, Stage::Brief]);
    assert_eq!(outcome.taste_version, Some(4));
    assert_eq!(h.describer.calls(), 1);

    let record = h.listings.get(&id).await.unwrap().unwrap();
    assert_eq!(record.present_fit.as_ref().unwrap().taste_version, 4);
    assert_eq!(record.brief.as_ref().unwrap().taste_version, 4);
    assert_eq!(record.present_fit_history.len(), 1);
    assert_eq!(record.present_fit_history[0].taste_version, 3);
    assert_eq!(record.potential, scored_v3.potential);
    assert!(record.brief.as_ref().unwrap().brief.executive_summary.contains("v4"));
    assert!(h.orchestrator.rankings().await.unwrap()[0].stale.is_none());
}

#[tokio::test]
async fn status_tallies_scores_by_version() {
    let h = harness().await;
    let a = h.ingest("20 Mill Street", 1).await;
    h.orchestrator.run_listing(&a).await.unwrap();
    h.bump_taste("Big windows").await;
    let b = h.ingest("21 Mill Street", 1).await;
    h.orchestrator.run_listing(&b).await.unwrap();

    let status = h.orchestrator.status().await.unwrap();

    assert_eq!(status.taste_version, h.prefs.current().version);
    assert_eq!(status.scored_by_version, vec![(1, 1), (2, 1)]);
    assert_eq!(status.stale, 1);
    assert_eq!(status.current, 1);
}
