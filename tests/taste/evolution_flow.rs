use hearth::core::listing::Verdict;
use hearth::core::taste::{PreferenceStore, ProposalStatus, TasteOp, VersionOrigin};
use hearth::error::{HearthError, ProposalError};

use super::pipeline_harness::{Harness, harness};

/// Score a listing the buyer loves for its light, but which the model
/// under-rates, and record that verdict.
async fn liked_but_underrated(h: &Harness, address: &str) -> String {
    h.describer.with_signals(
        address,
        &[
            ("natural_light", 95.0),
            ("kitchen_quality", 10.0),
            ("materials_quality", 20.0),
            ("condition", 20.0),
        ],
    );
    let id = h.ingest(address, 3).await;
    let outcome = h.orchestrator.run_listing(&id).await.unwrap();
    assert!(outcome.present_fit.unwrap() < h.config.evolution.like_threshold);
    h.orchestrator
        .record_verdict(&id, Verdict::Liked, "the light is amazing")
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn one_contradiction_is_not_enough() {
    let h = harness().await;
    liked_but_underrated(&h, "1 Light Lane").await;

    assert!(h.evolution.review().await.unwrap().is_none());
    assert!(h.evolution.proposals().await.unwrap().is_empty());
    assert_eq!(h.prefs.current().version, 1);
}

#[tokio::test]
async fn repeated_contradiction_is_proposed_then_applied_on_approval() {
    let h = harness().await;
    let before = h.prefs.current();
    for n in 1..=3 {
        liked_but_underrated(&h, &format!("{n} Light Lane")).await;
    }

    let proposal = h.evolution.review().await.unwrap().unwrap();

    assert_eq!(proposal.base_version, 1);
    assert_eq!(proposal.status, ProposalStatus::Proposed);
    assert_eq!(proposal.basis.len(), 3);
    assert!(proposal.diff.ops.iter().any(|op| matches!(
        op,
        TasteOp::SetWeight { dimension, .. } if dimension == "natural_light"
    )));
    // Proposing alone never changes the model.
    assert_eq!(h.prefs.current().version, 1);
    let again = h.evolution.review().await.unwrap().unwrap();
    assert_eq!(again.id, proposal.id);

    let next = h.evolution.approve(&proposal.id).await.unwrap();

    assert_eq!(next.version, 2);
    assert!((next.weight_sum() - 1.0).abs() < 1e-6);
    let light = next.weighted_dimensions["natural_light"];
    assert!(light > before.weighted_dimensions["natural_light"]);
    assert!(light <= h.config.evolution.max_weight);
    assert_eq!(next.exemplars.liked.len(), 3);

    let history = h.prefs.history().await.unwrap();
    assert_eq!(
        history.last().unwrap().origin,
        VersionOrigin::Proposal {
            proposal_id: proposal.id.clone()
        }
    );
    let stored = h.evolution.proposals().await.unwrap();
    assert_eq!(stored[0].status, ProposalStatus::Approved);
    assert_eq!(stored[0].applied_version, Some(2));

    // Every scored listing is now stale; their verdicts no longer count.
    assert_eq!(h.orchestrator.pending_listings().await.unwrap().len(), 3);
    assert!(h.evolution.review().await.unwrap().is_none());
}

#[tokio::test]
async fn rejection_keeps_the_model_and_the_audit_entry() {
    let h = harness().await;
    for n in 1..=3 {
        liked_but_underrated(&h, &format!("{n} Shade Street")).await;
    }
    let proposal = h.evolution.review().await.unwrap().unwrap();

    let rejected = h.evolution.reject(&proposal.id, "light is overrated").await.unwrap();

    assert_eq!(rejected.status, ProposalStatus::Rejected);
    assert_eq!(h.prefs.current().version, 1);
    let all = h.evolution.proposals().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].rejection_reason.as_deref(), Some("light is overrated"));
    assert!(matches!(
        h.evolution.approve(&proposal.id).await,
        Err(HearthError::Proposal(ProposalError::AlreadyDecided { .. }))
    ));
}

#[tokio::test]
async fn proposal_built_on_an_older_version_cannot_be_approved() {
    let h = harness().await;
    for n in 1..=3 {
        liked_but_underrated(&h, &format!("{n} Stale Street")).await;
    }
    let proposal = h.evolution.review().await.unwrap().unwrap();
    h.bump_taste("Pocket doors are charming").await;

    let err = h.evolution.approve(&proposal.id).await.unwrap_err();

    assert!(matches!(
        err,
        HearthError::Proposal(ProposalError::Outdated {
            base: 1,
            current: 2,
            ..
        })
    ));
    assert_eq!(h.prefs.current().version, 2);

    // The next review closes the outdated proposal.
    assert!(h.evolution.review().await.unwrap().is_none());
    let closed = &h.evolution.proposals().await.unwrap()[0];
    assert_eq!(closed.status, ProposalStatus::Rejected);
    assert!(closed.rejection_reason.as_deref().unwrap().starts_with("outdated"));
}

#[tokio::test]
async fn unknown_proposal_is_not_found() {
    let h = harness().await;
    assert!(matches!(
        h.evolution.approve("missing").await,
        Err(HearthError::NotFound { .. })
    ));
    assert!(h.evolution.reject("missing", "n/a").await.is_err());
}
