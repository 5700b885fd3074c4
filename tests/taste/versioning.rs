use hearth::core::taste::{
    PreferenceStore, SqlitePreferenceStore, TasteDiff, TasteModel, TasteOp, VersionOrigin,
};
use hearth::error::{ConstraintConflictError, HearthError};

use super::pipeline_harness::harness;

#[tokio::test]
async fn conflicting_diff_leaves_current_version_untouched() {
    let h = harness().await;
    let before = h.prefs.current();
    let diff = TasteDiff::new(vec![
        TasteOp::AddPrinciple {
            text: "Light above all".into(),
        },
        TasteOp::SetWeight {
            dimension: "natural_light".into(),
            weight: 0.9,
        },
    ]);

    let err = h.prefs.apply(&diff, 1, VersionOrigin::Manual).await.unwrap_err();

    assert!(matches!(
        err,
        HearthError::ConstraintConflict(ConstraintConflictError::WeightSum { .. })
    ));
    let after = h.prefs.current();
    assert_eq!(after.version, 1);
    assert_eq!(after.principles, before.principles);
    assert_eq!(h.prefs.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn diff_against_wrong_base_is_refused() {
    let h = harness().await;
    h.bump_taste("First").await;
    let diff = TasteDiff::new(vec![TasteOp::AddPrinciple {
        text: "Second".into(),
    }]);

    let err = h.prefs.apply(&diff, 1, VersionOrigin::Manual).await.unwrap_err();

    assert!(matches!(
        err,
        HearthError::ConstraintConflict(ConstraintConflictError::VersionMismatch {
            expected: 1,
            actual: 2
        })
    ));
    assert_eq!(h.prefs.current().version, 2);
}

#[tokio::test]
async fn rollback_restores_content_as_a_new_version() {
    let h = harness().await;
    h.bump_taste("Original trim").await;
    h.bump_taste("No grey floors").await;

    let restored = h.prefs.rollback(1).await.unwrap();

    assert_eq!(restored.version, 4);
    assert!(restored.principles.is_empty());
    let history = h.prefs.history().await.unwrap();
    let versions: Vec<u64> = history.iter().map(|v| v.version).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(
        history[3].origin,
        VersionOrigin::Rollback {
            restored_version: 1
        }
    );
    assert_eq!(history[1].model.principles, vec!["Original trim".to_string()]);
    assert!(h.prefs.rollback(99).await.is_err());
    assert_eq!(h.prefs.current().version, 4);
}

#[tokio::test]
async fn reopened_store_resumes_latest_version() {
    let h = harness().await;
    h.bump_taste("Deep porches").await;

    let reopened = SqlitePreferenceStore::with_seed(h.listings.pool().clone(), TasteModel::bootstrap())
        .await
        .unwrap();

    let current = reopened.current();
    assert_eq!(current.version, 2);
    assert_eq!(current.principles, vec!["Deep porches".to_string()]);
}

#[tokio::test]
async fn every_stored_version_keeps_weights_normalized() {
    let h = harness().await;
    let diff = TasteDiff::new(vec![
        TasteOp::SetWeight {
            dimension: "natural_light".into(),
            weight: 0.25,
        },
        TasteOp::SetWeight {
            dimension: "materials_quality".into(),
            weight: 0.05,
        },
    ]);
    h.prefs.apply(&diff, 1, VersionOrigin::Manual).await.unwrap();
    h.prefs.rollback(1).await.unwrap();

    for version in h.prefs.history().await.unwrap() {
        assert!(
            (version.model.weight_sum() - 1.0).abs() < 1e-6,
            "v{} sums to {}",
            version.version,
            version.model.weight_sum()
        );
    }
}

#[tokio::test]
async fn scoring_lease_blocks_taste_updates() {
    let h = harness().await;
    let lease = h.prefs.lease().await;
    let prefs = h.prefs.clone();
    let bump = tokio::spawn(async move {
        let diff = TasteDiff::new(vec![TasteOp::AddPrinciple {
            text: "Waits for the lease".into(),
        }]);
        prefs.apply(&diff, 1, VersionOrigin::Manual).await.map(|m| m.version)
    });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(h.prefs.current().version, 1);
    assert_eq!(lease.version(), 1);
    drop(lease);

    assert_eq!(bump.await.unwrap().unwrap(), 2);
    assert_eq!(h.prefs.current().version, 2);
}
