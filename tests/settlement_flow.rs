mod common;

use common::*;
use poolsettle::error::SettleError;
use poolsettle::types::{ClaimDenial, ScoringMode};
use uuid::Uuid;

#[tokio::test]
async fn scenario_a_linear_pro_rata_rewards() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;

    let pool = state.store.get_pool(pool_id).await.unwrap().unwrap();
    assert_eq!(pool.total_stake, 35.0);

    let resolution = state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();

    assert!((resolution.total_weighted - 3.5606).abs() < 1e-3);

    let alice = reward_of(&state, pool_id, "alice").await.unwrap();
    let bob = reward_of(&state, pool_id, "bob").await.unwrap();
    let charlie = reward_of(&state, pool_id, "charlie").await.unwrap();

    assert!((alice - 8.93).abs() < 0.01, "alice got {alice}");
    assert!((bob - 17.87).abs() < 0.01, "bob got {bob}");
    assert!((charlie - 8.19).abs() < 0.01, "charlie got {charlie}");
    assert!((alice + bob + charlie - 35.0).abs() < 1e-9);

    let pool = state.store.get_pool(pool_id).await.unwrap().unwrap();
    assert!(pool.is_resolved);
    assert_eq!(pool.outcome_value, Some(50.0));
}

#[tokio::test]
async fn scenario_b_empty_pool_resolves_without_rewards() {
    let state = test_state().await;
    let pool_id = open_pool(&state).await;

    let resolution = state
        .settlement
        .resolve_pool(pool_id, 75.0, ScoringMode::Linear)
        .await
        .unwrap();

    assert!(resolution.lines.is_empty());
    let pool = state.store.get_pool(pool_id).await.unwrap().unwrap();
    assert!(pool.is_resolved);
    assert_eq!(pool.outcome_value, Some(75.0));
    assert!(state.store.list_predictions(pool_id).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_d_concurrent_resolution_pays_once() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;

    let first = {
        let settlement = state.settlement.clone();
        tokio::spawn(async move { settlement.resolve_pool(pool_id, 50.0, ScoringMode::Linear).await })
    };
    let second = {
        let settlement = state.settlement.clone();
        tokio::spawn(async move { settlement.resolve_pool(pool_id, 50.0, ScoringMode::Linear).await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    let losers: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(losers.len(), 1);
    assert!(matches!(losers[0], SettleError::AlreadyResolved(id) if *id == pool_id));

    for line in &winners[0].lines {
        let stored = reward_of(&state, pool_id, &line.subject).await.unwrap();
        assert_eq!(stored, line.reward);
    }
}

#[tokio::test]
async fn resolving_twice_keeps_original_rewards() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;

    state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();
    let before = reward_of(&state, pool_id, "bob").await;

    let err = state
        .settlement
        .resolve_pool(pool_id, 10.0, ScoringMode::Quadratic)
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::AlreadyResolved(_)));

    assert_eq!(reward_of(&state, pool_id, "bob").await, before);
    let pool = state.store.get_pool(pool_id).await.unwrap().unwrap();
    assert_eq!(pool.outcome_value, Some(50.0));
}

#[tokio::test]
async fn resolution_preconditions_fail_in_order() {
    let state = test_state().await;

    let missing = Uuid::new_v4();
    assert!(matches!(
        state.settlement.resolve_pool(missing, 50.0, ScoringMode::Linear).await,
        Err(SettleError::NotFound(id)) if id == missing
    ));

    let pool_id = open_pool(&state).await;
    for bad in [-1.0, 100.5, f64::NAN] {
        assert!(matches!(
            state.settlement.resolve_pool(pool_id, bad, ScoringMode::Linear).await,
            Err(SettleError::InvalidOutcome(_))
        ));
    }
    let pool = state.store.get_pool(pool_id).await.unwrap().unwrap();
    assert!(!pool.is_resolved);

    state
        .settlement
        .resolve_pool(pool_id, 0.0, ScoringMode::Linear)
        .await
        .unwrap();
    assert!(matches!(
        state.settlement.resolve_pool(pool_id, 500.0, ScoringMode::Linear).await,
        Err(SettleError::AlreadyResolved(_))
    ));
}

#[tokio::test]
async fn unstaked_votes_resolve_with_zero_reward() {
    let state = test_state().await;
    let pool_id = open_pool(&state).await;
    stake(&state, pool_id, "voter1", "yes", 0.0).await;
    stake(&state, pool_id, "voter2", "no", 0.0).await;

    state
        .settlement
        .resolve_pool(pool_id, 100.0, ScoringMode::Linear)
        .await
        .unwrap();

    assert_eq!(reward_of(&state, pool_id, "voter1").await, Some(0.0));
    assert_eq!(reward_of(&state, pool_id, "voter2").await, Some(0.0));

    let check = state.claims.check_claim(pool_id, "voter1").await.unwrap();
    assert!(!check.can_claim);
    assert_eq!(check.reason, Some(ClaimDenial::NoRewardAvailable));
}

#[tokio::test]
async fn reward_summary_before_and_after_resolution() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;

    let open = state
        .settlement
        .reward_summary(pool_id, ScoringMode::Linear)
        .await
        .unwrap();
    assert!(!open.pool.is_resolved);
    assert!(open.reward_root.is_none());
    assert_eq!(open.predictions.len(), 3);
    assert!(open.predictions.iter().all(|p| p.score.is_none() && p.claimable_reward.is_none()));

    state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();

    let settled = state
        .settlement
        .reward_summary(pool_id, ScoringMode::Linear)
        .await
        .unwrap();
    assert!((settled.total_weighted - 3.5606).abs() < 1e-3);
    assert_eq!(settled.reward_root.as_deref().map(str::len), Some(64));

    let charlie = settled
        .predictions
        .iter()
        .find(|p| p.subject == "charlie")
        .unwrap();
    assert!((charlie.score.unwrap() - 1.0 / 6.0).abs() < 1e-9);
    assert!((charlie.weighted_score.unwrap() - 5.0 / 6.0).abs() < 1e-9);

    // same allocation, same root
    let again = state
        .settlement
        .reward_summary(pool_id, ScoringMode::Linear)
        .await
        .unwrap();
    assert_eq!(again.reward_root, settled.reward_root);
}

#[tokio::test]
async fn claim_is_exactly_once() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;
    state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();

    let stored = reward_of(&state, pool_id, "alice").await.unwrap();
    let check = state.claims.check_claim(pool_id, "alice").await.unwrap();
    assert!(check.can_claim);
    assert_eq!(check.amount, Some(stored));

    let receipt = state.claims.claim(pool_id, "alice").await.unwrap();
    assert_eq!(receipt.amount, stored);

    assert!(matches!(
        state.claims.claim(pool_id, "alice").await,
        Err(SettleError::AlreadyClaimed)
    ));
    let check = state.claims.check_claim(pool_id, "alice").await.unwrap();
    assert_eq!(check.reason, Some(ClaimDenial::AlreadyClaimed));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_claims_pay_once() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;
    state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let claims = state.claims.clone();
            tokio::spawn(async move { claims.claim(pool_id, "bob").await })
        })
        .collect();

    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(SettleError::AlreadyClaimed) => {}
            Err(e) => panic!("unexpected claim error: {e}"),
        }
    }
    assert_eq!(paid, 1);
}

#[tokio::test]
async fn claim_denials() {
    let state = test_state().await;
    let pool_id = scenario_a_pool(&state).await;

    let check = state.claims.check_claim(pool_id, "mallory").await.unwrap();
    assert_eq!(check.reason, Some(ClaimDenial::NoPrediction));
    assert!(matches!(
        state.claims.claim(pool_id, "mallory").await,
        Err(SettleError::NoPrediction)
    ));

    let check = state.claims.check_claim(pool_id, "alice").await.unwrap();
    assert_eq!(check.reason, Some(ClaimDenial::PoolNotResolved));
    assert!(check.amount.is_none());
    assert!(matches!(
        state.claims.claim(pool_id, "alice").await,
        Err(SettleError::PoolNotResolved)
    ));
}

#[tokio::test]
async fn padded_subject_claims_under_the_same_name() {
    let state = test_state().await;
    let pool_id = open_pool(&state).await;
    stake(&state, pool_id, " dana ", "50", 5.0).await;
    state
        .settlement
        .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
        .await
        .unwrap();

    let check = state.claims.check_claim(pool_id, "dana").await.unwrap();
    assert!(check.can_claim);

    let receipt = state.claims.claim(pool_id, " dana ").await.unwrap();
    assert_eq!(receipt.subject, "dana");
    assert!((receipt.amount - 5.0).abs() < 1e-9);
}

#[tokio::test]
async fn deleted_pool_cannot_be_resolved() {
    let state = test_state().await;
    let pool_id = open_pool(&state).await;

    state.settlement.delete_pool(pool_id).await.unwrap();

    assert!(matches!(
        state
            .settlement
            .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
            .await,
        Err(SettleError::NotFound(id)) if id == pool_id
    ));
    assert!(matches!(
        state.settlement.delete_pool(pool_id).await,
        Err(SettleError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_racing_resolution_never_reports_already_resolved() {
    for _ in 0..20 {
        let state = test_state().await;
        let pool_id = open_pool(&state).await;

        let settlement = state.settlement.clone();
        let resolve = tokio::spawn(async move {
            settlement
                .resolve_pool(pool_id, 50.0, ScoringMode::Linear)
                .await
        });
        let delete = state.settlement.delete_pool(pool_id).await;
        let resolve = resolve.await.unwrap();

        assert!(delete.is_ok());
        match resolve {
            Ok(_) | Err(SettleError::NotFound(_)) => {}
            Err(e) => panic!("unexpected resolution error: {e}"),
        }
    }
}
