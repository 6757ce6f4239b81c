#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use poolsettle::config::Config;
use poolsettle::eth::{LedgerVerifier, TrustingLedger};
use poolsettle::scheduler::FallbackOracle;
use poolsettle::staking::Submission;
use poolsettle::state::AppState;
use poolsettle::store::Store;
use poolsettle::types::{Pool, Prediction};
use uuid::Uuid;

/// Oracle returning a fixed outcome so sweeps are deterministic.
pub struct FixedOracle(pub f64);

impl FallbackOracle for FixedOracle {
    fn empty_pool_outcome(&self, _pool: &Pool) -> f64 {
        self.0
    }
}

pub fn test_config() -> Config {
    Config {
        resolver_interval: Duration::from_millis(50),
        lock_timeout: Duration::from_secs(5),
        ledger_timeout: Duration::from_millis(200),
        ..Config::default()
    }
}

pub async fn state_with(ledger: Arc<dyn LedgerVerifier>, config: &Config) -> AppState {
    let store = Store::in_memory().await.unwrap();
    AppState::new(store, config, ledger, Arc::new(FixedOracle(75.0)))
}

pub async fn test_state() -> AppState {
    state_with(Arc::new(TrustingLedger), &test_config()).await
}

pub fn in_an_hour() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::hours(1)
}

pub async fn open_pool(state: &AppState) -> Uuid {
    state.store.create_pool(in_an_hour()).await.unwrap().id
}

pub async fn stake(state: &AppState, pool_id: Uuid, subject: &str, value: &str, amount: f64) -> Prediction {
    state
        .stakes
        .submit(
            pool_id,
            Submission {
                subject: subject.to_string(),
                prediction_value: value.to_string(),
                stake_amount: amount,
                tx_ref: (amount > 0.0).then(|| format!("0x{subject}")),
            },
        )
        .await
        .unwrap()
}

/// The three-participant pool used across the settlement tests: total stake 35.
pub async fn scenario_a_pool(state: &AppState) -> Uuid {
    let pool_id = open_pool(state).await;
    stake(state, pool_id, "alice", "60", 10.0).await;
    stake(state, pool_id, "bob", "40", 20.0).await;
    stake(state, pool_id, "charlie", "55", 5.0).await;
    pool_id
}

pub async fn reward_of(state: &AppState, pool_id: Uuid, subject: &str) -> Option<f64> {
    state
        .store
        .find_prediction(pool_id, subject)
        .await
        .unwrap()
        .and_then(|p| p.claimable_reward)
}
