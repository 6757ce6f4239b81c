//! Pool resolution: score every prediction against the outcome and split the
//! pooled stake pro rata by stake-weighted score.
//!
//! Unstaked predictions are scored for reporting but take no share of the pool;
//! their stored reward is 0, so nothing outside the pool is ever paid out.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SettleError;
use crate::locks::PoolLocks;
use crate::proof;
use crate::scoring;
use crate::store::{RewardWrite, Store};
use crate::types::{
    OutcomeInput, Prediction, PredictionBreakdown, Resolution, RewardLine, RewardSummary,
    ScoringMode,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocation {
    pub total_weighted: f64,
    pub lines: Vec<RewardLine>,
}

/// Splits `total_stake` across staked predictions in proportion to
/// `score * stake`. Rewards sum to `total_stake` whenever any stake exists.
pub fn allocate(
    predictions: &[Prediction],
    total_stake: f64,
    outcome: f64,
    mode: ScoringMode,
) -> Result<Allocation, SettleError> {
    let mut lines = Vec::with_capacity(predictions.len());
    let mut total_weighted = 0.0;

    for prediction in predictions {
        let normalized = scoring::normalize(&prediction.prediction_value)?;
        let score = scoring::score(normalized, outcome, mode);
        let weighted = if prediction.is_staked() {
            score * prediction.stake_amount
        } else {
            0.0
        };
        total_weighted += weighted;

        lines.push(RewardLine {
            prediction_id: prediction.id,
            subject: prediction.subject.clone(),
            normalized_value: normalized,
            stake_amount: prediction.stake_amount,
            score,
            weighted_score: weighted,
            reward: 0.0,
        });
    }

    if total_weighted > 0.0 {
        for line in lines.iter_mut().filter(|l| l.weighted_score > 0.0) {
            line.reward = line.weighted_score / total_weighted * total_stake;
        }
    }

    Ok(Allocation {
        total_weighted,
        lines,
    })
}

impl OutcomeInput {
    pub fn value(&self) -> Result<f64, SettleError> {
        let value = match self {
            OutcomeInput::Number(v) => *v,
            OutcomeInput::Text(raw) => raw
                .trim()
                .parse()
                .map_err(|_| SettleError::InvalidOutcome(raw.clone()))?,
        };
        Ok(value)
    }
}

pub struct SettlementCoordinator {
    store: Store,
    locks: Arc<PoolLocks>,
}

impl SettlementCoordinator {
    pub fn new(store: Store, locks: Arc<PoolLocks>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fixes the pool's outcome and writes every prediction's claimable reward
    /// in one transaction. A second resolver sees `AlreadyResolved`.
    pub async fn resolve_pool(
        &self,
        pool_id: Uuid,
        outcome: f64,
        mode: ScoringMode,
    ) -> Result<Resolution, SettleError> {
        let _guard = self.locks.acquire(pool_id).await?;

        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(SettleError::NotFound(pool_id))?;

        if pool.is_resolved {
            return Err(SettleError::AlreadyResolved(pool_id));
        }

        let outcome = scoring::check_outcome(outcome)?;
        let predictions = self.store.list_predictions(pool_id).await?;

        let allocation = if predictions.is_empty() {
            debug!(%pool_id, "no predictions, skipping reward computation");
            Allocation::default()
        } else {
            allocate(&predictions, pool.total_stake, outcome, mode)?
        };

        let writes: Vec<RewardWrite> = allocation
            .lines
            .iter()
            .map(|line| RewardWrite {
                prediction_id: line.prediction_id,
                reward: line.reward,
            })
            .collect();

        self.store.commit_resolution(pool_id, outcome, &writes).await?;

        info!(
            %pool_id,
            outcome,
            ?mode,
            predictions = allocation.lines.len(),
            total_stake = pool.total_stake,
            total_weighted = allocation.total_weighted,
            "pool resolved"
        );

        Ok(Resolution {
            pool_id,
            outcome_value: outcome,
            mode,
            total_weighted: allocation.total_weighted,
            lines: allocation.lines,
        })
    }

    /// Deletes a pool and its predictions. Waits for any resolution or stake
    /// in flight on the same pool.
    pub async fn delete_pool(&self, pool_id: Uuid) -> Result<(), SettleError> {
        let _guard = self.locks.acquire(pool_id).await?;

        if !self.store.delete_pool(pool_id).await? {
            return Err(SettleError::NotFound(pool_id));
        }

        info!(%pool_id, "pool deleted");
        Ok(())
    }

    /// Per-prediction score, weight and reward for a pool. Scores are only
    /// available once the pool has an outcome.
    pub async fn reward_summary(
        &self,
        pool_id: Uuid,
        mode: ScoringMode,
    ) -> Result<RewardSummary, SettleError> {
        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(SettleError::NotFound(pool_id))?;
        let predictions = self.store.list_predictions(pool_id).await?;

        let allocation = match pool.outcome_value {
            Some(outcome) if pool.is_resolved => {
                Some(allocate(&predictions, pool.total_stake, outcome, mode)?)
            }
            _ => None,
        };

        let breakdown = predictions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let line = allocation.as_ref().map(|a| &a.lines[i]);
                PredictionBreakdown {
                    prediction_id: p.id,
                    subject: p.subject.clone(),
                    prediction_value: p.prediction_value.clone(),
                    stake_amount: p.stake_amount,
                    score: line.map(|l| l.score),
                    weighted_score: line.map(|l| l.weighted_score),
                    claimable_reward: p.claimable_reward,
                    claimed: p.claimed,
                }
            })
            .collect();

        let reward_root = pool.is_resolved.then(|| {
            proof::reward_root(predictions.iter().map(|p| {
                (p.id, p.subject.as_str(), p.claimable_reward.unwrap_or(0.0))
            }))
        });

        Ok(RewardSummary {
            total_weighted: allocation.as_ref().map_or(0.0, |a| a.total_weighted),
            pool,
            mode,
            predictions: breakdown,
            reward_root,
        })
    }
}
