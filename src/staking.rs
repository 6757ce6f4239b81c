//! Vote and stake intake. Ledger checks run before the pool lock is taken;
//! only the local transition happens inside it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SettleError;
use crate::eth::LedgerVerifier;
use crate::locks::PoolLocks;
use crate::scoring;
use crate::store::Store;
use crate::types::Prediction;

#[derive(Debug, Clone)]
pub struct Submission {
    pub subject: String,
    pub prediction_value: String,
    pub stake_amount: f64,
    pub tx_ref: Option<String>,
}

pub struct StakeDesk {
    store: Store,
    locks: Arc<PoolLocks>,
    ledger: Arc<dyn LedgerVerifier>,
    ledger_timeout: Duration,
}

impl StakeDesk {
    pub fn new(
        store: Store,
        locks: Arc<PoolLocks>,
        ledger: Arc<dyn LedgerVerifier>,
        ledger_timeout: Duration,
    ) -> Self {
        Self {
            store,
            locks,
            ledger,
            ledger_timeout,
        }
    }

    pub async fn submit(&self, pool_id: Uuid, submission: Submission) -> Result<Prediction, SettleError> {
        let subject = submission.subject.trim();
        if subject.is_empty() {
            return Err(SettleError::InvalidStake("subject is required".into()));
        }

        scoring::normalize(&submission.prediction_value)?;

        let stake = submission.stake_amount;
        if !stake.is_finite() || stake < 0.0 {
            return Err(SettleError::InvalidStake(format!("stake {stake} must be >= 0")));
        }

        if stake > 0.0 {
            let tx_ref = submission
                .tx_ref
                .as_deref()
                .ok_or_else(|| SettleError::InvalidStake("tx_ref is required when staking".into()))?;
            self.verify_transfer(pool_id, tx_ref, subject, stake).await?;
        }

        let _guard = self.locks.acquire(pool_id).await?;

        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(SettleError::NotFound(pool_id))?;

        if pool.is_resolved {
            return Err(SettleError::AlreadyResolved(pool_id));
        }
        if pool.deadline_passed(Utc::now()) {
            return Err(SettleError::DeadlinePassed(pool_id));
        }
        if !(pool.total_stake + stake).is_finite() {
            return Err(SettleError::InvalidStake(format!(
                "stake {stake} would overflow the pool total {}",
                pool.total_stake
            )));
        }

        let prediction = self
            .store
            .record_prediction(pool_id, subject, submission.prediction_value.trim(), stake)
            .await?;

        info!(
            %pool_id,
            subject,
            value = %prediction.prediction_value,
            stake,
            position = prediction.stake_amount,
            "prediction recorded"
        );

        Ok(prediction)
    }

    async fn verify_transfer(
        &self,
        pool_id: Uuid,
        tx_ref: &str,
        subject: &str,
        stake: f64,
    ) -> Result<(), SettleError> {
        let receipt = tokio::time::timeout(
            self.ledger_timeout,
            self.ledger.verify(tx_ref, subject, stake),
        )
        .await
        .map_err(|_| SettleError::Timeout("ledger verification"))??;

        if !receipt.verified {
            let reason = receipt.reason.unwrap_or_else(|| "unverified".to_string());
            warn!(%pool_id, tx_ref, subject, %reason, "stake rejected by ledger");
            return Err(SettleError::LedgerRejected(reason));
        }

        debug!(%pool_id, tx_ref, raw = %receipt.raw, "stake verified");
        Ok(())
    }
}
