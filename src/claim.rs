use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SettleError;
use crate::locks::PoolLocks;
use crate::store::Store;
use crate::types::{ClaimCheck, ClaimDenial, ClaimReceipt, Prediction};

impl From<ClaimDenial> for SettleError {
    fn from(denial: ClaimDenial) -> Self {
        match denial {
            ClaimDenial::NoPrediction => SettleError::NoPrediction,
            ClaimDenial::PoolNotResolved => SettleError::PoolNotResolved,
            ClaimDenial::AlreadyClaimed => SettleError::AlreadyClaimed,
            ClaimDenial::NoRewardAvailable => SettleError::NoRewardAvailable,
        }
    }
}

/// One-time payout of a settled reward.
pub struct ClaimGate {
    store: Store,
    locks: Arc<PoolLocks>,
}

impl ClaimGate {
    pub fn new(store: Store, locks: Arc<PoolLocks>) -> Self {
        Self { store, locks }
    }

    pub async fn check_claim(&self, pool_id: Uuid, subject: &str) -> Result<ClaimCheck, SettleError> {
        let subject = subject.trim();
        Ok(match self.eligible(pool_id, subject).await? {
            Ok((_, amount)) => ClaimCheck::allowed(amount),
            Err(denial) => ClaimCheck::denied(denial),
        })
    }

    async fn eligible(
        &self,
        pool_id: Uuid,
        subject: &str,
    ) -> Result<Result<(Prediction, f64), ClaimDenial>, SettleError> {
        let Some(prediction) = self.store.find_prediction(pool_id, subject).await? else {
            return Ok(Err(ClaimDenial::NoPrediction));
        };

        let pool = self
            .store
            .get_pool(pool_id)
            .await?
            .ok_or(SettleError::NotFound(pool_id))?;

        if !pool.is_resolved {
            return Ok(Err(ClaimDenial::PoolNotResolved));
        }
        if prediction.claimed {
            return Ok(Err(ClaimDenial::AlreadyClaimed));
        }

        match prediction.claimable_reward {
            Some(amount) if amount > 0.0 => Ok(Ok((prediction, amount))),
            _ => Ok(Err(ClaimDenial::NoRewardAvailable)),
        }
    }

    /// Marks the reward as claimed and returns its amount. Only one caller can
    /// ever win; everyone after gets `AlreadyClaimed`.
    pub async fn claim(&self, pool_id: Uuid, subject: &str) -> Result<ClaimReceipt, SettleError> {
        // subjects are stored trimmed
        let subject = subject.trim();
        let _guard = self.locks.acquire(pool_id).await?;

        let (prediction, amount) = self.eligible(pool_id, subject).await??;

        if !self.store.mark_claimed(prediction.id).await? {
            warn!(%pool_id, subject, "claim lost race");
            return Err(SettleError::AlreadyClaimed);
        }

        info!(%pool_id, subject, amount, "reward claimed");

        Ok(ClaimReceipt {
            prediction_id: prediction.id,
            pool_id,
            subject: prediction.subject,
            amount,
        })
    }
}
