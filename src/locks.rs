use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::SettleError;

const PRUNE_THRESHOLD: usize = 1024;

/// Per-pool critical sections. Stakes, resolutions and claims on the same pool
/// run one at a time; different pools never contend.
pub struct PoolLocks {
    slots: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

pub type PoolGuard = OwnedMutexGuard<()>;

impl PoolLocks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    fn slot(&self, pool_id: Uuid) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock();

        if slots.len() >= PRUNE_THRESHOLD {
            // only the map holds an idle slot
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }

        slots
            .entry(pool_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Waits for the pool's lock, giving up with `ConcurrencyConflict` after the
    /// configured timeout.
    pub async fn acquire(&self, pool_id: Uuid) -> Result<PoolGuard, SettleError> {
        let slot = self.slot(pool_id);

        tokio::time::timeout(self.timeout, slot.lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(%pool_id, "timed out waiting for pool lock");
                SettleError::ConcurrencyConflict(pool_id)
            })
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_pool_is_exclusive() {
        let locks = PoolLocks::new(Duration::from_millis(50));
        let id = Uuid::new_v4();

        let guard = locks.acquire(id).await.unwrap();
        let err = locks.acquire(id).await.unwrap_err();
        assert!(matches!(err, SettleError::ConcurrencyConflict(p) if p == id));

        drop(guard);
        assert!(locks.acquire(id).await.is_ok());
    }

    #[tokio::test]
    async fn different_pools_do_not_contend() {
        let locks = PoolLocks::new(Duration::from_millis(50));
        let _a = locks.acquire(Uuid::new_v4()).await.unwrap();
        let _b = locks.acquire(Uuid::new_v4()).await.unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn idle_slots_are_pruned() {
        let locks = PoolLocks::new(Duration::from_millis(50));
        for _ in 0..PRUNE_THRESHOLD {
            let _guard = locks.acquire(Uuid::new_v4()).await.unwrap();
        }
        let _held = locks.acquire(Uuid::new_v4()).await.unwrap();
        assert_eq!(locks.len(), 1);
    }
}
