use std::sync::Arc;

use crate::claim::ClaimGate;
use crate::config::Config;
use crate::eth::LedgerVerifier;
use crate::locks::PoolLocks;
use crate::scheduler::{FallbackOracle, ResolutionScheduler};
use crate::settlement::SettlementCoordinator;
use crate::staking::StakeDesk;
use crate::store::Store;

/// Services shared by every request handler and the scheduler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub settlement: Arc<SettlementCoordinator>,
    pub claims: Arc<ClaimGate>,
    pub stakes: Arc<StakeDesk>,
    pub scheduler: Arc<ResolutionScheduler>,
}

impl AppState {
    pub fn new(
        store: Store,
        config: &Config,
        ledger: Arc<dyn LedgerVerifier>,
        oracle: Arc<dyn FallbackOracle>,
    ) -> Self {
        let locks = Arc::new(PoolLocks::new(config.lock_timeout));

        let settlement = Arc::new(SettlementCoordinator::new(store.clone(), locks.clone()));
        let claims = Arc::new(ClaimGate::new(store.clone(), locks.clone()));
        let stakes = Arc::new(StakeDesk::new(
            store.clone(),
            locks,
            ledger,
            config.ledger_timeout,
        ));
        let scheduler = Arc::new(ResolutionScheduler::new(
            settlement.clone(),
            oracle,
            config.resolver_interval,
        ));

        Self {
            store,
            settlement,
            claims,
            stakes,
            scheduler,
        }
    }
}
