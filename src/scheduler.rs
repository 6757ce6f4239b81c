//! Background resolution of pools whose deadline passed without an admin
//! supplying an outcome.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::SettleError;
use crate::scoring;
use crate::settlement::SettlementCoordinator;
use crate::types::{
    Pool, Prediction, Resolution, SchedulerStatus, ScoringMode, SweepFailure, SweepReport,
};

/// Source of an outcome for pools nobody predicted on.
pub trait FallbackOracle: Send + Sync {
    fn empty_pool_outcome(&self, pool: &Pool) -> f64;
}

/// Coin flip between the two extremes. Placeholder until a real data source
/// is plugged in.
pub struct RandomExtremes;

impl FallbackOracle for RandomExtremes {
    fn empty_pool_outcome(&self, _pool: &Pool) -> f64 {
        if rand::thread_rng().gen_bool(0.5) {
            scoring::MAX_VALUE
        } else {
            scoring::MIN_VALUE
        }
    }
}

/// Stake-weighted mean of the predictions, rounded and clamped to [0, 100].
/// Unstaked votes count with weight 1. `None` when there is nothing to average.
pub fn consensus_outcome(predictions: &[Prediction]) -> Result<Option<f64>, SettleError> {
    if predictions.is_empty() {
        return Ok(None);
    }

    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;

    for prediction in predictions {
        let value = scoring::normalize(&prediction.prediction_value)?;
        let weight = prediction.stake_amount.max(1.0);
        weighted_sum += value * weight;
        total_weight += weight;
    }

    let outcome = (weighted_sum / total_weight)
        .round()
        .clamp(scoring::MIN_VALUE, scoring::MAX_VALUE);

    Ok(Some(outcome))
}

struct Running {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct ResolutionScheduler {
    coordinator: Arc<SettlementCoordinator>,
    oracle: Arc<dyn FallbackOracle>,
    interval: Duration,
    running: Mutex<Option<Running>>,
    // manual and periodic sweeps never overlap
    sweeping: AsyncMutex<()>,
}

impl ResolutionScheduler {
    pub fn new(
        coordinator: Arc<SettlementCoordinator>,
        oracle: Arc<dyn FallbackOracle>,
        interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            oracle,
            interval,
            running: Mutex::new(None),
            sweeping: AsyncMutex::new(()),
        }
    }

    /// Spawns the periodic loop. Returns false if it was already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut running = self.running.lock();

        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            info!("resolution scheduler already running");
            return false;
        }

        let (shutdown, rx) = watch::channel(false);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run(rx).await });

        *running = Some(Running { shutdown, handle });

        info!(interval_secs = self.interval.as_secs(), "resolution scheduler started");
        true
    }

    /// Stops the loop after any in-flight sweep completes. Returns false if it
    /// was not running.
    pub async fn stop(&self) -> bool {
        let running = self.running.lock().take();

        let Some(running) = running else {
            info!("resolution scheduler not running");
            return false;
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.handle.await {
            error!("resolution scheduler task ended abnormally: {}", e);
        }

        info!("resolution scheduler stopped");
        true
    }

    pub fn status(&self) -> SchedulerStatus {
        let running = self
            .running
            .lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished());

        SchedulerStatus {
            running,
            interval_secs: self.interval.as_secs(),
        }
    }

    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // shutdown is only observed between sweeps
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            match self.sweep().await {
                Ok(report) if report.examined > 0 => info!(
                    examined = report.examined,
                    resolved = report.resolved.len(),
                    failed = report.failed.len(),
                    "sweep finished"
                ),
                Ok(_) => debug!("sweep found no expired pools"),
                Err(e) => error!("sweep aborted, retrying next tick: {}", e),
            }
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, SettleError> {
        self.sweep_at(Utc::now()).await
    }

    /// Resolves every unresolved pool whose deadline is before `now`. One
    /// pool failing never stops the others; it is picked up again next tick.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, SettleError> {
        let _sweeping = self.sweeping.lock().await;

        let pools = self.coordinator.store().list_expired_unresolved(now).await?;
        let mut report = SweepReport {
            examined: pools.len(),
            ..SweepReport::default()
        };

        for pool in pools {
            match self.resolve_expired(&pool).await {
                Ok(resolution) => {
                    info!(
                        pool_id = %pool.id,
                        outcome = resolution.outcome_value,
                        "auto-resolved expired pool"
                    );
                    report.resolved.push(pool.id);
                }
                Err(e) => {
                    match &e {
                        SettleError::AlreadyResolved(_) => {
                            warn!(pool_id = %pool.id, "pool resolved concurrently, skipping")
                        }
                        _ if e.is_transient() => {
                            warn!(pool_id = %pool.id, "auto-resolution deferred to next tick: {}", e)
                        }
                        _ => error!(pool_id = %pool.id, "auto-resolution failed: {}", e),
                    }
                    report.failed.push(SweepFailure {
                        pool_id: pool.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn resolve_expired(&self, pool: &Pool) -> Result<Resolution, SettleError> {
        let predictions = self.coordinator.store().list_predictions(pool.id).await?;

        let outcome = match consensus_outcome(&predictions)? {
            Some(outcome) => outcome,
            None => {
                let outcome = self.oracle.empty_pool_outcome(pool);
                debug!(pool_id = %pool.id, outcome, "no predictions, using fallback oracle");
                outcome
            }
        };

        self.coordinator
            .resolve_pool(pool.id, outcome, ScoringMode::Linear)
            .await
    }
}
