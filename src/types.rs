use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pool {
    pub id: Uuid,
    pub deadline: DateTime<Utc>,
    pub total_stake: f64,
    pub outcome_value: Option<f64>,
    pub is_resolved: bool,
}

impl Pool {
    pub fn deadline_passed(&self, now: DateTime<Utc>) -> bool {
        self.deadline < now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub id: Uuid,
    pub pool_id: Uuid,
    pub subject: String,
    /// Raw value as submitted: "yes", "no" or a percentage string.
    pub prediction_value: String,
    pub stake_amount: f64,
    pub claimable_reward: Option<f64>,
    pub claimed: bool,
}

impl Prediction {
    pub fn is_staked(&self) -> bool {
        self.stake_amount > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    #[default]
    Linear,
    Quadratic,
}

/// Outcome as it arrives over the wire; admins send both `75` and `"75"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OutcomeInput {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
pub struct CreatePoolRequest {
    // RFC3339 string from client
    pub deadline: String,
}

#[derive(Deserialize)]
pub struct SubmitPredictionRequest {
    pub subject: String,
    pub prediction_value: String,
    #[serde(default)]
    pub stake_amount: f64,
    pub tx_ref: Option<String>,
}

#[derive(Deserialize)]
pub struct ResolvePoolRequest {
    pub outcome_value: OutcomeInput,
    #[serde(default)]
    pub mode: ScoringMode,
}

#[derive(Deserialize, Default)]
pub struct ModeQuery {
    #[serde(default)]
    pub mode: ScoringMode,
}

/// One prediction's share of a settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardLine {
    pub prediction_id: Uuid,
    pub subject: String,
    pub normalized_value: f64,
    pub stake_amount: f64,
    pub score: f64,
    pub weighted_score: f64,
    pub reward: f64,
}

/// Result of a committed resolution.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub pool_id: Uuid,
    pub outcome_value: f64,
    pub mode: ScoringMode,
    pub total_weighted: f64,
    pub lines: Vec<RewardLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionBreakdown {
    pub prediction_id: Uuid,
    pub subject: String,
    pub prediction_value: String,
    pub stake_amount: f64,
    pub score: Option<f64>,
    pub weighted_score: Option<f64>,
    pub claimable_reward: Option<f64>,
    pub claimed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewardSummary {
    pub pool: Pool,
    pub mode: ScoringMode,
    pub predictions: Vec<PredictionBreakdown>,
    pub total_weighted: f64,
    pub reward_root: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimDenial {
    NoPrediction,
    PoolNotResolved,
    AlreadyClaimed,
    NoRewardAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimCheck {
    pub can_claim: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ClaimDenial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

impl ClaimCheck {
    pub fn denied(reason: ClaimDenial) -> Self {
        Self {
            can_claim: false,
            reason: Some(reason),
            amount: None,
        }
    }

    pub fn allowed(amount: f64) -> Self {
        Self {
            can_claim: true,
            reason: None,
            amount: Some(amount),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimReceipt {
    pub prediction_id: Uuid,
    pub pool_id: Uuid,
    pub subject: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub resolved: Vec<Uuid>,
    pub failed: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub pool_id: Uuid,
    pub error: String,
}
