use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Everything that can go wrong between a request and a committed pool transition.
#[derive(Debug, thiserror::Error)]
pub enum SettleError {
    #[error("pool {0} not found")]
    NotFound(Uuid),

    #[error("pool {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("invalid outcome {0:?}: expected a number in [0, 100]")]
    InvalidOutcome(String),

    #[error("prediction value {0:?} is not yes/no or a number in [0, 100]")]
    InvalidPredictionFormat(String),

    #[error("pool {0} deadline has passed")]
    DeadlinePassed(Uuid),

    #[error("reward already claimed")]
    AlreadyClaimed,

    #[error("no reward available to claim")]
    NoRewardAvailable,

    #[error("no prediction for this subject in the pool")]
    NoPrediction,

    #[error("pool has not been resolved yet")]
    PoolNotResolved,

    #[error("concurrent update on pool {0}")]
    ConcurrencyConflict(Uuid),

    #[error("invalid deadline: {0}")]
    InvalidDeadline(String),

    #[error("invalid stake: {0}")]
    InvalidStake(String),

    #[error("ledger rejected stake: {0}")]
    LedgerRejected(String),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl SettleError {
    /// Stable machine-readable code for API bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            SettleError::NotFound(_) => "not_found",
            SettleError::AlreadyResolved(_) => "already_resolved",
            SettleError::InvalidOutcome(_) => "invalid_outcome",
            SettleError::InvalidPredictionFormat(_) => "invalid_prediction_format",
            SettleError::DeadlinePassed(_) => "deadline_passed",
            SettleError::AlreadyClaimed => "already_claimed",
            SettleError::NoRewardAvailable => "no_reward_available",
            SettleError::NoPrediction => "no_prediction",
            SettleError::PoolNotResolved => "pool_not_resolved",
            SettleError::ConcurrencyConflict(_) => "concurrency_conflict",
            SettleError::InvalidDeadline(_) => "invalid_deadline",
            SettleError::InvalidStake(_) => "invalid_stake",
            SettleError::LedgerRejected(_) => "ledger_rejected",
            SettleError::LedgerUnavailable(_) => "ledger_unavailable",
            SettleError::Timeout(_) => "timeout",
            SettleError::Store(_) | SettleError::Migrate(_) | SettleError::Corrupt(_) => "store",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SettleError::NotFound(_) | SettleError::NoPrediction => StatusCode::NOT_FOUND,
            SettleError::AlreadyResolved(_)
            | SettleError::AlreadyClaimed
            | SettleError::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            SettleError::InvalidOutcome(_)
            | SettleError::InvalidPredictionFormat(_)
            | SettleError::InvalidDeadline(_)
            | SettleError::InvalidStake(_) => StatusCode::BAD_REQUEST,
            SettleError::DeadlinePassed(_)
            | SettleError::PoolNotResolved
            | SettleError::NoRewardAvailable => StatusCode::UNPROCESSABLE_ENTITY,
            SettleError::LedgerRejected(_) => StatusCode::PAYMENT_REQUIRED,
            SettleError::LedgerUnavailable(_) | SettleError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            SettleError::Store(_) | SettleError::Migrate(_) | SettleError::Corrupt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Store, ledger and timeout failures are worth retrying; validation
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SettleError::Store(_)
                | SettleError::LedgerUnavailable(_)
                | SettleError::Timeout(_)
                | SettleError::ConcurrencyConflict(_)
        )
    }
}

impl IntoResponse for SettleError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
