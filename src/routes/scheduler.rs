use axum::{extract::State, Json};

use crate::error::SettleError;
use crate::state::AppState;
use crate::types::{SchedulerStatus, SweepReport};

pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

/// Runs one sweep inline and reports what it did.
pub async fn sweep_now(State(state): State<AppState>) -> Result<Json<SweepReport>, SettleError> {
    tracing::info!("manual sweep requested");
    Ok(Json(state.scheduler.sweep().await?))
}
