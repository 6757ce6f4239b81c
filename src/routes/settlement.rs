use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::SettleError;
use crate::state::AppState;
use crate::types::{ModeQuery, ResolvePoolRequest, Resolution, RewardSummary};

pub async fn resolve_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
    Json(payload): Json<ResolvePoolRequest>,
) -> Result<Json<Resolution>, SettleError> {
    let outcome = payload.outcome_value.value()?;

    let resolution = state
        .settlement
        .resolve_pool(pool_id, outcome, payload.mode)
        .await?;

    Ok(Json(resolution))
}

pub async fn get_rewards(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
    Query(query): Query<ModeQuery>,
) -> Result<Json<RewardSummary>, SettleError> {
    Ok(Json(state.settlement.reward_summary(pool_id, query.mode).await?))
}
