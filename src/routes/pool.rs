use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::error::SettleError;
use crate::state::AppState;
use crate::types::{CreatePoolRequest, Pool};

pub async fn create_pool(
    State(state): State<AppState>,
    Json(payload): Json<CreatePoolRequest>,
) -> Result<(StatusCode, Json<Pool>), SettleError> {
    let deadline = chrono::DateTime::parse_from_rfc3339(&payload.deadline)
        .map_err(|e| SettleError::InvalidDeadline(e.to_string()))?
        .with_timezone(&Utc);

    let pool = state.store.create_pool(deadline).await?;
    tracing::info!(pool_id = %pool.id, %deadline, "pool created");

    Ok((StatusCode::CREATED, Json(pool)))
}

pub async fn list_pools(State(state): State<AppState>) -> Result<Json<Vec<Pool>>, SettleError> {
    Ok(Json(state.store.list_pools().await?))
}

pub async fn get_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<Pool>, SettleError> {
    state
        .store
        .get_pool(pool_id)
        .await?
        .map(Json)
        .ok_or(SettleError::NotFound(pool_id))
}

pub async fn delete_pool(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<StatusCode, SettleError> {
    state.settlement.delete_pool(pool_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
