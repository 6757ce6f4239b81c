use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::SettleError;
use crate::state::AppState;
use crate::types::{ClaimCheck, ClaimReceipt};

pub async fn check_claim(
    State(state): State<AppState>,
    Path((pool_id, subject)): Path<(Uuid, String)>,
) -> Result<Json<ClaimCheck>, SettleError> {
    Ok(Json(state.claims.check_claim(pool_id, &subject).await?))
}

pub async fn claim_reward(
    State(state): State<AppState>,
    Path((pool_id, subject)): Path<(Uuid, String)>,
) -> Result<Json<ClaimReceipt>, SettleError> {
    Ok(Json(state.claims.claim(pool_id, &subject).await?))
}
