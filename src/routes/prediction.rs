use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::SettleError;
use crate::staking::Submission;
use crate::state::AppState;
use crate::types::{Prediction, SubmitPredictionRequest};

pub async fn submit_prediction(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
    Json(payload): Json<SubmitPredictionRequest>,
) -> Result<(StatusCode, Json<Prediction>), SettleError> {
    let prediction = state
        .stakes
        .submit(
            pool_id,
            Submission {
                subject: payload.subject,
                prediction_value: payload.prediction_value,
                stake_amount: payload.stake_amount,
                tx_ref: payload.tx_ref,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(prediction)))
}

pub async fn list_predictions(
    State(state): State<AppState>,
    Path(pool_id): Path<Uuid>,
) -> Result<Json<Vec<Prediction>>, SettleError> {
    if state.store.get_pool(pool_id).await?.is_none() {
        return Err(SettleError::NotFound(pool_id));
    }

    Ok(Json(state.store.list_predictions(pool_id).await?))
}
