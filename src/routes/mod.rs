use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod claim;
pub mod pool;
pub mod prediction;
pub mod scheduler;
pub mod settlement;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pools", post(pool::create_pool).get(pool::list_pools))
        .route("/pools/:id", get(pool::get_pool).delete(pool::delete_pool))
        .route(
            "/pools/:id/predictions",
            post(prediction::submit_prediction).get(prediction::list_predictions),
        )
        .route("/pools/:id/resolve", post(settlement::resolve_pool))
        .route("/pools/:id/rewards", get(settlement::get_rewards))
        .route(
            "/pools/:id/claims/:subject",
            get(claim::check_claim).post(claim::claim_reward),
        )
        .route("/scheduler", get(scheduler::status))
        .route("/scheduler/sweep", post(scheduler::sweep_now))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}
