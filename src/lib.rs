pub mod claim;
pub mod config;
pub mod error;
pub mod eth;
pub mod locks;
pub mod proof;
pub mod routes;
pub mod scheduler;
pub mod scoring;
pub mod settlement;
pub mod staking;
pub mod state;
pub mod store;
pub mod types;

use axum::Router;
use state::AppState;

pub use error::SettleError;

pub fn app(state: AppState) -> Router {
    routes::router(state)
}
