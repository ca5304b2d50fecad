pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod preflight;
pub mod rate_limit;
pub mod state;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{check_handler, health_handler, metrics_handler};
use crate::state::AppState;

// Counters are keyed "<category>:<client>" and only checks touch them
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/rate-limit-check", post(check_handler))
        .route("/functions/v1/rate-limit-check", post(check_handler))
        .with_state(state)
}
