pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::pipeline::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/tailor", post(handlers::handle_submit))
        .route(
            "/api/v1/tailor/:job_id/status",
            get(handlers::handle_status).delete(handlers::handle_clear),
        )
        .with_state(state)
}
