use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use crate::pipeline::Stage;
use crate::state::AppState;

/// GET /health
/// Returns service status plus per-stage queue depth. Reports `degraded`
/// when the queue backend cannot be reached.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let mut queues = Map::new();
    let mut healthy = true;

    for stage in Stage::all() {
        match state.queue.counts(stage.queue()).await {
            Ok(counts) => {
                queues.insert(stage.queue().to_string(), json!(counts));
            }
            Err(e) => {
                tracing::warn!("Health check could not read {}: {e}", stage.queue());
                healthy = false;
            }
        }
    }

    let status = if healthy { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "tailor",
        "model": state.config.generation_model,
        "queues": queues
    }))
}
