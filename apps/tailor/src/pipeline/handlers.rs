use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::errors::AppError;
use crate::ledger::StatusEvent;
use crate::models::job::JobId;
use crate::pipeline::TailorRequest;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub job_id: JobId,
    pub latest: StatusEvent,
    /// True once the run reached `COMPLETED` or `ERROR`.
    pub finished: bool,
    /// Oldest first.
    pub events: Vec<StatusEvent>,
}

/// POST /api/v1/tailor
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<TailorRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    let job_id = state.pipeline.submit(req).await?;
    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { job_id })))
}

/// GET /api/v1/tailor/:job_id/status
pub async fn handle_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let job_id = JobId::from(job_id);
    let events = state.ledger.read_chronological(&job_id).await?;

    let Some(latest) = events.last().cloned() else {
        return Err(AppError::NotFound(format!(
            "No status recorded for job {job_id}"
        )));
    };

    Ok(Json(StatusResponse {
        job_id,
        finished: latest.status.is_terminal(),
        latest,
        events,
    }))
}

/// DELETE /api/v1/tailor/:job_id/status
pub async fn handle_clear(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.ledger.clear(&JobId::from(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
