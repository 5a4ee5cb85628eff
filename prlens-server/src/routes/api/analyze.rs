use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::ValidatedJson;
use crate::schemas::analyze::{AnalyzeRequest, AnalyzeResponse};
use crate::schemas::task::ErrorResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(submit_analysis),
    components(schemas(AnalyzeRequest, AnalyzeResponse, ErrorResponse))
)]
pub struct AnalyzeApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/analyze", post(submit_analysis))
}

/// Queue an analysis of one pull request.
///
/// Returns immediately with the task id; poll `/api/status/{task_id}` or
/// subscribe to `/api/events/{task_id}` for progress.
#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Task queued", body = AnalyzeResponse),
        (status = 400, description = "Malformed JSON", body = ErrorResponse),
        (status = 422, description = "Invalid fields"),
        (status = 500, description = "Queue unavailable", body = ErrorResponse),
    )
)]
pub async fn submit_analysis(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ServerError> {
    let task_id = state.queue.submit(&req.to_job()).await?;
    Ok(Json(AnalyzeResponse { task_id }))
}
