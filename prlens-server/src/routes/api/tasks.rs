//! Polling endpoints over the result backend.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use prlens_core::entities::{TaskRecord, TaskState, TaskStore};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::task::{ErrorResponse, ResultsResponse, StatusResponse, TaskStateView};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_status, get_results),
    components(schemas(StatusResponse, ResultsResponse, TaskStateView))
)]
pub struct TasksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status/{task_id}", get(get_status))
        .route("/results/{task_id}", get(get_results))
}

/// Unknown and expired ids are both reported as 404.
pub(crate) async fn load_task(state: &AppState, task_id: &str) -> Result<TaskRecord, ServerError> {
    state
        .store
        .get_task(task_id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("task {task_id} not found")))
}

#[utoipa::path(
    get,
    path = "/api/status/{task_id}",
    tag = "analysis",
    params(
        ("task_id" = String, Path, description = "Id returned by /api/analyze")
    ),
    responses(
        (status = 200, description = "Current state", body = StatusResponse),
        (status = 404, description = "Unknown or expired task", body = ErrorResponse),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let record = load_task(&state, &task_id).await?;
    Ok(Json(StatusResponse::from(&record)))
}

/// Final outcome of a task.
///
/// A failed task is still a successful lookup, so FAILURE is returned with
/// HTTP 200 and an `error` field.
#[utoipa::path(
    get,
    path = "/api/results/{task_id}",
    tag = "analysis",
    params(
        ("task_id" = String, Path, description = "Id returned by /api/analyze")
    ),
    responses(
        (status = 200, description = "Report or failure message", body = ResultsResponse),
        (status = 404, description = "Unknown or expired task", body = ErrorResponse),
        (status = 409, description = "Task still pending", body = ErrorResponse),
    )
)]
pub async fn get_results(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ResultsResponse>, ServerError> {
    let record = load_task(&state, &task_id).await?;
    match record.state {
        TaskState::Pending => Err(ServerError::NotReady("Results not ready".to_owned())),
        TaskState::Success => {
            let result = record
                .result_data
                .as_deref()
                .map(serde_json::from_str::<serde_json::Value>)
                .transpose()
                .map_err(|e| ServerError::Internal(format!("stored result is not JSON: {e}")))?;
            Ok(Json(ResultsResponse {
                task_id,
                state: record.state.into(),
                result,
                error: None,
            }))
        }
        TaskState::Failure => {
            let status = StatusResponse::from(&record);
            Ok(Json(ResultsResponse {
                task_id,
                state: status.state,
                result: None,
                error: status.error,
            }))
        }
    }
}
