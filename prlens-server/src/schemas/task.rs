use prlens_core::entities::{TaskRecord, TaskState};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Task lifecycle as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStateView {
    Pending,
    Success,
    Failure,
}

impl From<TaskState> for TaskStateView {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Pending => TaskStateView::Pending,
            TaskState::Success => TaskStateView::Success,
            TaskState::Failure => TaskStateView::Failure,
        }
    }
}

/// Body of `GET /api/status/{task_id}` and of every SSE `state` event.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub task_id: String,
    pub state: TaskStateView,
    /// Set only for FAILURE.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TaskRecord> for StatusResponse {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.id.clone(),
            state: record.state.into(),
            error: match record.state {
                TaskState::Failure => Some(
                    record
                        .error_msg
                        .clone()
                        .unwrap_or_else(|| "unknown error".to_owned()),
                ),
                _ => None,
            },
        }
    }
}

/// Body of `GET /api/results/{task_id}` for a finished task.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResultsResponse {
    pub task_id: String,
    pub state: TaskStateView,
    /// Analysis report: `analysis`, `files`, `summary` and `model`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
