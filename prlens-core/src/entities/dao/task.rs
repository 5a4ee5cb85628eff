use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::queue::AnalysisRequest;

/// Externally visible lifecycle of a task.
///
/// A task is created `Pending` and moves exactly once to `Success` or
/// `Failure`. Claiming by a worker does not change the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Pending,
    Success,
    Failure,
}

impl TaskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Success => "SUCCESS",
            TaskState::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskState::Pending)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown task state '{0}'")]
pub struct UnknownTaskState(pub String);

impl FromStr for TaskState {
    type Err = UnknownTaskState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskState::Pending),
            "SUCCESS" => Ok(TaskState::Success),
            "FAILURE" => Ok(TaskState::Failure),
            other => Err(UnknownTaskState(other.to_owned())),
        }
    }
}

/// Terminal result written by a worker.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failure(String),
}

impl TaskOutcome {
    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Success(_) => TaskState::Success,
            TaskOutcome::Failure(_) => TaskState::Failure,
        }
    }
}

/// A row in the `tasks` table.
#[derive(Clone)]
pub struct TaskRecord {
    pub id: String,
    pub state: TaskState,
    pub repo_url: String,
    pub pr_number: i64,
    /// Cleared when the task finishes.
    pub github_token: Option<String>,
    /// JSON-encoded report, set on success.
    pub result_data: Option<String>,
    pub error_msg: Option<String>,
    /// Worker that claimed the task; `None` while it waits in the queue.
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// After this instant the claim counts as abandoned.
    pub claim_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    /// A freshly queued task for `request`.
    pub fn pending(id: impl Into<String>, request: &AnalysisRequest) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            state: TaskState::Pending,
            repo_url: request.repo_url.clone(),
            pr_number: i64::try_from(request.pr_number).unwrap_or(i64::MAX),
            github_token: request.github_token.clone(),
            result_data: None,
            error_msg: None,
            claimed_by: None,
            claimed_at: None,
            claim_deadline: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// The job payload this task was queued with.
    pub fn request(&self) -> AnalysisRequest {
        AnalysisRequest {
            repo_url: self.repo_url.clone(),
            pr_number: self.pr_number.max(0) as u64,
            github_token: self.github_token.clone(),
        }
    }
}

impl fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("repo_url", &self.repo_url)
            .field("pr_number", &self.pr_number)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("error_msg", &self.error_msg)
            .field("claimed_by", &self.claimed_by)
            .field("claim_deadline", &self.claim_deadline)
            .field("created_at", &self.created_at)
            .field("completed_at", &self.completed_at)
            .finish()
    }
}
