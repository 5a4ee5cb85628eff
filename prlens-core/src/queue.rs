//! Task queue client used by the HTTP API.
//!
//! The queue is the `tasks` table itself: submitting inserts a PENDING row
//! that any worker attached to the same database may claim. Workers running
//! in the same process are woken through a shared [`Notify`]; standalone
//! workers find new rows on their next poll.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::entities::{SqliteStore, TaskRecord, TaskStore};

/// Job payload for one pull request analysis.
#[derive(Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub repo_url: String,
    pub pr_number: u64,
    #[serde(default)]
    pub github_token: Option<String>,
}

impl fmt::Debug for AnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisRequest")
            .field("repo_url", &self.repo_url)
            .field("pr_number", &self.pr_number)
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    store: Arc<SqliteStore>,
    notify: Arc<Notify>,
}

impl TaskQueue {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Queue `request` and return the new task id.
    pub async fn submit(&self, request: &AnalysisRequest) -> Result<String, sqlx::Error> {
        let task_id = Uuid::new_v4().to_string();
        self.store
            .insert_task(TaskRecord::pending(task_id.clone(), request))
            .await?;
        self.notify.notify_one();
        tracing::info!(
            task_id = %task_id,
            repo_url = %request.repo_url,
            pr_number = request.pr_number,
            "task queued"
        );
        Ok(task_id)
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    /// Handle given to in-process workers so that submissions wake them.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::TaskState;
    use std::collections::HashSet;
    use tracing_test::traced_test;

    async fn queue() -> TaskQueue {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        TaskQueue::new(Arc::new(store))
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            repo_url: "https://github.com/a/b".into(),
            pr_number: 5,
            github_token: None,
        }
    }

    #[tokio::test]
    async fn submit_issues_unique_ids() {
        let queue = queue().await;
        let mut ids = HashSet::new();
        for _ in 0..20 {
            let id = queue.submit(&request()).await.unwrap();
            assert!(Uuid::parse_str(&id).is_ok());
            assert!(ids.insert(id), "task id issued twice");
        }
    }

    #[tokio::test]
    async fn submitted_task_starts_pending() {
        let queue = queue().await;
        let id = queue.submit(&request()).await.unwrap();
        let record = queue.store().get_task(&id).await.unwrap().unwrap();
        assert_eq!(record.state, TaskState::Pending);
        assert_eq!(record.repo_url, "https://github.com/a/b");
    }

    #[tokio::test]
    async fn submit_wakes_waiting_worker() {
        let queue = queue().await;
        let notify = queue.notifier();
        queue.submit(&request()).await.unwrap();
        // notify_one stores a permit when nobody is waiting yet.
        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .expect("worker should be woken");
    }

    #[tokio::test]
    #[traced_test]
    async fn submit_logs_task_without_token() {
        let queue = queue().await;
        let id = queue
            .submit(&AnalysisRequest {
                github_token: Some("ghp_secret".into()),
                ..request()
            })
            .await
            .unwrap();
        assert!(logs_contain("task queued"));
        assert!(logs_contain(&id));
        assert!(!logs_contain("ghp_secret"));
    }

    #[test]
    fn request_debug_hides_token() {
        let request = AnalysisRequest {
            github_token: Some("ghp_secret".into()),
            ..request()
        };
        assert!(!format!("{request:?}").contains("ghp_secret"));
    }

    #[test]
    fn token_defaults_to_none_when_missing() {
        let request: AnalysisRequest =
            serde_json::from_str(r#"{"repo_url":"https://github.com/a/b","pr_number":5}"#)
                .unwrap();
        assert!(request.github_token.is_none());
    }
}
