use std::future::Future;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::entities::{SqliteStore, TaskOutcome, TaskRecord, TaskState};

pub trait TaskStore: Send + Sync + 'static {
    /// Queue a new task.
    fn insert_task(&self, record: TaskRecord)
    -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    fn get_task(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// Atomically hand the oldest unclaimed pending task to `worker_id`.
    ///
    /// The claim is considered abandoned once `deadline` has passed.
    fn claim_next(
        &self,
        worker_id: &str,
        deadline: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<TaskRecord>, sqlx::Error>> + Send;

    /// Write the terminal state. Returns `false` when the task was missing
    /// or had already finished, in which case nothing is written.
    fn complete_task(
        &self,
        id: &str,
        outcome: &TaskOutcome,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;

    /// Fail pending tasks whose claim deadline is earlier than `now`.
    fn fail_stale_claims(
        &self,
        now: DateTime<Utc>,
        message: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;

    /// Delete finished tasks completed before `completed_before`.
    fn purge_finished(
        &self,
        completed_before: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

const TASK_COLUMNS: &str = "id, state, repo_url, pr_number, github_token, result_data, error_msg, \
     claimed_by, claimed_at, claim_deadline, created_at, updated_at, completed_at";

type TaskRow = (
    String,
    String,
    String,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
    String,
    Option<String>,
);

/// Fixed-width RFC 3339 so that timestamps compare correctly as text.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str, column: &'static str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse()
        .map_err(|e: chrono::ParseError| sqlx::Error::ColumnDecode {
            index: column.to_owned(),
            source: Box::new(e),
        })
}

fn parse_opt_ts(
    raw: Option<String>,
    column: &'static str,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    raw.as_deref().map(|s| parse_ts(s, column)).transpose()
}

fn into_record(row: TaskRow) -> Result<TaskRecord, sqlx::Error> {
    let (
        id,
        state,
        repo_url,
        pr_number,
        github_token,
        result_data,
        error_msg,
        claimed_by,
        claimed_at,
        claim_deadline,
        created_at,
        updated_at,
        completed_at,
    ) = row;
    let state: TaskState = state.parse().map_err(|e| sqlx::Error::ColumnDecode {
        index: "state".to_owned(),
        source: Box::new(e),
    })?;
    Ok(TaskRecord {
        id,
        state,
        repo_url,
        pr_number,
        github_token,
        result_data,
        error_msg,
        claimed_by,
        claimed_at: parse_opt_ts(claimed_at, "claimed_at")?,
        claim_deadline: parse_opt_ts(claim_deadline, "claim_deadline")?,
        created_at: parse_ts(&created_at, "created_at")?,
        updated_at: parse_ts(&updated_at, "updated_at")?,
        completed_at: parse_opt_ts(completed_at, "completed_at")?,
    })
}

impl TaskStore for SqliteStore {
    async fn insert_task(&self, record: TaskRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tasks (id, state, repo_url, pr_number, github_token, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&record.id)
        .bind(record.state.as_str())
        .bind(&record.repo_url)
        .bind(record.pr_number)
        .bind(&record.github_token)
        .bind(ts(record.created_at))
        .bind(ts(record.updated_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, id: &str) -> Result<Option<TaskRecord>, sqlx::Error> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_record).transpose()
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        deadline: DateTime<Utc>,
    ) -> Result<Option<TaskRecord>, sqlx::Error> {
        let now = ts(Utc::now());
        let sql = format!(
            "UPDATE tasks SET claimed_by = ?1, claimed_at = ?2, updated_at = ?2, claim_deadline = ?3 \
             WHERE id = (SELECT id FROM tasks \
                         WHERE state = 'PENDING' AND claimed_by IS NULL \
                         ORDER BY created_at, rowid LIMIT 1) \
               AND claimed_by IS NULL \
             RETURNING {TASK_COLUMNS}"
        );
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(worker_id)
            .bind(&now)
            .bind(ts(deadline))
            .fetch_optional(&self.pool)
            .await?;
        row.map(into_record).transpose()
    }

    async fn complete_task(&self, id: &str, outcome: &TaskOutcome) -> Result<bool, sqlx::Error> {
        let now = ts(Utc::now());
        let (result_data, error_msg) = match outcome {
            TaskOutcome::Success(value) => (Some(value.to_string()), None),
            TaskOutcome::Failure(message) => (None, Some(message.as_str())),
        };
        let result = sqlx::query(
            "UPDATE tasks SET state = ?1, result_data = ?2, error_msg = ?3, github_token = NULL, \
             updated_at = ?4, completed_at = ?4 \
             WHERE id = ?5 AND state = 'PENDING'",
        )
        .bind(outcome.state().as_str())
        .bind(result_data)
        .bind(error_msg)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn fail_stale_claims(
        &self,
        now: DateTime<Utc>,
        message: &str,
    ) -> Result<u64, sqlx::Error> {
        let now = ts(now);
        let result = sqlx::query(
            "UPDATE tasks SET state = 'FAILURE', error_msg = ?1, github_token = NULL, \
             updated_at = ?2, completed_at = ?2 \
             WHERE state = 'PENDING' AND claim_deadline IS NOT NULL AND claim_deadline < ?2",
        )
        .bind(message)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn purge_finished(&self, completed_before: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM tasks WHERE state != 'PENDING' AND completed_at IS NOT NULL \
             AND completed_at < ?1",
        )
        .bind(ts(completed_before))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
