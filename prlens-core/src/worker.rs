//! Task execution loop.
//!
//! A [`Worker`] claims PENDING tasks from the shared store, fetches the pull
//! request, runs the analysis and writes the terminal state. Up to
//! `concurrency` tasks run at once. Nothing is retried: every failure is
//! recorded as FAILURE with its message.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{watch, Notify, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::analysis::{AnalysisReport, Analyzer};
use crate::config::WorkerConfig;
use crate::entities::{SqliteStore, TaskOutcome, TaskRecord, TaskStore};
use crate::github::GitHubClient;
use crate::AnalysisError;

/// Extra time a claim may outlive the claiming worker's time limit before
/// the task is declared lost.
const STALE_CLAIM_GRACE: Duration = Duration::from_secs(60);
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);
const WORKER_LOST: &str = "worker lost before the task finished";

/// Why a task ended in FAILURE.
#[derive(Debug, thiserror::Error)]
pub enum TaskFailure {
    #[error("PR content error: {0}")]
    Fetch(#[source] AnalysisError),

    #[error("Analysis error: {0}")]
    Analysis(#[source] AnalysisError),
}

pub struct Worker {
    id: String,
    store: Arc<SqliteStore>,
    github: GitHubClient,
    analyzer: Analyzer,
    config: WorkerConfig,
    wake: Arc<Notify>,
}

impl Worker {
    /// # Errors
    ///
    /// Returns [`AnalysisError::Config`] when no LLM API key is configured.
    pub fn new(store: Arc<SqliteStore>, config: WorkerConfig) -> Result<Self, AnalysisError> {
        if config.llm.api_key.is_none() {
            return Err(AnalysisError::Config(
                "OPENAI_API_KEY is not set; workers cannot start without an LLM API key".into(),
            ));
        }
        let uuid = Uuid::new_v4().simple().to_string();
        Ok(Self {
            id: format!("worker-{}-{}", std::process::id(), &uuid[..8]),
            store,
            github: GitHubClient::new(&config.github)?,
            analyzer: Analyzer::new(&config.llm, config.analysis.clone())?,
            config,
            wake: Arc::new(Notify::new()),
        })
    }

    /// Share the submission notifier of an in-process [`TaskQueue`](crate::queue::TaskQueue).
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = wake;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Process tasks until `shutdown` flips to `true` (or its sender is
    /// dropped), then wait for in-flight tasks to finish.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = %self.id,
            concurrency = self.config.concurrency,
            time_limit_secs = self.config.time_limit.as_secs(),
            "worker started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut in_flight = JoinSet::new();
        let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        housekeeping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            if *shutdown.borrow() {
                break;
            }
            while let Some(joined) = in_flight.try_join_next() {
                if let Err(e) = joined {
                    error!(worker_id = %self.id, error = %e, "task runner panicked");
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = housekeeping.tick() => self.housekeeping().await,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    let Ok(permit) = permit else { break };
                    match self.claim().await {
                        Ok(Some(record)) => {
                            let worker = Arc::clone(&self);
                            in_flight.spawn(async move {
                                worker.process(record).await;
                                drop(permit);
                            });
                        }
                        Ok(None) => {
                            drop(permit);
                            tokio::select! {
                                _ = shutdown.changed() => break,
                                _ = self.wake.notified() => {}
                                _ = tokio::time::sleep(self.config.poll_interval) => {}
                            }
                        }
                        Err(e) => {
                            drop(permit);
                            error!(worker_id = %self.id, error = %e, "failed to claim task");
                            tokio::select! {
                                _ = shutdown.changed() => break,
                                _ = tokio::time::sleep(self.config.poll_interval) => {}
                            }
                        }
                    }
                }
            }
        }

        info!(worker_id = %self.id, in_flight = in_flight.len(), "worker draining");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(worker_id = %self.id, error = %e, "task runner panicked");
            }
        }
        info!(worker_id = %self.id, "worker stopped");
    }

    /// Claim and process a single task inline. Returns the id of the
    /// processed task, or `None` when the queue was empty.
    pub async fn run_once(&self) -> Result<Option<String>, sqlx::Error> {
        let Some(record) = self.claim().await? else {
            return Ok(None);
        };
        let id = record.id.clone();
        self.process(record).await;
        Ok(Some(id))
    }

    /// Claim the next task under this worker's own time limit, so that other
    /// workers' sweeps honour it.
    async fn claim(&self) -> Result<Option<TaskRecord>, sqlx::Error> {
        self.store.claim_next(&self.id, self.claim_deadline()).await
    }

    fn claim_deadline(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.config.time_limit + STALE_CLAIM_GRACE)
            .ok()
            .and_then(|lease| Utc::now().checked_add_signed(lease))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    async fn process(&self, record: TaskRecord) {
        let span = tracing::info_span!(
            "task",
            task_id = %record.id,
            repo_url = %record.repo_url,
            pr_number = record.pr_number,
            worker_id = %self.id,
        );

        async {
            info!("task started");
            let started = Instant::now();

            let outcome = match tokio::time::timeout(self.config.time_limit, self.execute(&record))
                .await
            {
                Ok(Ok(report)) => match serde_json::to_value(&report) {
                    Ok(value) => TaskOutcome::Success(value),
                    Err(e) => TaskOutcome::Failure(format!("Analysis error: {e}")),
                },
                Ok(Err(failure)) => {
                    warn!(error = %failure, "task failed");
                    TaskOutcome::Failure(failure.to_string())
                }
                Err(_) => {
                    let err = AnalysisError::TimeLimit(self.config.time_limit);
                    warn!(error = %err, "task timed out");
                    TaskOutcome::Failure(err.to_string())
                }
            };

            match self.store.complete_task(&record.id, &outcome).await {
                Ok(true) => info!(
                    state = %outcome.state(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "task finished"
                ),
                Ok(false) => warn!("task was already finished; result discarded"),
                Err(e) => error!(error = %e, "failed to store task result"),
            }
        }
        .instrument(span)
        .await;
    }

    async fn execute(&self, record: &TaskRecord) -> Result<AnalysisReport, TaskFailure> {
        let request = record.request();
        let contents = self
            .github
            .pull_request_contents(
                &request.repo_url,
                request.pr_number,
                request.github_token.as_deref(),
            )
            .await
            .map_err(TaskFailure::Fetch)?;

        self.analyzer
            .analyze(&contents)
            .await
            .map_err(TaskFailure::Analysis)
    }

    /// Fail abandoned claims and purge expired results.
    async fn housekeeping(&self) {
        match self.store.fail_stale_claims(Utc::now(), WORKER_LOST).await {
            Ok(0) => {}
            Ok(n) => warn!(worker_id = %self.id, count = n, "failed stale task claims"),
            Err(e) => error!(worker_id = %self.id, error = %e, "stale claim sweep failed"),
        }
        if let Some(cutoff) = cutoff(self.config.result_ttl) {
            match self.store.purge_finished(cutoff).await {
                Ok(0) => {}
                Ok(n) => info!(worker_id = %self.id, count = n, "purged expired task results"),
                Err(e) => error!(worker_id = %self.id, error = %e, "result purge failed"),
            }
        }
    }
}

fn cutoff(age: Duration) -> Option<DateTime<Utc>> {
    let age = TimeDelta::from_std(age).ok()?;
    Utc::now().checked_sub_signed(age)
}
