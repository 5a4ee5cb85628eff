//! Server-Sent Events alternative to polling `/api/status`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use prlens_core::entities::{SqliteStore, TaskRecord, TaskState, TaskStore};
use tokio::sync::watch;
use tracing::warn;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::api::tasks::load_task;
use crate::schemas::task::{ErrorResponse, StatusResponse};
use crate::state::AppState;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(OpenApi)]
#[openapi(paths(task_events))]
pub struct EventsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events/{task_id}", get(task_events))
}

/// Stream `state` events for a task.
///
/// One event is sent for the current state and one per change after that.
/// The stream ends after the terminal event, when the task expires, or when
/// the server shuts down.
#[utoipa::path(
    get,
    path = "/api/events/{task_id}",
    tag = "analysis",
    params(
        ("task_id" = String, Path, description = "Id returned by /api/analyze")
    ),
    responses(
        (status = 200, description = "Event stream of StatusResponse payloads", content_type = "text/event-stream", body = StatusResponse),
        (status = 404, description = "Unknown or expired task", body = ErrorResponse),
    )
)]
pub async fn task_events(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
    let first = load_task(&state, &task_id).await?;
    let watch = Watch {
        store: Arc::clone(&state.store),
        task_id,
        shutdown: state.shutdown_receiver(),
        pending: Some(first),
        last: None,
        done: false,
    };
    Ok(Sse::new(futures::stream::unfold(watch, next_event)).keep_alive(KeepAlive::default()))
}

struct Watch {
    store: Arc<SqliteStore>,
    task_id: String,
    shutdown: watch::Receiver<bool>,
    /// Record to report before polling again.
    pending: Option<TaskRecord>,
    last: Option<TaskState>,
    done: bool,
}

async fn next_event(mut watch: Watch) -> Option<(Result<Event, Infallible>, Watch)> {
    loop {
        if watch.done || *watch.shutdown.borrow() {
            return None;
        }
        let record = match watch.pending.take() {
            Some(record) => record,
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                    _ = watch.shutdown.changed() => return None,
                }
                match watch.store.get_task(&watch.task_id).await {
                    Ok(Some(record)) => record,
                    Ok(None) => return None,
                    Err(e) => {
                        warn!(task_id = %watch.task_id, error = %e, "event stream lookup failed");
                        continue;
                    }
                }
            }
        };
        if watch.last == Some(record.state) {
            continue;
        }
        watch.last = Some(record.state);
        watch.done = record.state.is_terminal();

        match Event::default()
            .event("state")
            .json_data(StatusResponse::from(&record))
        {
            Ok(event) => return Some((Ok(event), watch)),
            Err(e) => {
                warn!(task_id = %watch.task_id, error = %e, "failed to encode state event");
                return None;
            }
        }
    }
}
