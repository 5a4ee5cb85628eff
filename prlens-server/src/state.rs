//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use prlens_core::entities::SqliteStore;
use prlens_core::TaskQueue;
use tokio::sync::watch;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Result backend, read by the polling endpoints.
    pub store: Arc<SqliteStore>,
    /// Submission side of the task queue.
    pub queue: TaskQueue,
    /// Flipped to `true` once the process starts shutting down.
    shutdown: watch::Sender<bool>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<SqliteStore>) -> Self {
        Self {
            config: Arc::new(config),
            queue: TaskQueue::new(Arc::clone(&store)),
            store,
            shutdown: watch::channel(false).0,
        }
    }

    /// Ends open event streams and tells the embedded worker to stop.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}
