//! prlens-server – entry point.
//!
//! Startup order:
//! 1. Load `.env` and parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Optionally start an embedded worker.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod config;
mod error;
mod extract;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use prlens_core::config::WorkerConfig;
use prlens_core::entities::SqliteStore;
use prlens_core::{logging, shutdown, Worker};
use tracing::{info, warn};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    dotenvy::dotenv().ok();
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    logging::init(&cfg.log);
    info!(version = env!("CARGO_PKG_VERSION"), "prlens-server starting");

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = Arc::new(SqliteStore::connect(&cfg.database_url).await?);
    info!(database_url = %cfg.database_url, "database ready");

    let state = Arc::new(AppState::new(cfg.clone(), Arc::clone(&store)));

    // ── 4. Embedded worker ─────────────────────────────────────────────────────
    let worker = if cfg.embedded_worker {
        let worker = Worker::new(Arc::clone(&store), WorkerConfig::from_env())?
            .with_wake(state.queue.notifier());
        info!(worker_id = worker.id(), "embedded worker enabled");
        Some(tokio::spawn(Arc::new(worker).run(state.shutdown_receiver())))
    } else {
        None
    };

    // ── 5. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    let signalled = Arc::clone(&state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown::signal().await;
            info!("starting graceful shutdown");
            signalled.begin_shutdown();
        })
        .await?;

    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            warn!(error = %e, "embedded worker terminated abnormally");
        }
    }

    store.close().await;
    info!("prlens-server stopped");
    Ok(())
}
