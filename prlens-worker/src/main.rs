//! prlens-worker – standalone queue consumer.
//!
//! Shares the SQLite database with prlens-server. Any number of workers may
//! run against the same database; each claim is exclusive.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use prlens_core::config::{database_url_from_env, LogConfig, WorkerConfig};
use prlens_core::entities::SqliteStore;
use prlens_core::{logging, shutdown, Worker};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "prlens-worker",
    version,
    about = "Process queued pull request analyses"
)]
struct Args {
    /// SQLite URL of the shared queue (default: PRLENS_DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Maximum number of tasks processed at once (default: PRLENS_WORKER_CONCURRENCY)
    #[arg(long, short)]
    concurrency: Option<usize>,

    /// Per-task time limit in seconds (default: PRLENS_TASK_TIME_LIMIT_SECS)
    #[arg(long)]
    time_limit_secs: Option<u64>,

    /// Process tasks one at a time until the queue is empty, then exit
    #[arg(long, default_value_t = false)]
    drain: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    logging::init(&LogConfig::from_env());

    let mut config = WorkerConfig::from_env();
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }
    if let Some(secs) = args.time_limit_secs {
        config.time_limit = Duration::from_secs(secs);
    }

    let database_url = args.database_url.unwrap_or_else(database_url_from_env);
    let store = Arc::new(SqliteStore::connect(&database_url).await?);
    info!(%database_url, "database ready");

    let worker = Worker::new(store, config)?;

    if args.drain {
        let mut processed = 0usize;
        while worker.run_once().await?.is_some() {
            processed += 1;
        }
        info!(worker_id = worker.id(), processed, "queue drained");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(Arc::new(worker).run(shutdown_rx));

    shutdown::signal().await;
    info!("draining in-flight tasks");
    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        warn!(error = %e, "worker terminated abnormally");
    }
    info!("prlens-worker stopped");
    Ok(())
}
