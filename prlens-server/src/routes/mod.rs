//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - The browser page at `/` and its assets under `/static`
//! - Health route
//! - The analysis API under `/api`
//! - Optional OpenAPI document (disable with `PRLENS_ENABLE_DOCS=false`)

pub mod api;
pub mod doc;
mod health;
mod page;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/", get(page::index))
        .merge(health::router())
        .nest("/api", api::router())
        .nest_service("/static", ServeDir::new(&state.config.static_dir));

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(cors::cors_layer(&state.config))
                .layer(middleware::from_fn(trace::trace_middleware)),
        )
        .with_state(state)
}
