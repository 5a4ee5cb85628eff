//! Browser client.

use std::sync::Arc;

use axum::extract::State;
use axum::response::Html;
use tracing::error;

use crate::error::ServerError;
use crate::state::AppState;

/// `GET /`: the submission form from the static directory.
pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, ServerError> {
    let path = state.config.static_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            error!(path = %path.display(), error = %e, "index file not found");
            Err(ServerError::NotFound("Index file not found".to_owned()))
        }
    }
}
