//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body of the form
//! `{"error": "..."}` with a matching status code.
//!
//! Database and internal errors are logged with full detail but only a
//! generic message reaches the caller.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the task store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The caller referenced a task that does not exist (or has expired).
    #[error("not found: {0}")]
    NotFound(String),

    /// The task exists but has not finished yet.
    #[error("not ready: {0}")]
    NotReady(String),

    /// The caller sent a malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The body parsed but does not have the expected shape.
    #[error("unprocessable request: {0}")]
    InvalidBody(String),

    /// Field-level validation failed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
            ServerError::NotReady(m) => (StatusCode::CONFLICT, json!({ "error": m })),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
            ServerError::InvalidBody(m) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": m }))
            }
            ServerError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": "validation failed", "fields": field_messages(errors) }),
            ),
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Field name to messages, in a stable order.
fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}
