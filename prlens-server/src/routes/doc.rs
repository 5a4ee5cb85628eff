use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{api, health};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "prlens-server",
    description = "Queued LLM review of GitHub pull requests"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(api::api_docs());
    root
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
