//! Routes nested under `/api`.

pub mod analyze;
pub mod events;
pub mod tasks;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(analyze::router())
        .merge(tasks::router())
        .merge(events::router())
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = analyze::AnalyzeApi::openapi();
    spec.merge(tasks::TasksApi::openapi());
    spec.merge(events::EventsApi::openapi());
    spec
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use chrono::Utc;
    use mockito::{Matcher, Server, ServerGuard};
    use prlens_core::config::{AnalysisConfig, GitHubConfig, LlmConfig, WorkerConfig};
    use prlens_core::entities::{SqliteStore, TaskStore};
    use prlens_core::Worker;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::routes;

    const REVIEW_TEXT: &str = "The change looks correct. Consider adding a test.";

    async fn app() -> (Router, Arc<AppState>) {
        let store = SqliteStore::connect("sqlite::memory:").await.unwrap();
        let state = Arc::new(AppState::new(Config::default(), Arc::new(store)));
        (routes::build(Arc::clone(&state)), state)
    }

    fn worker(state: &AppState, server_url: &str) -> Worker {
        let config = WorkerConfig {
            github: GitHubConfig {
                api_url: server_url.to_owned(),
                token: None,
            },
            llm: LlmConfig {
                api_key: Some("sk-test".into()),
                base_url: server_url.to_owned(),
                ..LlmConfig::default()
            },
            analysis: AnalysisConfig {
                chunk_max_tokens: 6000,
                chunk_delay: Duration::ZERO,
            },
            ..WorkerConfig::default()
        };
        Worker::new(Arc::clone(&state.store), config).unwrap()
    }

    async fn mock_public_repo(server: &mut ServerGuard) {
        server
            .mock("GET", "/repos/a/b")
            .with_status(200)
            .with_body(r#"{"private":false}"#)
            .create_async()
            .await;
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn submit(app: &Router) -> String {
        let (status, body) = call(
            app,
            post_json(
                "/api/analyze",
                &json!({ "repo_url": "https://github.com/a/b", "pr_number": 5 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["task_id"].as_str().unwrap().to_owned()
    }

    #[tokio::test]
    async fn submitted_task_runs_to_success() {
        let mut server = Server::new_async().await;
        mock_public_repo(&mut server).await;
        server
            .mock("GET", "/repos/a/b/pulls/5")
            .with_status(200)
            .with_body(r#"{"title":"Fix typo","body":"Small fix"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/repos/a/b/pulls/5/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"filename":"README.md","patch":"-teh\n+the","status":"modified"}]"#)
            .create_async()
            .await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(json!({ "choices": [{ "message": { "content": REVIEW_TEXT } }] }).to_string())
            .create_async()
            .await;

        let (app, state) = app().await;
        let task_id = submit(&app).await;

        let (status, body) = call(&app, get(&format!("/api/status/{task_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "PENDING");
        assert!(body.get("error").is_none());

        let (status, _) = call(&app, get(&format!("/api/results/{task_id}"))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let processed = worker(&state, &server.url()).run_once().await.unwrap();
        assert_eq!(processed.as_deref(), Some(task_id.as_str()));

        let (_, body) = call(&app, get(&format!("/api/status/{task_id}"))).await;
        assert_eq!(body["state"], "SUCCESS");

        let (status, body) = call(&app, get(&format!("/api/results/{task_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_id"], task_id.as_str());
        assert_eq!(body["result"]["analysis"], REVIEW_TEXT);
        assert_eq!(body["result"]["summary"]["total_files"], 1);
        assert_eq!(body["result"]["files"][0]["name"], "README.md");
    }

    #[tokio::test]
    async fn authentication_failure_is_reported() {
        let mut server = Server::new_async().await;
        mock_public_repo(&mut server).await;
        server
            .mock("GET", "/repos/a/b/pulls/5")
            .with_status(401)
            .with_body(r#"{"message":"Requires authentication"}"#)
            .create_async()
            .await;

        let (app, state) = app().await;
        let task_id = submit(&app).await;
        worker(&state, &server.url()).run_once().await.unwrap();

        let (_, body) = call(&app, get(&format!("/api/status/{task_id}"))).await;
        assert_eq!(body["state"], "FAILURE");
        assert!(body["error"].as_str().unwrap().contains("authentication"));

        let (status, body) = call(&app, get(&format!("/api/results/{task_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "FAILURE");
        assert!(body.get("result").is_none());
        assert!(body["error"].as_str().unwrap().contains("authentication"));
    }

    #[tokio::test]
    async fn empty_repo_url_is_rejected_without_queueing() {
        let (app, state) = app().await;
        let (status, body) = call(
            &app,
            post_json("/api/analyze", &json!({ "repo_url": "", "pr_number": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["fields"]["repo_url"].is_array());
        assert!(state.store.claim_next("w1", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_pr_numbers_are_rejected() {
        let (app, _) = app().await;
        for body in [
            json!({ "repo_url": "https://github.com/a/b", "pr_number": 0 }),
            json!({ "repo_url": "https://github.com/a/b", "pr_number": -4 }),
        ] {
            let (status, body) = call(&app, post_json("/api/analyze", &body)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert!(body["fields"]["pr_number"].is_array());
        }

        let (status, _) = call(
            &app,
            post_json("/api/analyze", &json!({ "repo_url": "https://github.com/a/b" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (app, _) = app().await;
        let request = Request::post("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_task_is_not_found_everywhere() {
        let (app, _) = app().await;
        for uri in [
            "/api/status/nope",
            "/api/results/nope",
            "/api/events/nope",
        ] {
            let (status, body) = call(&app, get(uri)).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body["error"], "task nope not found");
        }
    }

    #[tokio::test]
    async fn events_end_after_terminal_state() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/repos/a/b")
            .with_status(404)
            .create_async()
            .await;

        let (app, state) = app().await;
        let task_id = submit(&app).await;
        worker(&state, &server.url()).run_once().await.unwrap();

        let response = app
            .clone()
            .oneshot(get(&format!("/api/events/{task_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream should end")
        .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text.matches("event: state").count(), 1);
        assert!(text.contains("FAILURE"));
        assert!(text.contains("GitHub token required"));
    }

    #[tokio::test]
    async fn events_end_when_the_server_shuts_down() {
        let (app, state) = app().await;
        let task_id = submit(&app).await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/events/{task_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stopper = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            stopper.begin_shutdown();
        });
        let bytes = tokio::time::timeout(
            Duration::from_secs(5),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await
        .expect("stream should end on shutdown")
        .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(text.matches("event: state").count(), 1);
        assert!(text.contains("PENDING"));
    }
}
