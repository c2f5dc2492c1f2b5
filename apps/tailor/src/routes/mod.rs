pub mod health;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use crate::normalize::handlers as resume;
use crate::state::AppState;
use crate::tailoring::handlers as tailor;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume API
        .route("/api/v1/resume/normalize", post(resume::handle_normalize))
        .route("/api/v1/resume/save", post(resume::handle_save))
        // Tailoring session
        .route("/api/v1/tailor", get(tailor::handle_get_session))
        .route("/api/v1/tailor/job-post", put(tailor::handle_set_job_post))
        .route("/api/v1/tailor/analyze", post(tailor::handle_analyze))
        .route(
            "/api/v1/tailor/answers/:q/rows",
            post(tailor::handle_add_answer_row).delete(tailor::handle_remove_answer_row),
        )
        .route(
            "/api/v1/tailor/answers/:q/rows/:r",
            patch(tailor::handle_set_answer_field),
        )
        .route("/api/v1/tailor/generate", post(tailor::handle_generate))
        .route(
            "/api/v1/tailor/preview/edit",
            post(tailor::handle_toggle_preview_edit).put(tailor::handle_update_preview_edit),
        )
        .route(
            "/api/v1/tailor/preview/save",
            post(tailor::handle_save_preview_edit),
        )
        .route("/api/v1/tailor/reset", post(tailor::handle_reset))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DraftBackend};
    use crate::tailoring::session::tests::{session_with, FakeApi};
    use crate::tailoring::workflow::WorkflowLimits;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            api_base: "http://backend.invalid".into(),
            user_id: "demo".into(),
            draft_backend: DraftBackend::Memory,
            draft_session: "test".into(),
            draft_debounce: Duration::from_millis(400),
            limits: WorkflowLimits::default(),
            backend_timeout: Duration::from_secs(5),
            port: 0,
            rust_log: "info".into(),
        }
    }

    async fn test_router() -> Router {
        let (_, session) = session_with(FakeApi::default()).await;
        build_router(AppState {
            session: Arc::new(session),
            api: Arc::new(FakeApi::default()),
            config: test_config(),
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_router().await;
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "tailor");
    }

    #[tokio::test]
    async fn test_normalize_route_canonicalizes_legacy_keys() {
        let app = test_router().await;
        let raw = json!({
            "experience": [{"company": "Leidos", "title": "Engineer", "isCurrent": true, "endDate": "2022"}],
            "education": {"school": "Georgia Tech", "degree": "BS"}
        });
        let (status, body) = call(&app, Method::POST, "/api/v1/resume/normalize", Some(raw)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["work"][0]["name"], "Leidos");
        assert_eq!(body["work"][0]["position"], "Engineer");
        assert_eq!(body["work"][0]["endDate"], "");
        assert_eq!(body["education"][0]["institution"], "Georgia Tech");
        assert_eq!(body["education"][0]["studyType"], "BS");
    }

    #[tokio::test]
    async fn test_save_route_returns_version() {
        let app = test_router().await;
        let raw = json!({"basics": {"name": "Ada"}});
        let (status, body) = call(&app, Method::POST, "/api/v1/resume/save", Some(raw)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], 3);
        assert_eq!(body["resume"]["basics"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_short_job_post_is_refused_with_gate_error() {
        let app = test_router().await;
        call(&app, Method::PUT, "/api/v1/tailor/job-post", Some(json!({"text": "too short"}))).await;

        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/analyze", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "GATE_CLOSED");
    }

    #[tokio::test]
    async fn test_tailoring_flow_over_http() {
        let app = test_router().await;
        let post = "Senior Rust engineer for distributed systems. ".repeat(8);
        let (status, body) =
            call(&app, Method::PUT, "/api/v1/tailor/job-post", Some(json!({"text": post}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["can_analyze"], true);

        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/analyze", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"]["name"], "awaiting_answers");
        assert_eq!(body["can_generate"], false);

        let (status, _) = call(&app, Method::POST, "/api/v1/tailor/answers/0/rows", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&app, Method::DELETE, "/api/v1/tailor/answers/0/rows", None).await;
        assert_eq!(body["answers"]["0"].as_array().unwrap().len(), 1);

        let (status, body) = call(
            &app,
            Method::PATCH,
            "/api/v1/tailor/answers/0/rows/0",
            Some(json!({"field": "text", "value": "GitHub Actions and Jenkins"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["can_generate"], true);

        let (_, body) = call(&app, Method::POST, "/api/v1/tailor/generate", None).await;
        assert_eq!(body["stage"]["name"], "previewing");

        let (_, body) = call(&app, Method::POST, "/api/v1/tailor/preview/edit", None).await;
        assert!(body["editing"].is_object());
        let (status, body) = call(
            &app,
            Method::PUT,
            "/api/v1/tailor/preview/edit",
            Some(json!({"text": "{not json"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["editing"].is_object());

        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/preview/save", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "UNPROCESSABLE_ENTITY");

        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/generate", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "GATE_CLOSED");

        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"]["name"], "drafting");
        assert_eq!(body["job_post"], "");
    }

    #[tokio::test]
    async fn test_unknown_question_is_not_found() {
        let app = test_router().await;
        let (status, body) = call(&app, Method::POST, "/api/v1/tailor/answers/7/rows", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
}
