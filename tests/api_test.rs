//! Integration tests for the HTTP API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use viva::server::{self, AppState};
use viva::store::{FileSessionStore, SessionStore};

mod common;

use common::{FakeAgentService, FakeStreamingProvider, orchestrator_with_store};

// ============================================================================
// Helpers
// ============================================================================

/// Create a test app over a temp-dir file store wired to the given fakes.
fn app_with(provider: Arc<FakeStreamingProvider>, agent: Arc<FakeAgentService>) -> Router {
    use tempfile::TempDir;

    let tmp = TempDir::new().unwrap();

    // Leak the TempDir so it doesn't get cleaned up during the test.
    let tmp = Box::leak(Box::new(tmp));
    let sessions_path = tmp.path().join("sessions");

    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&sessions_path));
    let state = AppState {
        orchestrator: orchestrator_with_store(provider, agent, store),
        max_connections: 16,
    };
    server::build_app(state, 300)
}

/// Create a test app wired to healthy fakes.
fn test_app() -> Router {
    app_with(
        FakeStreamingProvider::healthy(),
        FakeAgentService::healthy(),
    )
}

/// Minimal valid start-session request body.
fn start_request_body(assessment_id: &str, user_id: &str) -> serde_json::Value {
    serde_json::json!({
        "assessment_id": assessment_id,
        "user_id": user_id,
        "persona": {
            "avatar_id": "june_hr_public",
            "display_name": "Dr. June",
            "tone": "professional",
            "mood": "calm",
            "welcome_message": "Welcome to your assessment.",
            "voice": { "voice_id": "en-US-1", "rate": 1.0 }
        }
    })
}

/// Start a session and return the parsed response body.
async fn start_session(app: &Router) -> serde_json::Value {
    let body = start_request_body("assessment-1", "user-1");
    let response = app
        .clone()
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

// ============================================================================
// Health Endpoints
// ============================================================================

#[tokio::test]
async fn test_livez() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/livez").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_readyz() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "ok");
    assert_eq!(json["active_sessions"], 0);
}

#[tokio::test]
async fn test_version() {
    let app = test_app();

    let response = app
        .oneshot(Request::get("/version").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(json.get("version").is_some());
}

// ============================================================================
// Sessions API
// ============================================================================

#[tokio::test]
async fn test_start_session() {
    let app = test_app();

    let json = start_session(&app).await;

    assert!(json["session_id"].as_str().unwrap().starts_with("session_"));
    assert_eq!(
        json["stream_endpoint"],
        "wss://fake.stream.test/fake-stream-1"
    );
    assert_eq!(json["access_token"], "fake-access-token");
    assert_eq!(json["opening_prompt"], "Welcome. Tell me about the case.");
    assert_eq!(json["status"], "active");
    assert_eq!(json["is_mock"], false);
    assert_eq!(json["resumed"], false);
}

#[tokio::test]
async fn test_start_session_resumes_active() {
    let app = test_app();

    let first = start_session(&app).await;

    // Same assessment and user again: the active session is handed back.
    let body = start_request_body("assessment-1", "user-1");
    let response = app
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["session_id"], first["session_id"]);
    assert_eq!(json["resumed"], true);
    assert_eq!(json["opening_prompt"], first["opening_prompt"]);
    // The provider token is single-use and not re-issued on resumption.
    assert!(json.get("access_token").is_none());
}

#[tokio::test]
async fn test_start_session_empty_assessment_id() {
    let app = test_app();

    let body = start_request_body("", "user-1");
    let response = app
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(json["detail"].as_str().unwrap().contains("assessment_id"));
}

#[tokio::test]
async fn test_start_session_blank_persona_field() {
    let app = test_app();

    let mut body = start_request_body("assessment-1", "user-1");
    body["persona"]["display_name"] = serde_json::json!("   ");
    let response = app
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(
        json["detail"]
            .as_str()
            .unwrap()
            .contains("persona.display_name")
    );
}

#[tokio::test]
async fn test_start_session_provider_down() {
    let app = app_with(
        FakeStreamingProvider::failing(),
        FakeAgentService::healthy(),
    );

    let body = start_request_body("assessment-1", "user-1");
    let response = app
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // Provider failures are masked; the session starts in degraded mode.
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["is_mock"], true);
    assert!(
        json["stream_endpoint"]
            .as_str()
            .unwrap()
            .starts_with("wss://mock.stream.invalid/")
    );
}

#[tokio::test]
async fn test_start_session_agent_down() {
    let app = app_with(
        FakeStreamingProvider::healthy(),
        FakeAgentService::failing(),
    );

    let body = start_request_body("assessment-1", "user-1");
    let response = app
        .oneshot(
            Request::post("/api/v1/sessions")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], 502);
    assert!(
        json["detail"]
            .as_str()
            .unwrap()
            .contains("conversation service")
    );
}

#[tokio::test]
async fn test_get_session() {
    let app = test_app();

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["id"], started["session_id"]);
    assert_eq!(json["assessment_id"], "assessment-1");
    assert_eq!(json["user_id"], "user-1");
    assert_eq!(json["status"], "active");
    assert_eq!(json["persona"]["display_name"], "Dr. June");
}

#[tokio::test]
async fn test_get_session_not_found() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::get("/api/v1/sessions/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], 404);
    assert!(json["detail"].as_str().unwrap().contains("unknown session"));
}

#[tokio::test]
async fn test_list_sessions() {
    let app = test_app();

    let started = start_session(&app).await;

    let response = app
        .oneshot(Request::get("/api/v1/sessions").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let sessions = json["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["id"], started["session_id"]);
    assert_eq!(sessions[0]["status"], "active");
    assert_eq!(sessions[0]["stream_is_mock"], false);
}

// ============================================================================
// Turns API
// ============================================================================

#[tokio::test]
async fn test_send_turn() {
    let app = test_app();

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/turns"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "It began two days ago."}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(
        json["prompt"],
        "Noted: It began two days ago. Next question?"
    );
    assert_eq!(json["chat_session_id"], "chat-test");
}

#[tokio::test]
async fn test_send_turn_empty_utterance() {
    let app = test_app();

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/turns"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(json["detail"].as_str().unwrap().contains("utterance"));
}

#[tokio::test]
async fn test_send_turn_agent_down() {
    let agent = FakeAgentService::healthy();
    let app = app_with(FakeStreamingProvider::healthy(), agent.clone());

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    agent.set_fail(true);
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/turns"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // The failed turn does not end the session.
    agent.set_fail(false);
    let response = app
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/turns"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "hello again"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_send_turn_unknown_session() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::post("/api/v1/sessions/nonexistent/turns")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_send_turn_after_end() {
    let app = test_app();

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/end"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/turns"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"utterance": "hello"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(json["detail"].as_str().unwrap().contains("already ended"));
}

// ============================================================================
// End API
// ============================================================================

#[tokio::test]
async fn test_end_session_idempotent() {
    let app = test_app();

    let started = start_session(&app).await;
    let session_id = started["session_id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/end"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Ending again reports success, not an error.
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/sessions/{session_id}/end"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::get(format!("/api/v1/sessions/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["status"], "completed");
    assert!(json["ended_at"].is_string());
}

#[tokio::test]
async fn test_end_unknown_session() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::post("/api/v1/sessions/nonexistent/end")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Error Responses
// ============================================================================

#[tokio::test]
async fn test_problem_details_format() {
    let app = test_app();

    let response = app
        .oneshot(
            Request::get("/api/v1/sessions/nonexistent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/problem+json"
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(json["type"], "about:blank");
    assert_eq!(json["title"], "Not Found");
    assert_eq!(json["status"], 404);
}
