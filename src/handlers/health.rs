use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::handlers::problem_details;
use crate::server::AppState;

pub async fn livez() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
pub struct ReadyzResponse {
    pub status: String,
    pub active_sessions: usize,
}

/// Readiness is store reachability: a server that cannot read its records
/// cannot start or end sessions.
pub async fn readyz(State(state): State<AppState>) -> Response {
    match state.orchestrator.list().await {
        Ok(records) => {
            let active = records.iter().filter(|r| r.is_active()).count();
            Json(ReadyzResponse {
                status: "ok".to_string(),
                active_sessions: active,
            })
            .into_response()
        }
        Err(err) => {
            error!(error = %err, "readiness probe failed");
            problem_details::service_unavailable("session store unreachable")
        }
    }
}
