//! RFC 7807 problem-details error responses.
//!
//! Every HTTP error leaves the server in this shape, with the
//! `application/problem+json` content type.

use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// RFC 7807 problem details body.
#[derive(Debug, Serialize)]
pub struct ProblemDetails {
    /// Problem type URI; `about:blank` means the status code says it all.
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn problem(status: StatusCode, detail: impl Into<String>) -> Response {
    let body = ProblemDetails {
        problem_type: "about:blank",
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        detail: Some(detail.into()),
    };
    (
        status,
        [(header::CONTENT_TYPE, "application/problem+json")],
        Json(body),
    )
        .into_response()
}

/// 400 Bad Request.
pub fn bad_request(detail: impl Into<String>) -> Response {
    problem(StatusCode::BAD_REQUEST, detail)
}

/// 404 Not Found.
pub fn not_found(detail: impl Into<String>) -> Response {
    problem(StatusCode::NOT_FOUND, detail)
}

/// 409 Conflict.
pub fn conflict(detail: impl Into<String>) -> Response {
    problem(StatusCode::CONFLICT, detail)
}

/// 500 Internal Server Error.
pub fn internal_error(detail: impl Into<String>) -> Response {
    problem(StatusCode::INTERNAL_SERVER_ERROR, detail)
}

/// 502 Bad Gateway.
pub fn bad_gateway(detail: impl Into<String>) -> Response {
    problem(StatusCode::BAD_GATEWAY, detail)
}

/// 503 Service Unavailable.
pub fn service_unavailable(detail: impl Into<String>) -> Response {
    problem(StatusCode::SERVICE_UNAVAILABLE, detail)
}
