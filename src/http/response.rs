//! Generic JSON responses.
//!
//! # Responsibilities
//! - Build `{"error": "<message>"}` bodies for rejected requests
//! - Answer paths outside the proxy prefix with a not-found response
//!
//! # Design Decisions
//! - Error bodies are always JSON so replay clients can parse them
//! - Upstream error pages are not handled here (see proxy/compose.rs)

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// JSON error body with the given status.
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Not-found response for requests outside the proxy prefix.
pub fn not_found(message: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, message)
}
