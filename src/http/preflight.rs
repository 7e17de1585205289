//! OPTIONS responder.
//!
//! # Responsibilities
//! - Reject preflights from origins outside the configured allow-list
//! - Answer true CORS preflights by echoing origin, method and headers
//! - Answer plain OPTIONS requests with the supported method list

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS,
    ACCESS_CONTROL_REQUEST_METHOD, ALLOW, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::AllowedOrigins;
use crate::http::response::json_error;

pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

/// Answer an OPTIONS request.
pub fn preflight_response(headers: &HeaderMap, allowed: &AllowedOrigins) -> Response {
    let origin = headers.get(ORIGIN);

    if let Some(origin) = origin {
        let permitted = origin
            .to_str()
            .map(|o| allowed.allows(o))
            .unwrap_or(false);
        if !permitted {
            tracing::debug!(origin = ?origin, "Preflight origin not allowed");
            return json_error(StatusCode::FORBIDDEN, "origin not allowed");
        }
    }

    match (origin, headers.get(ACCESS_CONTROL_REQUEST_METHOD)) {
        (Some(origin), Some(method)) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            let out = response.headers_mut();
            out.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            out.insert(ACCESS_CONTROL_ALLOW_METHODS, method.clone());
            if let Some(requested) = headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
                out.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
            out.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
            out.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
            out.insert(VARY, HeaderValue::from_static("Origin"));
            response
        }
        _ => {
            let mut response = StatusCode::OK.into_response();
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
            response
        }
    }
}
