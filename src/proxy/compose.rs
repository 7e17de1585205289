//! Outgoing response composition.
//!
//! # Responsibilities
//! - Collapse surfaced redirects into 200 responses described by headers
//! - Reflect the caller's origin with credentialed CORS headers
//! - Make `Set-Cookie` readable through a sidecar header
//! - Replace error pages that are not archived captures with a short message
//!
//! # Design Decisions
//! - Upstream bodies stream through untouched; only error pages are replaced
//! - `Memento-Datetime` marks an archived capture, which is kept at any status
//! - Upstream CORS grants are never passed on; only a reflected `Origin` grants access

use axum::body::Body;
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
    CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ORIGIN, SET_COOKIE, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;

use crate::proxy::error::ProxyError;
use crate::proxy::fetcher::{is_followable_redirect, FetchOutcome};

pub const X_PROXY_SET_COOKIE: HeaderName = HeaderName::from_static("x-proxy-set-cookie");
pub const X_REDIRECT_STATUS: HeaderName = HeaderName::from_static("x-redirect-status");
pub const X_REDIRECT_STATUS_TEXT: HeaderName = HeaderName::from_static("x-redirect-statustext");
pub const X_ORIG_LOCATION: HeaderName = HeaderName::from_static("x-orig-location");
pub const X_ORIG_TS: HeaderName = HeaderName::from_static("x-orig-ts");

/// Archival timestamp marker of a recorded capture.
pub const MEMENTO_DATETIME: HeaderName = HeaderName::from_static("memento-datetime");

/// Headers always listed in `Access-Control-Expose-Headers`.
pub const EXPOSED_HEADERS: &[&str] = &[
    "x-redirect-status",
    "x-redirect-statusText",
    "X-Proxy-Set-Cookie",
    "x-orig-location",
    "x-orig-ts",
];

/// Body sent in place of an upstream error page.
pub fn error_message(status: StatusCode) -> String {
    format!(
        "Sorry, this page was not found or could not be loaded: (Error {})",
        status.as_u16()
    )
}

/// Build the response returned to the browser.
pub fn compose_response(inbound: &HeaderMap, outcome: FetchOutcome) -> Result<Response, ProxyError> {
    let (mut upstream, capture) = outcome.into_parts();
    let mut headers = upstream.headers.clone();
    for name in [
        ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        ACCESS_CONTROL_EXPOSE_HEADERS,
    ] {
        headers.remove(name);
    }

    let cookies: Vec<&str> = upstream
        .headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if !cookies.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&cookies.join(", ")) {
            headers.insert(X_PROXY_SET_COOKIE, value);
        }
    }

    let mut status = upstream.status;
    if is_followable_redirect(status) {
        headers.insert(X_REDIRECT_STATUS, HeaderValue::from(status.as_u16()));
        if let Ok(text) = HeaderValue::from_str(&upstream.status_text) {
            headers.insert(X_REDIRECT_STATUS_TEXT, text);
        }

        let orig_location = match &capture {
            Some(capture) => HeaderValue::from_str(&capture.target).ok(),
            None => upstream.headers.get(axum::http::header::LOCATION).cloned(),
        };
        if let Some(location) = orig_location {
            headers.insert(X_ORIG_LOCATION, location);
        }
        if let Some(ts) = capture.as_ref().and_then(|c| HeaderValue::from_str(&c.timestamp).ok()) {
            headers.insert(X_ORIG_TS, ts);
        }

        status = StatusCode::OK;
    }

    if let Some(origin) = inbound.get(ORIGIN) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));

        let exposed = EXPOSED_HEADERS
            .iter()
            .copied()
            .chain(
                upstream
                    .headers
                    .keys()
                    .filter(|name| **name != TRANSFER_ENCODING && **name != CONTENT_ENCODING)
                    .map(HeaderName::as_str),
            )
            .collect::<Vec<_>>()
            .join(",");
        if let Ok(value) = HeaderValue::from_str(&exposed) {
            headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
        }
    }

    let body = if status.as_u16() >= 400 && !upstream.headers.contains_key(MEMENTO_DATETIME) {
        headers.remove(CONTENT_LENGTH);
        headers.remove(CONTENT_ENCODING);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
        Body::from(error_message(status))
    } else {
        upstream.body.take()?
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}
