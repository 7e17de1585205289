//! Upstream response representation.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use thiserror::Error;

/// Returned when a body is read a second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("upstream body already consumed")]
pub struct BodyConsumed;

/// Lazy, single-consumption response body.
///
/// The stream is handed out exactly once; it is never buffered here.
#[derive(Debug)]
pub struct UpstreamBody {
    inner: Option<Body>,
}

impl UpstreamBody {
    pub fn new(body: Body) -> Self {
        Self { inner: Some(body) }
    }

    /// Take the body stream. Fails on every call after the first.
    pub fn take(&mut self) -> Result<Body, BodyConsumed> {
        self.inner.take().ok_or(BodyConsumed)
    }
}

/// A response received from the upstream server.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: UpstreamBody::new(body),
        }
    }

    /// Replace the canonical reason phrase with the one the upstream sent.
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// The raw `Location` header, if present and readable.
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::LOCATION)
            .and_then(|v| v.to_str().ok())
    }
}
