//! Proxy error types and response handling.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::http::response::json_error;
use crate::transport::{BodyConsumed, TransportError};

/// Errors that abort a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The embedded target is not an absolute http(s) URL.
    #[error("invalid target URL \"{0}\"")]
    InvalidTarget(String),

    /// The inbound request body could not be read.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    /// The outbound fetch failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    BodyConsumed(#[from] BodyConsumed),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            ProxyError::BodyRead(_) => StatusCode::BAD_REQUEST,
            ProxyError::Transport(_) => StatusCode::BAD_GATEWAY,
            ProxyError::BodyConsumed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Proxy error");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Rejected request");
        }
        json_error(status, &self.to_string())
    }
}
