//! Proxying pipeline.
//!
//! # Data Flow
//! ```text
//! Request<Body> (path = {prefix}{target-url-with-query})
//!     → target.rs   (extract + normalize target URL)
//!     → headers.rs  (translate request headers)
//!     → fetcher.rs  (outbound fetch, redirect chase)
//!     → compose.rs  (status remap, CORS, body selection)
//!     → Response<Body>
//! ```
//!
//! # Design Decisions
//! - One request, one response; nothing is shared between requests
//! - OPTIONS never reaches the upstream
//! - Paths outside the prefix get a JSON not-found response
//! - Request bodies stream to the upstream; only small bodies of known length
//!   are held in memory, so a followed redirect can resend them

pub mod compose;
pub mod error;
pub mod fetcher;
pub mod headers;
pub mod target;

use std::time::Instant;

use axum::body::{Body, HttpBody as _};
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};

use crate::config::{AllowedOrigins, GatewayConfig};
use crate::http::preflight::preflight_response;
use crate::http::response::not_found;
use crate::observability::metrics;
use crate::transport::{FetchOptions, FetchRequest, RequestBody, Transport};

pub use compose::compose_response;
pub use error::ProxyError;
pub use fetcher::{FetchOutcome, RedirectCapture, RedirectFetcher};
pub use headers::HeaderTranslator;

/// Entry point for one request/response cycle.
#[derive(Debug)]
pub struct Gateway<T> {
    prefix: String,
    translator: HeaderTranslator,
    fetcher: RedirectFetcher<T>,
    allowed_origins: AllowedOrigins,
    replay_buffer_size: usize,
}

impl<T: Transport> Gateway<T> {
    pub fn new(config: &GatewayConfig, transport: T) -> Self {
        let options = FetchOptions {
            cache_ttl_by_status: config.cache.ttl_by_status.clone(),
        };

        Self {
            prefix: config.proxy.prefix.clone(),
            translator: HeaderTranslator::new(&config.proxy.platform_header_prefixes),
            fetcher: RedirectFetcher::new(transport, options, config.proxy.max_redirect_hops),
            allowed_origins: config.cors.allowed_origins.clone(),
            replay_buffer_size: config.limits.replay_buffer_size,
        }
    }

    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    /// Dispatch a request and produce exactly one response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().clone();

        let response = if method == Method::OPTIONS {
            preflight_response(request.headers(), &self.allowed_origins)
        } else if request.uri().path().starts_with(&self.prefix) {
            match self.proxy(request).await {
                Ok(response) => response,
                Err(err) => {
                    if matches!(err, ProxyError::Transport(_)) {
                        metrics::record_upstream_error();
                    }
                    err.into_response()
                }
            }
        } else {
            not_found("Not Found")
        };

        metrics::record_request(method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn proxy(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();

        let path_and_query = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        let raw = target::strip_prefix(path_and_query, &self.prefix).unwrap_or_default();
        let url = target::resolve_target(raw)?;

        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        tracing::debug!(
            request_id = %request_id,
            method = %parts.method,
            target = %url,
            "Proxying request"
        );

        let headers = self.translator.translate(&parts.headers, &url);
        let body = self.outbound_body(body).await?;

        let outcome = self
            .fetcher
            .fetch(FetchRequest {
                url,
                method: parts.method.clone(),
                headers,
                body,
            })
            .await?;

        let response = compose_response(&parts.headers, outcome)?;
        tracing::debug!(
            request_id = %request_id,
            status = response.status().as_u16(),
            "Proxied request complete"
        );
        Ok(response)
    }

    /// Hold small bodies of known length in memory; stream everything else.
    async fn outbound_body(&self, body: Body) -> Result<RequestBody, ProxyError> {
        match body.size_hint().exact() {
            Some(0) => Ok(RequestBody::Empty),
            Some(len) if len <= self.replay_buffer_size as u64 => {
                let bytes = axum::body::to_bytes(body, self.replay_buffer_size)
                    .await
                    .map_err(|e| ProxyError::BodyRead(e.to_string()))?;
                Ok(RequestBody::Buffered(bytes))
            }
            _ => Ok(RequestBody::Streaming(body)),
        }
    }
}
