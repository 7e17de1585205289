//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! RedirectFetcher (proxy/fetcher.rs)
//!     → Transport::fetch (one request, one response, never follows redirects)
//!     → client.rs (reqwest over TCP/TLS)
//!     → UpstreamResponse (status, headers, single-consumption body)
//! ```
//!
//! # Design Decisions
//! - The gateway only sees the `Transport` trait; tests plug in scripted transports
//! - Redirects are never followed at this layer
//! - Bodies are passed through byte-for-byte: no decompression, no rewriting
//! - Hop-by-hop headers are stripped in both directions

pub mod body;
pub mod client;

use std::future::Future;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderName, Method};
use thiserror::Error;
use url::Url;

use crate::config::CacheTtlTable;

pub use body::{BodyConsumed, UpstreamBody, UpstreamResponse};
pub use client::HttpTransport;

/// Connection-scoped headers that never cross the proxy.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Body of an outbound request.
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Held in memory; can be sent any number of times.
    Buffered(Bytes),
    /// The inbound stream, forwarded as it arrives. Can be sent once.
    Streaming(Body),
}

impl RequestBody {
    /// A second copy of the body, or `None` for a stream.
    pub fn try_clone(&self) -> Option<RequestBody> {
        match self {
            RequestBody::Empty => Some(RequestBody::Empty),
            RequestBody::Buffered(bytes) => Some(RequestBody::Buffered(bytes.clone())),
            RequestBody::Streaming(_) => None,
        }
    }
}

/// A single outbound request.
#[derive(Debug)]
pub struct FetchRequest {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Directives attached to every outbound request.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Cache lifetime the transport may apply, by response status.
    pub cache_ttl_by_status: CacheTtlTable,
}

/// Errors raised by a transport while performing a fetch.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Performs one HTTP exchange with an upstream server.
///
/// Implementations must not follow redirects and must not alter the
/// response body.
pub trait Transport: Send + Sync + 'static {
    fn fetch(
        &self,
        request: FetchRequest,
        options: &FetchOptions,
    ) -> impl Future<Output = Result<UpstreamResponse, TransportError>> + Send;
}
