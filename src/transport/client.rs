//! reqwest-backed transport.
//!
//! # Responsibilities
//! - Issue one outbound request per call with redirects disabled
//! - Stream request and response bodies without buffering or decoding
//! - Keep the upstream's own reason phrase
//! - Strip hop-by-hop headers in both directions

use std::time::Duration;

use axum::body::Body;
use axum::http::HeaderMap;

use crate::config::schema::TransportConfig;
use crate::transport::{
    is_hop_by_hop, FetchOptions, FetchRequest, RequestBody, Transport, TransportError,
    UpstreamResponse,
};

/// Transport performing real network fetches.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the underlying client from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(Duration::from_secs(config.connect_secs))
            // Bodies must reach the caller byte-for-byte.
            .no_gzip()
            .no_brotli()
            .no_deflate();

        if !config.system_proxy {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(TransportError::Build)?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn fetch(
        &self,
        request: FetchRequest,
        options: &FetchOptions,
    ) -> Result<UpstreamResponse, TransportError> {
        let url = request.url.to_string();

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(strip_hop_by_hop(request.headers));
        match request.body {
            RequestBody::Empty => {}
            RequestBody::Buffered(bytes) => builder = builder.body(bytes),
            RequestBody::Streaming(body) => {
                builder = builder.body(reqwest::Body::wrap_stream(body.into_data_stream()));
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|source| TransportError::Request { url: url.clone(), source })?;

        let status = response.status();
        let cache_ttl = options.cache_ttl_by_status.ttl_for(status.as_u16());
        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            cache_ttl = ?cache_ttl,
            "Upstream responded"
        );

        let reason = response
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|reason| std::str::from_utf8(reason.as_bytes()).ok())
            .map(str::to_owned);
        let headers = strip_hop_by_hop(response.headers().clone());
        let body = Body::from_stream(response.bytes_stream());

        let upstream = UpstreamResponse::new(status, headers, body);
        Ok(match reason {
            Some(reason) => upstream.with_status_text(reason),
            None => upstream,
        })
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    let hop: Vec<_> = headers.keys().filter(|name| is_hop_by_hop(name)).cloned().collect();
    for name in hop {
        headers.remove(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-type", HeaderValue::from_static("text/html"));

        let headers = strip_hop_by_hop(headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("content-type"));
    }

    #[test]
    fn test_build_client() {
        assert!(HttpTransport::new(&TransportConfig::default()).is_ok());
    }
}
