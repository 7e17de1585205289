//! Redirect-aware outbound fetch.
//!
//! # Responsibilities
//! - Issue the outbound request with transport-level redirects disabled
//! - Chase archive-internal redirects (same capture URL, new timestamp)
//! - Upgrade plain-HTTP redirects to HTTPS silently when asked to
//! - Surface every other redirect with typed capture metadata
//!
//! # Design Decisions
//! - Iterations are strictly sequential; each target depends on the last reply
//! - The chase is bounded by `max_redirect_hops`; the last redirect is surfaced
//! - Intermediate responses are dropped without reading their bodies
//! - Every hop resends the original method, headers and body; a streamed body
//!   cannot be resent, so following a redirect after one fails with `BodyConsumed`

use axum::http::{HeaderName, StatusCode};
use url::Url;

use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::transport::{BodyConsumed, FetchOptions, FetchRequest, Transport, UpstreamResponse};

/// Control header asking the fetcher to follow redirects to `https://` targets.
pub const X_OWT_NO_HTTPS: HeaderName = HeaderName::from_static("x-owt-no-https");

/// Marker between the timestamp and the captured URL in archive paths.
const ID_MARKER: &str = "id_/";

/// A `<digits>id_/<absolute-url>` archive capture reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedUrl<'a> {
    pub timestamp: &'a str,
    pub url: &'a str,
}

impl<'a> TimestampedUrl<'a> {
    /// Find the first timestamp-id segment in `input`.
    pub fn parse(input: &'a str) -> Option<Self> {
        let mut from = 0;
        while let Some(offset) = input[from..].find(ID_MARKER) {
            let marker = from + offset;
            let digits_start = marker
                - input[..marker]
                    .bytes()
                    .rev()
                    .take_while(u8::is_ascii_digit)
                    .count();
            let url = &input[marker + ID_MARKER.len()..];

            let has_digits = digits_start < marker;
            let segment_start = digits_start == 0 || input[..digits_start].ends_with('/');
            if has_digits && segment_start && is_absolute(url) {
                return Some(Self {
                    timestamp: &input[digits_start..marker],
                    url,
                });
            }
            from = marker + ID_MARKER.len();
        }
        None
    }
}

fn is_absolute(url: &str) -> bool {
    Url::parse(url).map(|u| u.has_host()).unwrap_or(false)
}

/// Capture metadata of a redirect that was not followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCapture {
    /// Absolute URL captured in the `Location` header.
    pub target: String,
    /// Timestamp segment of the `Location` header.
    pub timestamp: String,
}

/// Final result of the fetch step.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The response to hand to the composer as-is.
    Completed(UpstreamResponse),
    /// A surfaced redirect whose `Location` names an archive capture.
    Redirected {
        capture: RedirectCapture,
        response: UpstreamResponse,
    },
}

impl FetchOutcome {
    pub fn into_parts(self) -> (UpstreamResponse, Option<RedirectCapture>) {
        match self {
            FetchOutcome::Completed(response) => (response, None),
            FetchOutcome::Redirected { capture, response } => (response, Some(capture)),
        }
    }
}

/// Redirect statuses this gateway inspects; 304 is not one of them.
pub fn is_followable_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Fetches a target, chasing archive-internal redirects.
#[derive(Debug)]
pub struct RedirectFetcher<T> {
    transport: T,
    options: FetchOptions,
    max_hops: u32,
}

impl<T: Transport> RedirectFetcher<T> {
    pub fn new(transport: T, options: FetchOptions, max_hops: u32) -> Self {
        Self {
            transport,
            options,
            max_hops,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchOutcome, ProxyError> {
        let FetchRequest {
            mut url,
            method,
            mut headers,
            body,
        } = request;
        let force_https_follow = headers.remove(X_OWT_NO_HTTPS).is_some();
        let mut pending = Some(body);
        let mut hops = 0u32;

        loop {
            let body = pending.take().ok_or(BodyConsumed)?;
            pending = body.try_clone();

            let response = self
                .transport
                .fetch(
                    FetchRequest {
                        url: url.clone(),
                        method: method.clone(),
                        headers: headers.clone(),
                        body,
                    },
                    &self.options,
                )
                .await?;

            if !is_followable_redirect(response.status) {
                return Ok(FetchOutcome::Completed(response));
            }
            let Some(location) = response.location().map(str::to_owned) else {
                return Ok(FetchOutcome::Completed(response));
            };

            let resolved = url.join(&location).ok();
            let next = resolved.as_ref().map(Url::as_str).unwrap_or(location.as_str());

            let mut follow = false;
            let mut capture = None;
            match (TimestampedUrl::parse(next), TimestampedUrl::parse(url.as_str())) {
                (Some(next), Some(current)) if next.url == current.url => follow = true,
                (Some(next), _) => {
                    capture = Some(RedirectCapture {
                        target: next.url.to_string(),
                        timestamp: next.timestamp.to_string(),
                    });
                }
                _ => {}
            }
            if force_https_follow && location.starts_with("https://") {
                follow = true;
            }

            let next_url = match resolved {
                Some(next_url) if follow && hops < self.max_hops => next_url,
                _ => {
                    if follow {
                        tracing::warn!(
                            url = %url,
                            location = %location,
                            hops,
                            "Redirect hop limit reached; surfacing redirect"
                        );
                    }
                    return Ok(match capture {
                        Some(capture) => FetchOutcome::Redirected { capture, response },
                        None => FetchOutcome::Completed(response),
                    });
                }
            };

            if pending.is_none() {
                tracing::warn!(
                    url = %url,
                    location = %location,
                    "Cannot follow redirect: streamed request body already sent"
                );
                return Err(BodyConsumed.into());
            }

            hops += 1;
            metrics::record_redirect_followed();
            tracing::debug!(
                from = %url,
                to = %next_url,
                status = response.status.as_u16(),
                hops,
                "Following redirect internally"
            );
            url = next_url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{Reply, ScriptedTransport};
    use crate::transport::TransportError;
    use crate::transport::RequestBody;
    use axum::body::{Body, Bytes};
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{HeaderMap, HeaderValue, Method};

    const ARCHIVE: &str = "https://archive.test/web/";

    fn request(url: &str) -> FetchRequest {
        FetchRequest {
            url: Url::parse(url).unwrap(),
            method: Method::GET,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    fn fetcher(replies: Vec<Reply>) -> RedirectFetcher<ScriptedTransport> {
        RedirectFetcher::new(ScriptedTransport::new(replies), FetchOptions::default(), 20)
    }

    #[test]
    fn test_parse_timestamped_url() {
        let parsed =
            TimestampedUrl::parse("https://archive.test/web/20200101000000id_/https://site.test/a.html?q=1")
                .unwrap();
        assert_eq!(parsed.timestamp, "20200101000000");
        assert_eq!(parsed.url, "https://site.test/a.html?q=1");

        let bare = TimestampedUrl::parse("2020id_/http://site.test/").unwrap();
        assert_eq!(bare.timestamp, "2020");
    }

    #[test]
    fn test_parse_rejects_non_captures() {
        assert_eq!(TimestampedUrl::parse("https://site.test/a.html"), None);
        assert_eq!(TimestampedUrl::parse("https://archive.test/web/id_/https://site.test/"), None);
        assert_eq!(TimestampedUrl::parse("https://archive.test/web/x2020id_/https://site.test/"), None);
        assert_eq!(TimestampedUrl::parse("https://archive.test/web/2020id_/relative/path"), None);
    }

    #[tokio::test]
    async fn test_plain_redirect_not_followed() {
        let fetcher = fetcher(vec![
            Reply::new(302).header("location", "https://site.test/b.html"),
        ]);

        let outcome = fetcher.fetch(request("https://site.test/a.html")).await.unwrap();
        let (response, capture) = outcome.into_parts();
        assert_eq!(response.status, StatusCode::FOUND);
        assert_eq!(response.location(), Some("https://site.test/b.html"));
        assert_eq!(capture, None);
        assert_eq!(fetcher.transport().recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_timestamp_redirect_followed() {
        let next = format!("{ARCHIVE}20200102000000id_/https://site.test/a.html");
        let fetcher = fetcher(vec![
            Reply::new(302).header("location", &next),
            Reply::new(200).body("capture"),
        ]);

        let outcome = fetcher
            .fetch(request(&format!("{ARCHIVE}20200101000000id_/https://site.test/a.html")))
            .await
            .unwrap();

        assert!(matches!(outcome, FetchOutcome::Completed(ref r) if r.status == StatusCode::OK));
        let recorded = fetcher.transport().recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].url.as_str(), next);
    }

    #[tokio::test]
    async fn test_capture_of_other_resource_surfaced() {
        let fetcher = fetcher(vec![Reply::new(301).header(
            "location",
            &format!("{ARCHIVE}20200102000000id_/https://site.test/b.html"),
        )]);

        let outcome = fetcher
            .fetch(request(&format!("{ARCHIVE}20200101000000id_/https://site.test/a.html")))
            .await
            .unwrap();

        match outcome {
            FetchOutcome::Redirected { capture, response } => {
                assert_eq!(capture.target, "https://site.test/b.html");
                assert_eq!(capture.timestamp, "20200102000000");
                assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
            }
            other => panic!("expected redirect, got {:?}", other),
        }
        assert_eq!(fetcher.transport().recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_capture_from_live_target() {
        let fetcher = fetcher(vec![Reply::new(302).header(
            "location",
            &format!("{ARCHIVE}20210101000000id_/https://site.test/a.html"),
        )]);

        let outcome = fetcher.fetch(request("https://site.test/a.html")).await.unwrap();
        let (_, capture) = outcome.into_parts();
        assert_eq!(
            capture,
            Some(RedirectCapture {
                target: "https://site.test/a.html".into(),
                timestamp: "20210101000000".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_force_https_follow() {
        let fetcher = fetcher(vec![
            Reply::new(301).header("location", "https://site.test/a.html"),
            Reply::new(200),
        ]);
        let mut req = request("http://site.test/a.html");
        req.headers.insert(X_OWT_NO_HTTPS, HeaderValue::from_static("1"));

        let outcome = fetcher.fetch(req).await.unwrap();
        assert_eq!(outcome.into_parts().0.status, StatusCode::OK);

        let recorded = fetcher.transport().recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].url.as_str(), "https://site.test/a.html");
        assert!(recorded.iter().all(|r| !r.headers.contains_key(X_OWT_NO_HTTPS)));
    }

    #[tokio::test]
    async fn test_force_https_ignores_plain_http_location() {
        let fetcher = fetcher(vec![
            Reply::new(302).header("location", "http://other.test/"),
        ]);
        let mut req = request("http://site.test/a.html");
        req.headers.insert(X_OWT_NO_HTTPS, HeaderValue::from_static("1"));

        let outcome = fetcher.fetch(req).await.unwrap();
        assert_eq!(outcome.into_parts().0.status, StatusCode::FOUND);
        assert_eq!(fetcher.transport().recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_not_modified_not_followed() {
        let fetcher = fetcher(vec![
            Reply::new(304).header("location", "https://site.test/b.html"),
        ]);

        let outcome = fetcher.fetch(request("https://site.test/a.html")).await.unwrap();
        assert_eq!(outcome.into_parts().0.status, StatusCode::NOT_MODIFIED);
        assert_eq!(fetcher.transport().recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_redirect_without_location() {
        let fetcher = fetcher(vec![Reply::new(307)]);
        let outcome = fetcher.fetch(request("https://site.test/a.html")).await.unwrap();
        assert!(matches!(outcome, FetchOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_hop_limit() {
        let location = format!("{ARCHIVE}20200102000000id_/https://site.test/a.html");
        let transport = ScriptedTransport::repeating(5, || {
            Reply::new(302).header("location", &location)
        });
        let fetcher = RedirectFetcher::new(transport, FetchOptions::default(), 2);

        let outcome = fetcher
            .fetch(request(&format!("{ARCHIVE}20200101000000id_/https://site.test/a.html")))
            .await
            .unwrap();

        assert_eq!(outcome.into_parts().0.status, StatusCode::FOUND);
        assert_eq!(fetcher.transport().recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_relative_location_resolved() {
        let fetcher = fetcher(vec![
            Reply::new(302).header("location", "/web/20200102000000id_/https://site.test/a.html"),
            Reply::new(200),
        ]);

        fetcher
            .fetch(request(&format!("{ARCHIVE}20200101000000id_/https://site.test/a.html")))
            .await
            .unwrap();

        let recorded = fetcher.transport().recorded();
        assert_eq!(
            recorded[1].url.as_str(),
            format!("{ARCHIVE}20200102000000id_/https://site.test/a.html")
        );
    }

    #[tokio::test]
    async fn test_followed_redirect_resends_method_and_body() {
        let fetcher = fetcher(vec![
            Reply::new(302).header("location", "https://site.test/done"),
            Reply::new(200),
        ]);
        let mut req = request("http://site.test/form");
        req.method = Method::POST;
        req.body = RequestBody::Buffered(Bytes::from_static(b"x=1"));
        req.headers.insert(X_OWT_NO_HTTPS, HeaderValue::from_static("1"));
        req.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

        fetcher.fetch(req).await.unwrap();

        let recorded = fetcher.transport().recorded();
        assert_eq!(recorded.len(), 2);
        for sent in &recorded {
            assert_eq!(sent.method, Method::POST);
            assert_eq!(sent.body.as_deref(), Some(&b"x=1"[..]));
            assert_eq!(sent.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        }
    }

    #[tokio::test]
    async fn test_streamed_body_sent_once() {
        let fetcher = fetcher(vec![
            Reply::new(307).header("location", "https://site.test/upload"),
            Reply::new(200),
        ]);
        let mut req = request("http://site.test/upload");
        req.method = Method::PUT;
        req.body = RequestBody::Streaming(Body::from("chunk"));
        req.headers.insert(X_OWT_NO_HTTPS, HeaderValue::from_static("1"));

        let err = fetcher.fetch(req).await.unwrap_err();
        assert!(matches!(err, ProxyError::BodyConsumed(_)));

        let recorded = fetcher.transport().recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].streamed);
        assert_eq!(recorded[0].body.as_deref(), Some(&b"chunk"[..]));
    }

    #[tokio::test]
    async fn test_streamed_body_without_redirect() {
        let fetcher = fetcher(vec![Reply::new(201)]);
        let mut req = request("https://site.test/upload");
        req.method = Method::POST;
        req.body = RequestBody::Streaming(Body::from("payload"));

        let (response, _) = fetcher.fetch(req).await.unwrap().into_parts();
        assert_eq!(response.status, StatusCode::CREATED);
        assert!(fetcher.transport().recorded()[0].streamed);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let fetcher = RedirectFetcher::new(
            ScriptedTransport::failing("connection reset"),
            FetchOptions::default(),
            20,
        );

        let err = fetcher.fetch(request("https://site.test/a.html")).await.unwrap_err();
        assert!(matches!(err, ProxyError::Transport(TransportError::Other(ref m)) if m == "connection reset"));
    }
}
