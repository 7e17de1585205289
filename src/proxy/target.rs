//! Target URL extraction from the inbound request path.

use std::borrow::Cow;

use url::Url;

use crate::proxy::error::ProxyError;

/// Repair `http:/host` and `https:/host` forms some callers produce when a
/// `//` collapses in transit.
pub fn fix_single_slash(raw: &str) -> Cow<'_, str> {
    for scheme in ["https:/", "http:/"] {
        if let Some(rest) = raw.strip_prefix(scheme) {
            if !rest.starts_with('/') {
                return Cow::Owned(format!("{}/{}", scheme, rest));
            }
        }
    }
    Cow::Borrowed(raw)
}

/// Everything after `prefix` in the request's path and query.
pub fn strip_prefix<'a>(path_and_query: &'a str, prefix: &str) -> Option<&'a str> {
    path_and_query.strip_prefix(prefix)
}

/// Turn the raw embedded target into an absolute http(s) URL.
pub fn resolve_target(raw: &str) -> Result<Url, ProxyError> {
    let fixed = fix_single_slash(raw);
    let absolute = match fixed.strip_prefix("//") {
        Some(rest) => Cow::Owned(format!("https://{}", rest)),
        None => fixed,
    };

    let url = Url::parse(&absolute).map_err(|_| ProxyError::InvalidTarget(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(ProxyError::InvalidTarget(raw.to_string())),
    }
}
