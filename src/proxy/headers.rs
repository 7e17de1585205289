//! Inbound → outbound request header translation.
//!
//! # Responsibilities
//! - Drop platform headers and internal `x-proxy-*` headers
//! - Promote the override headers the browser cannot set itself
//! - Forge `Origin` / `Sec-Fetch-Site` for the real target origin
//!
//! # Design Decisions
//! - The inbound map is never mutated; a fresh map is built per request
//! - Last value wins when a header appears more than once
//! - `Host` is always left to the transport

use axum::http::header::{COOKIE, HOST, ORIGIN, REFERER, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

/// Prefix reserved for proxy control headers.
pub const INTERNAL_PREFIX: &str = "x-proxy-";

pub const X_PROXY_REFERER: HeaderName = HeaderName::from_static("x-proxy-referer");
pub const X_PROXY_USER_AGENT: HeaderName = HeaderName::from_static("x-proxy-user-agent");
pub const X_PROXY_COOKIE: HeaderName = HeaderName::from_static("x-proxy-cookie");
pub const SEC_FETCH_SITE: HeaderName = HeaderName::from_static("sec-fetch-site");

/// Builds upstream request headers from client request headers.
#[derive(Debug, Clone)]
pub struct HeaderTranslator {
    platform_prefixes: Vec<String>,
}

impl HeaderTranslator {
    pub fn new<I, S>(platform_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            platform_prefixes: platform_prefixes
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_stripped(&self, name: &HeaderName) -> bool {
        let name = name.as_str();
        name.starts_with(INTERNAL_PREFIX)
            || self.platform_prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }

    /// Produce the outbound header set for a request to `target`.
    pub fn translate(&self, inbound: &HeaderMap, target: &Url) -> HeaderMap {
        let mut outbound = HeaderMap::with_capacity(inbound.len());

        for (name, value) in inbound {
            if *name == HOST || self.is_stripped(name) {
                continue;
            }
            outbound.insert(name.clone(), value.clone());
        }

        if let Some(referer) = last_value(inbound, &X_PROXY_REFERER) {
            outbound.insert(REFERER, referer.clone());
            apply_fetch_site(&mut outbound, referer, target);
        }

        if let Some(user_agent) = last_value(inbound, &X_PROXY_USER_AGENT) {
            outbound.insert(USER_AGENT, user_agent.clone());
        }

        if let Some(cookie) = last_value(inbound, &X_PROXY_COOKIE) {
            outbound.insert(COOKIE, cookie.clone());
        }

        outbound
    }
}

impl Default for HeaderTranslator {
    fn default() -> Self {
        Self::new(["cf-"])
    }
}

fn last_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a HeaderValue> {
    headers.get_all(name).iter().last()
}

/// Same-origin signalling a browser would send had it seen the real target.
fn apply_fetch_site(outbound: &mut HeaderMap, referer: &HeaderValue, target: &Url) {
    let Some(referer_url) = referer.to_str().ok().and_then(|r| Url::parse(r).ok()) else {
        tracing::debug!(referer = ?referer, "Unparseable proxy referer; origin left untouched");
        return;
    };

    let referer_origin = referer_url.origin();
    if referer_origin == target.origin() {
        outbound.remove(ORIGIN);
        outbound.insert(SEC_FETCH_SITE, HeaderValue::from_static("same-origin"));
    } else {
        match HeaderValue::from_str(&referer_origin.ascii_serialization()) {
            Ok(origin) => {
                outbound.insert(ORIGIN, origin);
            }
            Err(_) => {
                outbound.remove(ORIGIN);
            }
        }
        outbound.insert(SEC_FETCH_SITE, HeaderValue::from_static("cross-origin"));
    }
}
