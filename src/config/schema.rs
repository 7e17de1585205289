//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Proxy path and redirect handling rules.
    pub proxy: ProxyRules,

    /// CORS preflight policy.
    pub cors: CorsConfig,

    /// Cache directives handed to the outbound transport.
    pub cache: CacheConfig,

    /// Outbound transport settings.
    pub transport: TransportConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request body handling.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Rules for extracting and chasing proxy targets.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyRules {
    /// Path prefix that precedes the embedded target URL. Must start and end with `/`.
    pub prefix: String,

    /// Maximum number of redirects followed internally for one request.
    pub max_redirect_hops: u32,

    /// Header name prefixes identifying the calling edge/runtime.
    /// Matching inbound headers are never forwarded upstream.
    pub platform_header_prefixes: Vec<String>,
}

impl Default for ProxyRules {
    fn default() -> Self {
        Self {
            prefix: "/proxy/".to_string(),
            max_redirect_hops: 20,
            platform_header_prefixes: vec!["cf-".to_string()],
        }
    }
}

/// CORS preflight configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins allowed to pass a preflight check.
    pub allowed_origins: AllowedOrigins,
}

/// Either every origin, or an explicit allow-list.
///
/// In TOML this is the string `"any"` or an array of origins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(try_from = "OriginsRepr", into = "OriginsRepr")]
pub enum AllowedOrigins {
    #[default]
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    /// Returns true if the origin passes this policy.
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            AllowedOrigins::Any => true,
            AllowedOrigins::List(origins) => origins.iter().any(|o| o == origin),
        }
    }
}

#[derive(Deserialize, Serialize)]
#[serde(untagged)]
enum OriginsRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<OriginsRepr> for AllowedOrigins {
    type Error = String;

    fn try_from(repr: OriginsRepr) -> Result<Self, Self::Error> {
        match repr {
            OriginsRepr::Keyword(k) if k.eq_ignore_ascii_case("any") => Ok(AllowedOrigins::Any),
            OriginsRepr::Keyword(k) => Err(format!(
                "allowed_origins must be \"any\" or a list of origins, got \"{}\"",
                k
            )),
            OriginsRepr::List(list) => Ok(AllowedOrigins::List(list)),
        }
    }
}

impl From<AllowedOrigins> for OriginsRepr {
    fn from(origins: AllowedOrigins) -> Self {
        match origins {
            AllowedOrigins::Any => OriginsRepr::Keyword("any".to_string()),
            AllowedOrigins::List(list) => OriginsRepr::List(list),
        }
    }
}

/// Cache directive configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache TTL in seconds keyed by status code or status range.
    pub ttl_by_status: CacheTtlTable,
}

/// Inclusive range of HTTP status codes, written as `"404"` or `"200-299"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StatusRange {
    pub start: u16,
    pub end: u16,
}

impl StatusRange {
    pub fn contains(&self, status: u16) -> bool {
        (self.start..=self.end).contains(&status)
    }

    fn width(&self) -> u16 {
        self.end - self.start
    }
}

impl FromStr for StatusRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<u16>()
                .map_err(|_| format!("invalid status code \"{}\"", v.trim()))
        };
        let range = match s.split_once('-') {
            Some((start, end)) => StatusRange {
                start: parse(start)?,
                end: parse(end)?,
            },
            None => {
                let code = parse(s)?;
                StatusRange { start: code, end: code }
            }
        };
        if range.start > range.end {
            return Err(format!("status range \"{}\" is reversed", s));
        }
        Ok(range)
    }
}

impl fmt::Display for StatusRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Mapping from status ranges to cache TTL seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "BTreeMap<String, u64>", into = "BTreeMap<String, u64>")]
pub struct CacheTtlTable {
    entries: Vec<(StatusRange, u64)>,
}

impl CacheTtlTable {
    pub fn new(entries: Vec<(StatusRange, u64)>) -> Self {
        Self { entries }
    }

    /// TTL for a response status. The narrowest matching range wins.
    pub fn ttl_for(&self, status: u16) -> Option<u64> {
        self.entries
            .iter()
            .filter(|(range, _)| range.contains(status))
            .min_by_key(|(range, _)| range.width())
            .map(|(_, ttl)| *ttl)
    }

    pub fn entries(&self) -> &[(StatusRange, u64)] {
        &self.entries
    }
}

impl Default for CacheTtlTable {
    fn default() -> Self {
        let range = |start, end| StatusRange { start, end };
        Self::new(vec![
            (range(200, 299), 86_400),
            (range(300, 399), 10),
            (range(403, 403), 0),
            (range(404, 404), 5),
            (range(500, 599), 0),
        ])
    }
}

impl TryFrom<BTreeMap<String, u64>> for CacheTtlTable {
    type Error = String;

    fn try_from(map: BTreeMap<String, u64>) -> Result<Self, Self::Error> {
        let entries = map
            .into_iter()
            .map(|(key, ttl)| key.parse::<StatusRange>().map(|range| (range, ttl)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(entries))
    }
}

impl From<CacheTtlTable> for BTreeMap<String, u64> {
    fn from(table: CacheTtlTable) -> Self {
        table
            .entries
            .into_iter()
            .map(|(range, ttl)| (range.to_string(), ttl))
            .collect()
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Route outbound requests through the proxy named by `HTTP(S)_PROXY`.
    pub system_proxy: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            system_proxy: false,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed until response headers are sent back, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Request body handling.
///
/// Bodies with a known length up to `replay_buffer_size` are held in memory
/// so an internally followed redirect can resend them. Everything else is
/// streamed to the upstream and can be sent only once. Zero streams every body.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub replay_buffer_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            replay_buffer_size: 64 * 1024, // 64KB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
