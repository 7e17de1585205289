//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, status codes in range)
//! - Check shape of the proxy prefix and configured origins
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{AllowedOrigins, GatewayConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address \"{0}\" is not a socket address")]
    BindAddress(String),

    #[error("proxy.prefix \"{0}\" must start and end with '/'")]
    Prefix(String),

    #[error("proxy.max_redirect_hops must be greater than zero")]
    RedirectHops,

    #[error("cors.allowed_origins entry \"{0}\" is not a scheme://host[:port] origin")]
    Origin(String),

    #[error("cache.ttl_by_status range {0} is outside 100-599")]
    StatusRange(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("observability.metrics_address \"{0}\" is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let prefix = &config.proxy.prefix;
    if prefix.len() < 2 || !prefix.starts_with('/') || !prefix.ends_with('/') {
        errors.push(ValidationError::Prefix(prefix.clone()));
    }

    if config.proxy.max_redirect_hops == 0 {
        errors.push(ValidationError::RedirectHops);
    }

    if let AllowedOrigins::List(origins) = &config.cors.allowed_origins {
        for origin in origins {
            if !is_origin(origin) {
                errors.push(ValidationError::Origin(origin.clone()));
            }
        }
    }

    for (range, _) in config.cache.ttl_by_status.entries() {
        if range.start < 100 || range.end > 599 {
            errors.push(ValidationError::StatusRange(range.to_string()));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.transport.connect_secs == 0 {
        errors.push(ValidationError::Zero("transport.connect_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// An origin serializes back to itself: no path, query or trailing slash.
fn is_origin(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => url.has_host() && url.origin().ascii_serialization() == value,
        Err(_) => false,
    }
}
