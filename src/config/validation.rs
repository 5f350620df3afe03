//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate upstream addresses and the rewrite prefix
//! - Validate value ranges (timeouts > 0, buffer sizes > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;
use crate::load_balancer::upstream::Upstream;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.response_buffer_chunks == 0 {
        errors.push(ValidationError::new(
            "listener.response_buffer_chunks",
            "must be greater than zero",
        ));
    }

    if config.upstreams.addresses.is_empty() {
        errors.push(ValidationError::new(
            "upstreams",
            "at least one upstream is required",
        ));
    }
    for (i, address) in config.upstreams.addresses.iter().enumerate() {
        if let Err(e) = Upstream::parse(address) {
            errors.push(ValidationError::new(format!("upstreams[{}]", i), e.to_string()));
        }
    }

    let prefix = &config.load_balance.strip_prefix;
    if !prefix.starts_with('/') || !prefix.ends_with('/') {
        errors.push(ValidationError::new(
            "load_balance.strip_prefix",
            "must start and end with '/'",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than zero"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
