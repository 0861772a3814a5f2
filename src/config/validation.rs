//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ceilings > 0, timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{Ipv4Addr, SocketAddr};

use crate::config::schema::ProxyConfig;

/// Smallest buffer that can still hold a minimal request head.
pub const MIN_BUFFER_BYTES: usize = 64;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not an IPv4 address")]
    BindAddress(String),
    #[error("listener.max_connections must be at least 1")]
    ZeroMaxConnections,
    #[error("listener.backlog must be at least 1")]
    ZeroBacklog,
    #[error("limits.buffer_bytes must be at least {min}, got {0}", min = MIN_BUFFER_BYTES)]
    BufferTooSmall(usize),
    #[error("timeouts.{0} must be greater than zero when set")]
    ZeroTimeout(&'static str),
    #[error("observability.log_format `{0}` is not one of: pretty, json")]
    LogFormat(String),
    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Render a list of validation errors on one line.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<Ipv4Addr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }
    if config.limits.buffer_bytes < MIN_BUFFER_BYTES {
        errors.push(ValidationError::BufferTooSmall(config.limits.buffer_bytes));
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("client_read_secs", config.timeouts.client_read_secs),
        ("upstream_read_secs", config.timeouts.upstream_read_secs),
    ];
    for (name, value) in timeouts {
        if value == Some(0) {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    match config.observability.log_format.as_str() {
        "pretty" | "json" => {}
        other => errors.push(ValidationError::LogFormat(other.to_string())),
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
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
