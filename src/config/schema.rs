//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, port, admission ceiling).
    pub listener: ListenerConfig,

    /// Buffer limits shared by the reader, rewriter and relay.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream connection settings.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// IPv4 address to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// TCP port to listen on. Zero picks an ephemeral port.
    pub port: u16,

    /// Listen backlog handed to the kernel.
    pub backlog: u32,

    /// Maximum concurrently handled connections (admission slots).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8090,
            backlog: 1024,
            max_connections: 10,
        }
    }
}

/// Buffer limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Capacity of the request head buffer, the rewritten head and the relay buffer.
    pub buffer_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { buffer_bytes: 8192 }
    }
}

/// Timeout configuration. Absent values wait indefinitely.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-address upstream connect timeout in seconds.
    pub connect_secs: Option<u64>,

    /// Deadline for reading the complete request head from the client.
    pub client_read_secs: Option<u64>,

    /// Idle timeout for each read from the upstream while relaying.
    pub upstream_read_secs: Option<u64>,
}

impl TimeoutConfig {
    pub fn connect(&self) -> Option<Duration> {
        self.connect_secs.map(Duration::from_secs)
    }

    pub fn client_read(&self) -> Option<Duration> {
        self.client_read_secs.map(Duration::from_secs)
    }

    pub fn upstream_read(&self) -> Option<Duration> {
        self.upstream_read_secs.map(Duration::from_secs)
    }
}

/// Upstream connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Only connect to IPv4 addresses returned by the resolver.
    pub ipv4_only: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self { ipv4_only: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
