//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, response buffering).
    pub listener: ListenerConfig,

    /// Ordered upstream base addresses (scheme + host + port).
    pub upstreams: UpstreamsConfig,

    /// Path rewriting applied before forwarding.
    pub load_balance: LoadBalanceConfig,

    /// Response body interception.
    pub intercept: InterceptConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Number of response chunks that may be queued towards a client before
    /// the upstream read is paused (backpressure window).
    pub response_buffer_chunks: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            response_buffer_chunks: 16,
        }
    }
}

/// Static upstream pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct UpstreamsConfig {
    pub addresses: Vec<String>,
}

impl Default for UpstreamsConfig {
    fn default() -> Self {
        Self {
            addresses: vec![
                "http://localhost:8081".to_string(),
                "http://localhost:8082".to_string(),
            ],
        }
    }
}

/// Load balancing / rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalanceConfig {
    /// Path prefix removed before forwarding. Must start and end with `/`.
    pub strip_prefix: String,
}

impl Default for LoadBalanceConfig {
    fn default() -> Self {
        Self {
            strip_prefix: "/loadbalance/".to_string(),
        }
    }
}

/// How the response body interceptor observes the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterceptMode {
    /// Log and transform every chunk independently.
    PerChunk,
    /// Forward chunks untouched, log the merged body once the stream ends.
    #[default]
    Accumulating,
}

/// Response body interception configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterceptConfig {
    /// Interception mode.
    pub mode: InterceptMode,

    /// Literal appended to every chunk in per-chunk mode.
    pub suffix: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the whole request, until response headers are returned.
    pub request_secs: u64,

    /// Time allowed for an upstream to return response headers.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when RUST_LOG is unset.
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
