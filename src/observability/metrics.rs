//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_responses_total` (counter): completed exchanges by status
//! - `gateway_response_duration_seconds` (histogram): latency distribution
//! - `gateway_upstream_selected_total` (counter): round-robin picks by upstream
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one completed exchange. `status` is 0 when none was set.
pub fn record_response(status: u16, elapsed: Duration) {
    metrics::counter!("gateway_responses_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("gateway_response_duration_seconds").record(elapsed.as_secs_f64());
}
