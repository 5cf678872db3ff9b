//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gatehouse_requests_total` (counter): requests by method, route, status
//! - `gatehouse_request_duration_seconds` (histogram): dispatch latency by route
//! - `gatehouse_auth_failures_total` (counter): rejected credentials by reason
//! - `gatehouse_rate_limited_total` (counter): 429s by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus exporter is optional and owns its own listener

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "gatehouse_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gatehouse_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_auth_failure(reason: &'static str) {
    ::metrics::counter!("gatehouse_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_rate_limited(route: &str) {
    ::metrics::counter!("gatehouse_rate_limited_total", "route" => route.to_string()).increment(1);
}
