//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by operation, status
//! - `gateway_request_duration_seconds` (histogram): latency by operation
//! - `gateway_query_timeouts_total` (counter): waits abandoned at deadline
//! - `gateway_stale_deliveries_total` (counter): responses with no waiter
//! - `gateway_protocol_violations_total` (counter): session-state errors
//!
//! # Design Decisions
//! - Recording helpers are no-ops until an exporter is installed, so
//!   library code calls them unconditionally
//! - Labels are limited to operation name and status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

/// Record one completed HTTP operation.
pub fn record_request(operation: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a wait abandoned because the deadline fired.
pub fn record_query_timeout() {
    metrics::counter!("gateway_query_timeouts_total").increment(1);
}

/// Record an inbound envelope dropped for want of a matching wait.
pub fn record_stale_delivery() {
    metrics::counter!("gateway_stale_deliveries_total").increment(1);
}

/// Record a session-state error (stale binding, unbind without bind).
pub fn record_protocol_violation() {
    metrics::counter!("gateway_protocol_violations_total").increment(1);
}
