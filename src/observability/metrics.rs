//! Metrics collection and exposition.
//!
//! # Metrics
//! - `route_dispatch_requests_total` (counter): page requests by outcome
//! - `route_dispatch_request_duration_seconds` (histogram): request latency,
//!   handlers included
//! - `route_dispatch_handler_invocations_total` (counter): handler invocations
//!   by scope (page, context)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "route_dispatch_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "route_dispatch_request_duration_seconds";
pub const HANDLER_INVOCATIONS_TOTAL: &str = "route_dispatch_handler_invocations_total";

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(error) => tracing::error!(address = %addr, %error, "Failed to install metrics exporter"),
    }
}

/// Record one finished page request. `outcome` is `success` or an error kind.
pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one handler invocation.
pub fn record_invocation(scope: &'static str) {
    metrics::counter!(HANDLER_INVOCATIONS_TOTAL, "scope" => scope).increment(1);
}
