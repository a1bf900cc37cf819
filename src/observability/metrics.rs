//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ids_requests_total` (counter): inspected requests by verdict
//! - `ids_suspicious_total` (counter): requests matching a detector
//! - `ids_blocks_total` (counter): block transitions
//! - `ids_downstream_failures_total` (counter): continuation failures
//! - `ids_log_sink_failures_total` (counter): disabled log sinks by name
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_verdict(verdict: &'static str) {
    counter!("ids_requests_total", "verdict" => verdict).increment(1);
}

pub fn record_suspicious() {
    counter!("ids_suspicious_total").increment(1);
}

pub fn record_block() {
    counter!("ids_blocks_total").increment(1);
}

pub fn record_downstream_failure() {
    counter!("ids_downstream_failures_total").increment(1);
}

pub fn record_sink_failure(sink: &str) {
    counter!("ids_log_sink_failures_total", "sink" => sink.to_string()).increment(1);
}
