//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mox_executions_total` (counter): executions by outcome
//!   (`responded`, `passthrough`, `failed`, `timeout`)
//! - `mox_execution_duration_seconds` (histogram): latency per execution
//! - `mox_upstream_requests_total` (counter): upstream calls by status
//! - `mox_chain_compilations_total` (counter): route chains compiled

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the end of one pipeline execution.
pub fn record_execution(outcome: &'static str, start: Instant) {
    ::metrics::counter!("mox_executions_total", "outcome" => outcome).increment(1);
    ::metrics::histogram!("mox_execution_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

/// Record one upstream call.
pub fn record_upstream(status: u16) {
    ::metrics::counter!("mox_upstream_requests_total", "status" => status.to_string()).increment(1);
}

/// Record a chain being frozen into a handler.
pub fn record_compilation() {
    ::metrics::counter!("mox_chain_compilations_total").increment(1);
}
