//! Metrics collection and exposition.
//!
//! # Metrics
//! - `geoswitch_requests_total` (counter): requests by exit and status
//! - `geoswitch_request_duration_seconds` (histogram): end-to-end latency by exit
//! - `geoswitch_provision_total` (counter): provisioning attempts by exit and result
//! - `geoswitch_active_exits` (gauge): exits with a cached handler

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one proxied request. `exit` is `"none"` when no exit was resolved.
pub fn record_request(exit: &str, status: u16, start: Instant) {
    let exit = exit.to_string();
    ::metrics::counter!(
        "geoswitch_requests_total",
        "exit" => exit.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("geoswitch_request_duration_seconds", "exit" => exit)
        .record(start.elapsed().as_secs_f64());
}

/// Record a provisioning attempt with `result` of `"success"` or `"failure"`.
pub fn record_provision(exit: &str, result: &'static str) {
    ::metrics::counter!(
        "geoswitch_provision_total",
        "exit" => exit.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn set_active_exits(count: usize) {
    ::metrics::gauge!("geoswitch_active_exits").set(count as f64);
}
