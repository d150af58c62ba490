//! Metrics collection and exposition.
//!
//! # Metrics
//! - `unit_worker_requests_total` (counter): finished requests by method, path, status
//! - `unit_worker_request_duration_seconds` (histogram): latency distribution
//! - `unit_worker_executions_total` (counter): completed units of work
//! - `unit_worker_in_flight_requests` (gauge): requests inside the pipeline
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status = status.to_string();
    counter!(
        "unit_worker_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.clone()
    )
    .increment(1);
    histogram!(
        "unit_worker_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_execution() {
    counter!("unit_worker_executions_total").increment(1);
}

pub fn set_in_flight(count: u64) {
    gauge!("unit_worker_in_flight_requests").set(count as f64);
}
