//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpcsrv_requests_total` (counter): requests by method, status
//! - `rpcsrv_request_duration_seconds` (histogram): time from parse to write
//! - `rpcsrv_active_connections` (gauge): current connection count
//! - `rpcsrv_rpc_calls_total` (counter): RPC calls by service, method, outcome
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Unknown RPC method names and HTTP methods other than GET/POST are
//!   folded into `-` to bound label cardinality

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with its own HTTP listener.
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "rpcsrv_requests_total",
        "method" => method_label(method),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("rpcsrv_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    metrics::gauge!("rpcsrv_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("rpcsrv_active_connections").decrement(1.0);
}

pub fn record_rpc_call(service: &str, method: &str, outcome: &'static str) {
    metrics::counter!(
        "rpcsrv_rpc_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Label for an HTTP method token; anything the server does not route is `-`.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "POST" => "POST",
        _ => "-",
    }
}
