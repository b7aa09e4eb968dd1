//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fricu_requests_total` (counter): answered requests by method, status
//! - `fricu_request_duration_seconds` (histogram): accept-to-response latency
//! - `fricu_connections_accepted_total` (counter): accepted sockets
//! - `fricu_connections_rejected_total` (counter): dropped sockets by reason
//! - `fricu_active_connections` (gauge): connections currently held by workers
//!
//! Recording is always on and costs an atomic update; without an installed
//! recorder the `metrics` facade discards the values.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Outside a Tokio runtime the exporter runs on its own background thread.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one answered request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "fricu_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("fricu_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_accepted() {
    counter!("fricu_connections_accepted_total").increment(1);
}

/// Record a socket dropped before it produced a response.
pub fn record_rejected(reason: &'static str) {
    counter!("fricu_connections_rejected_total", "reason" => reason).increment(1);
}

pub fn connection_opened() {
    gauge!("fricu_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("fricu_active_connections").decrement(1.0);
}
