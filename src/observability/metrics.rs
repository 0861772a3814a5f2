//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_accepted_total` (counter): accepted client sockets
//! - `proxy_accept_errors_total` (counter): transient accept failures
//! - `proxy_active_connections` (gauge): handlers currently holding a slot
//! - `proxy_connection_outcomes_total` (counter): handler outcomes by `outcome` and `reason`
//! - `proxy_relayed_bytes_total` (counter): response bytes copied to clients
//! - `proxy_connection_duration_seconds` (histogram): slot hold time
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_accepted() {
    metrics::counter!("proxy_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    metrics::counter!("proxy_accept_errors_total").increment(1);
}

pub fn slot_acquired() {
    metrics::gauge!("proxy_active_connections").increment(1.0);
}

pub fn slot_released() {
    metrics::gauge!("proxy_active_connections").decrement(1.0);
}

/// Record how a connection ended and how long it held its slot.
pub fn record_outcome(
    outcome: &'static str,
    reason: &'static str,
    relayed_bytes: u64,
    started: Instant,
) {
    metrics::counter!(
        "proxy_connection_outcomes_total",
        "outcome" => outcome,
        "reason" => reason
    )
    .increment(1);
    if relayed_bytes > 0 {
        metrics::counter!("proxy_relayed_bytes_total").increment(relayed_bytes);
    }
    metrics::histogram!("proxy_connection_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}
