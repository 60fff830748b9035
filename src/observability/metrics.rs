//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (sessions, connect failures, bytes, passthrough)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `relay_sessions_total` (counter): sessions that reached the remote
//! - `relay_sessions_active` (gauge): sessions currently relaying
//! - `relay_connect_failures_total` (counter): failed remote dials
//! - `relay_bytes_total` (counter): bytes written, by direction
//! - `relay_passthrough_total` (counter): passthrough switches, by direction
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so the core and its
//!   tests never depend on the exporter

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::relay::state::Direction;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session_opened() {
    metrics::counter!("relay_sessions_total").increment(1);
    metrics::gauge!("relay_sessions_active").increment(1.0);
}

pub fn record_session_closed() {
    metrics::gauge!("relay_sessions_active").decrement(1.0);
}

pub fn record_connect_failure() {
    metrics::counter!("relay_connect_failures_total").increment(1);
}

pub fn record_bytes(direction: Direction, n: u64) {
    metrics::counter!("relay_bytes_total", "direction" => direction.as_str()).increment(n);
}

pub fn record_passthrough(direction: Direction) {
    metrics::counter!("relay_passthrough_total", "direction" => direction.as_str()).increment(1);
}
