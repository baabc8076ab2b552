//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method, status, route
//! - `relay_request_duration_seconds` (histogram): latency by route
//! - `relay_sessions_active` (gauge): live WebSocket sessions
//! - `relay_sessions_total` (counter): sessions by outcome
//! - `relay_frames_total` (counter): frames forwarded by direction
//! - `relay_frames_dropped_total` (counter): frames dropped by reason
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Initialize the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record an HTTP request outcome.
pub fn record_request(method: &str, status: u16, route: &'static str, start: Instant) {
    let duration = start.elapsed().as_secs_f64();

    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route
    )
    .increment(1);

    histogram!("relay_request_duration_seconds", "route" => route).record(duration);
}

pub fn session_started() {
    gauge!("relay_sessions_active").increment(1.0);
}

pub fn session_finished(outcome: &'static str) {
    gauge!("relay_sessions_active").decrement(1.0);
    counter!("relay_sessions_total", "outcome" => outcome).increment(1);
}

pub fn session_rejected() {
    counter!("relay_sessions_total", "outcome" => "rejected").increment(1);
}

/// Direction of a forwarded frame.
#[derive(Debug, Clone, Copy)]
pub enum Direction {
    ClientToUpstream,
    UpstreamToClient,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::ClientToUpstream => "client_to_upstream",
            Direction::UpstreamToClient => "upstream_to_client",
        }
    }
}

pub fn frame_forwarded(direction: Direction) {
    counter!("relay_frames_total", "direction" => direction.as_str()).increment(1);
}

pub fn frame_dropped(reason: &'static str) {
    counter!("relay_frames_dropped_total", "reason" => reason).increment(1);
}
