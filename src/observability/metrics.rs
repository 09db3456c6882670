//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_proxy_requests_total` (counter): requests by route, outcome, status
//! - `dev_proxy_request_duration_seconds` (histogram): latency by route, outcome
//! - `dev_proxy_errors_total` (counter): failed requests by route, error kind
//! - `dev_proxy_tunnels_active` (gauge): open WebSocket tunnels by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - `route` is the matched prefix, or `local` for unmatched requests

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Route label used for locally served requests.
pub const LOCAL_ROUTE: &str = "local";

/// How a request was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Forwarded,
    Tunneled,
    Local,
    Rejected,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Forwarded => "forwarded",
            Outcome::Tunneled => "tunneled",
            Outcome::Local => "local",
            Outcome::Rejected => "rejected",
        }
    }
}

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, outcome: Outcome, status: u16, start: Instant) {
    metrics::counter!(
        "dev_proxy_requests_total",
        "route" => route.to_string(),
        "outcome" => outcome.as_str(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "dev_proxy_request_duration_seconds",
        "route" => route.to_string(),
        "outcome" => outcome.as_str()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_error(route: &str, kind: &'static str) {
    metrics::counter!(
        "dev_proxy_errors_total",
        "route" => route.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn tunnel_opened(route: &str) {
    metrics::gauge!("dev_proxy_tunnels_active", "route" => route.to_string()).increment(1.0);
}

pub fn tunnel_closed(route: &str) {
    metrics::gauge!("dev_proxy_tunnels_active", "route" => route.to_string()).decrement(1.0);
}
