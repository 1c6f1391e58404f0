//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): proxied requests by method, status
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_guardrail_rejections_total` (counter): rejections by reason
//! - `proxy_upstream_failures_total` (counter): origin failures by kind
//! - `proxy_exchange_persist_failures_total` (counter): failed record writes
//! - `proxy_rate_limiter_clients` (gauge): tracked client IPs after a sweep
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_guardrail_rejection(reason: &'static str) {
    ::metrics::counter!("proxy_guardrail_rejections_total", "reason" => reason).increment(1);
}

pub fn record_upstream_failure(kind: &'static str) {
    ::metrics::counter!("proxy_upstream_failures_total", "kind" => kind).increment(1);
}

pub fn record_persist_failure() {
    ::metrics::counter!("proxy_exchange_persist_failures_total").increment(1);
}

pub fn record_rate_limiter_clients(count: usize) {
    ::metrics::gauge!("proxy_rate_limiter_clients").set(count as f64);
}
