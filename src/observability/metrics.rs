//! Metrics collection and exposition.
//!
//! # Metrics
//! - `outfitter_requests_total` (counter): requests by method, status
//! - `outfitter_request_duration_seconds` (histogram): latency distribution
//! - `outfitter_rate_limited_total` (counter): 429 rejections
//!
//! # Design Decisions
//! - The `metrics` facade is always recorded into; without an installed
//!   exporter the calls are no-ops, so the pipeline never branches on
//!   whether metrics are enabled

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record one completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "outfitter_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!("outfitter_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// Record one rate-limit rejection.
pub fn record_rate_limited() {
    counter!("outfitter_rate_limited_total").increment(1);
}
