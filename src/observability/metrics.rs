//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_requests_total` (counter): requests by method, status
//! - `registry_request_duration_seconds` (histogram): latency distribution
//! - `registry_rate_limited_total` (counter): admission rejections
//! - `registry_idempotent_replays_total` (counter): cached replies served
//! - `registry_idempotency_conflicts_total` (counter): duplicates hitting an in-flight key
//! - `registry_group_versions_created_total` (counter): new group versions by operation
//! - `registry_rate_limiter_clients` (gauge): tracked token buckets

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("registry_requests_total", &labels).increment(1);
    histogram!("registry_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    counter!("registry_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_idempotent_replay() {
    counter!("registry_idempotent_replays_total").increment(1);
}

pub fn record_idempotency_conflict() {
    counter!("registry_idempotency_conflicts_total").increment(1);
}

pub fn record_group_version(operation: &'static str) {
    counter!("registry_group_versions_created_total", "operation" => operation).increment(1);
}

pub fn record_tracked_clients(count: usize) {
    gauge!("registry_rate_limiter_clients").set(count as f64);
}
