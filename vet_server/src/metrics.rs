//! Prometheus metrics for API observability.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// Initialize metrics exporter (Prometheus) on its own listener.
pub fn init_metrics(port: u16) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)));
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a successful dataset load.
pub fn dataset_refreshed(rows: usize, elapsed: Duration) {
    counter!("vet_dataset_refreshes_total").increment(1);
    gauge!("vet_dataset_rows").set(rows as f64);
    histogram!("vet_dataset_load_ms").record(elapsed.as_millis() as f64);
}

/// Record a failed dataset load.
pub fn dataset_refresh_failed(source: &str) {
    counter!("vet_dataset_refresh_failures_total", "source" => source.to_string()).increment(1);
}

/// Record a request served from the cached dataset.
pub fn cache_hit() {
    counter!("vet_dataset_cache_hits_total").increment(1);
}

/// Record analytics computation time per endpoint.
pub fn analytics_duration(endpoint: &str, elapsed: Duration) {
    histogram!("vet_analytics_duration_ms", "endpoint" => endpoint.to_string())
        .record(elapsed.as_millis() as f64);
}

/// Record the outcome of one golden dataset check.
pub fn golden_check(check: &str, passed: bool) {
    let status = if passed { "pass" } else { "fail" };
    counter!("vet_golden_checks_total", "check" => check.to_string(), "status" => status)
        .increment(1);
}
