// Metrics module for observability
// Registers metric descriptions and installs the Prometheus recorder

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and describe every metric.
/// Should be called once at application startup
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    // Lock metrics (emitted by kvlock-core)
    describe_counter!(
        "lock_acquire_total",
        "Lock acquisitions by outcome (acquired, timed_out, cancelled, unavailable, error)"
    );
    describe_counter!(
        "lock_store_errors_total",
        "Store errors observed while acquiring or releasing a lock"
    );
    describe_counter!(
        "lock_release_total",
        "Lock releases by result (released, not_owner, error)"
    );
    describe_histogram!(
        "lock_wait_seconds",
        "Time spent waiting for a lock in seconds"
    );

    // HTTP request metrics
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests received"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    // Cache metrics
    describe_counter!("cache_hits_total", "Total number of cache hits");
    describe_counter!("cache_misses_total", "Total number of cache misses");

    // Store connection
    describe_gauge!(
        "redis_connection_up",
        "1 when the last Redis health probe succeeded, 0 otherwise"
    );

    tracing::info!("Metrics initialized");
    Ok(handle)
}

/// Record an HTTP request
pub fn record_http_request(path: &str, status: u16, duration_secs: f64) {
    counter!("http_requests_total", "path" => path.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!("http_request_duration_seconds", "path" => path.to_string()).record(duration_secs);
}

/// Record a cache hit
pub fn record_cache_hit(tier: &str) {
    counter!("cache_hits_total", "tier" => tier.to_string()).increment(1);
}

/// Record a cache miss
pub fn record_cache_miss(tier: &str) {
    counter!("cache_misses_total", "tier" => tier.to_string()).increment(1);
}

/// Update the store connection gauge
pub fn set_redis_connection_up(up: bool) {
    gauge!("redis_connection_up").set(if up { 1.0 } else { 0.0 });
}
