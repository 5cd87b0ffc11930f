//! Metrics collection and exposition.
//!
//! # Metrics
//! - `registry_instances` (gauge): live instances in the registry
//! - `registry_operations_total` (counter): register/unregister/get by op
//! - `circuit_transitions_total` (counter): breaker transitions by endpoint, state
//! - `upstream_calls_total` (counter): breaker-gated calls by endpoint, outcome
//! - `upstream_call_duration_seconds` (histogram): attempted call latency
//! - `cache_fallbacks_total` (counter): fallback reads by cache tier, hit/miss
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_registry_size(size: usize) {
    metrics::gauge!("registry_instances").set(size as f64);
}

pub fn record_registry_operation(op: &'static str) {
    metrics::counter!("registry_operations_total", "op" => op).increment(1);
}

pub fn record_circuit_transition(endpoint: &str, state: &'static str) {
    metrics::counter!(
        "circuit_transitions_total",
        "endpoint" => endpoint.to_string(),
        "state" => state
    )
    .increment(1);
}

/// `start` is `None` for calls the breaker denied.
pub fn record_upstream_call(endpoint: &str, outcome: &'static str, start: Option<Instant>) {
    metrics::counter!(
        "upstream_calls_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    if let Some(start) = start {
        metrics::histogram!("upstream_call_duration_seconds", "endpoint" => endpoint.to_string())
            .record(start.elapsed().as_secs_f64());
    }
}

pub fn record_cache_fallback(tier: &'static str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("cache_fallbacks_total", "tier" => tier, "result" => result).increment(1);
}
