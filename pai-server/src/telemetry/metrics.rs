//! Prometheus Metrics Definitions (spec.md §4.14 ambient stack)
//!
//! Defines the metrics a deployed PAI workspace exposes for Prometheus
//! scraping: active task count, per-tool call outcomes, memory dedup
//! skips, agent heartbeat freshness, and cold-archive throughput. Exposed
//! on `/metrics` by the optional `pai-server` binary only.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup.
pub static METRICS: Lazy<ApiResult<PaiMetrics>> = Lazy::new(PaiMetrics::new);

/// Container for every PAI workspace metric.
#[derive(Clone)]
pub struct PaiMetrics {
    /// HTTP request counter on pai-server's own surface - labels: method, path, status
    pub http_requests_total: CounterVec,
    /// HTTP request duration histogram - labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Currently-running tasks across all agent instances (spec.md §4.4)
    pub active_tasks: Gauge,

    /// Tool call outcomes - labels: tool, status (ok/error/blocked)
    pub tool_calls_total: CounterVec,

    /// Learnings skipped by the dedup gate before reaching the vector store
    /// (spec.md §4.7 "dedup gate")
    pub deduplicate_skipped_total: prometheus::Counter,

    /// Seconds since the most recently received agent heartbeat
    /// (spec.md §4.4 "heartbeat")
    pub heartbeat_age_seconds: Gauge,

    /// Cold-archive sweep outcomes - labels: outcome (archived/cleaned/failed)
    /// (spec.md §4.8 "archive sweep")
    pub archive_operations_total: CounterVec,
}

impl PaiMetrics {
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "pai_http_requests_total",
                "Total number of HTTP requests handled by pai-server",
                &["method", "path", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register http_requests_total: {e}")))?,

            http_request_duration_seconds: register_histogram_vec!(
                "pai_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register http_request_duration_seconds: {e}"))
            })?,

            active_tasks: register_gauge!(
                "pai_active_tasks",
                "Current number of tasks being processed across all agent instances"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register active_tasks: {e}")))?,

            tool_calls_total: register_counter_vec!(
                "pai_tool_calls_total",
                "Total tool invocations by outcome",
                &["tool", "status"]
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register tool_calls_total: {e}")))?,

            deduplicate_skipped_total: prometheus::register_counter!(
                "pai_deduplicate_skipped_total",
                "Total learnings rejected by the dedup gate before promotion"
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register deduplicate_skipped_total: {e}"))
            })?,

            heartbeat_age_seconds: register_gauge!(
                "pai_heartbeat_age_seconds",
                "Seconds since the most recent agent heartbeat was observed"
            )
            .map_err(|e| ApiError::internal_error(format!("Failed to register heartbeat_age_seconds: {e}")))?,

            archive_operations_total: register_counter_vec!(
                "pai_archive_operations_total",
                "Total cold-archive sweep operations by outcome",
                &["outcome"]
            )
            .map_err(|e| {
                ApiError::internal_error(format!("Failed to register archive_operations_total: {e}"))
            })?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn set_active_tasks(&self, count: i64) {
        self.active_tasks.set(count as f64);
    }

    pub fn record_tool_call(&self, tool: &str, status: &str) {
        self.tool_calls_total.with_label_values(&[tool, status]).inc();
    }

    pub fn record_deduplicate_skipped(&self) {
        self.deduplicate_skipped_total.inc();
    }

    pub fn set_heartbeat_age(&self, seconds: f64) {
        self.heartbeat_age_seconds.set(seconds);
    }

    pub fn record_archive_operation(&self, outcome: &str) {
        self.archive_operations_total.with_label_values(&[outcome]).inc();
    }
}

impl Default for PaiMetrics {
    fn default() -> Self {
        Self::new().expect("metrics registration must succeed")
    }
}

/// Handler for `GET /metrics`. Returns Prometheus text format.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("Metrics init failed: {}", e.message))?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_tool_call() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_tool_call("search_learnings", "ok");
        metrics.record_tool_call("write_file", "blocked");
        Ok(())
    }

    #[test]
    fn test_deduplicate_and_archive_metrics() -> Result<(), String> {
        let metrics = METRICS.as_ref().map_err(|e| format!("Metrics init failed: {}", e.message))?;
        metrics.record_deduplicate_skipped();
        metrics.record_archive_operation("archived");
        metrics.set_heartbeat_age(2.5);
        metrics.set_active_tasks(3);
        Ok(())
    }
}
