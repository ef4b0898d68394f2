//! Axum middleware recording request latency and count for every route
//! served by `pai-server`.

use axum::{body::Body, middleware::Next, response::Response};
use std::sync::OnceLock;
use std::time::Instant;

use super::metrics::METRICS;

/// Normalize a path for metrics labels (replace UUIDs and numeric ids with
/// placeholders) to avoid high-cardinality labels in Prometheus.
fn normalize_path(path: &str) -> String {
    static UUID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();
    static ID_REGEX: OnceLock<Result<regex::Regex, regex::Error>> = OnceLock::new();

    let uuid_regex = UUID_REGEX.get_or_init(|| {
        regex::Regex::new(
            r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        )
    });
    let id_regex = ID_REGEX.get_or_init(|| regex::Regex::new(r"/\d+(/|$)"));

    let mut result = path.to_string();
    match uuid_regex {
        Ok(regex) => result = regex.replace_all(&result, "{id}").to_string(),
        Err(err) => tracing::error!(error = %err, "failed to compile UUID regex"),
    }
    match id_regex {
        Ok(regex) => result = regex.replace_all(&result, "/{id}$1").to_string(),
        Err(err) => tracing::error!(error = %err, "failed to compile numeric ID regex"),
    }
    result
}

/// Records one `pai_http_requests_total`/`pai_http_request_duration_seconds`
/// observation per request and logs completion.
pub async fn observability_middleware(request: axum::http::Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let normalized_path = normalize_path(&path);

    let span = tracing::info_span!(
        "http_request",
        http.method = %method,
        http.route = %normalized_path,
    );
    let _guard = span.enter();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_http_request(method.as_str(), &normalized_path, status.as_u16(), duration.as_secs_f64());
    } else {
        tracing::error!("metrics registry unavailable; skipping HTTP request metrics");
    }

    tracing::info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = duration.as_millis(),
        "request completed"
    );

    response
}
