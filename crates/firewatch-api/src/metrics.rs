//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::LazyLock;
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "firewatch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "firewatch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "firewatch_http_requests_in_flight";

    // Stream metrics
    pub const STREAMS_OPENED_TOTAL: &str = "firewatch_streams_opened_total";

    // Upload metrics
    pub const UPLOADS_TOTAL: &str = "firewatch_uploads_total";
    pub const UPLOAD_BYTES_TOTAL: &str = "firewatch_upload_bytes_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "firewatch_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stream response handed to a client.
pub fn record_stream_opened(pipeline: &str) {
    let labels = [("pipeline", pipeline.to_string())];
    counter!(names::STREAMS_OPENED_TOTAL, &labels).increment(1);
}

/// Record an upload attempt.
pub fn record_upload(outcome: &str, bytes: u64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::UPLOADS_TOTAL, &labels).increment(1);
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

// SAFETY: compile-time constant pattern.
static UUID_PATTERN: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("valid job id pattern")
});

/// Prefixes whose remainder is a file name or path.
const FILE_ROUTES: [&str; 4] = [
    "/images/",
    "/vod_past_video_feed/",
    "/download_past_video/",
    "/download_past_log/",
];

/// Sanitize path for metrics labels (remove IDs, file names).
fn sanitize_path(path: &str) -> String {
    for prefix in FILE_ROUTES {
        if path.starts_with(prefix) {
            return format!("{}:path", prefix);
        }
    }
    UUID_PATTERN.replace_all(path, ":job_id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/vod_video_feed/550e8400-e29b-41d4-a716-446655440000"),
            "/vod_video_feed/:job_id"
        );
        assert_eq!(
            sanitize_path("/images/fire_2024-05-01_12-00-00.jpg"),
            "/images/:path"
        );
        assert_eq!(sanitize_path("/get_fire_logs"), "/get_fire_logs");
    }
}
