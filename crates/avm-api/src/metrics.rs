//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return the handle that renders it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "avm_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "avm_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "avm_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "avm_rate_limit_hits_total";
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

pub fn record_rate_limit_hit(path: &str) {
    let labels = [("path", sanitize_path(path))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Collapse job ids in a path so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let mut previous = "";
    path.split('/')
        .map(|segment| {
            let replaced = if previous == "videos" && !segment.is_empty() && segment != "create" {
                ":video_id"
            } else if is_id(segment) {
                ":id"
            } else {
                segment
            };
            previous = segment;
            replaced
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_id(segment: &str) -> bool {
    let all_digits = !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit());
    let uuid_like = segment.len() == 36
        && segment.bytes().filter(|b| *b == b'-').count() == 4
        && segment.bytes().all(|b| b == b'-' || b.is_ascii_hexdigit());
    all_digits || uuid_like
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/videos/550e8400-e29b-41d4-a716-446655440000/status"),
            "/api/videos/:video_id/status"
        );
        assert_eq!(sanitize_path("/api/videos/create"), "/api/videos/create");
        assert_eq!(sanitize_path("/api/videos"), "/api/videos");
        assert_eq!(sanitize_path("/jobs/42"), "/jobs/:id");
    }
}
