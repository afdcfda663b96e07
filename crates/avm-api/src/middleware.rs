//! API middleware.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderName, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::error::{ApiError, InternalErrorDetail};
use crate::metrics;

/// Tracked client IPs before stale entries are pruned.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Per-client-IP rate limiter.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClientRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Whether `ip` may make another request now.
    pub fn check(&self, ip: IpAddr) -> bool {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
        }
        self.limiter.check_key(&ip).is_ok()
    }
}

/// Create CORS layer.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers(Any)
            .allow_origin(Any)
            .max_age(std::time::Duration::from_secs(600));
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::ORIGIN, header::RANGE])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_TYPE,
            header::CONTENT_DISPOSITION,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
        ])
        .allow_origin(origins)
        .max_age(std::time::Duration::from_secs(600))
}

/// Security headers middleware.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    const HEADERS: [(&str, &str); 5] = [
        ("x-content-type-options", "nosniff"),
        ("x-frame-options", "DENY"),
        ("referrer-policy", "strict-origin-when-cross-origin"),
        ("strict-transport-security", "max-age=31536000; includeSubDomains"),
        ("x-permitted-cross-domain-policies", "none"),
    ];

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// Hide internal error details from clients; the full message is still logged.
pub async fn redact_internal_errors(request: Request<Body>, next: Next) -> Response<Body> {
    let response = next.run(request).await;
    if response.extensions().get::<InternalErrorDetail>().is_none() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    if let Ok(bytes) = axum::body::to_bytes(body, 64 * 1024).await {
        warn!(status = %parts.status, detail = %String::from_utf8_lossy(&bytes), "Internal error redacted");
    }
    parts.headers.remove(header::CONTENT_LENGTH);
    let body = serde_json::json!({ "detail": "An internal error occurred" }).to_string();
    Response::from_parts(parts, Body::from(body))
}

/// Request ID middleware.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());
    Span::current().record("request_id", request_id.as_str());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    // Pollers hit these constantly
    let quiet = uri.path() == "/health" || uri.path() == "/metrics" || uri.path().ends_with("/status");
    if !quiet {
        info!(
            method = %method,
            uri = %uri,
            status = %response.status(),
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
    }

    response
}

/// Per-IP rate limiting for the API routes.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<ClientRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = client_ip(&request) {
        if !limiter.check(ip) {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(request.uri().path());
            let mut response = ApiError::RateLimited.into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            return response;
        }
    }

    next.run(request).await
}

/// Client IP from proxy headers or the connection.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok());

    let real_ip = || {
        request
            .headers()
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    };

    let connection = || {
        request
            .extensions()
            .get::<ConnectInfo<std::net::SocketAddr>>()
            .map(|ci| ci.0.ip())
    };

    forwarded.or_else(real_ip).or_else(connection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_is_per_client() {
        let limiter = ClientRateLimiter::new(1);
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
    }

    #[test]
    fn test_client_ip_prefers_forwarded() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), Some("203.0.113.7".parse().unwrap()));

        let request = Request::builder()
            .header("x-real-ip", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&request), Some("198.51.100.2".parse().unwrap()));
    }

    async fn redacted_body(redact: bool) -> (u16, serde_json::Value) {
        use axum::routing::get;
        use tower::ServiceExt;

        let router = axum::Router::new().route(
            "/boom",
            get(|| async { Err::<(), _>(ApiError::internal("open /var/lib/avm/jobs.json: permission denied")) }),
        );
        let router = if redact {
            router.layer(axum::middleware::from_fn(redact_internal_errors))
        } else {
            router
        };

        let response = router
            .oneshot(Request::get("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_internal_errors_redacted_only_when_enabled() {
        let (status, body) = redacted_body(true).await;
        assert_eq!(status, 500);
        assert_eq!(body["detail"], "An internal error occurred");

        let (status, body) = redacted_body(false).await;
        assert_eq!(status, 500);
        assert!(body["detail"].as_str().unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn test_other_errors_pass_through_redaction() {
        use axum::routing::get;
        use tower::ServiceExt;

        let router = axum::Router::new()
            .route("/missing", get(|| async { Err::<(), _>(ApiError::video_not_found()) }))
            .layer(axum::middleware::from_fn(redact_internal_errors));
        let response = router
            .oneshot(Request::get("/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 404);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap()["detail"], "Video not found");
    }
}
