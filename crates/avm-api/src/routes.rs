//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::health;
use crate::handlers::videos::{create_video, download_video, get_status, list_videos, stream_video};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, redact_internal_errors, request_id, request_logging, security_headers,
    ClientRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/create", post(create_video))
        .route("/videos/:video_id/status", get(get_status))
        .route("/videos/:video_id/stream", get(stream_video))
        .route("/videos/:video_id/download", get(download_video));

    let rate_limiter = Arc::new(ClientRateLimiter::new(state.config.rate_limit_rps));

    let api_routes = video_routes.layer(middleware::from_fn_with_state(
        rate_limiter,
        rate_limit_middleware,
    ));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    let router = Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes);

    let router = if state.config.is_production() {
        router.layer(middleware::from_fn(redact_internal_errors))
    } else {
        router
    };

    router
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
