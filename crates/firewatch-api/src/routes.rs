//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    download_detection_log, download_detection_log_for_job, download_past_log,
    download_past_video, download_processed_video, download_processed_video_for_job,
    get_fire_logs, get_video_logs, health, index, ready, realtime_video_feed, serve_image,
    start_webcam, stop_webcam, upload_vod, vod_past_video_feed, vod_video_feed,
    vod_video_feed_for_job,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Session control and uploads are rate-limited per client IP
    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));
    let control_routes = Router::new()
        .route("/start_webcam", post(start_webcam))
        .route("/stop_webcam", post(stop_webcam))
        .route("/upload_vod", post(upload_vod))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let stream_routes = Router::new()
        .route("/realtime_video_feed", get(realtime_video_feed))
        .route("/vod_video_feed", get(vod_video_feed))
        .route("/vod_video_feed/:job_id", get(vod_video_feed_for_job))
        .route("/vod_past_video_feed/*path", get(vod_past_video_feed));

    let download_routes = Router::new()
        .route("/download_processed_video", get(download_processed_video))
        .route(
            "/download_processed_video/:job_id",
            get(download_processed_video_for_job),
        )
        .route("/download_detection_log", get(download_detection_log))
        .route(
            "/download_detection_log/:job_id",
            get(download_detection_log_for_job),
        )
        .route("/download_past_video/*path", get(download_past_video))
        .route("/download_past_log/*path", get(download_past_log))
        .route("/images/*filename", get(serve_image));

    let log_routes = Router::new()
        .route("/get_fire_logs", get(get_fire_logs))
        .route("/get_video_logs", get(get_video_logs));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .route("/", get(index))
        .merge(control_routes)
        .merge(stream_routes)
        .merge(download_routes)
        .merge(log_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        // Uploads are bounded by the configured size instead of the 2 MB extractor default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
