//! Webcam session control and the realtime stream.

use axum::extract::State;
use axum::response::Response;
use axum::Json;
use tracing::info;

use firewatch_models::{StatusResponse, StopStatus};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::responses::mjpeg_response;
use crate::state::AppState;

/// Open the camera unless a session is running.
pub async fn start_webcam(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let realtime = state.realtime.clone();
    // Opening the device spawns the capture process.
    let status = tokio::task::spawn_blocking(move || realtime.start())
        .await
        .map_err(|e| ApiError::internal(format!("webcam start task failed: {}", e)))??;
    info!(status = status.message(), "Start webcam requested");
    Ok(Json(status.into()))
}

/// Stop the running session.
pub async fn stop_webcam(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.realtime.stop();
    info!(status = status.message(), "Stop webcam requested");
    Json(status.into())
}

/// Stream the annotated webcam feed.
pub async fn realtime_video_feed(State(state): State<AppState>) -> ApiResult<Response> {
    let rx = state
        .realtime
        .open_feed()
        .ok_or_else(|| ApiError::conflict(StopStatus::NotRunning.message()))?;
    metrics::record_stream_opened("realtime");
    Ok(mjpeg_response(rx))
}
