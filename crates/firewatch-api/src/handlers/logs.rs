//! Fire-log and video-log retrieval.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::error;

use firewatch_models::{FireLogRecord, VideoLogRecord};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `{"logs": [...]}`
#[derive(Debug, Serialize)]
pub struct LogsResponse<T> {
    pub logs: Vec<T>,
}

/// All fire logs, newest first, with normalized screenshot paths.
pub async fn get_fire_logs(
    State(state): State<AppState>,
) -> ApiResult<Json<LogsResponse<FireLogRecord>>> {
    let logs = state.stores.fire.list_fire_logs().await.map_err(|e| {
        error!("Failed to fetch fire logs: {}", e);
        ApiError::LogsUnavailable
    })?;
    Ok(Json(LogsResponse {
        logs: logs.into_iter().map(FireLogRecord::normalized).collect(),
    }))
}

/// All video logs, newest first, with normalized paths.
pub async fn get_video_logs(
    State(state): State<AppState>,
) -> ApiResult<Json<LogsResponse<VideoLogRecord>>> {
    let logs = state.stores.video.list_video_logs().await.map_err(|e| {
        error!("Failed to fetch video logs: {}", e);
        ApiError::LogsUnavailable
    })?;
    Ok(Json(LogsResponse {
        logs: logs.into_iter().map(VideoLogRecord::normalized).collect(),
    }))
}
