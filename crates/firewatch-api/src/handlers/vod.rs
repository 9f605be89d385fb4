//! Upload, VOD streaming, downloads and past-video replay.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path as UrlPath, State};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use firewatch_models::JobId;
use firewatch_pipeline::uploads::{replay_paths, resolve_past_path, MSG_NO_FILE_PART};
use firewatch_pipeline::{StagedUpload, VodJob};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::responses::{file_response, mjpeg_response, not_found_message};
use crate::state::AppState;

pub const MSG_NO_VIDEO_UPLOADED: &str = "No video uploaded yet.";
pub const MSG_NO_PROCESSED_VIDEO: &str = "No processed video available for download.";
pub const MSG_NO_DETECTION_LOG: &str = "No detection log available for download.";
pub const MSG_VIDEO_NOT_FOUND: &str = "Video not found";
pub const MSG_LOG_NOT_FOUND: &str = "Detection log not found";

/// Multipart field carrying the video.
const UPLOAD_FIELD: &str = "file";

/// Successful upload body.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub job_id: String,
}

/// Accept a video upload and stage its derived paths.
pub async fn upload_vod(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let staged = match state.uploads.stage(&original_name) {
            Ok(staged) => staged,
            Err(e) => {
                metrics::record_upload("rejected", 0);
                return Err(e.into());
            }
        };

        let bytes = match write_field(&mut field, &staged.upload_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&staged.upload_path).await {
                    warn!(path = %staged.upload_path.display(), "Partial upload not removed: {}", remove_err);
                }
                metrics::record_upload("failed", 0);
                return Err(e);
            }
        };

        info!(
            job_id = %staged.job_id,
            original_name = %staged.original_name,
            path = %staged.upload_path.display(),
            bytes,
            "Video uploaded"
        );
        metrics::record_upload("accepted", bytes);

        let job_id = staged.job_id.to_string();
        state.uploads.commit(staged);

        return Ok(Json(UploadResponse {
            status: "success",
            message: "File uploaded successfully",
            job_id,
        }));
    }

    metrics::record_upload("rejected", 0);
    Err(ApiError::bad_request(MSG_NO_FILE_PART))
}

async fn write_field(field: &mut Field<'_>, path: &Path) -> ApiResult<u64> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::internal(format!("cannot create upload folder: {}", e)))?;
    }
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("cannot create upload file: {}", e)))?;

    let mut written = 0u64;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("cannot write upload: {}", e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("cannot write upload: {}", e)))?;
    Ok(written)
}

fn lookup(state: &AppState, job_id: &str) -> ApiResult<StagedUpload> {
    state
        .uploads
        .get(&JobId::from_string(job_id))
        .ok_or_else(|| ApiError::not_found(format!("Unknown job {}", job_id)))
}

async fn stream_upload(state: &AppState, upload: &StagedUpload) -> ApiResult<Response> {
    let rx = state.vod.start(VodJob::for_upload(upload)).await?;
    metrics::record_stream_opened("vod");
    Ok(mjpeg_response(rx))
}

/// Stream the most recent upload through the detector.
pub async fn vod_video_feed(State(state): State<AppState>) -> ApiResult<Response> {
    match state.uploads.latest() {
        Some(upload) => stream_upload(&state, &upload).await,
        None => Ok(not_found_message(MSG_NO_VIDEO_UPLOADED)),
    }
}

/// Stream a specific upload through the detector.
pub async fn vod_video_feed_for_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Response> {
    let upload = lookup(&state, &job_id)?;
    stream_upload(&state, &upload).await
}

async fn download_existing(path: Option<PathBuf>, missing: &'static str) -> Response {
    match path.filter(|p| p.is_file()) {
        Some(path) => match file_response(&path, true).await {
            Some(response) => response,
            None => not_found_message(missing),
        },
        None => not_found_message(missing),
    }
}

/// Download the most recent annotated video.
pub async fn download_processed_video(State(state): State<AppState>) -> Response {
    let path = state.uploads.latest().map(|u| u.processed_path);
    download_existing(path, MSG_NO_PROCESSED_VIDEO).await
}

/// Download the annotated video of a specific upload.
pub async fn download_processed_video_for_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Response> {
    let upload = lookup(&state, &job_id)?;
    Ok(download_existing(Some(upload.processed_path), MSG_NO_PROCESSED_VIDEO).await)
}

/// Download the most recent detection log.
pub async fn download_detection_log(State(state): State<AppState>) -> Response {
    let path = state.uploads.latest().map(|u| u.log_path);
    download_existing(path, MSG_NO_DETECTION_LOG).await
}

/// Download the detection log of a specific upload.
pub async fn download_detection_log_for_job(
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Response> {
    let upload = lookup(&state, &job_id)?;
    Ok(download_existing(Some(upload.log_path), MSG_NO_DETECTION_LOG).await)
}

fn past_path(state: &AppState, relative: &str) -> Option<PathBuf> {
    resolve_past_path(&state.pipeline.data_root, relative).filter(|p| p.is_file())
}

/// Re-run a past video through the detector into fresh outputs.
pub async fn vod_past_video_feed(
    State(state): State<AppState>,
    UrlPath(video_path): UrlPath<String>,
) -> ApiResult<Response> {
    let Some(input) = past_path(&state, &video_path) else {
        return Ok(not_found_message(MSG_VIDEO_NOT_FOUND));
    };

    let (output, log) = replay_paths(&state.pipeline.processed_folder, &input);
    let rx = state.vod.start(VodJob::replay(input, output, log)).await?;
    metrics::record_stream_opened("vod_replay");
    Ok(mjpeg_response(rx))
}

/// Download a past annotated video.
pub async fn download_past_video(
    State(state): State<AppState>,
    UrlPath(video_path): UrlPath<String>,
) -> Response {
    download_existing(past_path(&state, &video_path), MSG_VIDEO_NOT_FOUND).await
}

/// Download a past detection log.
pub async fn download_past_log(
    State(state): State<AppState>,
    UrlPath(log_path): UrlPath<String>,
) -> Response {
    download_existing(past_path(&state, &log_path), MSG_LOG_NOT_FOUND).await
}
