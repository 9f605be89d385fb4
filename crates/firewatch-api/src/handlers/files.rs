//! Fire screenshot serving.

use axum::extract::{Path, State};
use axum::response::Response;

use firewatch_pipeline::uploads::sanitize_filename;

use crate::responses::{file_response, not_found_message};
use crate::state::AppState;

pub const MSG_IMAGE_NOT_FOUND: &str = "Image not found";

/// Serve a saved screenshot by bare file name.
pub async fn serve_image(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    // Only plain names that survive sanitizing are served.
    if filename.is_empty() || sanitize_filename(&filename) != filename {
        return not_found_message(MSG_IMAGE_NOT_FOUND);
    }

    let path = state.pipeline.fire_image_folder.join(&filename);
    if !path.is_file() {
        return not_found_message(MSG_IMAGE_NOT_FOUND);
    }
    match file_response(&path, false).await {
        Some(response) => response,
        None => not_found_message(MSG_IMAGE_NOT_FOUND),
    }
}
