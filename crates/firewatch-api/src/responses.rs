//! Stream, file and plain-message responses.

use std::convert::Infallible;
use std::path::Path;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::warn;

use firewatch_media::MJPEG_CONTENT_TYPE;

/// Read size for file bodies.
const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// Multipart JPEG stream fed by a pipeline worker. Dropping the body closes
/// the channel, which stops the worker at its next send.
pub fn mjpeg_response(rx: mpsc::Receiver<Vec<u8>>) -> Response {
    let parts = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|part| (Ok::<_, Infallible>(part), rx))
    });

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(MJPEG_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

/// Plain-text 404 for an absent resource.
pub fn not_found_message(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

/// Content type from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "csv" => "text/csv",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// Stream a file from disk. With `attachment`, the response carries a
/// download file name. Returns `None` when the file cannot be opened.
pub async fn file_response(path: &Path, attachment: bool) -> Option<Response> {
    let file = match File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), "Cannot open file for serving: {}", e);
            return None;
        }
    };
    let length = file.metadata().await.ok().map(|m| m.len());

    let chunks = stream::unfold(Some(file), |state| async move {
        let mut file = state?;
        let mut buf = vec![0u8; FILE_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(buf), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    });

    let mut response = Body::from_stream(chunks).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(path)),
    );
    if let Some(length) = length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }
    if attachment {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().replace('"', ""))
            .unwrap_or_else(|| "download".to_string());
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }
    Some(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a/processed_x.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("log.csv")), "text/csv");
        assert_eq!(content_type_for(Path::new("fire.jpg")), "image/jpeg");
        assert_eq!(
            content_type_for(Path::new("noext")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        assert!(file_response(Path::new("/nonexistent/x.mp4"), true)
            .await
            .is_none());
    }
}
