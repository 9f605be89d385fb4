//! JPEG encoding and multipart stream framing.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Multipart boundary used by every stream endpoint.
pub const MJPEG_BOUNDARY: &str = "frame";

/// Response content type for boundary-delimited JPEG streams.
pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Quality used for stream parts and screenshots.
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encode a frame as JPEG.
pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode(frame.as_raw(), frame.width(), frame.height(), ExtendedColorType::Rgb8)
        .map_err(|e| MediaError::Encode(e.to_string()))?;
    Ok(buf)
}

/// Wrap one JPEG as a stream part: `--frame`, content type, blank line, bytes, CRLF.
pub fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{}\r\nContent-Type: image/jpeg\r\n\r\n", MJPEG_BOUNDARY);
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Encode and frame in one step.
pub fn encode_part(frame: &RgbImage) -> MediaResult<Vec<u8>> {
    encode_jpeg(frame, DEFAULT_JPEG_QUALITY).map(|jpeg| multipart_part(&jpeg))
}
