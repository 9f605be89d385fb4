//! Media collaborators for the fire detection service.
//!
//! This crate provides:
//! - Camera capture and file decode as raw RGB frames through FFmpeg pipes
//! - Annotated video encoding through FFmpeg
//! - FFprobe stream inspection
//! - YOLOv8 fire/smoke inference on ONNX Runtime
//! - Frame annotation, JPEG encoding and multipart stream framing

pub mod annotate;
pub mod backend;
pub mod command;
pub mod detection;
pub mod error;
pub mod mjpeg;
pub mod probe;
pub mod sink;
pub mod source;

pub use backend::{FfmpegBackend, VideoBackend};
pub use command::FfmpegCommand;
pub use detection::{
    DetectedFrame, DetectionStream, Detector, InferenceParams, YoloFireDetector,
    YoloFireDetectorConfig,
};
pub use error::{MediaError, MediaResult};
pub use mjpeg::{encode_jpeg, encode_part, multipart_part, MJPEG_BOUNDARY, MJPEG_CONTENT_TYPE};
pub use probe::{probe_video, VideoInfo};
pub use sink::{FfmpegVideoWriter, VideoSink};
pub use source::{CameraConfig, FfmpegFrameSource, FrameSource};
