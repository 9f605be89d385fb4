//! Video I/O seam used by the pipelines.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::error::MediaResult;
use crate::probe::probe_video;
use crate::sink::{FfmpegVideoWriter, VideoSink};
use crate::source::{CameraConfig, FfmpegFrameSource, FrameSource};

/// Opens frame sources and video writers.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Open the local capture device.
    fn open_camera(&self) -> MediaResult<Box<dyn FrameSource>>;

    /// Open a video file for decoding.
    async fn open_file(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>>;

    /// Create an annotated-video writer.
    fn create_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> MediaResult<Box<dyn VideoSink>>;
}

/// [`VideoBackend`] backed by the FFmpeg and FFprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    camera: CameraConfig,
}

impl FfmpegBackend {
    pub fn new(camera: CameraConfig) -> Self {
        Self { camera }
    }

    pub fn from_env() -> Self {
        Self::new(CameraConfig::from_env())
    }
}

#[async_trait]
impl VideoBackend for FfmpegBackend {
    fn open_camera(&self) -> MediaResult<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegFrameSource::open_camera(&self.camera)?))
    }

    async fn open_file(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        let info = probe_video(path).await?;
        info!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            rotation = info.rotation,
            fps = info.fps,
            codec = %info.codec,
            "Opening video"
        );
        Ok(Box::new(FfmpegFrameSource::open_file(path, &info)?))
    }

    fn create_writer(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> MediaResult<Box<dyn VideoSink>> {
        Ok(Box::new(FfmpegVideoWriter::create(path, width, height, fps)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;

    #[tokio::test]
    async fn test_open_missing_file() {
        let backend = FfmpegBackend::default();
        let result = backend.open_file(Path::new("/no/such/clip.mp4")).await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
