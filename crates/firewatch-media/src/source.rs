//! Frame sources: webcam capture and file decode through FFmpeg pipes.

use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Stdio};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, PIPE};
use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

/// A pull-based supplier of RGB frames.
///
/// `read_frame` returns `Ok(None)` at end of stream. `release` frees the
/// underlying device or process and must be safe to call more than once.
pub trait FrameSource: Send {
    /// Read the next frame.
    fn read_frame(&mut self) -> MediaResult<Option<RgbImage>>;

    /// Whether the source can still produce frames.
    fn is_open(&self) -> bool;

    /// Nominal frame rate of the source.
    fn fps(&self) -> f64;

    /// Frame geometry (width, height).
    fn dimensions(&self) -> (u32, u32);

    /// Release the underlying device.
    fn release(&mut self);
}

/// Capture device settings.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Device path or index understood by the input format
    pub device: String,
    /// FFmpeg input device (v4l2, avfoundation, dshow)
    pub input_format: String,
    /// Requested capture width
    pub width: u32,
    /// Requested capture height
    pub height: u32,
    /// Requested capture rate
    pub fps: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: default_camera_device().to_string(),
            input_format: default_camera_format().to_string(),
            width: 640,
            height: 480,
            fps: 30.0,
        }
    }
}

impl CameraConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            device: std::env::var("CAMERA_DEVICE").unwrap_or(defaults.device),
            input_format: std::env::var("CAMERA_INPUT_FORMAT").unwrap_or(defaults.input_format),
            ..defaults
        }
    }
}

fn default_camera_device() -> &'static str {
    if cfg!(target_os = "linux") {
        "/dev/video0"
    } else if cfg!(target_os = "windows") {
        "video=0"
    } else {
        "0"
    }
}

fn default_camera_format() -> &'static str {
    if cfg!(target_os = "linux") {
        "v4l2"
    } else if cfg!(target_os = "windows") {
        "dshow"
    } else {
        "avfoundation"
    }
}

/// Frames decoded by an FFmpeg child process writing `rgb24` to stdout.
pub struct FfmpegFrameSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    fps: f64,
    label: String,
}

impl FfmpegFrameSource {
    /// Spawn the decode command. The command must emit `width`x`height` rgb24 frames.
    pub fn spawn(
        command: &FfmpegCommand,
        width: u32,
        height: u32,
        fps: f64,
        label: impl Into<String>,
    ) -> MediaResult<Self> {
        let label = label.into();
        let mut child = command
            .to_command(Stdio::null(), Stdio::piped())?
            .spawn()
            .map_err(|e| MediaError::source_unavailable(format!("{}: {}", label, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;

        debug!(source = %label, width, height, fps, "Frame source opened");

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            width,
            height,
            fps,
            label,
        })
    }

    /// Open the local capture device.
    pub fn open_camera(config: &CameraConfig) -> MediaResult<Self> {
        if config.input_format == "v4l2" && !Path::new(&config.device).exists() {
            return Err(MediaError::CameraUnavailable(format!(
                "device {} does not exist",
                config.device
            )));
        }

        let command = FfmpegCommand::new(&config.device, PIPE)
            .input_format(&config.input_format)
            .input_arg("-framerate")
            .input_arg(format!("{}", config.fps))
            .input_arg("-video_size")
            .input_arg(format!("{}x{}", config.width, config.height))
            .video_filter(format!("scale={}:{}", config.width, config.height))
            .raw_rgb_output()
            .no_audio();

        let source = Self::spawn(
            &command,
            config.width,
            config.height,
            config.fps,
            format!("camera:{}", config.device),
        )
        .map_err(|e| match e {
            MediaError::SourceUnavailable(msg) => MediaError::CameraUnavailable(msg),
            other => other,
        })?;

        info!(device = %config.device, format = %config.input_format, "Camera opened");
        Ok(source)
    }

    /// Open a video file for decoding.
    pub fn open_file(path: &Path, info: &VideoInfo) -> MediaResult<Self> {
        let command = FfmpegCommand::new(path, PIPE).raw_rgb_output().no_audio();
        Self::spawn(
            &command,
            info.width,
            info.height,
            info.fps,
            path.display().to_string(),
        )
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut buf = vec![0u8; frame_len];
        if !read_full(stdout, &mut buf)? {
            debug!(source = %self.label, "End of stream");
            self.release();
            return Ok(None);
        }

        RgbImage::from_raw(self.width, self.height, buf)
            .map(Some)
            .ok_or_else(|| MediaError::internal("Frame buffer size mismatch"))
    }

    fn is_open(&self) -> bool {
        self.stdout.is_some()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn release(&mut self) {
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                // Already exited is the common case at end of file
                if e.kind() != ErrorKind::InvalidInput {
                    warn!(source = %self.label, "Failed to stop FFmpeg: {}", e);
                }
            }
            let _ = child.wait();
            debug!(source = %self.label, "Frame source released");
        }
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Fill `buf` completely. Returns `Ok(false)` on end of stream, including a
/// truncated trailing frame.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> MediaResult<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Ok(false),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}
