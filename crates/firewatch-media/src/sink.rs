//! Annotated video output through an FFmpeg encode pipe.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};

use image::RgbImage;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, PIPE};
use crate::error::{MediaError, MediaResult};

/// Codec for annotated output (MPEG-4 Part 2, the `mp4v` fourcc).
pub const OUTPUT_CODEC: &str = "mpeg4";

/// Destination for annotated frames.
pub trait VideoSink: Send {
    /// Append one frame.
    fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()>;

    /// Flush and close the output.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

/// Writes frames into an FFmpeg encoder at a fixed rate and resolution.
pub struct FfmpegVideoWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
    output: PathBuf,
}

impl FfmpegVideoWriter {
    /// Start an encoder writing `output` at `fps` and `width`x`height`.
    pub fn create(output: &Path, width: u32, height: u32, fps: f64) -> MediaResult<Self> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let command = FfmpegCommand::new(PIPE, output)
            .raw_rgb_input(width, height, fps)
            .video_codec(OUTPUT_CODEC)
            .output_arg("-q:v")
            .output_arg("5")
            .output_arg("-pix_fmt")
            .output_arg("yuv420p");

        let mut child = command.to_command(Stdio::piped(), Stdio::null())?.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdin not captured"))?;

        debug!(output = %output.display(), width, height, fps, "Video writer opened");

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            width,
            height,
            output: output.to_path_buf(),
        })
    }

    fn close(&mut self) -> MediaResult<()> {
        self.stdin.take();
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(MediaError::ffmpeg_failed(
                format!("encoder for {} exited with {}", self.output.display(), status),
                None,
                status.code(),
            ));
        }
        debug!(output = %self.output.display(), "Video writer closed");
        Ok(())
    }
}

impl VideoSink for FfmpegVideoWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> MediaResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(MediaError::internal(format!(
                "frame is {}x{}, writer expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MediaError::internal("video writer already closed"))?;
        stdin.write_all(frame.as_raw())?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        self.close()
    }
}

impl Drop for FfmpegVideoWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(output = %self.output.display(), "Video writer close failed: {}", e);
        }
    }
}
