//! FFmpeg command builder for raw frame pipes.
//!
//! Capture and decode commands write `rgb24` frames to stdout; the encode
//! command reads `rgb24` frames from stdin. Progress output is never enabled
//! because nothing drains stderr while frames are flowing.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{MediaError, MediaResult};

/// FFmpeg input/output target that means "the process pipe".
pub const PIPE: &str = "-";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file, device or pipe
    input: PathBuf,
    /// Output file or pipe
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Force an input demuxer/device (`-f` before -i).
    pub fn input_format(self, format: impl Into<String>) -> Self {
        self.input_arg("-f").input_arg(format)
    }

    /// Describe a raw `rgb24` input stream of the given geometry and rate.
    pub fn raw_rgb_input(self, width: u32, height: u32, fps: f64) -> Self {
        self.input_format("rawvideo")
            .input_arg("-pix_fmt")
            .input_arg("rgb24")
            .input_arg("-s")
            .input_arg(format!("{}x{}", width, height))
            .input_arg("-r")
            .input_arg(format_fps(fps))
    }

    /// Emit raw `rgb24` frames on the output.
    pub fn raw_rgb_output(self) -> Self {
        self.output_arg("-f")
            .output_arg("rawvideo")
            .output_arg("-pix_fmt")
            .output_arg("rgb24")
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Drop audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();

        if self.overwrite {
            args.push("-y".into());
        }

        args.push("-v".into());
        args.push(self.log_level.clone().into());

        args.extend(self.input_args.iter().map(OsString::from));

        args.push("-i".into());
        args.push(self.input.clone().into_os_string());

        args.extend(self.output_args.iter().map(OsString::from));

        args.push(self.output.clone().into_os_string());

        args
    }

    /// Create a blocking [`Command`] with the given stdio wiring.
    ///
    /// Fails with [`MediaError::FfmpegNotFound`] when ffmpeg is not on PATH.
    pub fn to_command(&self, stdin: Stdio, stdout: Stdio) -> MediaResult<Command> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        let mut cmd = Command::new(ffmpeg);
        cmd.args(self.build_args())
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::null());
        Ok(cmd)
    }
}

/// Format a frame rate for the command line without float noise.
fn format_fps(fps: f64) -> String {
    if (fps - fps.round()).abs() < 1e-6 {
        format!("{}", fps.round() as u64)
    } else {
        format!("{:.3}", fps)
    }
}
