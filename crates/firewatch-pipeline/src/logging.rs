//! Structured logging for VOD runs.
//!
//! Every run (fresh upload or replay) logs its lifecycle with the job id,
//! the operation and the input video as fields.

use std::fmt;
use std::path::{Path, PathBuf};

use firewatch_models::JobId;
use tracing::{error, info, warn, Span};

/// What a VOD run is doing with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VodOperation {
    /// Processing a fresh upload
    Processing,
    /// Re-running a past video into new outputs
    Replay,
}

impl VodOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "vod_processing",
            Self::Replay => "vod_replay",
        }
    }
}

impl fmt::Display for VodOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Totals reported when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VodSummary {
    pub frames: u64,
    pub rows: usize,
}

impl fmt::Display for VodSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames, {} detection{} logged",
            self.frames,
            self.rows,
            if self.rows == 1 { "" } else { "s" }
        )
    }
}

/// Logger bound to one VOD run.
#[derive(Debug, Clone)]
pub struct VodRunLogger {
    job_id: String,
    operation: VodOperation,
    input: PathBuf,
}

impl VodRunLogger {
    pub fn new(job_id: &JobId, operation: VodOperation, input: &Path) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
            input: input.to_path_buf(),
        }
    }

    pub fn opening(&self) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            input = %self.input.display(),
            "VOD run opening input"
        );
    }

    pub fn open_failed(&self, reason: &dyn fmt::Display) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            input = %self.input.display(),
            "Cannot open input: {}", reason
        );
    }

    pub fn processing(&self, width: u32, height: u32, fps: f64, threshold: f32) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            width,
            height,
            fps,
            threshold,
            "VOD run processing"
        );
    }

    pub fn warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "VOD run warning: {}", message
        );
    }

    pub fn failed(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "VOD run failed: {}", message
        );
    }

    pub fn interrupted(&self, frames: u64) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            frames,
            "Client disconnected, VOD run interrupted"
        );
    }

    pub fn completed(&self, summary: VodSummary) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            frames = summary.frames,
            rows = summary.rows,
            "VOD run completed: {}", summary
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> VodOperation {
        self.operation
    }

    /// Span carrying the job id and operation.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "vod_run",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
