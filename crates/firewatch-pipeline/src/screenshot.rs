//! Screenshot capture behind a cooldown.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use image::RgbImage;
use metrics::counter;
use tracing::{info, warn};

use firewatch_media::mjpeg::{encode_jpeg, DEFAULT_JPEG_QUALITY};

use crate::cooldown::CooldownGate;

/// `fire_%Y-%m-%d_%H-%M-%S.jpg`
pub fn screenshot_filename(at: NaiveDateTime) -> String {
    format!("fire_{}.jpg", at.format("%Y-%m-%d_%H-%M-%S"))
}

/// Writes a frame to the screenshot folder at most once per cooldown period.
///
/// The cooldown only advances when the file was actually written; a
/// suppressed or failed capture leaves it untouched.
#[derive(Debug)]
pub struct ScreenshotGate {
    folder: PathBuf,
    gate: CooldownGate,
}

impl ScreenshotGate {
    pub fn new(folder: impl Into<PathBuf>, cooldown: Duration) -> Self {
        Self {
            folder: folder.into(),
            gate: CooldownGate::new(cooldown),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Capture using the current clocks.
    pub fn capture(&self, frame: &RgbImage) -> Option<PathBuf> {
        self.capture_at(frame, Instant::now(), Local::now().naive_local())
    }

    /// Capture with explicit monotonic and wall-clock times.
    pub fn capture_at(
        &self,
        frame: &RgbImage,
        now: Instant,
        wall_clock: NaiveDateTime,
    ) -> Option<PathBuf> {
        if !self.gate.is_open_at(now) {
            return None;
        }

        let path = self.folder.join(screenshot_filename(wall_clock));
        let written = encode_jpeg(frame, DEFAULT_JPEG_QUALITY)
            .map_err(|e| e.to_string())
            .and_then(|jpeg| {
                std::fs::create_dir_all(&self.folder)
                    .and_then(|_| std::fs::write(&path, jpeg))
                    .map_err(|e| e.to_string())
            });

        match written {
            Ok(()) => {
                self.gate.mark_at(now);
                counter!("firewatch_screenshots_saved_total").increment(1);
                info!(path = %path.display(), "Fire screenshot saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to save fire screenshot: {}", e);
                None
            }
        }
    }
}
