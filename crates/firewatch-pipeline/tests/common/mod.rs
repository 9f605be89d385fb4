//! Scripted collaborators shared by the pipeline integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use firewatch_media::{
    Detector, FrameSource, InferenceParams, MediaError, MediaResult, VideoBackend, VideoSink,
};
use firewatch_models::{BoundingBox, Detection};
use firewatch_pipeline::{AlertError, AlertMessage, Mailer, PartSink};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn fire(confidence: f32) -> Detection {
    Detection::new(BoundingBox::new(8.0, 8.0, 24.0, 24.0), 0, confidence)
}

pub fn smoke(confidence: f32) -> Detection {
    Detection::new(BoundingBox::new(30.0, 10.0, 50.0, 30.0), 1, confidence)
}

/// Frame source yielding grey frames, optionally bounded and optionally
/// failing on one read.
pub struct ScriptedSource {
    remaining: Option<u64>,
    fail_at: Option<u64>,
    read: u64,
    fps: f64,
    open: bool,
    releases: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn finite(frames: u64, fps: f64, releases: Arc<AtomicUsize>) -> Self {
        Self {
            remaining: Some(frames),
            fail_at: None,
            read: 0,
            fps,
            open: true,
            releases,
        }
    }

    pub fn endless(releases: Arc<AtomicUsize>) -> Self {
        Self {
            remaining: None,
            ..Self::finite(0, 30.0, releases)
        }
    }

    /// Read number `n` (1-based) returns an error.
    pub fn failing_at(mut self, n: u64) -> Self {
        self.fail_at = Some(n);
        self
    }
}

impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if !self.open {
            return Ok(None);
        }
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(None);
            }
            *remaining -= 1;
        }
        self.read += 1;
        if self.fail_at == Some(self.read) {
            return Err(MediaError::source_unavailable("scripted read failure"));
        }
        Ok(Some(RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([90, 90, 90]))))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn dimensions(&self) -> (u32, u32) {
        (WIDTH, HEIGHT)
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Returns the scripted detections for the n-th call (1-based), none otherwise.
#[derive(Default)]
pub struct ScriptedDetector {
    by_call: HashMap<usize, Vec<Detection>>,
    every_call: Vec<Detection>,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn on_call(mut self, call: usize, detections: Vec<Detection>) -> Self {
        self.by_call.insert(call, detections);
        self
    }

    pub fn always(detections: Vec<Detection>) -> Self {
        Self {
            every_call: detections,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, _: &RgbImage, _: &InferenceParams) -> MediaResult<Vec<Detection>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(self
            .by_call
            .get(&call)
            .cloned()
            .unwrap_or_else(|| self.every_call.clone()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Counts written frames and writes a placeholder file on finish.
pub struct CountingSink {
    path: PathBuf,
    frames: Arc<AtomicUsize>,
}

impl VideoSink for CountingSink {
    fn write_frame(&mut self, _: &RgbImage) -> MediaResult<()> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        std::fs::write(&self.path, b"video")?;
        Ok(())
    }
}

/// Backend over scripted sources. Files that do not exist fail to open.
pub struct ScriptedBackend {
    pub file_frames: u64,
    pub file_fps: f64,
    pub file_fail_at: Option<u64>,
    pub camera_opens: AtomicUsize,
    pub releases: Arc<AtomicUsize>,
    pub frames_written: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(file_frames: u64, file_fps: f64) -> Self {
        Self {
            file_frames,
            file_fps,
            file_fail_at: None,
            camera_opens: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
            frames_written: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoBackend for ScriptedBackend {
    fn open_camera(&self) -> MediaResult<Box<dyn FrameSource>> {
        self.camera_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSource::endless(self.releases.clone())))
    }

    async fn open_file(&self, path: &Path) -> MediaResult<Box<dyn FrameSource>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let mut source =
            ScriptedSource::finite(self.file_frames, self.file_fps, self.releases.clone());
        if let Some(n) = self.file_fail_at {
            source = source.failing_at(n);
        }
        Ok(Box::new(source))
    }

    fn create_writer(
        &self,
        path: &Path,
        _width: u32,
        _height: u32,
        _fps: f64,
    ) -> MediaResult<Box<dyn VideoSink>> {
        Ok(Box::new(CountingSink {
            path: path.to_path_buf(),
            frames: self.frames_written.clone(),
        }))
    }
}

/// Records every message; recipients containing "bad" fail.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<AlertMessage>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<AlertMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &AlertMessage) -> Result<(), AlertError> {
        self.sent.lock().unwrap().push(message.clone());
        if message.recipient.contains("bad") {
            return Err(AlertError::Transport("rejected".to_string()));
        }
        Ok(())
    }
}

/// Accepts parts until a fixed count, then reports a disconnect.
#[derive(Debug, Default)]
pub struct LimitedPartSink {
    pub parts: Vec<Vec<u8>>,
    pub limit: usize,
}

impl LimitedPartSink {
    pub fn new(limit: usize) -> Self {
        Self {
            parts: Vec::new(),
            limit,
        }
    }
}

impl PartSink for LimitedPartSink {
    fn send_part(&mut self, part: Vec<u8>) -> bool {
        if self.parts.len() >= self.limit {
            return false;
        }
        self.parts.push(part);
        true
    }
}
