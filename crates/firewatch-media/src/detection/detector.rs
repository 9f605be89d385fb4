//! Detector trait and the per-frame detection stream.

use std::sync::Arc;

use firewatch_models::Detection;
use image::RgbImage;
use metrics::counter;
use tracing::warn;

use crate::error::{MediaError, MediaResult};
use crate::source::FrameSource;

/// Per-call inference thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    /// Minimum class score kept before NMS
    pub confidence: f32,
    /// IoU above which same-class boxes are suppressed
    pub iou: f32,
}

impl InferenceParams {
    pub fn new(confidence: f32, iou: f32) -> Self {
        Self { confidence, iou }
    }

    /// Thresholds for the webcam loop.
    pub fn realtime() -> Self {
        Self::new(0.25, 0.5)
    }

    /// Thresholds for uploaded videos. The model runs at the lower of 0.25 and
    /// the reporting threshold so nothing reportable is dropped early.
    pub fn vod(report_threshold: f32) -> Self {
        Self::new(report_threshold.min(0.25), 0.7)
    }
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self::realtime()
    }
}

/// Object detector over RGB frames.
///
/// Returned boxes are in pixel coordinates of the input frame.
pub trait Detector: Send + Sync {
    /// Run inference on one frame.
    fn detect(&self, frame: &RgbImage, params: &InferenceParams) -> MediaResult<Vec<Detection>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

impl<D: Detector + ?Sized> Detector for Arc<D> {
    fn detect(&self, frame: &RgbImage, params: &InferenceParams) -> MediaResult<Vec<Detection>> {
        (**self).detect(frame, params)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// One decoded frame with its detections.
#[derive(Debug, Clone)]
pub struct DetectedFrame {
    /// 1-based position in the source
    pub frame_number: u64,
    pub frame: RgbImage,
    pub detections: Vec<Detection>,
}

/// Pulls frames from a source and runs the detector on each one.
///
/// A failed inference yields the frame with no detections. A read error ends
/// the stream and is kept in [`DetectionStream::error`].
pub struct DetectionStream<'a> {
    source: &'a mut dyn FrameSource,
    detector: &'a dyn Detector,
    params: InferenceParams,
    frame_number: u64,
    error: Option<MediaError>,
}

impl<'a> DetectionStream<'a> {
    pub fn new(
        source: &'a mut dyn FrameSource,
        detector: &'a dyn Detector,
        params: InferenceParams,
    ) -> Self {
        Self {
            source,
            detector,
            params,
            frame_number: 0,
            error: None,
        }
    }

    /// Frames yielded so far.
    pub fn frames_read(&self) -> u64 {
        self.frame_number
    }

    /// The read error that ended the stream, if any.
    pub fn error(&self) -> Option<&MediaError> {
        self.error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<MediaError> {
        self.error.take()
    }
}

impl Iterator for DetectionStream<'_> {
    type Item = DetectedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.error.is_some() {
            return None;
        }

        let frame = match self.source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                warn!("Frame read failed after {} frames: {}", self.frame_number, e);
                self.error = Some(e);
                return None;
            }
        };

        self.frame_number += 1;
        let detections = match self.detector.detect(&frame, &self.params) {
            Ok(detections) => {
                for d in &detections {
                    counter!("firewatch_detections_total", "class" => d.label()).increment(1);
                }
                detections
            }
            Err(e) => {
                counter!("firewatch_inference_failures_total").increment(1);
                warn!(
                    frame = self.frame_number,
                    detector = self.detector.name(),
                    "Inference failed: {}",
                    e
                );
                Vec::new()
            }
        };

        Some(DetectedFrame {
            frame_number: self.frame_number,
            frame,
            detections,
        })
    }
}
