//! Realtime webcam detection loop.
//!
//! Frames are read from the claimed capture device, throttled, run through
//! the detector and annotated. A high-confidence fire detection triggers the
//! screenshot gate, and a saved screenshot triggers the alert dispatcher and
//! a fire-log write. Each annotated frame is pushed to the HTTP body as one
//! multipart part.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbImage;
use metrics::counter;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use firewatch_media::annotate::Annotator;
use firewatch_media::{encode_part, Detector, FrameSource, VideoBackend};
use firewatch_models::{Detection, StartStatus, StopStatus};

use crate::alert::{AlertDispatcher, FireLogWriter};
use crate::config::RealtimeConfig;
use crate::error::PipelineResult;
use crate::screenshot::ScreenshotGate;
use crate::session::RealtimeSessions;
use crate::stream::{part_channel, PartSink};

/// Drops frames that arrive faster than the configured ceiling.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl FrameThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admit a frame seen at `now` if the interval since the last admitted
    /// frame has elapsed.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Draw qualifying fire detections onto `frame`.
///
/// Returns the highest confidence among fire detections above the alert
/// threshold, if any.
pub fn annotate_realtime(
    annotator: &Annotator,
    frame: &mut RgbImage,
    detections: &[Detection],
    config: &RealtimeConfig,
) -> Option<f32> {
    let mut alert: Option<f32> = None;
    for detection in detections.iter().filter(|d| d.is_fire()) {
        if detection.confidence > config.draw_threshold {
            annotator.draw_realtime(frame, detection);
        }
        if detection.confidence > config.alert_threshold {
            alert = Some(alert.map_or(detection.confidence, |c| c.max(detection.confidence)));
        }
    }
    alert
}

/// Why a realtime loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Stop signal observed
    Stopped,
    /// Device closed or ran out of frames
    EndOfStream,
    /// A frame read failed
    ReadFailed,
    /// The stream consumer went away
    ClientDisconnected,
}

impl LoopExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::EndOfStream => "end_of_stream",
            Self::ReadFailed => "read_failed",
            Self::ClientDisconnected => "client_disconnected",
        }
    }
}

/// The per-frame work of the webcam stream.
pub struct RealtimeLoop {
    detector: Arc<dyn Detector>,
    screenshots: ScreenshotGate,
    alerts: AlertDispatcher,
    fire_log: FireLogWriter,
    config: RealtimeConfig,
    annotator: Arc<Annotator>,
}

impl RealtimeLoop {
    pub fn new(
        detector: Arc<dyn Detector>,
        screenshots: ScreenshotGate,
        alerts: AlertDispatcher,
        fire_log: FireLogWriter,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            detector,
            screenshots,
            alerts,
            fire_log,
            config,
            annotator: Arc::new(Annotator::boxes_only()),
        }
    }

    /// Use `annotator` for overlays instead of boxes without labels.
    pub fn with_annotator(mut self, annotator: Arc<Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Run until stopped, the device ends, a read fails or the consumer
    /// disconnects. Blocks the calling thread; async collaborators are
    /// driven through `runtime`. The source is released before returning.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        stop: &watch::Receiver<bool>,
        sink: &mut dyn PartSink,
        runtime: &Handle,
    ) -> LoopExit {
        let mut throttle = FrameThrottle::new(self.config.frame_interval());

        let exit = loop {
            if *stop.borrow() {
                break LoopExit::Stopped;
            }
            if !source.is_open() {
                break LoopExit::EndOfStream;
            }

            let mut frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break LoopExit::EndOfStream,
                Err(e) => {
                    warn!("Webcam read failed: {}", e);
                    break LoopExit::ReadFailed;
                }
            };

            if !throttle.admit() {
                continue;
            }

            let detections = match self.detector.detect(&frame, &self.config.inference) {
                Ok(detections) => detections,
                Err(e) => {
                    counter!("firewatch_inference_failures_total").increment(1);
                    warn!(detector = self.detector.name(), "Inference failed: {}", e);
                    Vec::new()
                }
            };
            for d in &detections {
                counter!("firewatch_detections_total", "class" => d.label()).increment(1);
            }

            if let Some(confidence) = annotate_realtime(&self.annotator, &mut frame, &detections, &self.config) {
                self.raise_alert(&frame, confidence, runtime);
            }

            let part = match encode_part(&frame) {
                Ok(part) => part,
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    continue;
                }
            };
            counter!("firewatch_frames_streamed_total", "pipeline" => "realtime").increment(1);
            if !sink.send_part(part) {
                break LoopExit::ClientDisconnected;
            }
        };

        source.release();
        exit
    }

    fn raise_alert(&self, frame: &RgbImage, confidence: f32, runtime: &Handle) {
        let Some(path) = self.screenshots.capture(frame) else {
            debug!(confidence, "Screenshot suppressed");
            return;
        };

        info!(confidence, path = %path.display(), "Fire detected");
        runtime.block_on(async {
            self.alerts.dispatch(&path).await;
            self.fire_log.record(confidence, &path).await;
        });
    }
}

/// Webcam control plus the feed that runs the loop.
pub struct RealtimeService {
    sessions: Arc<RealtimeSessions>,
    backend: Arc<dyn VideoBackend>,
    realtime_loop: Arc<RealtimeLoop>,
}

impl RealtimeService {
    pub fn new(backend: Arc<dyn VideoBackend>, realtime_loop: RealtimeLoop) -> Self {
        Self {
            sessions: Arc::new(RealtimeSessions::new()),
            backend,
            realtime_loop: Arc::new(realtime_loop),
        }
    }

    /// Open the camera unless a session is already running.
    pub fn start(&self) -> PipelineResult<StartStatus> {
        let backend = self.backend.clone();
        Ok(self.sessions.start_with(move || backend.open_camera())?)
    }

    pub fn stop(&self) -> StopStatus {
        self.sessions.stop()
    }

    pub fn is_running(&self) -> bool {
        self.sessions.is_running()
    }

    /// Claim the running session's device and start streaming it.
    ///
    /// Returns `None` when no session is running or another feed holds the
    /// device. Must be called from within a Tokio runtime.
    pub fn open_feed(&self) -> Option<mpsc::Receiver<Vec<u8>>> {
        let claim = self.sessions.claim()?;
        let (mut sink, rx) = part_channel();
        let sessions = self.sessions.clone();
        let realtime_loop = self.realtime_loop.clone();
        let runtime = Handle::current();

        tokio::task::spawn_blocking(move || {
            let mut device = claim.device;
            let exit = realtime_loop.run(device.as_mut(), &claim.stop, &mut sink, &runtime);
            sessions.finish(claim.generation);
            info!(
                generation = claim.generation,
                exit = exit.as_str(),
                "Realtime loop finished"
            );
        });

        Some(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewatch_models::BoundingBox;
    use image::Rgb;

    fn fire(confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(10.0, 40.0, 30.0, 60.0), 0, confidence)
    }

    fn smoke(confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(50.0, 40.0, 70.0, 60.0), 1, confidence)
    }

    #[test]
    fn test_throttle_drops_fast_frames() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(throttle.admit_at(t0));
        assert!(!throttle.admit_at(t0 + Duration::from_millis(50)));
        assert!(throttle.admit_at(t0 + Duration::from_millis(100)));
        assert!(!throttle.admit_at(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn test_zero_interval_admits_everything() {
        let mut throttle = FrameThrottle::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(throttle.admit_at(t0));
        assert!(throttle.admit_at(t0));
    }

    #[test]
    fn test_only_fire_above_threshold_is_drawn() {
        let boxes = Annotator::boxes_only();
        let config = RealtimeConfig::default();
        let mut frame = RgbImage::new(100, 100);
        let detections = [fire(0.2), smoke(0.99)];
        assert_eq!(annotate_realtime(&boxes, &mut frame, &detections, &config), None);
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));

        let mut frame = RgbImage::new(100, 100);
        annotate_realtime(&boxes, &mut frame, &[fire(0.3)], &config);
        assert_eq!(*frame.get_pixel(10, 50), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_alert_confidence_is_maximum() {
        let boxes = Annotator::boxes_only();
        let config = RealtimeConfig::default();
        let mut frame = RgbImage::new(100, 100);
        let detections = [fire(0.97), fire(0.92), fire(0.5), smoke(0.99)];
        assert_eq!(
            annotate_realtime(&boxes, &mut frame, &detections, &config),
            Some(0.97)
        );
    }

    #[test]
    fn test_alert_threshold_is_strict() {
        let boxes = Annotator::boxes_only();
        let config = RealtimeConfig::default();
        let mut frame = RgbImage::new(100, 100);
        assert_eq!(annotate_realtime(&boxes, &mut frame, &[fire(0.9)], &config), None);
    }
}
