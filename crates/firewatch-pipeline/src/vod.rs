//! Video-on-demand batch pipeline.
//!
//! Decodes an uploaded (or past) video, annotates every detection at or above
//! the reporting threshold, writes the annotated video and a CSV detection
//! log, streams each annotated frame to the caller, and records one
//! video-log row when the whole clip was processed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use metrics::counter;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::Instrument;

use firewatch_media::annotate::{ceil_confidence, Annotator};
use firewatch_media::{
    encode_part, DetectionStream, Detector, FrameSource, InferenceParams, VideoBackend,
};
use firewatch_models::{JobId, NewVideoLog};
use firewatch_store::VideoLogStore;

use crate::detection_log::DetectionLogWriter;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::{VodOperation, VodRunLogger, VodSummary};
use crate::stream::{part_channel, PartSink};
use crate::uploads::StagedUpload;

/// Input and output locations of one VOD run.
#[derive(Debug, Clone, PartialEq)]
pub struct VodJob {
    pub job_id: JobId,
    pub input: PathBuf,
    pub output: PathBuf,
    pub log: PathBuf,
    pub operation: VodOperation,
}

impl VodJob {
    /// Processing run for a staged upload.
    pub fn for_upload(upload: &StagedUpload) -> Self {
        Self {
            job_id: upload.job_id.clone(),
            input: upload.upload_path.clone(),
            output: upload.processed_path.clone(),
            log: upload.log_path.clone(),
            operation: VodOperation::Processing,
        }
    }

    /// Re-run of a past video into fresh outputs.
    pub fn replay(input: PathBuf, output: PathBuf, log: PathBuf) -> Self {
        Self {
            job_id: JobId::new(),
            input,
            output,
            log,
            operation: VodOperation::Replay,
        }
    }
}

/// How a VOD run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VodOutcome {
    /// Every frame was processed. `record_id` is `None` when the store
    /// rejected the video-log write.
    Completed {
        frames: u64,
        rows: usize,
        record_id: Option<i64>,
    },
    /// The consumer went away before the clip ended; no record written
    Interrupted { frames: u64 },
}

/// Runs VOD jobs against the detector, video backend and video-log store.
pub struct VodPipeline {
    detector: Arc<dyn Detector>,
    backend: Arc<dyn VideoBackend>,
    video_logs: Arc<dyn VideoLogStore>,
    threshold: f32,
    annotator: Arc<Annotator>,
}

impl VodPipeline {
    pub fn new(
        detector: Arc<dyn Detector>,
        backend: Arc<dyn VideoBackend>,
        video_logs: Arc<dyn VideoLogStore>,
        threshold: f32,
    ) -> Self {
        Self {
            detector,
            backend,
            video_logs,
            threshold,
            annotator: Arc::new(Annotator::boxes_only()),
        }
    }

    /// Use `annotator` for overlays instead of boxes without labels.
    pub fn with_annotator(mut self, annotator: Arc<Annotator>) -> Self {
        self.annotator = annotator;
        self
    }

    /// Whether a raw confidence is reported. Compared after rounding up to
    /// the hundredth, so 0.2401 passes a 0.25 threshold.
    pub fn reports(&self, confidence: f32) -> bool {
        ceil_confidence(confidence) >= self.threshold
    }

    /// Open the job's input and start streaming it.
    ///
    /// An input that cannot be opened fails here, before any output file is
    /// created. Must be called from within a Tokio runtime.
    pub async fn start(self: &Arc<Self>, job: VodJob) -> PipelineResult<mpsc::Receiver<Vec<u8>>> {
        let logger = VodRunLogger::new(&job.job_id, job.operation, &job.input);
        logger.opening();

        let source = match self.backend.open_file(&job.input).await {
            Ok(source) => source,
            Err(e) => {
                counter!("firewatch_vod_runs_total", "outcome" => "open_failed").increment(1);
                logger.open_failed(&e);
                return Err(e.into());
            }
        };

        let (mut sink, rx) = part_channel();
        let pipeline = self.clone();
        let runtime = Handle::current();
        let span = logger.span();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            if let Err(e) = pipeline.run(&job, source, &mut sink, &runtime) {
                logger.failed(&e.to_string());
            }
        });

        Ok(rx)
    }

    /// Process an already opened source to completion or disconnect.
    ///
    /// Blocks the calling thread; the video-log write is driven through
    /// `runtime`. The source is released before returning.
    pub fn run(
        &self,
        job: &VodJob,
        mut source: Box<dyn FrameSource>,
        sink: &mut dyn PartSink,
        runtime: &Handle,
    ) -> PipelineResult<VodOutcome> {
        let logger = VodRunLogger::new(&job.job_id, job.operation, &job.input);
        let fps = source.fps();
        let (width, height) = source.dimensions();

        let mut writer = match self.backend.create_writer(&job.output, width, height, fps) {
            Ok(writer) => writer,
            Err(e) => {
                source.release();
                return Err(e.into());
            }
        };
        let mut csv = match DetectionLogWriter::create(&job.log) {
            Ok(csv) => csv,
            Err(e) => {
                source.release();
                if let Err(finish_err) = writer.finish() {
                    logger.warning(&format!("Output video not finalized: {}", finish_err));
                }
                return Err(e.into());
            }
        };

        logger.processing(width, height, fps, self.threshold);

        let mut interrupted = false;
        let mut write_error = None;
        let frames = {
            let params = InferenceParams::vod(self.threshold);
            let mut stream = DetectionStream::new(source.as_mut(), self.detector.as_ref(), params);

            for detected in stream.by_ref() {
                let mut frame = detected.frame;
                for detection in detected
                    .detections
                    .iter()
                    .filter(|d| self.reports(d.confidence))
                {
                    self.annotator.draw_vod(&mut frame, detection);
                    if let Err(e) = csv.write_detection(detected.frame_number, fps, detection) {
                        logger.warning(&format!("Detection log row lost: {}", e));
                    }
                }

                if let Err(e) = writer.write_frame(&frame) {
                    write_error = Some(e);
                    break;
                }

                match encode_part(&frame) {
                    Ok(part) => {
                        counter!("firewatch_frames_streamed_total", "pipeline" => "vod")
                            .increment(1);
                        if !sink.send_part(part) {
                            interrupted = true;
                            break;
                        }
                    }
                    Err(e) => logger.warning(&format!("Skipping stream part: {}", e)),
                }
            }

            let frames = stream.frames_read();
            if let Some(e) = stream.take_error() {
                logger.warning(&format!("Read stopped after {} frames: {}", frames, e));
            }
            frames
        };

        source.release();
        if let Err(e) = writer.finish() {
            logger.failed(&format!("Failed to finalize output video: {}", e));
        }
        let rows = csv.finish()?;

        if let Some(e) = write_error {
            counter!("firewatch_vod_runs_total", "outcome" => "failed").increment(1);
            return Err(PipelineError::Media(e));
        }

        if interrupted {
            counter!("firewatch_vod_runs_total", "outcome" => "interrupted").increment(1);
            logger.interrupted(frames);
            return Ok(VodOutcome::Interrupted { frames });
        }

        let record = NewVideoLog {
            timestamp: Local::now().naive_local(),
            video_path: path_string(&job.output),
            csv_path: path_string(&job.log),
        };
        let record_id = match runtime.block_on(
            self.video_logs
                .insert_video_log(&record)
                .instrument(logger.span()),
        ) {
            Ok(id) => Some(id),
            Err(e) => {
                logger.warning(&format!("Failed to store video log: {}", e));
                None
            }
        };

        counter!("firewatch_vod_runs_total", "outcome" => "completed").increment(1);
        logger.completed(VodSummary { frames, rows });
        Ok(VodOutcome::Completed {
            frames,
            rows,
            record_id,
        })
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
