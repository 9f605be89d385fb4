//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use firewatch_media::annotate::Annotator;
use firewatch_media::{Detector, FfmpegBackend, VideoBackend, YoloFireDetector, YoloFireDetectorConfig};
use firewatch_pipeline::{
    AlertDispatcher, DisabledMailer, FireLogWriter, MailConfig, Mailer, PipelineConfig,
    RealtimeLoop, RealtimeService, ScreenshotGate, SmtpMailer, UploadRegistry, VodPipeline,
};
use firewatch_store::{DbConfig, LogStores};

use crate::config::{ApiConfig, ModelConfig};

/// External collaborators the services are built from.
pub struct Collaborators {
    pub backend: Arc<dyn VideoBackend>,
    pub annotator: Arc<Annotator>,
    pub realtime_detector: Arc<dyn Detector>,
    pub vod_detector: Arc<dyn Detector>,
    pub mailer: Arc<dyn Mailer>,
    pub stores: LogStores,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<PipelineConfig>,
    pub stores: LogStores,
    pub realtime: Arc<RealtimeService>,
    pub vod: Arc<VodPipeline>,
    pub uploads: Arc<UploadRegistry>,
}

impl AppState {
    /// Wire the services over the given collaborators.
    pub fn new(config: ApiConfig, pipeline: PipelineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            backend,
            annotator,
            realtime_detector,
            vod_detector,
            mailer,
            stores,
        } = collaborators;
        let realtime_config = pipeline.realtime.clone();

        let realtime_loop = RealtimeLoop::new(
            realtime_detector,
            ScreenshotGate::new(&pipeline.fire_image_folder, realtime_config.screenshot_cooldown),
            AlertDispatcher::new(mailer, pipeline.alert.clone(), realtime_config.email_cooldown),
            FireLogWriter::new(stores.fire.clone()),
            realtime_config,
        )
        .with_annotator(annotator.clone());
        let realtime = RealtimeService::new(backend.clone(), realtime_loop);

        let vod = VodPipeline::new(
            vod_detector,
            backend,
            stores.video.clone(),
            pipeline.confidence_threshold,
        )
        .with_annotator(annotator);
        let uploads = UploadRegistry::new(
            &pipeline.upload_folder,
            &pipeline.processed_folder,
            pipeline.max_tracked_uploads,
        );

        Self {
            config,
            pipeline: Arc::new(pipeline),
            stores,
            realtime: Arc::new(realtime),
            vod: Arc::new(vod),
            uploads: Arc::new(uploads),
        }
    }

    /// Build the production state from environment variables.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let pipeline = PipelineConfig::from_env();
        pipeline
            .ensure_directories()
            .context("Failed to create data directories")?;

        let stores = LogStores::connect(&DbConfig::from_env()).await;

        let models = ModelConfig::from_env();
        let realtime_detector: Arc<dyn Detector> = Arc::new(
            YoloFireDetector::new(
                YoloFireDetectorConfig::with_model_path(&models.realtime_model_path)
                    .with_device(&models.device),
            )
            .context("Failed to load realtime model")?,
        );
        let vod_detector = if models.vod_model_path == models.realtime_model_path {
            realtime_detector.clone()
        } else {
            Arc::new(
                YoloFireDetector::new(
                    YoloFireDetectorConfig::with_model_path(&models.vod_model_path)
                        .with_device(&models.device),
                )
                .context("Failed to load VOD model")?,
            )
        };

        let mail = MailConfig::from_env();
        let mailer: Arc<dyn Mailer> = match SmtpMailer::new(&mail) {
            Ok(mailer) => {
                info!(server = ?mail.server, port = mail.port, "SMTP mailer configured");
                Arc::new(mailer)
            }
            Err(e) => {
                warn!("Alert e-mails disabled: {}", e);
                Arc::new(DisabledMailer)
            }
        };
        if pipeline.alert.recipients.is_empty() {
            warn!("ALERT_EMAILS is empty; fire alerts will not be e-mailed");
        }

        Ok(Self::new(
            config,
            pipeline,
            Collaborators {
                backend: Arc::new(FfmpegBackend::from_env()),
                annotator: Arc::new(Annotator::from_env()),
                realtime_detector,
                vod_detector,
                mailer,
                stores,
            },
        ))
    }
}
