//! Detection pipelines for the Firewatch backend.
//!
//! This crate provides:
//! - The realtime webcam loop with screenshot, e-mail and fire-log alerting
//! - The VOD batch pipeline writing an annotated video and a CSV detection log
//! - Webcam session management and upload staging by job id
//! - Hand-off of multipart stream parts to HTTP bodies

pub mod alert;
pub mod config;
pub mod cooldown;
pub mod detection_log;
pub mod error;
pub mod logging;
pub mod mailer;
pub mod realtime;
pub mod screenshot;
pub mod session;
pub mod stream;
pub mod uploads;
pub mod vod;

pub use alert::{
    AlertDispatcher, AlertError, AlertMessage, DispatchOutcome, FireLogWriter, Mailer,
    ALERT_SUBJECT,
};
pub use config::{AlertConfig, PipelineConfig, RealtimeConfig};
pub use cooldown::CooldownGate;
pub use detection_log::{DetectionLogWriter, CSV_HEADER};
pub use error::{PipelineError, PipelineResult};
pub use logging::{VodOperation, VodRunLogger, VodSummary};
pub use mailer::{DisabledMailer, MailConfig, SmtpMailer};
pub use realtime::{annotate_realtime, FrameThrottle, LoopExit, RealtimeLoop, RealtimeService};
pub use screenshot::ScreenshotGate;
pub use session::RealtimeSessions;
pub use stream::{part_channel, PartSink};
pub use uploads::{StagedUpload, UploadRegistry};
pub use vod::{VodJob, VodOutcome, VodPipeline};
