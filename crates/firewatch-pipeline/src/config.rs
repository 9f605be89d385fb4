//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use firewatch_media::InferenceParams;

/// Fixed tuning of the webcam loop.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Ceiling on processed frames per second
    pub fps_limit: f64,
    /// Thresholds passed to the detector
    pub inference: InferenceParams,
    /// Fire detections above this confidence are drawn
    pub draw_threshold: f32,
    /// Fire detections above this confidence trigger screenshot/alert/log
    pub alert_threshold: f32,
    /// Minimum time between screenshots
    pub screenshot_cooldown: Duration,
    /// Minimum time between e-mail dispatches
    pub email_cooldown: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            fps_limit: 15.0,
            inference: InferenceParams::realtime(),
            draw_threshold: 0.25,
            alert_threshold: 0.9,
            screenshot_cooldown: Duration::from_secs(30),
            email_cooldown: Duration::from_secs(300),
        }
    }
}

impl RealtimeConfig {
    /// Minimum spacing between admitted frames.
    pub fn frame_interval(&self) -> Duration {
        if self.fps_limit > 0.0 {
            Duration::from_secs_f64(1.0 / self.fps_limit)
        } else {
            Duration::ZERO
        }
    }
}

/// Alert e-mail settings.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    /// Recipients, already trimmed and non-empty
    pub recipients: Vec<String>,
    /// Longitude caption in the alert body
    pub longitude: String,
    /// Latitude caption in the alert body
    pub latitude: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            recipients: Vec::new(),
            longitude: "73.760120".to_string(),
            latitude: "18.645974".to_string(),
        }
    }
}

impl AlertConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            recipients: std::env::var("ALERT_EMAILS")
                .map(|s| parse_recipients(&s))
                .unwrap_or_default(),
            longitude: std::env::var("ALERT_LONGITUDE").unwrap_or(defaults.longitude),
            latitude: std::env::var("ALERT_LATITUDE").unwrap_or(defaults.latitude),
        }
    }
}

/// Split a comma-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Folder layout and thresholds shared by both pipelines.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Where uploads are written
    pub upload_folder: PathBuf,
    /// Where annotated videos and detection logs are written
    pub processed_folder: PathBuf,
    /// Where fire screenshots are written
    pub fire_image_folder: PathBuf,
    /// Base for replay paths
    pub data_root: PathBuf,
    /// VOD reporting threshold
    pub confidence_threshold: f32,
    /// Upload jobs remembered for id lookups
    pub max_tracked_uploads: usize,
    pub alert: AlertConfig,
    pub realtime: RealtimeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_folder: PathBuf::from("uploads"),
            processed_folder: PathBuf::from("processed_videos"),
            fire_image_folder: PathBuf::from("fire_detect_img"),
            data_root: PathBuf::from("."),
            confidence_threshold: 0.25,
            max_tracked_uploads: 64,
            alert: AlertConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upload_folder: std::env::var("UPLOAD_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_folder),
            processed_folder: std::env::var("PROCESSED_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_folder),
            fire_image_folder: std::env::var("FIRE_IMAGE_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(defaults.fire_image_folder),
            data_root: std::env::var("DATA_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_root),
            confidence_threshold: std::env::var("CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            max_tracked_uploads: std::env::var("MAX_TRACKED_UPLOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tracked_uploads),
            alert: AlertConfig::from_env(),
            realtime: RealtimeConfig::default(),
        }
    }

    /// Rooted at `base`: every folder lives under it. Used by tests.
    pub fn rooted_at(base: impl Into<PathBuf>) -> Self {
        let base = base.into();
        Self {
            upload_folder: base.join("uploads"),
            processed_folder: base.join("processed_videos"),
            fire_image_folder: base.join("fire_detect_img"),
            data_root: base,
            ..Self::default()
        }
    }

    /// Create the upload, processed and screenshot folders.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            &self.upload_folder,
            &self.processed_folder,
            &self.fire_image_folder,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_realtime_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.screenshot_cooldown, Duration::from_secs(30));
        assert_eq!(config.email_cooldown, Duration::from_secs(300));
        assert!((config.inference.confidence - 0.25).abs() < 1e-6);
        assert!((config.inference.iou - 0.5).abs() < 1e-6);
        let interval = config.frame_interval().as_secs_f64();
        assert!((interval - 1.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@x.io, ,b@y.io,"),
            vec!["a@x.io".to_string(), "b@y.io".to_string()]
        );
        assert!(parse_recipients("").is_empty());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        config.ensure_directories().unwrap();
        assert!(config.upload_folder.is_dir());
        assert!(config.processed_folder.is_dir());
        assert!(config.fire_image_folder.is_dir());
    }
}
