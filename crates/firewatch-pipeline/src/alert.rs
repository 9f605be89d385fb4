//! Alert e-mail dispatch and fire-log writes.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Local;
use metrics::counter;
use thiserror::Error;
use tracing::{error, info, warn};

use firewatch_models::NewFireLog;
use firewatch_store::FireLogStore;

use crate::config::AlertConfig;
use crate::cooldown::CooldownGate;

pub const ALERT_SUBJECT: &str = "🔥 Fire Alert Detected";

/// Errors from building or sending one alert message.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("mail not configured")]
    NotConfigured,

    #[error("invalid address {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// File attached to an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// One outgoing alert for one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub subject: String,
    pub body: String,
    pub recipient: String,
    pub attachment: Option<AlertAttachment>,
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &AlertMessage) -> Result<(), AlertError>;
}

/// Alert body with the location caption.
pub fn alert_body(config: &AlertConfig) -> String {
    format!(
        "Fire detected! Check the attached screenshot.\nLongitude: {}\nLatitude: {}",
        config.longitude, config.latitude
    )
}

/// `image/png` for `.png` files, `image/jpeg` otherwise.
pub fn attachment_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Cooldown still running; nothing sent
    Suppressed { remaining: Duration },
    /// Gate opened and the cooldown advanced
    Dispatched { sent: usize, failed: usize },
}

/// Sends one e-mail per recipient at most once per cooldown period.
pub struct AlertDispatcher {
    mailer: Arc<dyn Mailer>,
    config: AlertConfig,
    gate: CooldownGate,
}

impl AlertDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, config: AlertConfig, cooldown: Duration) -> Self {
        Self {
            mailer,
            config,
            gate: CooldownGate::new(cooldown),
        }
    }

    pub async fn dispatch(&self, image_path: &Path) -> DispatchOutcome {
        self.dispatch_at(image_path, Instant::now()).await
    }

    /// Dispatch at an explicit monotonic time.
    ///
    /// The cooldown advances as soon as the gate opens, whatever happens to
    /// the individual sends.
    pub async fn dispatch_at(&self, image_path: &Path, now: Instant) -> DispatchOutcome {
        if !self.gate.try_acquire_at(now) {
            let remaining = self.gate.remaining_at(now);
            info!(
                remaining_secs = remaining.as_secs(),
                "Email not sent, cooldown period not over"
            );
            return DispatchOutcome::Suppressed { remaining };
        }

        let attachment = load_attachment(image_path).await;
        let body = alert_body(&self.config);

        let mut sent = 0;
        let mut failed = 0;
        for recipient in &self.config.recipients {
            let message = AlertMessage {
                subject: ALERT_SUBJECT.to_string(),
                body: body.clone(),
                recipient: recipient.clone(),
                attachment: attachment.clone(),
            };
            match self.mailer.send(&message).await {
                Ok(()) => {
                    sent += 1;
                    counter!("firewatch_alert_emails_total", "outcome" => "sent").increment(1);
                    info!(recipient = %recipient, "Email alert sent");
                }
                Err(e) => {
                    failed += 1;
                    counter!("firewatch_alert_emails_total", "outcome" => "failed").increment(1);
                    error!(recipient = %recipient, "Failed to send email alert: {}", e);
                }
            }
        }

        DispatchOutcome::Dispatched { sent, failed }
    }
}

async fn load_attachment(path: &Path) -> Option<AlertAttachment> {
    match tokio::fs::read(path).await {
        Ok(data) => Some(AlertAttachment {
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "screenshot.jpg".to_string()),
            content_type: attachment_content_type(path).to_string(),
            data,
        }),
        Err(e) => {
            warn!(path = %path.display(), "Alert image not attached: {}", e);
            None
        }
    }
}

/// Appends fire alerts to the fire-log store, swallowing store failures.
#[derive(Clone)]
pub struct FireLogWriter {
    store: Arc<dyn FireLogStore>,
}

impl FireLogWriter {
    pub fn new(store: Arc<dyn FireLogStore>) -> Self {
        Self { store }
    }

    /// Insert a record stamped with the current local time. Returns the new
    /// id, or `None` when the store rejected the write.
    pub async fn record(&self, confidence: f32, image_path: &Path) -> Option<i64> {
        let record = NewFireLog {
            timestamp: Local::now().naive_local(),
            confidence: f64::from(confidence),
            image_path: image_path.to_string_lossy().to_string(),
        };

        match self.store.insert_fire_log(&record).await {
            Ok(id) => {
                info!(id, confidence, "Fire log stored");
                Some(id)
            }
            Err(e) => {
                error!(confidence, "Failed to store fire log: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use firewatch_store::MemoryLogStore;

    /// Records messages; fails for recipients containing "bad".
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<AlertMessage>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &AlertMessage) -> Result<(), AlertError> {
            if message.recipient.contains("bad") {
                return Err(AlertError::Transport("rejected".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn config(recipients: &[&str]) -> AlertConfig {
        AlertConfig {
            recipients: recipients.iter().map(|s| s.to_string()).collect(),
            ..AlertConfig::default()
        }
    }

    #[test]
    fn test_body_and_content_type() {
        let body = alert_body(&AlertConfig::default());
        assert!(body.starts_with("Fire detected! Check the attached screenshot."));
        assert!(body.contains("Longitude: 73.760120"));
        assert!(body.contains("Latitude: 18.645974"));
        assert_eq!(attachment_content_type(Path::new("a.png")), "image/png");
        assert_eq!(attachment_content_type(Path::new("a.jpg")), "image/jpeg");
    }

    #[tokio::test]
    async fn test_dispatch_sends_per_recipient_with_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("fire_x.jpg");
        std::fs::write(&image, b"jpeg").unwrap();

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = AlertDispatcher::new(
            mailer.clone(),
            config(&["a@x.io", "b@x.io"]),
            Duration::from_secs(300),
        );

        let outcome = dispatcher.dispatch(&image).await;
        assert_eq!(outcome, DispatchOutcome::Dispatched { sent: 2, failed: 0 });

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent[0].subject, ALERT_SUBJECT);
        let attachment = sent[0].attachment.as_ref().unwrap();
        assert_eq!(attachment.filename, "fire_x.jpg");
        assert_eq!(attachment.data, b"jpeg");
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_batch_or_cooldown() {
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = AlertDispatcher::new(
            mailer.clone(),
            config(&["bad@x.io", "good@x.io"]),
            Duration::from_secs(300),
        );
        let t0 = Instant::now();
        let missing = Path::new("/no/such/image.jpg");

        let outcome = dispatcher.dispatch_at(missing, t0).await;
        assert_eq!(outcome, DispatchOutcome::Dispatched { sent: 1, failed: 1 });
        assert!(mailer.sent.lock().unwrap()[0].attachment.is_none());

        let again = dispatcher
            .dispatch_at(missing, t0 + Duration::from_secs(299))
            .await;
        assert!(matches!(again, DispatchOutcome::Suppressed { .. }));
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        let later = dispatcher
            .dispatch_at(missing, t0 + Duration::from_secs(300))
            .await;
        assert!(matches!(later, DispatchOutcome::Dispatched { .. }));
    }

    #[tokio::test]
    async fn test_fire_log_writer_swallows_store_errors() {
        let store = Arc::new(MemoryLogStore::new());
        let writer = FireLogWriter::new(store.clone());

        assert!(writer.record(0.95, Path::new("fire_detect_img/a.jpg")).await.is_some());
        store.set_available(false);
        assert!(writer.record(0.97, Path::new("fire_detect_img/b.jpg")).await.is_none());
        store.set_available(true);
        assert_eq!(store.fire_log_count(), 1);
    }
}
