//! SMTP transport for alert e-mails.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::alert::{AlertError, AlertMessage, Mailer};

/// SMTP settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub server: Option<String>,
    pub port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub default_sender: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: 587,
            use_tls: true,
            username: None,
            password: None,
            default_sender: None,
        }
    }
}

impl MailConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: std::env::var("MAIL_SERVER").ok().filter(|s| !s.is_empty()),
            port: std::env::var("MAIL_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            use_tls: std::env::var("MAIL_USE_TLS")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.use_tls),
            username: std::env::var("MAIL_USERNAME").ok(),
            password: std::env::var("MAIL_PASSWORD").ok(),
            default_sender: std::env::var("MAIL_DEFAULT_SENDER").ok(),
        }
    }
}

/// Mailer over an async SMTP connection pool.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, AlertError> {
        let server = config.server.as_deref().ok_or(AlertError::NotConfigured)?;

        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(server)
                .map_err(|e| AlertError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };
        let mut builder = builder.port(config.port);
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        let sender = config
            .default_sender
            .as_deref()
            .or(config.username.as_deref())
            .ok_or_else(|| AlertError::InvalidAddress("no sender configured".to_string()))?;
        let from: Mailbox = sender
            .parse()
            .map_err(|_| AlertError::InvalidAddress(sender.to_string()))?;

        info!(server, port = config.port, tls = config.use_tls, "SMTP mailer configured");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

/// Assemble the MIME message for one alert.
pub fn build_message(from: &Mailbox, message: &AlertMessage) -> Result<Message, AlertError> {
    let to: Mailbox = message
        .recipient
        .parse()
        .map_err(|_| AlertError::InvalidAddress(message.recipient.clone()))?;

    let builder = Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject.clone());

    let built = match &message.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|e| AlertError::Build(e.to_string()))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(message.body.clone()))
                    .singlepart(
                        Attachment::new(attachment.filename.clone())
                            .body(attachment.data.clone(), content_type),
                    ),
            )
        }
        None => builder.body(message.body.clone()),
    };

    built.map_err(|e| AlertError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &AlertMessage) -> Result<(), AlertError> {
        let email = build_message(&self.from, message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| AlertError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Mailer used when no SMTP server is configured; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, message: &AlertMessage) -> Result<(), AlertError> {
        warn!(recipient = %message.recipient, "Alert not sent: mail not configured");
        Err(AlertError::NotConfigured)
    }
}
