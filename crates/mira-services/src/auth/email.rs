//! SMTP delivery of magic links.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use mira_core::{AppError, SmtpConfig};

pub const MAGIC_LINK_SUBJECT: &str = "Your Mira login link";

pub fn magic_link_body(link: &str, ttl_minutes: i64) -> String {
    format!(
        "Click to login:\n\n{}\n\nThis link expires in {} minutes.",
        link, ttl_minutes
    )
}

/// Outbound mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport. Sender address and password are required here,
    /// at the first point mail is actually sent.
    pub fn from_config(config: &SmtpConfig) -> Result<Self, AppError> {
        let sender = config
            .sender
            .as_deref()
            .ok_or_else(|| AppError::Config("EMAIL_SENDER is not set".to_string()))?;
        let password = config
            .password
            .as_deref()
            .ok_or_else(|| AppError::Config("EMAIL_PASSWORD is not set".to_string()))?;
        let from: Mailbox = sender
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid EMAIL_SENDER: {}", e)))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .map_err(|e| AppError::Config(format!("Invalid SMTP_SERVER: {}", e)))?
            .port(config.port)
            .credentials(Credentials::new(sender.to_string(), password.to_string()))
            .build();

        tracing::info!(
            host = %config.server,
            port = config.port,
            "Email service initialized (SMTP with STARTTLS)"
        );
        Ok(Self {
            mailer: Arc::new(mailer),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("Invalid recipient address: {}", e)))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| AppError::external("SMTP", e.to_string()))?;
        tracing::info!("Login email sent");
        Ok(())
    }
}
