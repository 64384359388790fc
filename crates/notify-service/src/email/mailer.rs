//! Email transports.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport. [`LogMailer`]
//! only logs, for installations without SMTP. [`MemoryMailer`] records
//! messages and can be told to fail, for tests and local runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;
use tracing::info;

use notify_core::config::{EmailConfig, EmailTransportKind};
use notify_core::error::{AppError, ErrorKind};
use notify_core::result::AppResult;

/// A rendered message ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html_body: String,
    /// Plain-text alternative.
    pub text_body: String,
}

/// Delivers rendered emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one message. I/O failures are `Transport` errors.
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()>;
}

/// Build the transport selected in configuration.
pub fn mailer_from_config(config: &EmailConfig) -> AppResult<Arc<dyn Mailer>> {
    match config.transport {
        EmailTransportKind::Smtp => Ok(Arc::new(SmtpMailer::from_config(config)?)),
        EmailTransportKind::Log => Ok(Arc::new(LogMailer)),
    }
}

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the transport from the `email` configuration section.
    pub fn from_config(config: &EmailConfig) -> AppResult<Self> {
        if config.smtp_host.is_empty() {
            return Err(AppError::configuration(
                "email.smtp_host is required for the smtp transport",
            ));
        }
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            AppError::configuration(format!("Invalid email.from_address: {e}"))
        })?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| AppError::configuration(format!("Invalid SMTP relay: {e}")))?
            .port(config.smtp_port);
        if let (Some(user), Some(password)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| AppError::validation(format!("Invalid recipient address: {e}")))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|e| AppError::internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Transport, "SMTP delivery failed", e))?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body_len = email.html_body.len(),
            "Email delivery skipped (log transport)"
        );
        Ok(())
    }
}

/// Records every message; optionally fails the next sends.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    failures: AtomicU32,
}

impl MemoryMailer {
    /// Create an empty mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    /// Fail the next `count` sends with a transport error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<()> {
        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(AppError::transport("connection refused"));
        }
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}
