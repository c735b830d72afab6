//! Résumé email assembly and SMTP delivery.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport (implicit TLS,
//! the classic port-465 setup). The [`MailTransport`] trait is the seam
//! the processor talks through, so tests can substitute a stub transport
//! without an SMTP server.

use async_trait::async_trait;

use envio_core::error::CoreError;
use envio_core::types::SubmissionTask;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email assembly and delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// SMTP transport-level failure (authentication, connection, rejection).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The attachment file could not be read.
    #[error("Attachment read error: {0}")]
    Attachment(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// SmtpConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (implicit TLS).
const DEFAULT_SMTP_PORT: u16 = 465;

/// Configuration for the SMTP mail transport.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port (defaults to 465).
    pub port: u16,
    /// SMTP username; also the RFC 5322 sender address.
    pub user: String,
    /// SMTP password.
    pub password: String,
}

impl SmtpConfig {
    /// Load configuration from environment variables.
    ///
    /// The worker cannot run without a mail transport, so a missing
    /// mandatory variable is a startup error.
    ///
    /// | Variable     | Required | Default |
    /// |--------------|----------|---------|
    /// | `EMAIL_HOST` | yes      | —       |
    /// | `EMAIL_PORT` | no       | `465`   |
    /// | `EMAIL_USER` | yes      | —       |
    /// | `EMAIL_PASS` | yes      | —       |
    pub fn from_env() -> Result<Self, CoreError> {
        let host =
            std::env::var("EMAIL_HOST").map_err(|_| CoreError::ConfigurationMissing("EMAIL_HOST"))?;
        let port = std::env::var("EMAIL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_SMTP_PORT);
        let user =
            std::env::var("EMAIL_USER").map_err(|_| CoreError::ConfigurationMissing("EMAIL_USER"))?;
        let password =
            std::env::var("EMAIL_PASS").map_err(|_| CoreError::ConfigurationMissing("EMAIL_PASS"))?;
        Ok(Self {
            host,
            port,
            user,
            password,
        })
    }
}

// ---------------------------------------------------------------------------
// ResumeEmail
// ---------------------------------------------------------------------------

/// An attachment ready to go on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    /// Filename shown to the recipient.
    pub filename: String,
    /// Raw file contents.
    pub content: Vec<u8>,
}

/// One résumé email, fully assembled and ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeEmail {
    /// Display name on the `From` header (the candidate).
    pub from_display: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub text: String,
    /// HTML alternative body.
    pub html: String,
    /// Résumé attachment; `None` when the file no longer exists.
    pub attachment: Option<EmailAttachment>,
}

impl ResumeEmail {
    /// Assemble the outgoing email for a submission task.
    ///
    /// The attachment is read into memory when the recorded path still
    /// resolves to a file; an absent file yields a body-only email
    /// (absence is not an error). A file that exists but cannot be read
    /// is an error, and the task goes through the normal retry path.
    pub fn for_task(task: &SubmissionTask) -> Result<Self, MailError> {
        let attachment = match std::fs::metadata(&task.attachment_path) {
            Ok(meta) if meta.is_file() => Some(EmailAttachment {
                filename: task.email_attachment_name(),
                content: std::fs::read(&task.attachment_path)?,
            }),
            _ => None,
        };

        let candidate = &task.candidate;
        let job_title = &task.job_title;

        Ok(Self {
            from_display: candidate.clone(),
            to: task.email.clone(),
            subject: format!("Em busca de oportunidade como {job_title} - {candidate}"),
            text: format!(
                "Olá,\n\n\
                 Este é um envio automático do currículo de {candidate} \
                 para a vaga de {job_title}.\n\n\
                 Atenciosamente,\n{candidate}"
            ),
            html: format!(
                "<div style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\
                 <h2 style=\"color: #2e7d32;\">Em busca de oportunidade como {job_title}</h2>\
                 <p>Olá,</p>\
                 <p>Este é um envio automático do currículo de <strong>{candidate}</strong>.</p>\
                 <hr style=\"border: 0; border-top: 1px solid #eee;\" />\
                 <p>Atenciosamente,<br /><strong>{candidate}</strong></p>\
                 </div>"
            ),
            attachment,
        })
    }
}

// ---------------------------------------------------------------------------
// MailTransport
// ---------------------------------------------------------------------------

/// The pipeline's single blocking external call.
///
/// `send` suspends until the remote transport accepts or rejects the
/// message; the worker's ack/retry decision hangs entirely on the result.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Deliver one résumé email.
    async fn send(&self, email: &ResumeEmail) -> Result<(), MailError>;
}

// ---------------------------------------------------------------------------
// SmtpMailer
// ---------------------------------------------------------------------------

/// Sends résumé emails over SMTP with implicit TLS.
pub struct SmtpMailer {
    config: SmtpConfig,
    transport: lettre::AsyncSmtpTransport<lettre::Tokio1Executor>,
}

impl SmtpMailer {
    /// Build the transport once; it is reused for every send.
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, Tokio1Executor};

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { config, transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &ResumeEmail) -> Result<(), MailError> {
        use lettre::message::header::ContentType;
        use lettre::message::{Attachment, Mailbox, MultiPart};
        use lettre::{AsyncTransport, Message};

        let from = Mailbox::new(
            Some(email.from_display.clone()),
            self.config.user.parse()?,
        );

        let alternative =
            MultiPart::alternative_plain_html(email.text.clone(), email.html.clone());

        let body = match &email.attachment {
            Some(att) => {
                let content_type = ContentType::parse("application/pdf")
                    .map_err(|e| MailError::Build(e.to_string()))?;
                MultiPart::mixed()
                    .multipart(alternative)
                    .singlepart(Attachment::new(att.filename.clone()).body(
                        att.content.clone(),
                        content_type,
                    ))
            }
            None => alternative,
        };

        let message = Message::builder()
            .from(from)
            .to(email.to.parse()?)
            .subject(email.subject.clone())
            .multipart(body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(message).await?;

        tracing::info!(to = %email.to, subject = %email.subject, "Résumé email sent");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
