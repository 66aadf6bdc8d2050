//! Mailer trait and SMTP implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;

use super::{Email, MailError};

/// Async email sending trait.
///
/// One call is one delivery attempt. Implementations must not retry.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// How the connection to the relay is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465).
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS, which must succeed.
    Starttls,
    /// Unencrypted. Local test relays only.
    None,
}

/// Configuration for SMTP mailer.
#[derive(Debug, Clone, Deserialize)]
pub struct MailerConfig {
    /// SMTP server hostname.
    #[serde(rename = "smtp_host")]
    pub host: String,

    /// SMTP server port (default: 465).
    #[serde(rename = "smtp_port", default = "default_port")]
    pub port: u16,

    #[serde(rename = "smtp_user")]
    pub username: Option<String>,

    #[serde(rename = "smtp_pass")]
    pub password: Option<String>,

    /// Sender address, when it differs from the login.
    #[serde(rename = "smtp_from")]
    pub from: Option<String>,

    #[serde(rename = "smtp_tls", default)]
    pub tls: TlsMode,

    /// Accept self-signed or mismatched relay certificates.
    #[serde(rename = "smtp_accept_invalid_certs", default)]
    pub accept_invalid_certs: bool,

    /// Connection timeout in seconds (default: 60).
    #[serde(rename = "smtp_timeout", default = "default_timeout")]
    pub timeout: u64,
}

fn default_port() -> u16 {
    465
}

fn default_timeout() -> u64 {
    60
}

impl MailerConfig {
    /// Defaults for everything but the host.
    pub fn new(host: impl Into<String>) -> Self {
        MailerConfig {
            host: host.into(),
            port: default_port(),
            username: None,
            password: None,
            from: None,
            tls: TlsMode::default(),
            accept_invalid_certs: false,
            timeout: default_timeout(),
        }
    }
}

/// SMTP-based mailer using lettre.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailer {
    /// Must be called from within a Tokio runtime.
    pub fn from_config(config: MailerConfig) -> Result<Self, MailError> {
        if config.accept_invalid_certs && config.tls != TlsMode::None {
            tracing::warn!(
                host = %config.host,
                "relay certificate validation is disabled (SMTP_ACCEPT_INVALID_CERTS)"
            );
        }

        let tls = match config.tls {
            TlsMode::None => Tls::None,
            TlsMode::Tls => Tls::Wrapper(tls_parameters(&config)?),
            TlsMode::Starttls => Tls::Required(tls_parameters(&config)?),
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .timeout(Some(Duration::from_secs(config.timeout)));

        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: Arc::new(builder.build()),
        })
    }
}

fn tls_parameters(config: &MailerConfig) -> Result<TlsParameters, MailError> {
    TlsParameters::builder(config.host.clone())
        .dangerous_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|e| MailError::Smtp(e.to_string()))
}

fn parse_mailbox(value: &str) -> Result<Mailbox, MailError> {
    value
        .parse()
        .map_err(|_| MailError::InvalidAddress(value.to_string()))
}

/// Build a lettre Message from our Email type, reading any attachment from disk.
async fn build_message(email: &Email) -> Result<Message, MailError> {
    let mut builder = Message::builder().from(parse_mailbox(&email.from)?);

    for to in &email.to {
        builder = builder.to(parse_mailbox(to)?);
    }

    if let Some(reply_to) = &email.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }

    builder = builder.subject(&email.subject);

    let message = match &email.attachment {
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.text.clone()),
        Some(attachment) => {
            let bytes = tokio::fs::read(&attachment.path)
                .await
                .map_err(|source| MailError::Attachment {
                    path: attachment.path.clone(),
                    source,
                })?;
            let mime = mime_guess::from_path(&attachment.filename).first_or_octet_stream();
            let content_type =
                ContentType::parse(mime.as_ref()).map_err(|e| MailError::Build(e.to_string()))?;

            builder.multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(email.text.clone()))
                    .singlepart(
                        MimeAttachment::new(attachment.filename.clone()).body(bytes, content_type),
                    ),
            )
        }
    };

    message.map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let message = build_message(email).await?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> crate::mail::EmailBuilder {
        Email::builder()
            .from("\"Job Application\" <relay@example.com>")
            .to("hr@example.com")
            .subject("New Job Application from Ada")
            .text("Full Name: Ada")
    }

    #[tokio::test]
    async fn plain_message_has_headers() {
        let message = build_message(&email().reply_to("ada@example.com").build().unwrap())
            .await
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("To: hr@example.com"));
        assert!(raw.contains("Reply-To: ada@example.com"));
        assert!(raw.contains("Subject: New Job Application from Ada"));
        assert!(raw.contains("Full Name: Ada"));
    }

    #[tokio::test]
    async fn attachment_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1700000000000-cv.pdf");
        tokio::fs::write(&path, b"%PDF-1.4").await.unwrap();

        let message = build_message(&email().attach("cv.pdf", &path).build().unwrap())
            .await
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("application/pdf"));
        assert!(raw.contains("cv.pdf"));
        assert!(path.exists(), "the mailer must not remove the attachment");
    }

    #[tokio::test]
    async fn missing_attachment_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.pdf");

        let err = build_message(&email().attach("cv.pdf", &path).build().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Attachment { .. }));
    }

    #[tokio::test]
    async fn invalid_recipient_is_reported() {
        let email = Email::builder()
            .from("relay@example.com")
            .to("not an address")
            .subject("x")
            .text("y")
            .build()
            .unwrap();
        let err = build_message(&email).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(a) if a == "not an address"));
    }

    #[tokio::test]
    async fn transport_builds_for_every_tls_mode() {
        for tls in [TlsMode::Tls, TlsMode::Starttls, TlsMode::None] {
            let config = MailerConfig {
                tls,
                accept_invalid_certs: true,
                username: Some("relay@example.com".into()),
                password: Some("secret".into()),
                ..MailerConfig::new("smtp.example.com")
            };
            assert!(SmtpMailer::from_config(config).is_ok());
        }
    }
}
