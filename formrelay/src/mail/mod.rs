//! Outbound mail relay.
//!
//! A thin layer over [lettre](https://lettre.rs): [`SmtpMailer`] submits each
//! [`Email`] to the configured relay exactly once, with no queueing or retry.
//! Handlers depend on the [`Mailer`] trait so tests can swap the transport out.
//!
//! # Environment Variables
//!
//! [`MailerConfig`] is read with [`crate::EnvConfig`]:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_HOST` | Yes | Relay hostname |
//! | `SMTP_PORT` | No | Port (default: 465) |
//! | `SMTP_USER` | No | Username; also the fallback sender and recipient |
//! | `SMTP_PASS` | No | Password |
//! | `SMTP_FROM` | No | Sender address (default: `SMTP_USER`) |
//! | `SMTP_TLS` | No | `tls` (default, implicit TLS), `starttls`, or `none` |
//! | `SMTP_ACCEPT_INVALID_CERTS` | No | Skip relay certificate validation (default: false) |
//! | `SMTP_TIMEOUT` | No | Connection timeout in seconds (default: 60) |

mod envelope;
mod mailer;
mod message;

use std::path::PathBuf;

pub use envelope::Envelope;
pub use mailer::{Mailer, MailerConfig, SmtpMailer, TlsMode};
pub use message::{Attachment, Email, EmailBuilder};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),
}
