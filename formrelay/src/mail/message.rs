//! Email message types and builder.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::MailError;

/// A file on local disk to attach. The mailer reads it but never deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename presented to the recipient.
    pub filename: String,
    /// Where the bytes currently live.
    pub path: PathBuf,
}

/// A plain-text email ready to hand to a [`super::Mailer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Email {
    /// Sender mailbox, optionally with a display name (`"Name" <addr>`).
    pub from: String,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Email subject line.
    pub subject: String,
    /// Plain text body.
    pub text: String,
    /// Optional reply-to address.
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Email {
    /// Create a new email builder.
    pub fn builder() -> EmailBuilder {
        EmailBuilder::default()
    }
}

/// Builder for constructing [`Email`] instances.
#[derive(Debug, Default)]
pub struct EmailBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    text: Option<String>,
    reply_to: Option<String>,
    attachment: Option<Attachment>,
}

impl EmailBuilder {
    /// Set the sender (required).
    pub fn from(mut self, mailbox: impl Into<String>) -> Self {
        self.from = Some(mailbox.into());
        self
    }

    /// Add a primary recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }

    /// Attach a local file under the given display name.
    pub fn attach(mut self, filename: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(Attachment {
            filename: filename.into(),
            path: path.into(),
        });
        self
    }

    /// Build the email, validating required fields.
    pub fn build(self) -> Result<Email, MailError> {
        if self.to.is_empty() {
            return Err(MailError::Build("at least one recipient required".into()));
        }

        let from = self
            .from
            .ok_or_else(|| MailError::Build("from address required".into()))?;

        let subject = self
            .subject
            .ok_or_else(|| MailError::Build("subject required".into()))?;

        let text = self
            .text
            .ok_or_else(|| MailError::Build("text body required".into()))?;

        Ok(Email {
            from,
            to: self.to,
            subject,
            text,
            reply_to: self.reply_to,
            attachment: self.attachment,
        })
    }
}
