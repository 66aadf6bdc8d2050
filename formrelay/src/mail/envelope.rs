use lettre::message::Mailbox;
use lettre::Address;

use super::{MailError, MailerConfig};

/// Sender and recipient shared by every relayed submission.
///
/// Resolved once at startup so a missing or malformed address stops the
/// process before it accepts traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: Address,
    recipient: Address,
}

impl Envelope {
    pub fn new(sender: Address, recipient: Address) -> Self {
        Envelope { sender, recipient }
    }

    /// Sender is `SMTP_FROM`, else `SMTP_USER`. Recipient is `receiver`
    /// (`RECEIVER_EMAIL`), else `SMTP_USER`. Blank values count as unset.
    pub fn resolve(config: &MailerConfig, receiver: Option<&str>) -> Result<Self, MailError> {
        let user = non_blank(config.username.as_deref());

        let recipient = non_blank(receiver)
            .or(user)
            .ok_or_else(|| MailError::MissingConfig("RECEIVER_EMAIL (or SMTP_USER)".into()))?;
        let sender = non_blank(config.from.as_deref())
            .or(user)
            .ok_or_else(|| MailError::MissingConfig("SMTP_FROM (or SMTP_USER)".into()))?;

        Ok(Envelope {
            sender: parse_address(sender)?,
            recipient: parse_address(recipient)?,
        })
    }

    /// The `From` mailbox, labelled with a display name such as "Job Application".
    pub fn sender_mailbox(&self, display_name: &str) -> Mailbox {
        Mailbox::new(Some(display_name.to_string()), self.sender.clone())
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_address(value: &str) -> Result<Address, MailError> {
    value
        .parse()
        .map_err(|_| MailError::InvalidAddress(value.to_string()))
}
