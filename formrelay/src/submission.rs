//! Parsed form payloads and the emails they turn into.

use std::collections::HashMap;

use lettre::Address;
use serde_json::Value;

use crate::error::Error;
use crate::mail::{Email, Envelope, MailError};
use crate::staging::StagedFile;

/// Text fields of one submitted form. A repeated name keeps its last value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Absent fields read as empty text.
    fn take(&mut self, name: &str) -> String {
        self.0.remove(name).unwrap_or_default()
    }

    /// Strings, numbers and booleans become text; `null` and nested values are dropped.
    pub fn from_json(map: serde_json::Map<String, Value>) -> Self {
        map.into_iter()
            .filter_map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((name, text))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        FormFields(iter.into_iter().collect())
    }
}

/// Use the submitter's address as Reply-To only when it is a valid address.
fn reply_to(email: &str) -> Option<String> {
    email.trim().parse::<Address>().ok().map(|a| a.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

impl ContactSubmission {
    /// All four fields must be present and non-empty. Formats are not checked.
    pub fn from_fields(mut fields: FormFields) -> Result<Self, Error> {
        let submission = ContactSubmission {
            name: fields.take("name"),
            email: fields.take("email"),
            phone: fields.take("phone"),
            message: fields.take("message"),
        };

        let complete = [
            &submission.name,
            &submission.email,
            &submission.phone,
            &submission.message,
        ]
        .iter()
        .all(|field| !field.is_empty());

        if complete {
            Ok(submission)
        } else {
            Err(Error::MissingFields)
        }
    }

    pub fn to_email(&self, envelope: &Envelope) -> Result<Email, MailError> {
        let mut builder = Email::builder()
            .from(envelope.sender_mailbox("Website Contact").to_string())
            .to(envelope.recipient().to_string())
            .subject(format!("New Contact Form Submission from {}", self.name))
            .text(format!(
                "Name: {}\nEmail: {}\nPhone: {}\nMessage: {}",
                self.name, self.email, self.phone, self.message
            ));
        if let Some(address) = reply_to(&self.email) {
            builder = builder.reply_to(address);
        }
        builder.build()
    }
}

/// A job application. Only the attachment is mandatory; text fields may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub message: String,
    pub attachment: StagedFile,
}

impl ApplicationSubmission {
    pub fn new(mut fields: FormFields, attachment: StagedFile) -> Self {
        ApplicationSubmission {
            name: fields.take("name"),
            email: fields.take("email"),
            phone: fields.take("phone"),
            position: fields.take("position"),
            message: fields.take("message"),
            attachment,
        }
    }

    pub fn to_email(&self, envelope: &Envelope) -> Result<Email, MailError> {
        let mut builder = Email::builder()
            .from(envelope.sender_mailbox("Job Application").to_string())
            .to(envelope.recipient().to_string())
            .subject(format!("New Job Application from {}", self.name))
            .text(format!(
                "Full Name: {}\nEmail: {}\nPhone: {}\nPosition: {}\nMessage: {}",
                self.name, self.email, self.phone, self.position, self.message
            ))
            .attach(
                self.attachment.original_filename.clone(),
                self.attachment.path.clone(),
            );
        if let Some(address) = reply_to(&self.email) {
            builder = builder.reply_to(address);
        }
        builder.build()
    }
}
