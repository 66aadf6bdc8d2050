use std::borrow::Cow;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::mail::MailError;
use crate::staging::StorageError;

/// The JSON body of every response: `{"success": bool, "message": string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
    pub message: Cow<'static, str>,
}

impl Reply {
    pub fn ok(message: impl Into<Cow<'static, str>>) -> Self {
        Reply {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<Cow<'static, str>>) -> Self {
        Reply {
            success: false,
            message: message.into(),
        }
    }
}

/// Everything a form handler can fail with.
///
/// `Display` is the internal, logged description. Clients only ever see
/// [`Error::http_message`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("application has no resume attachment")]
    MissingResume,

    #[error("contact form is missing required fields")]
    MissingFields,

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("origin {0} is not allowed")]
    ForbiddenOrigin(String),

    #[error("relaying application failed: {0}")]
    ApplicationRelay(#[source] MailError),

    #[error("relaying contact message failed: {0}")]
    ContactRelay(#[source] MailError),

    #[error("staging upload failed: {0}")]
    Storage(#[from] StorageError),
}

impl Error {
    pub fn http_code(&self) -> StatusCode {
        match self {
            Error::MissingResume | Error::MissingFields | Error::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::ForbiddenOrigin(_) => StatusCode::FORBIDDEN,
            // The client stopped sending mid-upload; nothing failed on our side.
            Error::Storage(StorageError::Interrupted(_)) => StatusCode::BAD_REQUEST,
            Error::ApplicationRelay(_) | Error::ContactRelay(_) | Error::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn http_message(&self) -> &'static str {
        match self {
            Error::MissingResume => "Resume file is required.",
            Error::MissingFields => "All fields are required.",
            Error::MalformedBody(_) | Error::Storage(StorageError::Interrupted(_)) => {
                "Invalid form submission."
            }
            Error::ForbiddenOrigin(_) => "Origin not allowed.",
            Error::ApplicationRelay(_) => "Error submitting application.",
            Error::ContactRelay(_) => "Error sending your message.",
            Error::Storage(_) => "Error saving the uploaded file.",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let code = self.http_code();
        // Server errors are logged in full since the body only carries the generic message
        if code.is_server_error() {
            tracing::error!("Error Status {}: {}", code, self);
        } else {
            tracing::debug!("Rejected with {}: {}", code, self);
        }

        (code, Json(Reply::failure(self.http_message()))).into_response()
    }
}
