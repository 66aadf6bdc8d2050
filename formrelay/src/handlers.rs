//! Form endpoints.

use axum::async_trait;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde_json::{json, Value};

use crate::error::{Error, Reply};
use crate::routes::Context;
use crate::staging::{StagedFile, Stager};
use crate::submission::{ApplicationSubmission, ContactSubmission, FormFields};

/// Multipart part carrying the applicant's file.
pub const RESUME_FIELD: &str = "resume";

type JsonResult<T> = Result<Json<T>, Error>;

/// Text fields from a JSON, URL-encoded or multipart body.
///
/// File parts in a multipart body are skipped. Any other content type yields
/// no fields at all.
#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(map) = Json::<serde_json::Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| Error::MalformedBody(e.body_text()))?;
            Ok(FormFields::from_json(map))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| Error::MalformedBody(e.body_text()))?;
            Ok(fields.into_iter().collect())
        } else if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| Error::MalformedBody(e.body_text()))?;

            let mut fields = FormFields::default();
            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| Error::MalformedBody(e.body_text()))?
            {
                let Some(name) = field.name().map(str::to_owned) else {
                    continue;
                };
                if field.file_name().is_some() {
                    continue;
                }
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::MalformedBody(e.body_text()))?;
                fields.insert(name, value);
            }
            Ok(fields)
        } else {
            Ok(FormFields::default())
        }
    }
}

/// Read every part of an application, staging the resume as it streams in.
///
/// If reading fails after the resume was staged, the staged file is discarded.
async fn read_application(
    stager: &Stager,
    mut multipart: Multipart,
) -> Result<(FormFields, Option<StagedFile>), Error> {
    let mut fields = FormFields::default();
    let mut resume: Option<StagedFile> = None;

    let read: Result<(), Error> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| Error::MalformedBody(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_owned();
            let file_name = field.file_name().map(str::to_owned);

            match file_name {
                // Browsers send an empty filename when no file was chosen
                Some(file_name) if file_name.is_empty() => {}
                Some(file_name) if name == RESUME_FIELD && resume.is_none() => {
                    resume = Some(stager.stage(&file_name, field).await?);
                }
                Some(_) => tracing::debug!(field = %name, "ignoring unexpected file part"),
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| Error::MalformedBody(e.body_text()))?;
                    fields.insert(name, value);
                }
            }
        }
        Ok(())
    }
    .await;

    if let Err(err) = read {
        if let Some(staged) = &resume {
            stager.discard(staged).await;
        }
        return Err(err);
    }

    Ok((fields, resume))
}

/// `POST /backend/apply`
pub async fn apply(
    State(ctx): State<Context>,
    multipart: Result<Multipart, MultipartRejection>,
) -> JsonResult<Reply> {
    // A body that is not multipart cannot carry a resume
    let multipart = multipart.map_err(|rejection| {
        tracing::debug!("application body is not multipart: {}", rejection.body_text());
        Error::MissingResume
    })?;

    let (fields, resume) = read_application(&ctx.stager, multipart).await?;
    let resume = resume.ok_or(Error::MissingResume)?;
    let submission = ApplicationSubmission::new(fields, resume);

    let outcome = match submission.to_email(&ctx.envelope) {
        Ok(email) => ctx.mailer.send(&email).await,
        Err(err) => Err(err),
    };

    if ctx.cleanup.discard_after(outcome.is_ok()) {
        ctx.stager.discard(&submission.attachment).await;
    } else {
        tracing::warn!(
            path = %submission.attachment.path.display(),
            "keeping staged resume after failed relay"
        );
    }

    outcome.map_err(Error::ApplicationRelay)?;

    tracing::info!(position = %submission.position, "relayed job application");
    Ok(Json(Reply::ok("Application submitted successfully!")))
}

/// `POST /backend/contact`
pub async fn contact(State(ctx): State<Context>, fields: FormFields) -> JsonResult<Reply> {
    let submission = ContactSubmission::from_fields(fields)?;
    let email = submission
        .to_email(&ctx.envelope)
        .map_err(Error::ContactRelay)?;

    ctx.mailer
        .send(&email)
        .await
        .map_err(Error::ContactRelay)?;

    tracing::info!("relayed contact message");
    Ok(Json(Reply::ok("Message sent successfully!")))
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({"ok": true}))
}
