//! Résumé submission endpoint.
//!
//! Parses the multipart candidature form, materializes the uploaded
//! résumé under the upload directory, and hands the assembled
//! [`SubmissionTask`] to the producer.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};

use envio_core::error::CoreError;
use envio_core::types::{SubmissionTask, DEFAULT_CANDIDATE};

use crate::error::{AppError, AppResult};
use crate::producer;
use crate::state::AppState;

/// Parsed multipart form fields.
#[derive(Default)]
struct SubmissionForm {
    company: Option<String>,
    candidate: Option<String>,
    email: Option<String>,
    job_title: Option<String>,
    /// Materialized upload: absolute path on disk + original filename.
    attachment: Option<(PathBuf, String)>,
}

/// POST /submit -- accept a candidature form and enqueue the delivery.
///
/// Responds 400 when the résumé file is missing, 500 when the broker is
/// unconfigured or unreachable, and `{"status":"enqueued"}` on success.
async fn submit_resume(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let form = parse_form(multipart, &state.config.upload_dir).await?;

    let (attachment_path, attachment_name) = form.attachment.ok_or_else(|| {
        CoreError::InvalidSubmission("résumé file field 'curriculo' is required".to_string())
    })?;

    let task = SubmissionTask {
        company: form.company.unwrap_or_default(),
        candidate: form
            .candidate
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CANDIDATE.to_string()),
        email: form.email.unwrap_or_default(),
        job_title: form.job_title.unwrap_or_default(),
        attachment_path: attachment_path.to_string_lossy().into_owned(),
        attachment_name,
    };

    let connector = state
        .connector
        .as_deref()
        .ok_or(CoreError::ConfigurationMissing("AMQP_URL"))?;

    producer::submit(connector, &task).await?;

    Ok(Json(json!({ "status": "enqueued" })))
}

/// Drain the multipart stream into a [`SubmissionForm`], writing the
/// file field to the upload directory under a unique name.
async fn parse_form(mut multipart: Multipart, upload_dir: &Path) -> AppResult<SubmissionForm> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("nome") => form.company = Some(read_text(field).await?),
            Some("candidato") => form.candidate = Some(read_text(field).await?),
            Some("email") => form.email = Some(read_text(field).await?),
            Some("vaga") => form.job_title = Some(read_text(field).await?),
            Some("curriculo") => {
                let original = field
                    .file_name()
                    .unwrap_or("curriculo")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Invalid file upload: {e}")))?;
                let path = save_upload(upload_dir, &data)?;
                form.attachment = Some((path, original));
            }
            // Unknown fields are ignored.
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid form field: {e}")))
}

/// Write the uploaded bytes under a unique name and return the absolute
/// path recorded on the task.
fn save_upload(upload_dir: &Path, data: &[u8]) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(upload_dir)
        .map_err(|e| AppError::InternalError(format!("Cannot create upload dir: {e}")))?;

    let filename = uuid::Uuid::new_v4().simple().to_string();
    let path = upload_dir.join(filename);
    std::fs::write(&path, data)
        .map_err(|e| AppError::InternalError(format!("Cannot write upload: {e}")))?;

    std::fs::canonicalize(&path)
        .map_err(|e| AppError::InternalError(format!("Cannot resolve upload path: {e}")))
}

/// Mount the submission route.
pub fn router() -> Router<AppState> {
    Router::new().route("/submit", post(submit_resume))
}
