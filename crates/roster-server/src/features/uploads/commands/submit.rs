//! Submit upload command
//!
//! Reads every `files` part of a multipart form into its own temporary file,
//! then hands the batch to the intake coordinator. Other parts are ignored.

use axum::extract::multipart::{Multipart, MultipartError};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::{spool_stream, StudentIntake};

/// Multipart field name carrying the uploaded files.
pub const FILES_FIELD: &str = "files";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitUploadResponse {
    pub upload_id: Uuid,
    pub files: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitUploadError {
    #[error("Failed to parse multipart form: {0}")]
    Multipart(#[from] MultipartError),

    #[error("No files were provided for upload")]
    NoFiles,

    #[error("Failed to spool uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SubmitUploadError> for AppError {
    fn from(err: SubmitUploadError) -> Self {
        match err {
            SubmitUploadError::Multipart(_) | SubmitUploadError::NoFiles => {
                AppError::BadRequest(err.to_string())
            },
            SubmitUploadError::Io(e) => AppError::Io(e),
        }
    }
}

#[tracing::instrument(skip(intake, multipart))]
pub async fn handle(
    intake: &StudentIntake,
    mut multipart: Multipart,
) -> Result<SubmitUploadResponse, SubmitUploadError> {
    let spool_dir = intake.settings().spool_dir();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let index = files.len();
        let name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("file-{index}"));
        let chunks = Box::pin(field.map_err(|e| std::io::Error::other(e.body_text())));
        let spooled = spool_stream(&spool_dir, index, name, chunks).await?;
        tracing::debug!(file_index = index, file = %spooled.name, "file spooled");
        files.push(spooled);
    }

    if files.is_empty() {
        return Err(SubmitUploadError::NoFiles);
    }

    let count = files.len();
    let upload_id = intake.launch(files).await;
    tracing::info!(%upload_id, files = count, "upload accepted");

    Ok(SubmitUploadResponse {
        upload_id,
        files: count,
    })
}
