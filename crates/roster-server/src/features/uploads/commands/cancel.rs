use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::SessionRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelUploadCommand {
    pub upload_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelUploadResponse {
    pub upload_id: Uuid,
    pub cancelled: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CancelUploadError {
    #[error("Upload '{0}' not found")]
    NotFound(Uuid),
}

impl From<CancelUploadError> for AppError {
    fn from(err: CancelUploadError) -> Self {
        AppError::NotFound(err.to_string())
    }
}

/// Signals the upload's file tasks to stop. Rows already flushed stay
/// persisted; the progress stream still closes normally.
#[tracing::instrument(skip(registry), fields(upload_id = %command.upload_id))]
pub async fn handle(
    registry: &SessionRegistry,
    command: CancelUploadCommand,
) -> Result<CancelUploadResponse, CancelUploadError> {
    if !registry.cancel(command.upload_id).await {
        return Err(CancelUploadError::NotFound(command.upload_id));
    }
    tracing::info!("upload cancellation requested");
    Ok(CancelUploadResponse {
        upload_id: command.upload_id,
        cancelled: true,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_cancel_known_upload() {
        let registry = SessionRegistry::new();
        let token = CancellationToken::new();
        let (upload_id, _status) = registry.register(4, 1, token.clone()).await;

        let response = handle(&registry, CancelUploadCommand { upload_id }).await.unwrap();
        assert!(response.cancelled);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_unknown_upload() {
        let registry = SessionRegistry::new();
        let upload_id = Uuid::new_v4();
        let err = handle(&registry, CancelUploadCommand { upload_id }).await.unwrap_err();
        assert!(matches!(err, CancelUploadError::NotFound(id) if id == upload_id));
    }
}
