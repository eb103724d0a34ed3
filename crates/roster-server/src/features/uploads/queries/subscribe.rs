//! Progress subscription
//!
//! Resolves a tracking id to its conduit before the WebSocket upgrade, so an
//! unknown or already-watched upload is refused with a plain HTTP error.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::session::ConduitGuard;
use crate::ingest::SessionRegistry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeQuery {
    pub upload_id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("Upload '{0}' not found")]
    NotFound(Uuid),

    #[error("Upload '{0}' already has a subscriber")]
    AlreadySubscribed(Uuid),
}

impl From<SubscribeError> for AppError {
    fn from(err: SubscribeError) -> Self {
        match err {
            SubscribeError::NotFound(_) => AppError::NotFound(err.to_string()),
            SubscribeError::AlreadySubscribed(_) => AppError::Conflict(err.to_string()),
        }
    }
}

#[tracing::instrument(skip(registry), fields(upload_id = %query.upload_id))]
pub async fn handle(
    registry: &SessionRegistry,
    query: SubscribeQuery,
) -> Result<ConduitGuard, SubscribeError> {
    let session = registry
        .lookup(query.upload_id)
        .await
        .ok_or(SubscribeError::NotFound(query.upload_id))?;
    session
        .claim()
        .ok_or(SubscribeError::AlreadySubscribed(query.upload_id))
}
