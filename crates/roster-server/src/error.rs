//! Server error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::ingest::PersistError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{}", crate::ingest::bulk::MISSING_DATA_MESSAGE)]
    MissingData,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::MissingData => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Io(_)
            | AppError::Database(_)
            | AppError::Persistence(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::MissingData => "MISSING_DATA",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Io(_) => "IO_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Persistence(_) => "PERSISTENCE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl From<PersistError> for AppError {
    fn from(err: PersistError) -> Self {
        match err {
            PersistError::MissingData => AppError::MissingData,
            PersistError::Store(e) => e.into(),
            shards @ PersistError::Shards { .. } => AppError::Persistence(shards.to_string()),
        }
    }
}

impl From<roster_common::RosterError> for AppError {
    fn from(err: roster_common::RosterError) -> Self {
        match err {
            roster_common::RosterError::UnknownCourse(name) => {
                AppError::BadRequest(format!("Unknown subject: {name}"))
            },
            roster_common::RosterError::Io(e) => AppError::Io(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Database(e) => {
                tracing::error!(error = ?e, "database error");
                "A database error occurred".to_string()
            },
            AppError::Io(e) => {
                tracing::error!(error = ?e, "io error");
                "An IO error occurred".to_string()
            },
            AppError::Internal(msg) | AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "request failed");
                msg.clone()
            },
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(self.code(), message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ShardFailure;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingData.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_shard_failures_map_to_persistence() {
        let err: AppError = PersistError::Shards {
            shards: 2,
            failures: vec![ShardFailure {
                shard: 1,
                rows: 3,
                reason: "boom".into(),
            }],
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("shard 1"));
    }

    #[test]
    fn test_missing_data_keeps_message() {
        let err: AppError = PersistError::MissingData.into();
        assert_eq!(err.code(), "MISSING_DATA");
        assert_eq!(err.to_string(), crate::ingest::bulk::MISSING_DATA_MESSAGE);
    }
}
