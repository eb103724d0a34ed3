//! Upload API routes
//!
//! - `POST /api/v1/uploads` - Submit CSV files (multipart field `files`)
//! - `GET /api/v1/uploads/:upload_id/events` - WebSocket progress stream
//! - `DELETE /api/v1/uploads/:upload_id` - Cancel an in-flight upload

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::StreamExt;
use uuid::Uuid;

use super::{commands::CancelUploadCommand, queries::SubscribeQuery};
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::ingest::broadcast::stream_session;
use crate::ingest::StudentIntake;

pub type IntakeState = Arc<StudentIntake>;

pub fn uploads_routes(max_upload_bytes: usize) -> Router<IntakeState> {
    Router::new()
        .route("/", post(submit_upload))
        .route("/:upload_id", delete(cancel_upload))
        .route("/:upload_id/events", get(subscribe_events))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

#[tracing::instrument(skip(intake, multipart))]
async fn submit_upload(
    State(intake): State<IntakeState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    let multipart = multipart.map_err(|e| {
        AppError::BadRequest(format!("Failed to parse multipart form: {}", e.body_text()))
    })?;
    let response = super::commands::submit::handle(&intake, multipart).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(intake))]
async fn cancel_upload(
    State(intake): State<IntakeState>,
    Path(upload_id): Path<Uuid>,
) -> ApiResult<Response> {
    let response =
        super::commands::cancel::handle(intake.registry(), CancelUploadCommand { upload_id })
            .await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// The session is claimed before the upgrade is validated, so unknown and
/// already-watched uploads answer 404 and 409 even to plain HTTP requests.
#[tracing::instrument(skip(intake, ws))]
async fn subscribe_events(
    State(intake): State<IntakeState>,
    Path(upload_id): Path<Uuid>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    let conduit =
        super::queries::subscribe::handle(intake.registry(), SubscribeQuery { upload_id }).await?;
    let ws = ws.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let registry = intake.registry().clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let (writer, reader) = socket.split();
        stream_session(registry, upload_id, conduit, writer, reader).await;
    }))
}
