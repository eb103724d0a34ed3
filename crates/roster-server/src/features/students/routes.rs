//! Student API routes
//!
//! - `POST /api/v1/students` - Insert one validated student
//! - `GET /api/v1/students` - List with filters, sorting and pagination
//! - `GET /api/v1/students/by-name/:name` - Exact-name lookup
//! - `GET /api/v1/students/by-subject/:subject` - Paginated rows for one course

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::{
    commands::CreateStudentCommand,
    queries::{BySubjectQuery, FindByNameQuery, ListStudentsQuery},
};
use crate::api::response::ApiResponse;
use crate::error::{ApiResult, AppError};
use crate::features::shared::PaginationParams;
use crate::store::StudentStore;

pub type StoreState = Arc<dyn StudentStore>;

pub fn students_routes() -> Router<StoreState> {
    Router::new()
        .route("/", get(list_students).post(create_student))
        .route("/by-name/:name", get(find_by_name))
        .route("/by-subject/:subject", get(by_subject))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

#[tracing::instrument(skip(store, payload))]
async fn create_student(
    State(store): State<StoreState>,
    payload: Result<Json<CreateStudentCommand>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(command) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let response = super::commands::create::handle(store.as_ref(), command).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))).into_response())
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

#[tracing::instrument(skip(store, params))]
async fn list_students(
    State(store): State<StoreState>,
    params: Result<Query<ListStudentsQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(query) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let result = super::queries::list::handle(store.as_ref(), query).await?;
    Ok(ApiResponse::paginated(result.page, result.meta).into_response())
}

#[tracing::instrument(skip(store))]
async fn find_by_name(
    State(store): State<StoreState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let students =
        super::queries::by_name::handle(store.as_ref(), FindByNameQuery { name }).await?;
    Ok(ApiResponse::success(students).into_response())
}

#[tracing::instrument(skip(store, params))]
async fn by_subject(
    State(store): State<StoreState>,
    Path(subject): Path<String>,
    params: Result<Query<PaginationParams>, QueryRejection>,
) -> ApiResult<Response> {
    let Query(pagination) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let result =
        super::queries::by_subject::handle(store.as_ref(), BySubjectQuery { subject, pagination })
            .await?;
    Ok(ApiResponse::paginated(result.page, result.meta).into_response())
}
