//! Feature modules implementing the roster API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes:
//!
//! - **students**: single-record inserts and the filtered, paginated query surface
//! - **uploads**: CSV submission, cancellation and the progress WebSocket
//!
//! Commands are write operations, queries are reads. Both are plain `handle`
//! functions that the route handlers call after extracting the request.

pub mod shared;
pub mod students;
pub mod uploads;

use axum::Router;
use std::sync::Arc;

use crate::ingest::StudentIntake;
use crate::store::StudentStore;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Student backend used by the query surface and single inserts
    pub store: Arc<dyn StudentStore>,
    /// Upload pipeline; owns the session registry
    pub intake: Arc<StudentIntake>,
}

/// Creates the API router with every feature mounted under its own prefix:
/// - `/students` - student records
/// - `/uploads` - CSV uploads and their progress streams
pub fn router(state: FeatureState) -> Router<()> {
    let max_upload_bytes = state.intake.settings().max_upload_bytes;
    Router::new()
        .nest("/students", students::students_routes().with_state(state.store))
        .nest("/uploads", uploads::uploads_routes(max_upload_bytes).with_state(state.intake))
}
