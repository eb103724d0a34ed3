pub mod response;

use crate::config::Config;
use crate::db;
use crate::features;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    /// Present when the server runs against Postgres
    pub db: Option<PgPool>,
    pub features: features::FeatureState,
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let api_v1 = features::router(state.features.clone());

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api_v1)
        .layer(crate::middleware::tracing_layer())
        .layer(crate::middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Roster Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health(State(state): State<AppState>) -> Response {
    let Some(pool) = &state.db else {
        return (StatusCode::OK, Json(json!({ "status": "ok", "store": "memory" })))
            .into_response();
    };

    match db::health_check(pool).await {
        Ok(()) => {
            (StatusCode::OK, Json(json!({ "status": "ok", "store": "postgres" }))).into_response()
        },
        Err(e) => {
            tracing::error!(error = %e, "database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable", "store": "postgres" })),
            )
                .into_response()
        },
    }
}
