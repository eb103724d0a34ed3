//! Test helpers for roster server integration tests
//!
//! - An app backed by `MemoryStore`, with uploads spooled to a temp dir
//! - Multipart request builders for the uploads endpoint
//! - Random student CSV fixtures

#![allow(dead_code)]

pub mod fixtures;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use roster_common::types::{StatusEvent, STUDENT_CSV_HEADER};
use roster_server::{
    api::{self, AppState},
    config::{Config, IngestConfig},
    features::FeatureState,
    ingest::{IntakeCoordinator, SessionRegistry, StudentIntake, StudentMapper},
    store::{MemoryStore, StudentStore},
};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use fixtures::*;

pub const BOUNDARY: &str = "roster-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub intake: Arc<StudentIntake>,
    pub shutdown: CancellationToken,
    _spool: TempDir,
}

impl TestApp {
    /// Drains the upload's status conduit until every file task has finished.
    pub async fn wait_for_upload(&self, upload_id: Uuid) -> Vec<StatusEvent> {
        let session = self
            .intake
            .registry()
            .lookup(upload_id)
            .await
            .expect("upload session should be registered");
        let mut conduit = session.claim().expect("conduit should be free");

        let mut events = Vec::new();
        while let Some(event) = conduit.recv().await {
            events.push(event);
        }
        events
    }
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(MemoryStore::new())
}

pub fn setup_test_app_with(store: MemoryStore) -> TestApp {
    let spool = tempfile::tempdir().expect("Failed to create spool dir");
    let store = Arc::new(store);
    let shutdown = CancellationToken::new();

    let dyn_store: Arc<dyn StudentStore> = store.clone();
    let settings = IngestConfig {
        batch_size: 5,
        max_workers: 4,
        shard_count: 3,
        spool_dir: Some(spool.path().to_path_buf()),
        ..IngestConfig::default()
    };
    let intake: StudentIntake = IntakeCoordinator::new(
        SessionRegistry::new(),
        Arc::clone(&dyn_store),
        StudentMapper,
        &STUDENT_CSV_HEADER,
        settings,
        shutdown.clone(),
    );
    let intake = Arc::new(intake);

    let state = AppState {
        db: None,
        features: FeatureState {
            store: dyn_store,
            intake: Arc::clone(&intake),
        },
    };
    let router = api::create_router(state, &Config::default());

    TestApp {
        router,
        store,
        intake,
        shutdown,
        _spool: spool,
    }
}

/// Builds a multipart body with one `files` part per `(filename, content)`.
pub fn multipart_body(files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = String::new();
    for (filename, content) in files {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: text/csv\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body.into_bytes()
}

/// A multipart body whose only part is a plain text field.
pub fn multipart_without_files() -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\nno files here\r\n--{BOUNDARY}--\r\n"
    )
    .into_bytes()
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/uploads")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
