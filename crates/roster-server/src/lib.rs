//! Roster Server Library
//!
//! HTTP server that ingests student CSV uploads and serves the resulting
//! records.
//!
//! # Overview
//!
//! - **Uploads**: multi-file CSV submissions processed in the background, with
//!   per-file progress streamed over a WebSocket
//! - **Students**: single inserts plus a filtered, sorted, paginated query API
//! - **Storage**: PostgreSQL through SQLx, or an in-memory store
//! - **Configuration**: environment-based, see [`config`]
//!
//! # Architecture
//!
//! Endpoints are grouped into feature slices under [`features`]. Commands
//! (writes) and queries (reads) are plain async `handle` functions, called by
//! thin Axum route handlers. The upload pipeline itself lives in [`ingest`]
//! and only depends on the [`store::RecordStore`] write trait.
//!
//! ## Framework Stack
//!
//! - **Axum**: HTTP routing, multipart and WebSocket extraction
//! - **SQLx**: PostgreSQL pool, migrations and runtime queries
//! - **Tower**: middleware and service abstractions
//! - **csv-async**: streaming CSV decoding on tokio readers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod ingest;
pub mod middleware;
pub mod store;

pub use error::{ApiResult, AppError};
