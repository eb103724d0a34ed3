//! CSV uploads
//!
//! A submission spools its files and returns a tracking id straight away.
//! Progress for that id is streamed over a WebSocket, and the upload can be
//! cancelled while its files are still being processed.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::uploads_routes;
