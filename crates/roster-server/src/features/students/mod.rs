//! Student records
//!
//! Single validated inserts and a filtered, sorted, paginated read surface
//! over whatever [`StudentStore`](crate::store::StudentStore) the server runs.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::students_routes;
