//! Roster Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared domain types, logging setup, and error handling for the roster
//! workspace.
//!
//! - **Types**: the student record, the record capability trait, upload
//!   status events and the course catalogue
//! - **Logging**: `tracing` subscriber initialization driven by the environment
//! - **Errors**: the common error and result types
//!
//! # Example
//!
//! ```no_run
//! use roster_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> roster_common::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{Result, RosterError};
