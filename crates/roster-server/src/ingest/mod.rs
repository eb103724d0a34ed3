//! CSV ingestion pipeline
//!
//! ```text
//! intake ──► validation ──► file pool ──► bulk writer ──► store
//!    │                          │
//!    └── session registry ◄─────┴── status events ──► broadcaster
//! ```
//!
//! - [`coordinator`]: spools uploads, registers the session, launches the run
//! - [`validation`]: content sniffing and header checks for every file
//! - [`worker`]: bounded per-file decoding, batching and flushing
//! - [`bulk`]: sharded concurrent writes with per-shard error reporting
//! - [`progress`]: byte counting, throttled progress and the conduit sender
//! - [`session`]: tracking id to conduit registry
//! - [`broadcast`]: forwards a session's events to one WebSocket client

pub mod broadcast;
pub mod bulk;
pub mod coordinator;
pub mod mapper;
pub mod progress;
pub mod session;
pub mod validation;
pub mod worker;

use roster_common::types::Student;

use crate::store::StudentStore;

pub use bulk::{BulkWriter, PersistError, ShardFailure};
pub use coordinator::{spool_bytes, spool_stream, IntakeCoordinator, SpooledFile};
pub use mapper::{DecodeError, RowMapper, StudentMapper};
pub use session::{SessionRegistry, UploadSession};
pub use validation::ValidationError;
pub use worker::IngestError;

/// The coordinator the server runs for student uploads.
pub type StudentIntake = IntakeCoordinator<Student, dyn StudentStore, StudentMapper>;
