//! Error types shared across the roster crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, RosterError>;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown course: {0}")]
    UnknownCourse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
