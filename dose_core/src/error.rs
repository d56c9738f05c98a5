//! Error types for the dose_core library.

use crate::MedicineId;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dose_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No medicine with the given id exists in the store
    #[error("Medicine not found: {0}")]
    NotFound(MedicineId),

    /// A time-of-day string that is not `HH:mm`
    #[error("Invalid time of day: {0:?}")]
    InvalidTime(String),

    /// Medicine definition rejected on add/update
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store backend failure
    #[error("Store error: {0}")]
    Store(String),

    /// Background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}
