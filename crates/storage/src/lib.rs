//! Storage Layer
//!
//! - Baseline profiles as one JSON file per user
//! - Per-frame telemetry in a bounded in-memory repository, with a
//!   compact postcard encoding for export

mod profile_store;
mod telemetry;

pub use profile_store::ProfileStore;
pub use telemetry::{SessionStats, TelemetryRecord, TelemetryRepository};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
