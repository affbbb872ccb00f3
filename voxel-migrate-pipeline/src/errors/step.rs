//! Error types for migration steps.
//! Only setup failures surface here: connection, snapshot, precondition and
//! preparation statements. Row-level problems are counted in `RunStats`.
use crate::errors::{MapperError, WriterError};
use thiserror::Error;
use voxel_migrate_repository::{SourceRepositoryError, TargetRepositoryError};

/// Represents errors that abort a migration step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Source error: {0}")]
    Source(#[from] SourceRepositoryError),

    #[error("Target error: {0}")]
    Target(#[from] TargetRepositoryError),

    #[error("Mapper error: {0}")]
    Mapper(#[from] MapperError),

    #[error("Writer error: {0}")]
    Writer(#[from] WriterError),

    #[error("Table {table} must be empty before this step runs ({rows} rows present); run `reset` first")]
    TableNotEmpty { table: &'static str, rows: i64 },

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
