//! Error types for the batch writer.
use thiserror::Error;
use voxel_migrate_repository::TargetRepositoryError;

/// Represents errors that can occur while opening, using or committing a batch.
///
/// Rejections of a single row are not errors; the writer reports them as a
/// `WriteOutcome` so the step can count them and carry on.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("Failed to begin batch: {0}")]
    Begin(#[source] TargetRepositoryError),
    #[error("Failed to commit batch: {0}")]
    Commit(#[source] TargetRepositoryError),
    #[error("Batch transaction failed: {0}")]
    Transaction(#[source] TargetRepositoryError),
}
