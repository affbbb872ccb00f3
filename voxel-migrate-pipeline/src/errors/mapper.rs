//! Error types for the identifier mapper.
//! Building a mapping only fails when its snapshot query fails; a key that
//! does not resolve is a `Resolution::Missing`, never an error.
use thiserror::Error;
use voxel_migrate_repository::{SourceRepositoryError, TargetRepositoryError};

/// Represents errors that can occur while loading mapping snapshots.
#[derive(Debug, Error)]
pub enum MapperError {
    #[error("Source snapshot error: {0}")]
    Source(#[from] SourceRepositoryError),
    #[error("Target snapshot error: {0}")]
    Target(#[from] TargetRepositoryError),
}
