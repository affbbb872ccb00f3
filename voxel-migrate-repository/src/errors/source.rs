use thiserror::Error;

/// Represents errors that can occur while reading the legacy store.
///
/// The legacy store is read-only, so every error here is a query or decode
/// failure and is fatal for the step that issued it.
#[derive(Debug, Error)]
pub enum SourceRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}
