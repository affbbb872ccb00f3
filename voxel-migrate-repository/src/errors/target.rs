//! Error types for the destination repository.
use thiserror::Error;

/// PostgreSQL SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Represents errors that can occur within the destination repository.
///
/// Row-level write failures are classified so the batch writer can tell a
/// rejected foreign key apart from any other rejection.
#[derive(Debug, Error)]
pub enum TargetRepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Table {0} has no single integer key")]
    NoIntegerKey(&'static str),

    /// A savepoint statement around a row failed; the transaction is unusable.
    #[error("Transaction control failed: {0}")]
    Transaction(#[source] sqlx::Error),
}

impl TargetRepositoryError {
    /// Classifies a write error, lifting foreign key rejections out of the
    /// generic database variant.
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
                return Self::ForeignKeyViolation(db.message().to_string());
            }
        }
        Self::DatabaseError(err)
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Self::ForeignKeyViolation(_) => true,
            Self::DatabaseError(err) => err.to_string().to_lowercase().contains("foreign key"),
            Self::NoIntegerKey(_) | Self::Transaction(_) => false,
        }
    }

    /// True when the open transaction can no longer be used.
    pub fn is_transaction_failure(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }
}
