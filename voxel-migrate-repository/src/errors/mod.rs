//! Error types for the migration repositories.
//! Consolidates and re-exports the errors of the legacy (source) and
//! destination (target) stores.
mod source;
mod target;

pub use source::SourceRepositoryError;
pub use target::TargetRepositoryError;
