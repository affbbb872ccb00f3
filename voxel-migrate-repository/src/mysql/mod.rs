//! MySQL implementation of the legacy source repository.
mod source_repository;

pub use source_repository::MySqlSourceRepository;
