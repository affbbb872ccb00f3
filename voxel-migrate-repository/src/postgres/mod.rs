//! PostgreSQL implementation of the destination repository.
mod target_batch;
mod target_repository;

pub use target_batch::PostgresTargetBatch;
pub use target_repository::PostgresTargetRepository;
