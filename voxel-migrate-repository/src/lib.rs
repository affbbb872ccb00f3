//! # Voxel Migrate Repository
//! This crate provides the traits and implementations for reading the legacy
//! MySQL schema and writing the redesigned PostgreSQL schema. It includes
//! definitions for errors, interfaces, and concrete implementations for both
//! stores.
pub mod errors;
pub mod interfaces;
pub mod mysql;
pub mod postgres;

pub use errors::{SourceRepositoryError, TargetRepositoryError};
pub use interfaces::{
    LegacyTable, OrphanCheck, SampleQuery, SourceRepository, TargetBatch, TargetRepository,
    TargetTable, WriteReceipt,
};
pub use mysql::MySqlSourceRepository;
pub use postgres::PostgresTargetRepository;
