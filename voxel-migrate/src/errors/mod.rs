//! Error types for the voxel-migrate binary.
//! Consolidates the errors of configuration, connection set-up, the
//! migration steps and the orchestrator into the one type `main` reports.
use thiserror::Error;
use voxel_migrate_pipeline::errors::{OrchestratorError, StepError};
use voxel_migrate_repository::TargetRepositoryError;

/// Invalid or incomplete environment configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingVar(String),

    #[error("{name} has an invalid value: {value:?}")]
    InvalidVar { name: String, value: String },
}

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Setup error: {0:#}")]
    Setup(#[from] anyhow::Error),

    #[error("Target error: {0}")]
    Target(#[from] TargetRepositoryError),

    #[error("Step error: {0}")]
    Step(#[from] StepError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
