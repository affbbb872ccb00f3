//! Error types for the orchestrator.
use thiserror::Error;

/// Represents errors that stop the orchestrated batch.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to launch step {step}: {source}")]
    Launch {
        step: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Step {step} failed with exit code {code:?}")]
    StepFailed {
        step: &'static str,
        code: Option<i32>,
    },

    #[error("Failed to write run report: {0}")]
    Report(#[from] std::io::Error),

    #[error("Failed to serialize run report: {0}")]
    Serialization(#[from] serde_json::Error),
}
