//! Error types for the drain pipeline

use thiserror::Error;

/// Errors that can occur while draining the queue
///
/// Per-task problems (validation failures, transformer errors, destination
/// write failures) never surface here; they are recorded on the task. These
/// are the run-level errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Task store error; claim and commit cannot be trusted without it
    #[error("Store error: {0}")]
    Store(String),

    /// Destination store error outside a task (status report)
    #[error("Destination error: {0}")]
    Destination(String),

    /// Recovery sweep error
    #[error("Sweep error: {0}")]
    Sweep(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sluice_janitor::JanitorError> for PipelineError {
    fn from(e: sluice_janitor::JanitorError) -> Self {
        match e {
            sluice_janitor::JanitorError::Config(msg) => PipelineError::Config(msg),
            other => PipelineError::Sweep(other.to_string()),
        }
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(e: toml::de::Error) -> Self {
        PipelineError::Config(format!("Failed to parse TOML: {}", e))
    }
}
