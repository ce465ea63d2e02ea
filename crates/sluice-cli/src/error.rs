//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store could not be opened
    #[error("Store error: {0}")]
    Store(#[from] sluice_store::StoreError),

    /// Transformer could not be built
    #[error("Transformer error: {0}")]
    Transformer(#[from] sluice_llm::LlmError),

    /// Pipeline operation failed
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] sluice_pipeline::PipelineError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
