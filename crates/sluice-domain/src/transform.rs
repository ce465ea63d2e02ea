//! Transformer call results and their error classification

use crate::QuotaSnapshot;
use thiserror::Error;

/// Successful transformer response
#[derive(Debug, Clone, PartialEq)]
pub struct Transformation {
    /// Structured document produced from the payload
    pub output: serde_json::Value,

    /// Capacity left after this call
    pub quota: QuotaSnapshot,
}

impl Transformation {
    /// Create a transformation result
    pub fn new(output: serde_json::Value, quota: QuotaSnapshot) -> Self {
        Self { output, quota }
    }
}

/// Transformer failures, classified by how the worker must react
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// Retryable: network trouble, timeouts, provider 5xx
    #[error("Transient error: {0}")]
    Transient(String),

    /// Provider refused the call because the quota is spent
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        /// Capacity reported with the refusal, when the provider sent one
        snapshot: Option<QuotaSnapshot>,
        /// Provider message
        message: String,
    },

    /// Not retryable: malformed input or unusable response
    #[error("Permanent error: {0}")]
    Permanent(String),
}

impl TransformError {
    /// Whether a local retry could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransformError::Transient(_))
    }

    /// Quota refusal without snapshot details
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        TransformError::QuotaExceeded {
            snapshot: None,
            message: message.into(),
        }
    }
}
