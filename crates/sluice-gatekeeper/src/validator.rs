//! Result validation logic

use crate::ValidationConfig;
use serde_json::Value;
use std::fmt;

/// Result of validating one transformer output
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the output passed validation
    pub status: ValidationStatus,

    /// Rejection reasons (if any)
    pub reasons: Vec<RejectionReason>,

    /// Share of required fields that were satisfied (0.0-1.0)
    pub quality_score: f64,
}

impl ValidationResult {
    /// True when the output may be committed
    pub fn is_accepted(&self) -> bool {
        self.status == ValidationStatus::Accepted
    }

    /// Names of every field that caused a rejection
    pub fn failed_fields(&self) -> Vec<&str> {
        self.reasons.iter().filter_map(RejectionReason::field).collect()
    }

    /// Human-readable reason recorded on the failed task
    ///
    /// Empty when the output was accepted.
    pub fn error_message(&self) -> String {
        if self.reasons.is_empty() {
            return String::new();
        }
        let details: Vec<String> = self.reasons.iter().map(ToString::to_string).collect();
        format!("Validation failed: {}", details.join("; "))
    }
}

/// Validation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStatus {
    /// Output accepted
    Accepted,

    /// Output rejected
    Rejected,
}

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Output is not a JSON object
    NotAnObject,

    /// Required field absent or null
    MissingField(String),

    /// Required list-valued field has no elements
    EmptyList(String),

    /// Required string field is empty or whitespace
    BlankField(String),
}

impl RejectionReason {
    /// Field the reason refers to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            RejectionReason::NotAnObject => None,
            RejectionReason::MissingField(f)
            | RejectionReason::EmptyList(f)
            | RejectionReason::BlankField(f) => Some(f.as_str()),
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NotAnObject => write!(f, "output is not a JSON object"),
            RejectionReason::MissingField(name) => write!(f, "missing required field '{}'", name),
            RejectionReason::EmptyList(name) => write!(f, "required field '{}' is empty", name),
            RejectionReason::BlankField(name) => write!(f, "required field '{}' is blank", name),
        }
    }
}

/// The Gatekeeper validates transformer output before it is committed
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    config: ValidationConfig,
}

impl Gatekeeper {
    /// Create a new Gatekeeper with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Create a Gatekeeper with default configuration
    pub fn default_config() -> Self {
        Self::new(ValidationConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate an output against the configured required-field set
    ///
    /// Every failing field is reported, not just the first, so the recorded
    /// error names all of them.
    pub fn validate(&self, output: &Value) -> ValidationResult {
        let Some(object) = output.as_object() else {
            return ValidationResult {
                status: ValidationStatus::Rejected,
                reasons: vec![RejectionReason::NotAnObject],
                quality_score: 0.0,
            };
        };

        let reasons: Vec<RejectionReason> = self
            .config
            .required_fields
            .iter()
            .filter_map(|field| self.check_field(field, object.get(field)))
            .collect();

        let required = self.config.required_fields.len();
        let quality_score = if required == 0 {
            1.0
        } else {
            (required - reasons.len()) as f64 / required as f64
        };

        let status = if reasons.is_empty() {
            ValidationStatus::Accepted
        } else {
            ValidationStatus::Rejected
        };

        ValidationResult {
            status,
            reasons,
            quality_score,
        }
    }

    fn check_field(&self, field: &str, value: Option<&Value>) -> Option<RejectionReason> {
        match value {
            None | Some(Value::Null) => Some(RejectionReason::MissingField(field.to_string())),
            Some(Value::Array(items)) if items.is_empty() => {
                Some(RejectionReason::EmptyList(field.to_string()))
            }
            Some(Value::String(s)) if self.config.reject_blank_strings && s.trim().is_empty() => {
                Some(RejectionReason::BlankField(field.to_string()))
            }
            _ => None,
        }
    }
}
