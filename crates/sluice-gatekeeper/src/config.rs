//! Gatekeeper configuration

use crate::GatekeeperError;
use serde::{Deserialize, Serialize};

/// Fields the resume extractor must always produce
pub const RESUME_REQUIRED_FIELDS: [&str; 4] = [
    "job_role",
    "professional_summary",
    "technical_skills",
    "experiences",
];

/// Configuration for validation rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Top-level fields every result must carry
    pub required_fields: Vec<String>,

    /// Reject required fields whose value is an empty or whitespace-only string
    pub reject_blank_strings: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::with_fields(RESUME_REQUIRED_FIELDS)
    }
}

impl ValidationConfig {
    /// Require exactly these fields
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_fields: fields.into_iter().map(Into::into).collect(),
            reject_blank_strings: false,
        }
    }

    /// Create a permissive configuration (any JSON object passes)
    pub fn permissive() -> Self {
        Self {
            required_fields: Vec::new(),
            reject_blank_strings: false,
        }
    }

    /// Create a strict configuration (resume contract, blank strings rejected)
    pub fn strict() -> Self {
        Self {
            reject_blank_strings: true,
            ..Self::default()
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), GatekeeperError> {
        let mut seen = std::collections::HashSet::new();
        for field in &self.required_fields {
            if field.trim().is_empty() {
                return Err(GatekeeperError::Config(
                    "required field names must not be blank".to_string(),
                ));
            }
            if !seen.insert(field.as_str()) {
                return Err(GatekeeperError::Config(format!(
                    "required field '{}' is listed twice",
                    field
                )));
            }
        }
        Ok(())
    }
}
