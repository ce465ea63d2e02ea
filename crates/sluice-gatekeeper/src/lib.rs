//! Sluice Gatekeeper
//!
//! Checks transformer output against a required-field contract before it is
//! written to the destination store.
//!
//! The Gatekeeper provides:
//! - Required-field presence checks
//! - Non-empty checks for list-valued fields
//! - Optional rejection of blank strings
//!
//! The required-field set is configuration, not code: the default preset is
//! the resume extraction contract, and any other set can be injected.
//!
//! # Examples
//!
//! ```
//! use sluice_gatekeeper::{Gatekeeper, ValidationConfig};
//! use serde_json::json;
//!
//! let gatekeeper = Gatekeeper::new(ValidationConfig::with_fields(["skills"]));
//!
//! let result = gatekeeper.validate(&json!({ "skills": [] }));
//! assert!(!result.is_accepted());
//! assert!(result.error_message().contains("skills"));
//! ```

#![warn(missing_docs)]

mod validator;
mod error;
mod config;

pub use validator::{Gatekeeper, ValidationResult, ValidationStatus, RejectionReason};
pub use error::GatekeeperError;
pub use config::ValidationConfig;
