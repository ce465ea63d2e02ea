//! Configuration for the drain pipeline

use crate::{PipelineError, RetryPolicy};
use serde::{Deserialize, Serialize};
use sluice_domain::QuotaSnapshot;
use std::time::Duration;

/// One step of token-aware pacing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingTier {
    /// Applies when remaining tokens are below this value
    pub below_tokens: i64,

    /// Pause after each successful call (seconds)
    pub delay_secs: u64,
}

/// Token-aware pacing between successful calls
///
/// The closer the token budget is to zero, the longer a worker waits
/// before claiming its next task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause after every successful call regardless of budget (milliseconds)
    pub min_delay_ms: u64,

    /// Budget tiers; the lowest matching threshold wins
    pub tiers: Vec<PacingTier>,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            tiers: vec![
                PacingTier { below_tokens: 1_000, delay_secs: 20 },
                PacingTier { below_tokens: 3_000, delay_secs: 10 },
                PacingTier { below_tokens: 6_000, delay_secs: 5 },
            ],
        }
    }
}

impl PacingConfig {
    /// Pause to take after a call that left `snapshot` behind
    pub fn delay_for(&self, snapshot: &QuotaSnapshot) -> Duration {
        let min_delay = Duration::from_millis(self.min_delay_ms);

        let tier_delay = snapshot
            .remaining_tokens
            .and_then(|tokens| {
                self.tiers
                    .iter()
                    .filter(|tier| tokens < tier.below_tokens)
                    .min_by_key(|tier| tier.below_tokens)
            })
            .map(|tier| Duration::from_secs(tier.delay_secs))
            .unwrap_or_default();

        min_delay.max(tier_delay)
    }
}

/// Configuration for the drain pipeline
///
/// # Examples
///
/// ```
/// use sluice_pipeline::PipelineConfig;
///
/// let config = PipelineConfig::from_toml(r#"
///     batch_size = 10
///     pool_size = 2
///
///     [retry]
///     max_attempts = 5
/// "#).unwrap();
///
/// assert_eq!(config.batch_size, 10);
/// assert_eq!(config.retry.max_attempts, 5);
/// assert_eq!(config.interval_secs, 60);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum tasks fetched per batch
    pub batch_size: usize,

    /// Concurrent workers per batch
    pub pool_size: usize,

    /// Pause between batches in draining modes (seconds)
    pub interval_secs: u64,

    /// Stop after this many iterations (drain and continuous modes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    /// Maximum time for a single transformer call (seconds)
    pub call_timeout_secs: u64,

    /// Reclaim stale tasks once before the first fetch of a draining run
    pub sweep_on_start: bool,

    /// Local retry policy for transient failures
    pub retry: RetryPolicy,

    /// Token-aware pacing (disabled when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pacing: Option<PacingConfig>,
}

impl Default for PipelineConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            batch_size: 50,
            pool_size: 4,
            interval_secs: 60,
            max_iterations: None,
            call_timeout_secs: 120,
            sweep_on_start: true,
            retry: RetryPolicy::default(),
            pacing: None,
        }
    }
}

impl PipelineConfig {
    /// Aggressive preset: bigger batches, more workers, short pauses
    pub fn aggressive() -> Self {
        Self {
            batch_size: 100,
            pool_size: 8,
            interval_secs: 10,
            max_iterations: None,
            call_timeout_secs: 60,
            sweep_on_start: true,
            retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
            pacing: None,
        }
    }

    /// Lenient preset: small batches, few workers, paced calls
    pub fn lenient() -> Self {
        Self {
            batch_size: 20,
            pool_size: 2,
            interval_secs: 120,
            max_iterations: None,
            call_timeout_secs: 300,
            sweep_on_start: true,
            retry: RetryPolicy {
                max_attempts: 5,
                ..RetryPolicy::default()
            },
            pacing: Some(PacingConfig::default()),
        }
    }

    /// Get the inter-batch interval as a Duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Get the per-call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.pool_size == 0 {
            return Err(PipelineError::Config("pool_size must be greater than 0".to_string()));
        }
        if self.call_timeout_secs == 0 {
            return Err(PipelineError::Config(
                "call_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == Some(0) {
            return Err(PipelineError::Config(
                "max_iterations must be greater than 0 when set".to_string(),
            ));
        }
        self.retry.validate()
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, PipelineError> {
        toml::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(format!("Failed to serialize to TOML: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.interval(), Duration::from_secs(60));
        assert!(config.pacing.is_none());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(PipelineConfig::aggressive().validate().is_ok());
        assert!(PipelineConfig::lenient().validate().is_ok());
        assert!(PipelineConfig::lenient().pacing.is_some());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = PipelineConfig::default();
        config.pool_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.max_iterations = Some(0);
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.retry.max_attempts = 0;
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = PipelineConfig::lenient();
        config.max_iterations = Some(7);

        let toml_str = config.to_toml().unwrap();
        let parsed = PipelineConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml_rejects_invalid() {
        assert!(PipelineConfig::from_toml("pool_size = 0").is_err());
        assert!(PipelineConfig::from_toml("pool_size = \"four\"").is_err());
    }

    #[test]
    fn test_pacing_tiers() {
        let pacing = PacingConfig::default();

        let delay = |tokens| pacing.delay_for(&QuotaSnapshot::from_parts(None, tokens));
        assert_eq!(delay(Some(500)), Duration::from_secs(20));
        assert_eq!(delay(Some(2_999)), Duration::from_secs(10));
        assert_eq!(delay(Some(5_000)), Duration::from_secs(5));
        assert_eq!(delay(Some(6_000)), Duration::ZERO);
        assert_eq!(delay(None), Duration::ZERO);
    }

    #[test]
    fn test_pacing_min_delay() {
        let pacing = PacingConfig {
            min_delay_ms: 7_000,
            ..PacingConfig::default()
        };

        let snapshot = QuotaSnapshot::new(100, 4_000);
        assert_eq!(pacing.delay_for(&snapshot), Duration::from_secs(7));
        assert_eq!(pacing.delay_for(&QuotaSnapshot::unknown()), Duration::from_secs(7));
    }
}
