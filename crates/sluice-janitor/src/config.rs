//! Configuration for Janitor operations
//!
//! Defines the staleness threshold and the sweep interval.

use crate::JanitorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the recovery sweeper
///
/// The staleness threshold must exceed the slowest legitimate task, so a
/// claim is only reclaimed when its worker crashed, was killed, or stalled.
///
/// # Examples
///
/// ```
/// use sluice_janitor::JanitorConfig;
///
/// // Default configuration (balanced)
/// let config = JanitorConfig::default();
/// assert_eq!(config.stale_threshold_minutes, 30);
///
/// // Aggressive recovery
/// let config = JanitorConfig::aggressive();
/// assert_eq!(config.stale_threshold_minutes, 10);
///
/// // Lenient recovery
/// let config = JanitorConfig::lenient();
/// assert_eq!(config.stale_threshold_minutes, 120);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Minutes a task may stay `processing` before it is reclaimed
    /// Default: 30 minutes
    #[serde(default = "default_stale_threshold_minutes")]
    pub stale_threshold_minutes: u64,

    /// How often the background worker sweeps (in seconds)
    /// Default: every 300 seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Dry-run mode: count what would be reclaimed without changing anything
    /// Default: false
    #[serde(default)]
    pub dry_run: bool,
}

fn default_stale_threshold_minutes() -> u64 {
    30
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            stale_threshold_minutes: default_stale_threshold_minutes(),
            sweep_interval_secs: default_sweep_interval_secs(),
            dry_run: false,
        }
    }
}

impl JanitorConfig {
    /// Aggressive recovery (short threshold, frequent sweeps)
    ///
    /// Suitable when tasks are known to finish quickly.
    ///
    /// - Threshold: 10 minutes
    /// - Sweep interval: 60 seconds
    pub fn aggressive() -> Self {
        Self {
            stale_threshold_minutes: 10,
            sweep_interval_secs: 60,
            dry_run: false,
        }
    }

    /// Lenient recovery (long threshold, infrequent sweeps)
    ///
    /// Suitable for slow transformers with long tail latency.
    ///
    /// - Threshold: 120 minutes
    /// - Sweep interval: 900 seconds
    pub fn lenient() -> Self {
        Self {
            stale_threshold_minutes: 120,
            sweep_interval_secs: 900,
            dry_run: false,
        }
    }

    /// Get the staleness threshold as Duration
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_minutes * 60)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), JanitorError> {
        if self.stale_threshold_minutes == 0 {
            return Err(JanitorError::Config(
                "stale_threshold_minutes must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(JanitorError::Config(
                "sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
