//! Retry policy: decides backoff delays for transient transformer failures

use crate::PipelineError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Local retry policy for transient failures
///
/// Delay before retry `n` (1-indexed, counting failed attempts so far) is
/// `min(base_delay * multiplier^(n-1), max_delay)` plus uniform jitter in
/// `[0, jitter]`.
///
/// Example with the defaults (base 1s, multiplier 2.0, max 30s):
/// - after attempt 1: 1s + jitter
/// - after attempt 2: 2s + jitter
/// - attempt 3 fails for good (`max_attempts = 3`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total calls per task, including the first
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,

    /// Backoff multiplier for exponential backoff
    pub multiplier: f64,

    /// Upper bound on the backoff before jitter (milliseconds)
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay (milliseconds)
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether another call is allowed after `attempts` failed calls
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Backoff for the retry after `attempts` failed calls, without jitter
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.base_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max_delay_ms as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Backoff plus a random jitter
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let jitter = if self.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_ms)
        } else {
            0
        };
        self.backoff(attempts) + Duration::from_millis(jitter)
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(PipelineError::Config(
                "retry.multiplier must be a finite number >= 1.0".to_string(),
            ));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(PipelineError::Config(
                "retry.max_delay_ms cannot be below retry.base_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}
