//! Core Janitor implementation: one recovery sweep

use crate::{JanitorConfig, JanitorError, JanitorMetrics};
use sluice_domain::TaskStore;
use std::time::Instant;

/// Recovery sweeper for abandoned claims
///
/// A sweep moves every task that has been `processing` longer than the
/// staleness threshold back to `pending`. It goes through the store's
/// conditional update, so it is safe to run while workers are active: a
/// worker that commits after its task was reclaimed gets a no-op.
///
/// # Examples
///
/// ```no_run
/// use sluice_janitor::{Janitor, JanitorConfig};
/// use sluice_store::SqliteTaskStore;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SqliteTaskStore::new("sluice.db")?;
/// let mut janitor = Janitor::new(JanitorConfig::default());
///
/// let reclaimed = janitor.sweep(&store).await?;
/// println!("reclaimed {} tasks", reclaimed);
/// # Ok(())
/// # }
/// ```
pub struct Janitor {
    config: JanitorConfig,
    metrics: JanitorMetrics,
}

impl Janitor {
    /// Create a new Janitor with the given configuration
    pub fn new(config: JanitorConfig) -> Self {
        Self {
            config,
            metrics: JanitorMetrics::new(),
        }
    }

    /// Create a Janitor with default configuration
    pub fn default_config() -> Self {
        Self::new(JanitorConfig::default())
    }

    /// Configuration in use
    pub fn config(&self) -> &JanitorConfig {
        &self.config
    }

    /// Get a reference to the current metrics
    pub fn metrics(&self) -> &JanitorMetrics {
        &self.metrics
    }

    /// Reset metrics counters
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Perform one sweep
    ///
    /// Returns how many tasks were reclaimed, or in dry-run mode how many
    /// would have been.
    pub async fn sweep<S: TaskStore>(&mut self, store: &S) -> Result<u64, JanitorError> {
        let start = Instant::now();
        let threshold = self.config.stale_threshold();

        let result = if self.config.dry_run {
            store.count_stale(threshold).await
        } else {
            store.reclaim_stale(threshold).await
        };
        self.metrics.total_runtime_ms += start.elapsed().as_millis() as u64;

        let count = match result {
            Ok(count) => count,
            Err(e) => {
                self.metrics.record_failure();
                return Err(JanitorError::Store(e.to_string()));
            }
        };

        self.metrics.record_sweep(count, self.config.dry_run);

        if self.config.dry_run {
            tracing::info!(
                "Dry run: {} tasks stuck in processing for over {} minutes",
                count,
                self.config.stale_threshold_minutes
            );
        } else if count > 0 {
            tracing::warn!(
                "Reclaimed {} tasks stuck in processing for over {} minutes",
                count,
                self.config.stale_threshold_minutes
            );
        } else {
            tracing::debug!("Sweep found no stale tasks");
        }

        Ok(count)
    }
}
