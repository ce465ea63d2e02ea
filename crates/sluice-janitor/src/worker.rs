//! Background worker for scheduled Janitor operation

use crate::{Janitor, JanitorConfig, JanitorError};
use sluice_domain::TaskStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

/// Background worker that runs the Janitor on a schedule
///
/// The first sweep happens one interval after start; callers that want an
/// immediate sweep run `Janitor::sweep` themselves first.
///
/// # Examples
///
/// ```no_run
/// use sluice_janitor::{JanitorWorker, JanitorConfig};
/// use sluice_store::SqliteTaskStore;
/// use std::sync::Arc;
/// use tokio::sync::watch;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(SqliteTaskStore::new("sluice.db")?);
///     let (stop_tx, stop_rx) = watch::channel(false);
///     let mut worker = JanitorWorker::new(JanitorConfig::default());
///
///     let handle = tokio::spawn(async move { worker.run(store, stop_rx).await });
///
///     // ... later
///     stop_tx.send(true)?;
///     handle.await??;
///     Ok(())
/// }
/// ```
pub struct JanitorWorker {
    janitor: Janitor,
    interval: Duration,
}

impl JanitorWorker {
    /// Create a new background worker with the given configuration
    pub fn new(config: JanitorConfig) -> Self {
        let interval = config.sweep_interval();
        Self {
            janitor: Janitor::new(config),
            interval,
        }
    }

    /// Create a worker with default configuration
    pub fn default_config() -> Self {
        Self::new(JanitorConfig::default())
    }

    fn ticker(&self) -> Interval {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Run until `shutdown` turns true (or its sender is dropped)
    ///
    /// A failed sweep is logged and the schedule continues; the store may
    /// come back before the next tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub async fn run<S: TaskStore>(
        &mut self,
        store: Arc<S>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), JanitorError> {
        self.janitor.config().validate()?;
        let mut ticker = self.ticker();

        tracing::info!("Janitor worker started (interval: {:?})", self.interval);

        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    tracing::debug!("Starting sweep cycle");
                    if let Err(e) = self.janitor.sweep(store.as_ref()).await {
                        tracing::error!("Sweep failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Janitor stopped. Final metrics:\n{}", self.janitor.metrics().summary());

        Ok(())
    }

    /// Run for a specific number of cycles (useful for testing)
    ///
    /// Unlike `run`, a failed sweep ends the call with its error.
    pub async fn run_cycles<S: TaskStore>(
        &mut self,
        store: Arc<S>,
        cycles: usize,
    ) -> Result<(), JanitorError> {
        self.janitor.config().validate()?;
        let mut ticker = self.ticker();

        tracing::info!(
            "Janitor worker started for {} cycles (interval: {:?})",
            cycles,
            self.interval
        );

        for cycle in 0..cycles {
            ticker.tick().await;

            tracing::debug!("Starting sweep cycle {}/{}", cycle + 1, cycles);

            if let Err(e) = self.janitor.sweep(store.as_ref()).await {
                tracing::error!("Sweep {}/{} failed: {}", cycle + 1, cycles, e);
                return Err(e);
            }
        }

        tracing::info!(
            "Janitor finished {} cycles. Final metrics:\n{}",
            cycles,
            self.janitor.metrics().summary()
        );

        Ok(())
    }

    /// Get a reference to the janitor's current metrics
    pub fn metrics(&self) -> &crate::JanitorMetrics {
        self.janitor.metrics()
    }

    /// Reset the janitor's metrics counters
    pub fn reset_metrics(&mut self) {
        self.janitor.reset_metrics();
    }
}
