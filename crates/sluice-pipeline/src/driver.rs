//! Driver: run modes, operator operations, and cancellation

use crate::{
    PipelineConfig, PipelineError, QuotaGovernor, RunMode, RunReport, StatusReport, Termination,
    WorkerPool,
};
use sluice_domain::{DestinationStore, TaskId, TaskStore, Transformer};
use sluice_gatekeeper::Gatekeeper;
use sluice_janitor::{Janitor, JanitorConfig, JanitorError, JanitorWorker};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Cloneable handle that stops a running driver
///
/// Cancelling stops new claims and cuts the inter-batch sleep short; calls
/// already in flight finish and are committed. Cancellation is permanent for
/// the driver that issued the handle.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Request the run to stop
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Janitor worker running beside a draining run
struct BackgroundSweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<(), JanitorError>>,
}

impl BackgroundSweeper {
    async fn stop(self) {
        self.stop_tx.send_replace(true);
        match self.handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Background sweeper ended with error: {}", e),
            Err(e) => warn!("Background sweeper task failed: {}", e),
        }
    }
}

/// Drives the queue in one of the run modes
///
/// # Examples
///
/// ```no_run
/// use sluice_domain::TaskStore;
/// use sluice_llm::MockTransformer;
/// use sluice_pipeline::{Driver, PipelineConfig, RunMode};
/// use sluice_store::{MemoryDestination, MemoryTaskStore};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = Arc::new(MemoryTaskStore::new());
///     store.enqueue("https://example.com/cv.pdf").await?;
///
///     let transformer = Arc::new(MockTransformer::new(serde_json::json!({
///         "job_role": "Engineer",
///         "professional_summary": "Builds things",
///         "technical_skills": ["Rust"],
///         "experiences": [{ "company": "Acme" }],
///     })));
///
///     let driver = Driver::new(
///         store,
///         transformer,
///         Arc::new(MemoryDestination::new()),
///         PipelineConfig::default(),
///     )?;
///
///     let report = driver.run(RunMode::DrainUntilEmpty).await;
///     println!("{}", report.summary());
///     Ok(())
/// }
/// ```
pub struct Driver<S, T, D> {
    store: Arc<S>,
    transformer: Arc<T>,
    destination: Arc<D>,
    gatekeeper: Gatekeeper,
    config: PipelineConfig,
    janitor_config: JanitorConfig,
    cancel: Arc<watch::Sender<bool>>,
}

impl<S, T, D> Driver<S, T, D>
where
    S: TaskStore + 'static,
    T: Transformer + 'static,
    D: DestinationStore + 'static,
{
    /// Create a driver with the default gatekeeper and janitor settings
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        store: Arc<S>,
        transformer: Arc<T>,
        destination: Arc<D>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let (cancel, _) = watch::channel(false);

        Ok(Self {
            store,
            transformer,
            destination,
            gatekeeper: Gatekeeper::default_config(),
            config,
            janitor_config: JanitorConfig::default(),
            cancel: Arc::new(cancel),
        })
    }

    /// Replace the validator
    pub fn with_gatekeeper(mut self, gatekeeper: Gatekeeper) -> Self {
        self.gatekeeper = gatekeeper;
        self
    }

    /// Replace the sweeper settings
    ///
    /// # Errors
    ///
    /// Returns an error if the janitor configuration is invalid.
    pub fn with_janitor_config(mut self, config: JanitorConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        self.janitor_config = config;
        Ok(self)
    }

    /// Pipeline configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle for stopping runs from another task (e.g. a Ctrl+C handler)
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: Arc::clone(&self.cancel),
        }
    }

    /// Run in the given mode until it terminates
    ///
    /// Never fails: store failures end the run with `Termination::Fatal`,
    /// and the report still carries the counts gathered up to that point.
    pub async fn run(&self, mode: RunMode) -> RunReport {
        let mut report = RunReport::new(mode);
        info!(
            "Starting {} run (batch size {}, pool size {})",
            mode, self.config.batch_size, self.config.pool_size
        );

        let termination = self.drive(mode, &mut report).await;
        report.termination = termination;

        match self.store.stats().await {
            Ok(stats) => report.set_remaining(&stats),
            Err(e) => warn!("Could not read final task counts: {}", e),
        }

        if report.termination.is_fatal() {
            error!("{}", report.summary());
        } else {
            info!("{}", report.summary());
        }

        report
    }

    async fn drive(&self, mode: RunMode, report: &mut RunReport) -> Termination {
        if let Err(e) = self.store.health_check().await {
            return Termination::Fatal(format!("Task store health check failed: {}", e));
        }

        let sweeper = if mode.is_draining() {
            match self.start_sweeper().await {
                Ok(sweeper) => Some(sweeper),
                Err(e) => return Termination::Fatal(e.to_string()),
            }
        } else {
            None
        };

        let termination = self.drive_batches(mode, report).await;

        if let Some(sweeper) = sweeper {
            sweeper.stop().await;
        }

        termination
    }

    async fn start_sweeper(&self) -> Result<BackgroundSweeper, PipelineError> {
        if self.config.sweep_on_start {
            let mut janitor = Janitor::new(self.janitor_config.clone());
            janitor.sweep(self.store.as_ref()).await?;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut worker = JanitorWorker::new(self.janitor_config.clone());
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move { worker.run(store, stop_rx).await });

        Ok(BackgroundSweeper { stop_tx, handle })
    }

    async fn drive_batches(&self, mode: RunMode, report: &mut RunReport) -> Termination {
        let governor = Arc::new(QuotaGovernor::new());
        let pool = WorkerPool::new(
            Arc::clone(&self.store),
            Arc::clone(&self.transformer),
            Arc::clone(&self.destination),
            self.gatekeeper.clone(),
            self.config.clone(),
        );
        let mut cancel_rx = self.cancel.subscribe();

        loop {
            let cancelled = *cancel_rx.borrow_and_update();
            if cancelled {
                return Termination::Cancelled;
            }
            if governor.is_exhausted() {
                info!("Quota exhausted ({}), no further batches", governor.snapshot());
                return Termination::QuotaExhausted;
            }
            if self.iteration_cap_reached(report) {
                return Termination::IterationCap;
            }

            report.iterations += 1;
            let batch = match self.store.fetch_pending(self.config.batch_size).await {
                Ok(batch) => batch,
                Err(e) => return Termination::Fatal(format!("Failed to fetch pending tasks: {}", e)),
            };

            if batch.is_empty() {
                if mode != RunMode::Continuous {
                    return Termination::EmptyQueue;
                }
                debug!("No pending tasks, polling again in {}s", self.config.interval_secs);
            } else {
                info!("Iteration {}: processing {} tasks", report.iterations, batch.len());
                let outcome = pool
                    .process_batch(batch, Arc::clone(&governor), cancel_rx.clone())
                    .await;
                report.absorb(&outcome);

                if let Some(e) = outcome.error {
                    return Termination::Fatal(e.to_string());
                }
            }

            let cancelled = *cancel_rx.borrow();
            if cancelled {
                return Termination::Cancelled;
            }
            if governor.is_exhausted() {
                info!("Quota exhausted ({}), no further batches", governor.snapshot());
                return Termination::QuotaExhausted;
            }
            if mode == RunMode::Single {
                return Termination::SinglePass;
            }
            if self.iteration_cap_reached(report) {
                return Termination::IterationCap;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval()) => {}
                _ = cancel_rx.changed() => {}
            }
        }
    }

    fn iteration_cap_reached(&self, report: &RunReport) -> bool {
        self.config
            .max_iterations
            .is_some_and(|max| report.iterations >= max)
    }

    /// Read-only counts for status mode
    pub async fn status(&self) -> Result<StatusReport, PipelineError> {
        let tasks = self
            .store
            .stats()
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;
        let destination_documents = self
            .destination
            .count()
            .await
            .map_err(|e| PipelineError::Destination(e.to_string()))?;

        Ok(StatusReport {
            tasks,
            destination_documents,
        })
    }

    /// One recovery sweep with the configured threshold
    ///
    /// With `dry_run` the stale tasks are only counted.
    pub async fn sweep(&self, dry_run: bool) -> Result<u64, PipelineError> {
        let mut config = self.janitor_config.clone();
        config.dry_run = dry_run;

        let mut janitor = Janitor::new(config);
        Ok(janitor.sweep(self.store.as_ref()).await?)
    }

    /// Requeue failed tasks, optionally only those with `retry_count` below a cutoff
    pub async fn retry_failed(&self, max_retry_count: Option<u32>) -> Result<u64, PipelineError> {
        let requeued = self
            .store
            .requeue_failed(max_retry_count)
            .await
            .map_err(|e| PipelineError::Store(e.to_string()))?;

        info!("Requeued {} failed tasks", requeued);
        Ok(requeued)
    }

    /// Insert new pending tasks
    pub async fn enqueue<I>(&self, payload_refs: I) -> Result<Vec<TaskId>, PipelineError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut ids = Vec::new();
        for payload_ref in payload_refs {
            let id = self
                .store
                .enqueue(payload_ref.as_ref())
                .await
                .map_err(|e| PipelineError::Store(e.to_string()))?;
            debug!(task_id = %id, "Enqueued {}", payload_ref.as_ref());
            ids.push(id);
        }
        Ok(ids)
    }
}
