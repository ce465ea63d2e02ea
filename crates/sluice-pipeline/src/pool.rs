//! Worker pool: claim, transform, validate, commit

use crate::{BatchOutcome, PipelineConfig, PipelineError, QuotaGovernor};
use sluice_domain::{DestinationStore, Task, TaskStore, TransformError, Transformer};
use sluice_gatekeeper::Gatekeeper;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// How one claimed task ended for this worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskOutcome {
    Completed,
    Failed { validation: bool },
    QuotaStopped,
    Superseded,
}

struct Shared<S, T, D> {
    store: Arc<S>,
    transformer: Arc<T>,
    destination: Arc<D>,
    gatekeeper: Gatekeeper,
    config: PipelineConfig,
}

/// Bounded set of concurrent executors for one batch at a time
///
/// Workers pull candidates from the batch, claim them through the store's
/// atomic `claim`, and commit the outcome. A lost claim is skipped without
/// error. Each claimed task runs in its own tokio task, so a panic ends
/// only that task (left `processing` for the sweeper) and the worker moves on.
pub struct WorkerPool<S, T, D> {
    shared: Arc<Shared<S, T, D>>,
}

impl<S, T, D> WorkerPool<S, T, D>
where
    S: TaskStore + 'static,
    T: Transformer + 'static,
    D: DestinationStore + 'static,
{
    /// Create a pool
    pub fn new(
        store: Arc<S>,
        transformer: Arc<T>,
        destination: Arc<D>,
        gatekeeper: Gatekeeper,
        config: PipelineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                transformer,
                destination,
                gatekeeper,
                config,
            }),
        }
    }

    /// Process one fetched batch and wait for every worker to finish
    ///
    /// Workers stop claiming when the governor reports exhaustion, when
    /// `cancel` turns true, or when a sibling hit a store error. Calls
    /// already in flight always run to completion.
    pub async fn process_batch(
        &self,
        tasks: Vec<Task>,
        governor: Arc<QuotaGovernor>,
        cancel: watch::Receiver<bool>,
    ) -> BatchOutcome {
        if tasks.is_empty() {
            return BatchOutcome::default();
        }

        let workers = self.shared.config.pool_size.min(tasks.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let abort = Arc::new(AtomicBool::new(false));

        debug!("Starting {} workers", workers);

        let mut joins = JoinSet::new();
        for worker_id in 0..workers {
            joins.spawn(worker_loop(
                worker_id,
                Arc::clone(&self.shared),
                Arc::clone(&queue),
                Arc::clone(&governor),
                Arc::clone(&abort),
                cancel.clone(),
            ));
        }

        let mut total = BatchOutcome::default();
        while let Some(joined) = joins.join_next().await {
            match joined {
                Ok(outcome) => total.merge(outcome),
                Err(e) => error!("Worker loop ended abnormally: {}", e),
            }
        }

        total
    }
}

fn next_candidate(queue: &Mutex<VecDeque<Task>>) -> Option<Task> {
    queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front()
}

async fn worker_loop<S, T, D>(
    worker_id: usize,
    shared: Arc<Shared<S, T, D>>,
    queue: Arc<Mutex<VecDeque<Task>>>,
    governor: Arc<QuotaGovernor>,
    abort: Arc<AtomicBool>,
    cancel: watch::Receiver<bool>,
) -> BatchOutcome
where
    S: TaskStore + 'static,
    T: Transformer + 'static,
    D: DestinationStore + 'static,
{
    let mut outcome = BatchOutcome::default();

    loop {
        let cancelled = *cancel.borrow();
        if cancelled || abort.load(Ordering::SeqCst) {
            break;
        }
        if governor.is_exhausted() {
            debug!(worker_id, "Quota exhausted, worker stops claiming");
            break;
        }

        let Some(task) = next_candidate(&queue) else {
            break;
        };

        match shared.store.claim(task.id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(worker_id, task_id = %task.id, outcome = "lost_race", "Task already claimed");
                outcome.lost_races += 1;
                continue;
            }
            Err(e) => {
                error!(worker_id, task_id = %task.id, "Claim failed: {}", e);
                abort.store(true, Ordering::SeqCst);
                outcome.error = Some(PipelineError::Store(e.to_string()));
                break;
            }
        }
        outcome.claimed += 1;

        let task_id = task.id;
        let handle = tokio::spawn(process_task(
            Arc::clone(&shared),
            task,
            Arc::clone(&governor),
        ));

        match handle.await {
            Ok(Ok(TaskOutcome::Completed)) => outcome.completed += 1,
            Ok(Ok(TaskOutcome::Failed { validation })) => {
                outcome.failed += 1;
                if validation {
                    outcome.validation_failed += 1;
                }
            }
            Ok(Ok(TaskOutcome::QuotaStopped)) => outcome.quota_stopped += 1,
            Ok(Ok(TaskOutcome::Superseded)) => outcome.superseded += 1,
            Ok(Err(e)) => {
                error!(worker_id, task_id = %task_id, "Aborting batch: {}", e);
                abort.store(true, Ordering::SeqCst);
                outcome.error = Some(e);
                break;
            }
            Err(e) => {
                error!(
                    worker_id,
                    task_id = %task_id,
                    outcome = "crashed",
                    "Worker crashed, task left processing: {}",
                    e
                );
                outcome.crashed += 1;
            }
        }
    }

    outcome
}

/// Transform, validate, and commit one claimed task
///
/// Returns `Err` only for store failures, which abort the run.
async fn process_task<S, T, D>(
    shared: Arc<Shared<S, T, D>>,
    task: Task,
    governor: Arc<QuotaGovernor>,
) -> Result<TaskOutcome, PipelineError>
where
    S: TaskStore + 'static,
    T: Transformer + 'static,
    D: DestinationStore + 'static,
{
    let retry = &shared.config.retry;
    let call_timeout = shared.config.call_timeout();
    let mut attempts = 0;

    let transformation = loop {
        attempts += 1;

        let result = match timeout(call_timeout, shared.transformer.invoke(&task.payload_ref)).await {
            Ok(result) => result,
            Err(_) => Err(TransformError::Transient(format!(
                "Transformer call timed out after {}s",
                shared.config.call_timeout_secs
            ))),
        };

        match result {
            Ok(transformation) => break transformation,
            Err(TransformError::QuotaExceeded { snapshot, message }) => {
                governor.trip(snapshot);
                warn!(
                    task_id = %task.id,
                    outcome = "quota_stop",
                    "Quota exceeded, task left processing: {}",
                    message
                );
                return Ok(TaskOutcome::QuotaStopped);
            }
            Err(TransformError::Transient(message)) if retry.should_retry(attempts) => {
                if governor.is_exhausted() {
                    warn!(task_id = %task.id, outcome = "quota_stop", "Quota exhausted before retry");
                    return Ok(TaskOutcome::QuotaStopped);
                }

                let delay = retry.next_delay(attempts);
                warn!(
                    task_id = %task.id,
                    outcome = "transient_retry",
                    attempt = attempts,
                    "Transient failure, retrying in {:?}: {}",
                    delay,
                    message
                );
                tokio::time::sleep(delay).await;

                if governor.is_exhausted() {
                    warn!(task_id = %task.id, outcome = "quota_stop", "Quota exhausted before retry");
                    return Ok(TaskOutcome::QuotaStopped);
                }
            }
            Err(e) => {
                return commit_failure(&shared, &task, &e.to_string(), false).await;
            }
        }
    };

    governor.observe(transformation.quota);

    let validation = shared.gatekeeper.validate(&transformation.output);
    if !validation.is_accepted() {
        return commit_failure(&shared, &task, &validation.error_message(), true).await;
    }

    let result_ref = match shared.destination.upsert(task.id, &transformation.output).await {
        Ok(result_ref) => result_ref,
        Err(e) => {
            let message = format!("Destination write failed: {}", e);
            return commit_failure(&shared, &task, &message, false).await;
        }
    };

    let committed = shared
        .store
        .commit_success(task.id, &result_ref)
        .await
        .map_err(|e| PipelineError::Store(e.to_string()))?;

    if !committed {
        warn!(
            task_id = %task.id,
            outcome = "superseded",
            "Task no longer held by this worker; success not recorded"
        );
        return Ok(TaskOutcome::Superseded);
    }

    info!(
        task_id = %task.id,
        outcome = "completed",
        quota = %transformation.quota,
        "Task completed"
    );

    if let Some(pacing) = &shared.config.pacing {
        let pause = pacing.delay_for(&governor.snapshot());
        if !pause.is_zero() {
            debug!("Pacing for {:?}", pause);
            tokio::time::sleep(pause).await;
        }
    }

    Ok(TaskOutcome::Completed)
}

async fn commit_failure<S, T, D>(
    shared: &Shared<S, T, D>,
    task: &Task,
    message: &str,
    validation: bool,
) -> Result<TaskOutcome, PipelineError>
where
    S: TaskStore,
{
    let committed = shared
        .store
        .commit_failure(task.id, message)
        .await
        .map_err(|e| PipelineError::Store(e.to_string()))?;

    if !committed {
        warn!(
            task_id = %task.id,
            outcome = "superseded",
            "Task no longer held by this worker; failure not recorded"
        );
        return Ok(TaskOutcome::Superseded);
    }

    if validation {
        warn!(task_id = %task.id, outcome = "validation_failed", "{}", message);
    } else {
        warn!(task_id = %task.id, outcome = "failed", "{}", message);
    }

    Ok(TaskOutcome::Failed { validation })
}
