//! In-process implementations of the store traits
//!
//! Each transition runs as one check-and-set under a single mutex, the
//! in-process equivalent of the conditional `UPDATE` used by SQLite.

use crate::{cutoff, truncate_error, StoreError};
use async_trait::async_trait;
use sluice_domain::{
    Clock, DestinationStore, SystemClock, Task, TaskId, TaskStats, TaskStatus, TaskStore,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Task store held entirely in memory
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<TaskId, Task>>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
}

impl MemoryTaskStore {
    /// Create an empty store using the wall clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that reads time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            clock,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every subsequent operation fail with `StoreError::Unavailable`
    /// (or succeed again), to exercise outage handling
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tasks(&self) -> Result<MutexGuard<'_, HashMap<TaskId, Task>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        self.tasks
            .lock()
            .map_err(|_| StoreError::Unavailable("task map lock poisoned".to_string()))
    }

    /// Move the task from `from` to `to` and apply `f`, if it is currently in `from`
    ///
    /// Edges outside the task lifecycle are rejected with `InvalidData`.
    fn transition<F>(&self, id: TaskId, from: TaskStatus, to: TaskStatus, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidData(format!(
                "Illegal task transition: {} -> {}",
                from, to
            )));
        }

        let now = self.clock.now();
        let mut tasks = self.tasks()?;
        match tasks.get_mut(&id) {
            Some(task) if task.status == from => {
                task.status = to;
                f(task);
                task.updated_at = task.updated_at.max(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

impl Default for MemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    type Error = StoreError;

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>, Self::Error> {
        let tasks = self.tasks()?;
        let mut pending: Vec<Task> = tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .cloned()
            .collect();

        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn claim(&self, id: TaskId) -> Result<bool, Self::Error> {
        let now = self.clock.now();
        self.transition(id, TaskStatus::Pending, TaskStatus::Processing, |task| {
            task.claimed_at = Some(now);
        })
    }

    async fn commit_success(&self, id: TaskId, result_ref: &str) -> Result<bool, Self::Error> {
        self.transition(id, TaskStatus::Processing, TaskStatus::Completed, |task| {
            task.result_ref = Some(result_ref.to_string());
            task.error_message = None;
            task.claimed_at = None;
        })
    }

    async fn commit_failure(&self, id: TaskId, error_message: &str) -> Result<bool, Self::Error> {
        self.transition(id, TaskStatus::Processing, TaskStatus::Failed, |task| {
            task.error_message = Some(truncate_error(error_message));
            task.retry_count += 1;
            task.claimed_at = None;
        })
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<u64, Self::Error> {
        let now = self.clock.now();
        let cutoff = cutoff(now, older_than)?;
        let mut tasks = self.tasks()?;

        let mut reclaimed = 0;
        for task in tasks.values_mut().filter(|t| t.is_stale(cutoff)) {
            task.status = TaskStatus::Pending;
            task.claimed_at = None;
            task.error_message = None;
            task.retry_count += 1;
            task.updated_at = task.updated_at.max(now);
            reclaimed += 1;
        }

        Ok(reclaimed)
    }

    async fn count_stale(&self, older_than: Duration) -> Result<u64, Self::Error> {
        let cutoff = cutoff(self.clock.now(), older_than)?;
        let tasks = self.tasks()?;
        Ok(tasks.values().filter(|t| t.is_stale(cutoff)).count() as u64)
    }

    async fn stats(&self) -> Result<TaskStats, Self::Error> {
        let tasks = self.tasks()?;
        let mut stats = TaskStats::default();
        for task in tasks.values() {
            stats.add(task.status, 1);
        }
        Ok(stats)
    }

    async fn enqueue(&self, payload_ref: &str) -> Result<TaskId, Self::Error> {
        let task = Task::new(payload_ref, self.clock.now());
        let id = task.id;
        self.tasks()?.insert(id, task);
        Ok(id)
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, Self::Error> {
        Ok(self.tasks()?.get(&id).cloned())
    }

    async fn requeue_failed(&self, max_retry_count: Option<u32>) -> Result<u64, Self::Error> {
        let now = self.clock.now();
        let mut tasks = self.tasks()?;

        let mut requeued = 0;
        for task in tasks.values_mut() {
            let under_cap = max_retry_count.map(|cap| task.retry_count < cap).unwrap_or(true);
            if task.status == TaskStatus::Failed && under_cap {
                task.status = TaskStatus::Pending;
                task.error_message = None;
                task.updated_at = task.updated_at.max(now);
                requeued += 1;
            }
        }

        Ok(requeued)
    }

    async fn health_check(&self) -> Result<(), Self::Error> {
        self.tasks().map(|_| ())
    }
}

/// Destination store held in memory
///
/// Counts every write so tests can tell an idempotent rewrite from a
/// duplicate document.
#[derive(Default)]
pub struct MemoryDestination {
    documents: Mutex<HashMap<TaskId, serde_json::Value>>,
    writes: AtomicU64,
}

impl MemoryDestination {
    /// Create an empty destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Total upsert calls received
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Document written for a task, if any
    pub fn document(&self, task_id: TaskId) -> Option<serde_json::Value> {
        self.documents
            .lock()
            .ok()
            .and_then(|docs| docs.get(&task_id).cloned())
    }

    fn documents(&self) -> Result<MutexGuard<'_, HashMap<TaskId, serde_json::Value>>, StoreError> {
        self.documents
            .lock()
            .map_err(|_| StoreError::Unavailable("document map lock poisoned".to_string()))
    }
}

#[async_trait]
impl DestinationStore for MemoryDestination {
    type Error = StoreError;

    async fn upsert(&self, task_id: TaskId, output: &serde_json::Value) -> Result<String, Self::Error> {
        self.documents()?.insert(task_id, output.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(format!("doc:{}", task_id))
    }

    async fn count(&self) -> Result<u64, Self::Error> {
        Ok(self.documents()?.len() as u64)
    }
}
