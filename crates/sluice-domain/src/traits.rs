//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the drain engine and
//! infrastructure. Implementations live in other crates.

use crate::{Task, TaskId, TaskStats, Transformation, TransformError};
use async_trait::async_trait;
use std::time::Duration;

/// Persistent collection of tasks
///
/// Implemented by the infrastructure layer (sluice-store). Every mutation is a
/// single atomic conditional update inside the store; callers never
/// read-then-write a task's status.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Error type for store operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Up to `limit` pending tasks, oldest first. Never mutates.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>, Self::Error>;

    /// Move a task from pending to processing, stamping `claimed_at`.
    ///
    /// Returns `false` when the task was not pending (another worker won the
    /// race, or the task is terminal).
    async fn claim(&self, id: TaskId) -> Result<bool, Self::Error>;

    /// Move a task from processing to completed, recording `result_ref`.
    ///
    /// Returns `false` (and changes nothing) when the task is not processing,
    /// which makes repeated commits idempotent.
    async fn commit_success(&self, id: TaskId, result_ref: &str) -> Result<bool, Self::Error>;

    /// Move a task from processing to failed, recording the reason and
    /// incrementing `retry_count`.
    ///
    /// Returns `false` (and changes nothing) when the task is not processing.
    async fn commit_failure(&self, id: TaskId, error_message: &str) -> Result<bool, Self::Error>;

    /// Move every processing task claimed more than `older_than` ago back to
    /// pending, clearing `claimed_at` and incrementing `retry_count`.
    async fn reclaim_stale(&self, older_than: Duration) -> Result<u64, Self::Error>;

    /// Number of tasks `reclaim_stale(older_than)` would reclaim right now
    async fn count_stale(&self, older_than: Duration) -> Result<u64, Self::Error>;

    /// Count of tasks per status
    async fn stats(&self) -> Result<TaskStats, Self::Error>;

    /// Insert a new pending task
    async fn enqueue(&self, payload_ref: &str) -> Result<TaskId, Self::Error>;

    /// Get a task by id
    async fn get(&self, id: TaskId) -> Result<Option<Task>, Self::Error>;

    /// Operator requeue: move failed tasks back to pending.
    ///
    /// With `max_retry_count`, only tasks whose `retry_count` is below it are
    /// requeued. Returns how many moved.
    async fn requeue_failed(&self, max_retry_count: Option<u32>) -> Result<u64, Self::Error>;

    /// Verify the store is reachable
    async fn health_check(&self) -> Result<(), Self::Error>;
}

/// External extraction or embedding service
///
/// Implemented by the infrastructure layer (sluice-llm)
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform the content behind `payload_ref`
    async fn invoke(&self, payload_ref: &str) -> Result<Transformation, TransformError>;
}

/// Where validated results are written
///
/// Implemented by the infrastructure layer (sluice-store). Writes are keyed
/// by task id, so repeating an identical upsert does not duplicate anything.
#[async_trait]
pub trait DestinationStore: Send + Sync {
    /// Error type for destination operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Write the result for a task and return its destination reference
    async fn upsert(&self, task_id: TaskId, output: &serde_json::Value) -> Result<String, Self::Error>;

    /// Number of documents held
    async fn count(&self) -> Result<u64, Self::Error>;
}
