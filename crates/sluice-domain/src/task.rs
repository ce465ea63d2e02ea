//! Task module - the unit of work moved through the drain pipeline

use crate::TaskStatus;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a task based on UUIDv7
///
/// UUIDv7 provides:
/// - Chronological sortability, so "oldest first" can fall back on id order
/// - 128-bit uniqueness
/// - No coordination required between processes enqueueing work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u128);

impl TaskId {
    /// Generate a new UUIDv7-based TaskId
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice_domain::TaskId;
    ///
    /// let id = TaskId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a TaskId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a TaskId from its hyphenated UUID string
    ///
    /// # Examples
    ///
    /// ```
    /// use sluice_domain::TaskId;
    ///
    /// let id = TaskId::new();
    /// let parsed = TaskId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid task id '{}': {}", s, e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }

    /// Big-endian byte form used as the storage key
    pub fn to_bytes(&self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// Rebuild a TaskId from its storage key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let arr: [u8; 16] = bytes
            .try_into()
            .map_err(|_| format!("Expected 16 bytes for TaskId, got {}", bytes.len()))?;
        Ok(Self(u128::from_be_bytes(arr)))
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl std::str::FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

/// A task tracked by the Task Store
///
/// The store exclusively owns these records. Values handed out by
/// `fetch_pending` or `get` are snapshots; mutating them changes nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Opaque reference to the source content (URL or document key)
    pub payload_ref: String,

    /// Current lifecycle state
    pub status: TaskStatus,

    /// Reason for the last failure; only set while `status` is `Failed`
    pub error_message: Option<String>,

    /// Incremented on every reclaim and every failed attempt
    pub retry_count: u32,

    /// When the current claim was taken; only set while `Processing`
    pub claimed_at: Option<DateTime<Utc>>,

    /// Last mutation time
    pub updated_at: DateTime<Utc>,

    /// When the task was enqueued
    pub created_at: DateTime<Utc>,

    /// Destination reference recorded on successful completion
    pub result_ref: Option<String>,
}

impl Task {
    /// Create a new pending task
    pub fn new(payload_ref: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: TaskId::new(),
            payload_ref: payload_ref.into(),
            status: TaskStatus::Pending,
            error_message: None,
            retry_count: 0,
            claimed_at: None,
            updated_at: now,
            created_at: now,
            result_ref: None,
        }
    }

    /// Whether the task is held by a worker whose claim started before `cutoff`
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Processing
            && self.claimed_at.map(|at| at < cutoff).unwrap_or(false)
    }
}

/// Count of tasks per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Tasks waiting to be claimed
    pub pending: u64,
    /// Tasks currently held by a worker (or abandoned by one)
    pub processing: u64,
    /// Tasks committed successfully
    pub completed: u64,
    /// Tasks that failed permanently
    pub failed: u64,
}

impl TaskStats {
    /// Total tasks across all statuses
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    /// Count for a single status
    pub fn get(&self, status: TaskStatus) -> u64 {
        match status {
            TaskStatus::Pending => self.pending,
            TaskStatus::Processing => self.processing,
            TaskStatus::Completed => self.completed,
            TaskStatus::Failed => self.failed,
        }
    }

    /// Add `count` tasks to the bucket for `status`
    pub fn add(&mut self, status: TaskStatus, count: u64) {
        match status {
            TaskStatus::Pending => self.pending += count,
            TaskStatus::Processing => self.processing += count,
            TaskStatus::Completed => self.completed += count,
            TaskStatus::Failed => self.failed += count,
        }
    }

    /// Ordered view for reporting
    pub fn as_map(&self) -> BTreeMap<&'static str, u64> {
        TaskStatus::ALL
            .iter()
            .map(|s| (s.as_str(), self.get(*s)))
            .collect()
    }
}
