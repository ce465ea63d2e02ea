//! Run modes, termination reasons, and run summaries

use crate::PipelineError;
use serde::Serialize;
use sluice_domain::TaskStats;
use std::fmt;

/// Looping run modes of the driver
///
/// The read-only status mode is `Driver::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    /// One batch, then stop
    Single,
    /// Batches until a fetch comes back empty
    DrainUntilEmpty,
    /// Batches forever, until cancelled or capped
    Continuous,
}

impl RunMode {
    /// String representation used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Single => "single",
            RunMode::DrainUntilEmpty => "drain-until-empty",
            RunMode::Continuous => "continuous",
        }
    }

    /// Whether the mode loops over batches
    pub fn is_draining(&self) -> bool {
        !matches!(self, RunMode::Single)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A fetch returned no pending tasks
    EmptyQueue,
    /// Single mode finished its one batch
    SinglePass,
    /// The quota governor reported exhaustion
    QuotaExhausted,
    /// The configured iteration cap was reached
    IterationCap,
    /// Stopped through the cancel handle
    Cancelled,
    /// The store failed; the run was aborted
    Fatal(String),
}

impl Termination {
    /// True for run-level failures
    pub fn is_fatal(&self) -> bool {
        matches!(self, Termination::Fatal(_))
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::EmptyQueue => f.write_str("empty queue"),
            Termination::SinglePass => f.write_str("single pass"),
            Termination::QuotaExhausted => f.write_str("quota exhausted"),
            Termination::IterationCap => f.write_str("iteration cap"),
            Termination::Cancelled => f.write_str("cancelled"),
            Termination::Fatal(msg) => write!(f, "fatal error: {}", msg),
        }
    }
}

/// Counts produced by one batch of the worker pool
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Tasks this pool successfully claimed
    pub claimed: u64,
    /// Tasks committed as completed
    pub completed: u64,
    /// Tasks committed as failed (validation failures included)
    pub failed: u64,
    /// Subset of `failed` rejected by the gatekeeper
    pub validation_failed: u64,
    /// Tasks left processing because the quota ran out mid-call
    pub quota_stopped: u64,
    /// Claims lost to another worker or process
    pub lost_races: u64,
    /// Tasks whose worker panicked; left processing
    pub crashed: u64,
    /// Commits that found the task no longer processing (reclaimed meanwhile)
    pub superseded: u64,
    /// Run-level error that aborted the batch
    pub error: Option<PipelineError>,
}

impl BatchOutcome {
    /// Fold another worker's counts into this one, keeping the first error
    pub fn merge(&mut self, other: BatchOutcome) {
        self.claimed += other.claimed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.validation_failed += other.validation_failed;
        self.quota_stopped += other.quota_stopped;
        self.lost_races += other.lost_races;
        self.crashed += other.crashed;
        self.superseded += other.superseded;
        if self.error.is_none() {
            self.error = other.error;
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Mode the run used
    pub mode: RunMode,
    /// Batches fetched (empty polls included)
    pub iterations: u64,
    /// Tasks claimed
    pub claimed: u64,
    /// Tasks completed
    pub completed: u64,
    /// Tasks failed (validation failures included)
    pub failed: u64,
    /// Subset of `failed` rejected by the gatekeeper
    pub validation_failed: u64,
    /// Tasks left processing by a quota stop
    pub quota_stopped: u64,
    /// Claims lost to concurrent workers
    pub lost_races: u64,
    /// Tasks left processing by a crashed worker
    pub crashed: u64,
    /// Commits that found the task already reclaimed
    pub superseded: u64,
    /// Pending tasks when the run ended (absent if the store was unreachable)
    pub still_pending: Option<u64>,
    /// Processing tasks when the run ended (absent if the store was unreachable)
    pub still_processing: Option<u64>,
    /// Why the run stopped
    pub termination: Termination,
}

impl RunReport {
    /// Empty report for a run that has not started
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            iterations: 0,
            claimed: 0,
            completed: 0,
            failed: 0,
            validation_failed: 0,
            quota_stopped: 0,
            lost_races: 0,
            crashed: 0,
            superseded: 0,
            still_pending: None,
            still_processing: None,
            termination: Termination::SinglePass,
        }
    }

    /// Add a batch's counts
    pub fn absorb(&mut self, batch: &BatchOutcome) {
        self.claimed += batch.claimed;
        self.completed += batch.completed;
        self.failed += batch.failed;
        self.validation_failed += batch.validation_failed;
        self.quota_stopped += batch.quota_stopped;
        self.lost_races += batch.lost_races;
        self.crashed += batch.crashed;
        self.superseded += batch.superseded;
    }

    /// Record end-of-run queue counts
    pub fn set_remaining(&mut self, stats: &TaskStats) {
        self.still_pending = Some(stats.pending);
        self.still_processing = Some(stats.processing);
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let remaining = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        format!(
            "{} run ended ({}) after {} iterations: {} completed, {} failed, {} still pending, {} still processing",
            self.mode,
            self.termination,
            self.iterations,
            self.completed,
            self.failed,
            remaining(self.still_pending),
            remaining(self.still_processing),
        )
    }
}

/// Read-only snapshot for status mode
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Task counts per status
    pub tasks: TaskStats,
    /// Documents in the destination store
    pub destination_documents: u64,
}

impl StatusReport {
    /// JSON rendering for machine consumers
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tasks": self.tasks.as_map(),
            "total_tasks": self.tasks.total(),
            "destination_documents": self.destination_documents,
        })
    }
}
