//! Metrics collection for Janitor operations

/// Metrics collected across sweeps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JanitorMetrics {
    /// Tasks moved back to pending
    pub reclaimed: u64,

    /// Tasks a dry-run sweep found stale but left alone
    pub would_reclaim: u64,

    /// Result of the most recent sweep
    pub last_sweep: u64,

    /// Total sweep iterations completed
    pub sweep_count: usize,

    /// Sweeps that ended in a store error
    pub failed_sweeps: usize,

    /// Total time spent sweeping, in milliseconds
    pub total_runtime_ms: u64,
}

impl JanitorMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed sweep
    pub fn record_sweep(&mut self, count: u64, dry_run: bool) {
        if dry_run {
            self.would_reclaim += count;
        } else {
            self.reclaimed += count;
        }
        self.last_sweep = count;
        self.sweep_count += 1;
    }

    /// Record a sweep that failed
    pub fn record_failure(&mut self) {
        self.failed_sweeps += 1;
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Janitor Metrics Summary".to_string(),
            "======================".to_string(),
            format!("Sweep cycles: {}", self.sweep_count),
            format!("Total runtime: {}ms", self.total_runtime_ms),
            format!("Reclaimed: {}", self.reclaimed),
        ];

        if self.would_reclaim > 0 {
            lines.push(format!("Would reclaim (dry run): {}", self.would_reclaim));
        }
        if self.failed_sweeps > 0 {
            lines.push(format!("Failed sweeps: {}", self.failed_sweeps));
        }

        lines.join("\n")
    }
}
