//! Quota Governor: shared view of the transformer's remaining capacity

use sluice_domain::QuotaSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

/// Tracks remaining transformer capacity and signals exhaustion
///
/// Every worker reports the snapshot from each transformer response and
/// asks `is_exhausted()` before claiming its next task. The governor never
/// interrupts a call in flight; it only stops new claims.
///
/// Exhaustion is sticky for the lifetime of the governor. A late response
/// carrying an older, larger budget cannot re-open claiming once another
/// worker saw the budget run out. The driver creates a fresh governor per run.
#[derive(Debug, Default)]
pub struct QuotaGovernor {
    latest: RwLock<QuotaSnapshot>,
    exhausted: AtomicBool,
}

impl QuotaGovernor {
    /// Create a governor with unknown budgets
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the snapshot reported with a transformer response
    pub fn observe(&self, snapshot: QuotaSnapshot) {
        {
            let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
            *latest = snapshot;
        }
        if snapshot.is_exhausted() {
            self.exhausted.store(true, Ordering::SeqCst);
        }
    }

    /// Record a provider refusal
    ///
    /// The refusal itself proves the quota is spent, whatever the snapshot says.
    pub fn trip(&self, snapshot: Option<QuotaSnapshot>) {
        if let Some(snapshot) = snapshot {
            let mut latest = self.latest.write().unwrap_or_else(|e| e.into_inner());
            *latest = snapshot;
        }
        self.exhausted.store(true, Ordering::SeqCst);
    }

    /// True once any reported budget reached zero or the provider refused a call
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Latest reported snapshot
    pub fn snapshot(&self) -> QuotaSnapshot {
        *self.latest.read().unwrap_or_else(|e| e.into_inner())
    }
}
