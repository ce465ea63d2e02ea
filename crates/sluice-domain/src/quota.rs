//! Quota module - remaining external-service capacity

/// Remaining capacity reported by the transformer after a call
///
/// Either budget may be unknown (the provider did not report it). Unknown
/// budgets never count as exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSnapshot {
    /// Remaining calls in the current window
    pub remaining_calls: Option<i64>,

    /// Remaining tokens in the current window
    pub remaining_tokens: Option<i64>,
}

impl QuotaSnapshot {
    /// Snapshot with both budgets known
    pub fn new(remaining_calls: i64, remaining_tokens: i64) -> Self {
        Self {
            remaining_calls: Some(remaining_calls),
            remaining_tokens: Some(remaining_tokens),
        }
    }

    /// Snapshot where either budget may be unknown
    pub fn from_parts(remaining_calls: Option<i64>, remaining_tokens: Option<i64>) -> Self {
        Self {
            remaining_calls,
            remaining_tokens,
        }
    }

    /// Snapshot carrying no information
    pub fn unknown() -> Self {
        Self::default()
    }

    /// True when either known budget is at or below zero
    pub fn is_exhausted(&self) -> bool {
        self.remaining_calls.is_some_and(|n| n <= 0) || self.remaining_tokens.is_some_and(|n| n <= 0)
    }
}

impl std::fmt::Display for QuotaSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let show = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string());
        write!(
            f,
            "calls={} tokens={}",
            show(self.remaining_calls),
            show(self.remaining_tokens)
        )
    }
}
