//! Sluice Transformer Layer
//!
//! Implementations of the `Transformer` trait from `sluice-domain`.
//!
//! # Transformers
//!
//! - `MockTransformer`: Scripted, deterministic transformer for testing
//! - `HttpTransformer`: JSON-over-HTTP extraction or embedding service
//!
//! # Examples
//!
//! ```
//! use sluice_llm::MockTransformer;
//! use sluice_domain::Transformer;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let transformer = MockTransformer::new(json!({ "skills": ["rust"] }));
//! let result = transformer.invoke("https://example.com/cv").await.unwrap();
//! assert_eq!(result.output["skills"][0], "rust");
//! # }
//! ```

#![warn(missing_docs)]

pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use sluice_domain::{QuotaSnapshot, TransformError, Transformation, Transformer};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Barrier;

pub use http::HttpTransformer;

/// Errors raised while constructing a transformer
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),

    /// Invalid transformer configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What a `MockTransformer` does for a payload
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this document
    Succeed(Value),
    /// Return this error
    Fail(TransformError),
    /// Panic mid-call, simulating a crashed worker
    Panic(String),
}

#[derive(Debug, Default)]
struct QuotaBudget {
    calls: Option<i64>,
    tokens: Option<i64>,
    tokens_per_call: i64,
}

impl QuotaBudget {
    fn snapshot(&self) -> QuotaSnapshot {
        QuotaSnapshot::from_parts(self.calls, self.tokens)
    }

    fn is_spent(&self) -> bool {
        self.snapshot().is_exhausted()
    }

    fn charge(&mut self) {
        if let Some(calls) = self.calls.as_mut() {
            *calls -= 1;
        }
        if let Some(tokens) = self.tokens.as_mut() {
            *tokens -= self.tokens_per_call;
        }
    }
}

/// Scripted transformer for deterministic testing
///
/// Returns pre-configured outcomes without making any network calls.
/// Clones share scripts, budget, and call count through `Arc`, so a test
/// can keep a handle and change behavior between runs.
///
/// # Examples
///
/// ```
/// use sluice_llm::{MockOutcome, MockTransformer};
/// use sluice_domain::TransformError;
/// use serde_json::json;
///
/// let transformer = MockTransformer::new(json!({ "skills": ["rust"] }))
///     .with_call_quota(3);
/// transformer.add_outcome(
///     "https://example.com/broken",
///     MockOutcome::Fail(TransformError::Permanent("unreadable page".into())),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockTransformer {
    default_outcome: Arc<Mutex<MockOutcome>>,
    outcomes: Arc<Mutex<HashMap<String, MockOutcome>>>,
    budget: Arc<Mutex<QuotaBudget>>,
    call_count: Arc<AtomicUsize>,
    latency: Option<Duration>,
    barrier: Option<Arc<Barrier>>,
}

impl MockTransformer {
    /// Create a transformer that returns `output` for every payload
    pub fn new(output: Value) -> Self {
        Self::with_default(MockOutcome::Succeed(output))
    }

    /// Create a transformer with an arbitrary default outcome
    pub fn with_default(outcome: MockOutcome) -> Self {
        Self {
            default_outcome: Arc::new(Mutex::new(outcome)),
            outcomes: Arc::new(Mutex::new(HashMap::new())),
            budget: Arc::new(Mutex::new(QuotaBudget::default())),
            call_count: Arc::new(AtomicUsize::new(0)),
            latency: None,
            barrier: None,
        }
    }

    /// Allow `calls` successful calls; later calls are refused with `QuotaExceeded`
    pub fn with_call_quota(self, calls: i64) -> Self {
        lock(&self.budget).calls = Some(calls);
        self
    }

    /// Start with `total` tokens and charge `per_call` for each call
    pub fn with_token_quota(self, total: i64, per_call: i64) -> Self {
        {
            let mut budget = lock(&self.budget);
            budget.tokens = Some(total);
            budget.tokens_per_call = per_call;
        }
        self
    }

    /// Sleep this long inside every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call wait until `parties` calls are in flight together
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    /// Script the outcome for one payload
    pub fn add_outcome(&self, payload_ref: impl Into<String>, outcome: MockOutcome) {
        lock(&self.outcomes).insert(payload_ref.into(), outcome);
    }

    /// Script a successful document for one payload
    pub fn add_response(&self, payload_ref: impl Into<String>, output: Value) {
        self.add_outcome(payload_ref, MockOutcome::Succeed(output));
    }

    /// Replace the outcome used for unscripted payloads
    pub fn set_default(&self, outcome: MockOutcome) {
        *lock(&self.default_outcome) = outcome;
    }

    /// Forget every per-payload script
    pub fn clear_outcomes(&self) {
        lock(&self.outcomes).clear();
    }

    /// Reset the call budget (for example when a quota window rolls over)
    pub fn refill_calls(&self, calls: i64) {
        lock(&self.budget).calls = Some(calls);
    }

    /// Get the number of times invoke was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        self.call_count.store(0, Ordering::SeqCst);
    }

    fn outcome_for(&self, payload_ref: &str) -> MockOutcome {
        lock(&self.outcomes)
            .get(payload_ref)
            .cloned()
            .unwrap_or_else(|| lock(&self.default_outcome).clone())
    }
}

/// Lock, recovering the guard if a panicking call poisoned it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl Transformer for MockTransformer {
    async fn invoke(&self, payload_ref: &str) -> Result<Transformation, TransformError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let snapshot = {
            let mut budget = lock(&self.budget);
            if budget.is_spent() {
                return Err(TransformError::QuotaExceeded {
                    snapshot: Some(budget.snapshot()),
                    message: "mock quota spent".to_string(),
                });
            }
            budget.charge();
            budget.snapshot()
        };

        match self.outcome_for(payload_ref) {
            MockOutcome::Succeed(output) => Ok(Transformation::new(output, snapshot)),
            MockOutcome::Fail(err) => Err(err),
            MockOutcome::Panic(message) => panic!("{}", message),
        }
    }
}
