//! Sluice Pipeline
//!
//! Drains a task queue through an external transformer with a bounded worker
//! pool, stopping cleanly when the transformer's quota runs out.
//!
//! # Overview
//!
//! Every task moves through the store's atomic conditional updates only:
//! a worker owns a task exactly when its `claim` returned `true`. Outcomes are
//! committed with `commit_success` or `commit_failure`; tasks stopped by the
//! quota, or held by a crashed worker, stay `processing` until the recovery
//! sweeper returns them to `pending`.
//!
//! # Architecture
//!
//! ```text
//! Driver → fetch_pending → WorkerPool → claim → Transformer → Gatekeeper
//!                               ↑                    ↓             ↓
//!                         QuotaGovernor  ←── quota snapshot   Destination → commit
//! ```
//!
//! # Key Features
//!
//! - **Run modes**: single, drain-until-empty, continuous, plus status
//! - **Quota Governor**: cooperative stop once either budget reaches zero
//! - **Local retry**: exponential backoff with jitter for transient failures
//! - **Crash isolation**: a panicking task never takes its siblings down
//! - **Operator operations**: sweep, retry-failed, enqueue
//!
//! # Example Usage
//!
//! ```no_run
//! use sluice_llm::MockTransformer;
//! use sluice_pipeline::{Driver, PipelineConfig, RunMode};
//! use sluice_store::{SqliteDestination, SqliteTaskStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteTaskStore::new("sluice.db")?);
//! let destination = Arc::new(SqliteDestination::new("documents.db")?);
//! let transformer = Arc::new(MockTransformer::new(serde_json::json!({})));
//!
//! let driver = Driver::new(store, transformer, destination, PipelineConfig::default())?;
//! driver.enqueue(["https://example.com/cv.pdf"]).await?;
//!
//! let report = driver.run(RunMode::DrainUntilEmpty).await;
//! println!("{} completed, {} failed", report.completed, report.failed);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod driver;
mod error;
mod governor;
mod pool;
mod report;
mod retry;

pub use config::{PacingConfig, PacingTier, PipelineConfig};
pub use driver::{CancelHandle, Driver};
pub use error::PipelineError;
pub use governor::QuotaGovernor;
pub use pool::WorkerPool;
pub use report::{BatchOutcome, RunMode, RunReport, StatusReport, Termination};
pub use retry::RetryPolicy;
