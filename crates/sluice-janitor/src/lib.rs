//! Sluice Janitor
//!
//! Recovery sweeper for tasks abandoned mid-processing.
//!
//! # Overview
//!
//! A worker that crashes, is killed, or stalls leaves its task in
//! `processing` with a `claimed_at` stamp. The Janitor finds every such task
//! whose claim is older than the staleness threshold and moves it back to
//! `pending`, incrementing its `retry_count`.
//!
//! - **One-shot sweeps**: `Janitor::sweep`, used by the `sweep` command and
//!   at the start of draining runs
//! - **Scheduled sweeps**: `JanitorWorker`, running on its own interval
//!   independent of any batch
//! - **Dry runs**: count stale tasks without touching them
//!
//! # Safety
//!
//! | Actor | Transition | Guard |
//! |-------|------------|-------|
//! | Janitor | processing → pending | `status = 'processing' AND claimed_at < now - threshold` |
//! | Worker commit | processing → completed/failed | `status = 'processing'` |
//!
//! Both are conditional updates in the store. Whichever runs second sees
//! a status it does not expect and changes nothing.
//!
//! # Usage
//!
//! ## One-time Sweep
//!
//! ```no_run
//! use sluice_janitor::Janitor;
//! use sluice_store::SqliteTaskStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteTaskStore::new("sluice.db")?;
//! let mut janitor = Janitor::default_config();
//!
//! let reclaimed = janitor.sweep(&store).await?;
//! println!("{}", janitor.metrics().summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Presets
//!
//! ```
//! use sluice_janitor::JanitorConfig;
//!
//! // Default: 30 minute threshold, sweep every 5 minutes
//! let config = JanitorConfig::default();
//!
//! // Aggressive: fast transformers, quick recovery
//! let config = JanitorConfig::aggressive();
//!
//! // Lenient: slow transformers with long tail latency
//! let config = JanitorConfig::lenient();
//! ```
//!
//! # Configuration
//!
//! The Janitor can be configured via TOML:
//!
//! ```toml
//! [janitor]
//! stale_threshold_minutes = 30
//! sweep_interval_secs = 300
//! dry_run = false
//! ```

#![warn(missing_docs)]

mod error;
mod config;
mod metrics;
mod janitor;
mod worker;

pub use error::JanitorError;
pub use config::JanitorConfig;
pub use metrics::JanitorMetrics;
pub use janitor::Janitor;
pub use worker::JanitorWorker;
