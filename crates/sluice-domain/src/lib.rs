//! Sluice Domain Layer
//!
//! This crate holds the domain model for the Sluice drain pipeline: the task
//! state machine, quota snapshots, transformer outcomes, and the trait
//! interfaces every other layer depends upon.
//!
//! ## Key Concepts
//!
//! - **Task**: A unit of work tracked by status in the Task Store
//! - **Claim**: The atomic `pending -> processing` transition that grants one
//!   worker exclusive ownership
//! - **QuotaSnapshot**: Remaining external-service capacity after a call
//! - **Transformer**: The external service that extracts or embeds a payload
//!
//! ## Lifecycle
//!
//! ```text
//! pending -> processing -> completed
//!                       -> failed
//! processing -> pending   (recovery sweeper only)
//! failed -> pending       (explicit operator requeue only)
//! ```
//!
//! ## Architecture
//!
//! - Pure domain types and trait boundaries only
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod quota;
pub mod status;
pub mod task;
pub mod traits;
pub mod transform;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use quota::QuotaSnapshot;
pub use status::TaskStatus;
pub use task::{Task, TaskId, TaskStats};
pub use traits::{DestinationStore, TaskStore, Transformer};
pub use transform::{TransformError, Transformation};
