//! Sluice Storage Layer
//!
//! Implements the `TaskStore` and `DestinationStore` traits.
//!
//! # Architecture
//!
//! - SQLite for the task queue. Every state transition is one conditional
//!   `UPDATE ... WHERE status = ?`, so mutual exclusion holds across
//!   processes sharing the database file, not just across threads.
//! - SQLite for the processed-document collection (upsert keyed by task id)
//! - In-memory implementations of both traits for tests and dry runs
//!
//! # Examples
//!
//! ```no_run
//! use sluice_store::SqliteTaskStore;
//!
//! let store = SqliteTaskStore::new(":memory:").unwrap();
//! // Store is now ready for queue operations
//! ```

#![warn(missing_docs)]

mod destination;
mod memory;
mod sqlite;

pub use destination::SqliteDestination;
pub use memory::{MemoryDestination, MemoryTaskStore};
pub use sqlite::SqliteTaskStore;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Longest error message recorded on a failed task, in characters
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Store cannot be reached or its handle is unusable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Truncate a failure reason to `MAX_ERROR_MESSAGE_LEN` characters
pub(crate) fn truncate_error(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_LEN) {
        Some((idx, _)) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Run `f` against a shared connection on the blocking thread pool
///
/// rusqlite calls block, including the busy-timeout wait for another
/// process's write lock, so they must stay off the async worker threads.
pub(crate) async fn with_connection<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let conn = conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    })
    .await
    .map_err(|e| StoreError::Unavailable(format!("Task join error: {}", e)))?
}

/// The instant `older_than` before `now`
pub(crate) fn cutoff(now: DateTime<Utc>, older_than: Duration) -> Result<DateTime<Utc>, StoreError> {
    let delta = chrono::Duration::from_std(older_than)
        .map_err(|e| StoreError::InvalidData(format!("Threshold out of range: {}", e)))?;
    now.checked_sub_signed(delta)
        .ok_or_else(|| StoreError::InvalidData("Threshold reaches before the epoch".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_error() {
        let short = "connection reset";
        assert_eq!(truncate_error(short), short);

        let long = "x".repeat(MAX_ERROR_MESSAGE_LEN + 20);
        assert_eq!(truncate_error(&long).chars().count(), MAX_ERROR_MESSAGE_LEN);

        // Multi-byte characters must not be split
        let wide = "é".repeat(MAX_ERROR_MESSAGE_LEN + 1);
        let truncated = truncate_error(&wide);
        assert_eq!(truncated.chars().count(), MAX_ERROR_MESSAGE_LEN);
    }

    #[test]
    fn test_cutoff() {
        let now = Utc::now();
        let at = cutoff(now, Duration::from_secs(30 * 60)).unwrap();
        assert_eq!(now - at, chrono::Duration::minutes(30));
    }
}
