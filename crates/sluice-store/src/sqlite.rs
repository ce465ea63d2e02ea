//! SQLite-backed task queue

use crate::{cutoff, truncate_error, with_connection, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sluice_domain::{Clock, SystemClock, Task, TaskId, TaskStats, TaskStatus, TaskStore};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long a statement waits for another process's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const TASK_COLUMNS: &str =
    "id, payload_ref, status, error_message, retry_count, claimed_at, updated_at, created_at, result_ref";

/// SQLite-based implementation of `TaskStore`
///
/// Several `SqliteTaskStore` handles (in one process or many) may open the
/// same database file. The store never reads a status and writes it back;
/// each transition is a conditional `UPDATE` and its affected-row count.
///
/// # Thread Safety
///
/// The connection sits behind a mutex, so one handle can be shared by all
/// workers through an `Arc`. Statements run on tokio's blocking pool; a
/// statement waiting out another process's lock never stalls the runtime.
pub struct SqliteTaskStore {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteTaskStore {
    /// Open (or create) a task store at the given path using the wall clock
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sluice_store::SqliteTaskStore;
    ///
    /// let store = SqliteTaskStore::new("sluice.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    /// Open a task store that reads time from `clock`
    pub fn with_clock<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // WAL lets readers proceed while another process commits
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
        let id_bytes: Vec<u8> = row.get(0)?;
        let id = TaskId::from_bytes(&id_bytes).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, Type::Blob, Box::new(StoreError::InvalidData(e)))
        })?;

        let status_str: String = row.get(2)?;
        let status = TaskStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                Box::new(StoreError::InvalidData(format!("Unknown task status: {}", status_str))),
            )
        })?;

        let claimed_at: Option<i64> = row.get(5)?;

        Ok(Task {
            id,
            payload_ref: row.get(1)?,
            status,
            error_message: row.get(3)?,
            retry_count: row.get(4)?,
            claimed_at: claimed_at.map(|ms| millis_to_datetime(ms, 5)).transpose()?,
            updated_at: millis_to_datetime(row.get(6)?, 6)?,
            created_at: millis_to_datetime(row.get(7)?, 7)?,
            result_ref: row.get(8)?,
        })
    }
}

fn millis_to_datetime(ms: i64, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Integer,
            Box::new(StoreError::InvalidData(format!("Timestamp out of range: {}", ms))),
        )
    })
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    type Error = StoreError;

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<Task>, Self::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        with_connection(&self.conn, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE status = 'pending'
                 ORDER BY created_at ASC, id ASC LIMIT ?1",
                TASK_COLUMNS
            ))?;

            let tasks = stmt
                .query_map(params![limit], Self::row_to_task)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
    }

    async fn claim(&self, id: TaskId) -> Result<bool, Self::Error> {
        let now = self.now_millis();

        with_connection(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = 'processing', claimed_at = ?1, updated_at = MAX(updated_at, ?1)
                 WHERE id = ?2 AND status = 'pending'",
                params![now, &id.to_bytes()[..]],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn commit_success(&self, id: TaskId, result_ref: &str) -> Result<bool, Self::Error> {
        let now = self.now_millis();
        let result_ref = result_ref.to_string();

        with_connection(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = 'completed', result_ref = ?1, error_message = NULL,
                     claimed_at = NULL, updated_at = MAX(updated_at, ?2)
                 WHERE id = ?3 AND status = 'processing'",
                params![result_ref, now, &id.to_bytes()[..]],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn commit_failure(&self, id: TaskId, error_message: &str) -> Result<bool, Self::Error> {
        let now = self.now_millis();
        let error_message = truncate_error(error_message);

        with_connection(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = 'failed', error_message = ?1, retry_count = retry_count + 1,
                     claimed_at = NULL, updated_at = MAX(updated_at, ?2)
                 WHERE id = ?3 AND status = 'processing'",
                params![error_message, now, &id.to_bytes()[..]],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn reclaim_stale(&self, older_than: Duration) -> Result<u64, Self::Error> {
        let now = self.clock.now();
        let cutoff = cutoff(now, older_than)?.timestamp_millis();
        let now = now.timestamp_millis();

        with_connection(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = 'pending', claimed_at = NULL, error_message = NULL,
                     retry_count = retry_count + 1, updated_at = MAX(updated_at, ?1)
                 WHERE status = 'processing' AND claimed_at < ?2",
                params![now, cutoff],
            )?;
            Ok(changed as u64)
        })
        .await
    }

    async fn count_stale(&self, older_than: Duration) -> Result<u64, Self::Error> {
        let cutoff = cutoff(self.clock.now(), older_than)?.timestamp_millis();

        with_connection(&self.conn, move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks WHERE status = 'processing' AND claimed_at < ?1",
                params![cutoff],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn stats(&self) -> Result<TaskStats, Self::Error> {
        with_connection(&self.conn, |conn| {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stats = TaskStats::default();
            for (status, count) in rows {
                let status = TaskStatus::parse(&status)
                    .ok_or_else(|| StoreError::InvalidData(format!("Unknown task status: {}", status)))?;
                stats.add(status, count as u64);
            }
            Ok(stats)
        })
        .await
    }

    async fn enqueue(&self, payload_ref: &str) -> Result<TaskId, Self::Error> {
        let task = Task::new(payload_ref, self.clock.now());
        let now = task.created_at.timestamp_millis();

        with_connection(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, payload_ref, status, retry_count, updated_at, created_at)
                 VALUES (?1, ?2, 'pending', 0, ?3, ?3)",
                params![&task.id.to_bytes()[..], &task.payload_ref, now],
            )?;
            Ok(task.id)
        })
        .await
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, Self::Error> {
        with_connection(&self.conn, move |conn| {
            let task = conn
                .query_row(
                    &format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS),
                    params![&id.to_bytes()[..]],
                    Self::row_to_task,
                )
                .optional()?;
            Ok(task)
        })
        .await
    }

    async fn requeue_failed(&self, max_retry_count: Option<u32>) -> Result<u64, Self::Error> {
        let now = self.now_millis();

        with_connection(&self.conn, move |conn| {
            let changed = conn.execute(
                "UPDATE tasks
                 SET status = 'pending', error_message = NULL, updated_at = MAX(updated_at, ?1)
                 WHERE status = 'failed' AND (?2 IS NULL OR retry_count < ?2)",
                params![now, max_retry_count],
            )?;
            Ok(changed as u64)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), Self::Error> {
        with_connection(&self.conn, |conn| {
            conn.query_row("SELECT 1", [], |_| Ok(()))?;
            Ok(())
        })
        .await
    }
}
