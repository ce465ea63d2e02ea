//! SQLite-backed processed-document collection

use crate::{with_connection, StoreError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use sluice_domain::{Clock, DestinationStore, SystemClock, TaskId};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Destination store holding one JSON document per task
///
/// Upserts are keyed by task id, so a worker that writes the same result
/// twice (for example after a crash between write and commit) leaves a
/// single row.
pub struct SqliteDestination {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

impl SqliteDestination {
    /// Open (or create) the document collection at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(include_str!("destination_schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(SystemClock),
        })
    }

    /// Reference recorded on the task when its document is written
    pub fn result_ref(task_id: TaskId) -> String {
        format!("doc:{}", task_id)
    }

    /// Read back the document written for a task
    pub async fn get_document(&self, task_id: TaskId) -> Result<Option<serde_json::Value>, StoreError> {
        let body = with_connection(&self.conn, move |conn| {
            let body: Option<String> = conn
                .query_row(
                    "SELECT body FROM documents WHERE task_id = ?1",
                    params![&task_id.to_bytes()[..]],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(body)
        })
        .await?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }
}

#[async_trait]
impl DestinationStore for SqliteDestination {
    type Error = StoreError;

    async fn upsert(&self, task_id: TaskId, output: &serde_json::Value) -> Result<String, Self::Error> {
        let body = serde_json::to_string(output)?;
        let now = self.clock.now().timestamp_millis();

        with_connection(&self.conn, move |conn| {
            conn.execute(
                "INSERT INTO documents (task_id, body, written_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(task_id) DO UPDATE SET body = excluded.body, written_at = excluded.written_at",
                params![&task_id.to_bytes()[..], body, now],
            )?;
            Ok(())
        })
        .await?;

        Ok(Self::result_ref(task_id))
    }

    async fn count(&self) -> Result<u64, Self::Error> {
        with_connection(&self.conn, |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let dest = SqliteDestination::new(":memory:").unwrap();
        let id = TaskId::new();
        let doc = json!({ "job_role": "Data Engineer", "technical_skills": ["Rust", "SQL"] });

        let first = dest.upsert(id, &doc).await.unwrap();
        let second = dest.upsert(id, &doc).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dest.count().await.unwrap(), 1);
        assert_eq!(dest.get_document(id).await.unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_upsert_replaces_body() {
        let dest = SqliteDestination::new(":memory:").unwrap();
        let id = TaskId::new();

        dest.upsert(id, &json!({ "v": 1 })).await.unwrap();
        dest.upsert(id, &json!({ "v": 2 })).await.unwrap();

        assert_eq!(dest.count().await.unwrap(), 1);
        assert_eq!(dest.get_document(id).await.unwrap(), Some(json!({ "v": 2 })));
    }
}
