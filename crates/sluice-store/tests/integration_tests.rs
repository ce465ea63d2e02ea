//! Integration tests for sluice-store
//!
//! The same contract checks run against both task store implementations.

use chrono::Duration as ChronoDuration;
use sluice_domain::{ManualClock, TaskStatus, TaskStore};
use sluice_store::{MemoryTaskStore, SqliteTaskStore, StoreError, MAX_ERROR_MESSAGE_LEN};
use std::sync::Arc;
use std::time::Duration;

const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

fn sqlite_store() -> (SqliteTaskStore, ManualClock) {
    let clock = ManualClock::default();
    let store = SqliteTaskStore::with_clock(":memory:", Arc::new(clock.clone())).unwrap();
    (store, clock)
}

fn memory_store() -> (MemoryTaskStore, ManualClock) {
    let clock = ManualClock::default();
    let store = MemoryTaskStore::with_clock(Arc::new(clock.clone()));
    (store, clock)
}

async fn check_full_lifecycle<S: TaskStore>(store: &S) {
    let ok_id = store.enqueue("https://example.com/a").await.unwrap();
    let bad_id = store.enqueue("https://example.com/b").await.unwrap();

    assert!(store.claim(ok_id).await.unwrap());
    assert!(store.claim(bad_id).await.unwrap());

    assert!(store.commit_success(ok_id, "doc:a").await.unwrap());
    assert!(store.commit_failure(bad_id, "missing fields: skills").await.unwrap());

    let ok = store.get(ok_id).await.unwrap().unwrap();
    assert_eq!(ok.status, TaskStatus::Completed);
    assert_eq!(ok.result_ref.as_deref(), Some("doc:a"));
    assert!(ok.claimed_at.is_none());
    assert!(ok.error_message.is_none());
    assert_eq!(ok.retry_count, 0);

    let bad = store.get(bad_id).await.unwrap().unwrap();
    assert_eq!(bad.status, TaskStatus::Failed);
    assert_eq!(bad.error_message.as_deref(), Some("missing fields: skills"));
    assert!(bad.claimed_at.is_none());
    assert_eq!(bad.retry_count, 1);

    // Terminal tasks are never claimed again
    assert!(!store.claim(ok_id).await.unwrap());
    assert!(!store.claim(bad_id).await.unwrap());

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.total(), 2);
}

async fn check_idempotent_commit<S: TaskStore>(store: &S) {
    let id = store.enqueue("doc").await.unwrap();
    assert!(store.claim(id).await.unwrap());

    assert!(store.commit_success(id, "doc:1").await.unwrap());
    let first = store.get(id).await.unwrap().unwrap();

    assert!(!store.commit_success(id, "doc:1").await.unwrap());
    assert!(!store.commit_failure(id, "late failure").await.unwrap());
    let second = store.get(id).await.unwrap().unwrap();

    assert_eq!(first, second, "repeated commits must not change the record");
}

async fn check_sweeper_threshold<S: TaskStore>(store: &S, clock: &ManualClock) {
    let id = store.enqueue("doc").await.unwrap();
    assert!(store.claim(id).await.unwrap());

    // Exactly at the threshold the claim is still honoured
    clock.advance(ChronoDuration::minutes(30));
    assert_eq!(store.count_stale(THIRTY_MINUTES).await.unwrap(), 0);
    assert_eq!(store.reclaim_stale(THIRTY_MINUTES).await.unwrap(), 0);

    clock.advance(ChronoDuration::minutes(1));
    assert_eq!(store.count_stale(THIRTY_MINUTES).await.unwrap(), 1);
    assert_eq!(store.reclaim_stale(THIRTY_MINUTES).await.unwrap(), 1);

    let task = store.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.claimed_at.is_none());
    assert_eq!(task.retry_count, 1);

    // A reclaimed task can be claimed again
    assert!(store.claim(id).await.unwrap());
}

async fn check_commit_after_reclaim_is_noop<S: TaskStore>(store: &S, clock: &ManualClock) {
    let id = store.enqueue("slow-doc").await.unwrap();
    assert!(store.claim(id).await.unwrap());

    clock.advance(ChronoDuration::minutes(45));
    assert_eq!(store.reclaim_stale(THIRTY_MINUTES).await.unwrap(), 1);

    // The stalled worker wakes up and tries to commit
    assert!(!store.commit_success(id, "doc:late").await.unwrap());
    let task = store.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert!(task.result_ref.is_none());
}

async fn check_requeue_failed<S: TaskStore>(store: &S) {
    let a = store.enqueue("a").await.unwrap();
    let b = store.enqueue("b").await.unwrap();
    for id in [a, b] {
        assert!(store.claim(id).await.unwrap());
        assert!(store.commit_failure(id, "boom").await.unwrap());
    }
    assert_eq!(store.requeue_failed(None).await.unwrap(), 2);

    // Both fail a second time
    assert!(store.claim(b).await.unwrap());
    assert!(store.commit_failure(b, "boom again").await.unwrap());
    assert!(store.claim(a).await.unwrap());
    assert!(store.commit_failure(a, "boom").await.unwrap());

    // Only tasks below the cutoff move
    let b_task = store.get(b).await.unwrap().unwrap();
    assert_eq!(b_task.retry_count, 2);
    assert_eq!(store.requeue_failed(Some(2)).await.unwrap(), 0);
    assert_eq!(store.requeue_failed(Some(3)).await.unwrap(), 2);

    let requeued = store.get(a).await.unwrap().unwrap();
    assert_eq!(requeued.status, TaskStatus::Pending);
    assert!(requeued.error_message.is_none());
    assert_eq!(requeued.retry_count, 2);
}

async fn check_error_truncation<S: TaskStore>(store: &S) {
    let id = store.enqueue("doc").await.unwrap();
    assert!(store.claim(id).await.unwrap());

    let long = "e".repeat(MAX_ERROR_MESSAGE_LEN * 2);
    assert!(store.commit_failure(id, &long).await.unwrap());

    let task = store.get(id).await.unwrap().unwrap();
    assert_eq!(task.error_message.unwrap().len(), MAX_ERROR_MESSAGE_LEN);
}

#[tokio::test]
async fn test_sqlite_full_lifecycle() {
    let (store, _clock) = sqlite_store();
    check_full_lifecycle(&store).await;
}

#[tokio::test]
async fn test_memory_full_lifecycle() {
    let (store, _clock) = memory_store();
    check_full_lifecycle(&store).await;
}

#[tokio::test]
async fn test_sqlite_idempotent_commit() {
    let (store, _clock) = sqlite_store();
    check_idempotent_commit(&store).await;
}

#[tokio::test]
async fn test_memory_idempotent_commit() {
    let (store, _clock) = memory_store();
    check_idempotent_commit(&store).await;
}

#[tokio::test]
async fn test_sqlite_sweeper_threshold() {
    let (store, clock) = sqlite_store();
    check_sweeper_threshold(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_sweeper_threshold() {
    let (store, clock) = memory_store();
    check_sweeper_threshold(&store, &clock).await;
}

#[tokio::test]
async fn test_sqlite_commit_after_reclaim_is_noop() {
    let (store, clock) = sqlite_store();
    check_commit_after_reclaim_is_noop(&store, &clock).await;
}

#[tokio::test]
async fn test_memory_commit_after_reclaim_is_noop() {
    let (store, clock) = memory_store();
    check_commit_after_reclaim_is_noop(&store, &clock).await;
}

#[tokio::test]
async fn test_sqlite_requeue_failed() {
    let (store, _clock) = sqlite_store();
    check_requeue_failed(&store).await;
}

#[tokio::test]
async fn test_memory_requeue_failed() {
    let (store, _clock) = memory_store();
    check_requeue_failed(&store).await;
}

#[tokio::test]
async fn test_sqlite_error_truncation() {
    let (store, _clock) = sqlite_store();
    check_error_truncation(&store).await;
}

#[tokio::test]
async fn test_memory_error_truncation() {
    let (store, _clock) = memory_store();
    check_error_truncation(&store).await;
}

#[tokio::test]
async fn test_sqlite_fetch_pending_skips_claimed() {
    let (store, clock) = sqlite_store();
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(store.enqueue(&format!("doc-{}", i)).await.unwrap());
        clock.advance(ChronoDuration::seconds(1));
    }
    assert!(store.claim(ids[0]).await.unwrap());

    let batch = store.fetch_pending(3).await.unwrap();
    let fetched: Vec<_> = batch.iter().map(|t| t.id).collect();
    assert_eq!(fetched, ids[1..4].to_vec());

    // Fetching does not mutate anything
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.pending, 4);
    assert_eq!(stats.processing, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_claim_race_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let seed = SqliteTaskStore::new(&path).unwrap();
    let mut ids = Vec::new();
    for i in 0..20 {
        ids.push(seed.enqueue(&format!("doc-{}", i)).await.unwrap());
    }

    // Each handle has its own connection, like separate worker processes
    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = Arc::new(SqliteTaskStore::new(&path).unwrap());
        let ids = ids.clone();
        handles.push(tokio::spawn(async move {
            let mut won = Vec::new();
            for id in ids {
                if store.claim(id).await.unwrap() {
                    won.push(id);
                }
            }
            won
        }));
    }

    let mut all_won = Vec::new();
    for handle in handles {
        all_won.extend(handle.await.unwrap());
    }

    all_won.sort();
    let before = all_won.len();
    all_won.dedup();
    assert_eq!(before, all_won.len(), "a task was claimed twice");
    assert_eq!(all_won.len(), ids.len(), "every task is claimed exactly once");
}

#[tokio::test]
async fn test_store_unavailable_error_variant() {
    let (store, _clock) = memory_store();
    store.set_unavailable(true);
    let err = store.claim(sluice_domain::TaskId::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_sqlite_claim_waits_for_foreign_lock_without_stalling_runtime() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    let store = SqliteTaskStore::new(&path).unwrap();
    let id = store.enqueue("doc-1").await.unwrap();

    // Another process holds the write lock briefly
    let locker = rusqlite::Connection::open(&path).unwrap();
    locker.execute_batch("BEGIN IMMEDIATE").unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        locker.execute_batch("COMMIT").unwrap();
    });

    let started = std::time::Instant::now();
    assert!(store.claim(id).await.unwrap());
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "claim waited {:?}",
        started.elapsed()
    );

    release.await.unwrap();
    let task = store.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Processing);
}
