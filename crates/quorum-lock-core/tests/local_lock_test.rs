// Integration tests for the in-process keyed lock

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quorum_lock_core::{KeyedLock, LocalLockError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_lost_updates_under_contention() {
    const TASKS: u64 = 16;
    const ROUNDS: u64 = 20;

    let locks = Arc::new(KeyedLock::new());
    let counter = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..TASKS {
        let locks = Arc::clone(&locks);
        let counter = Arc::clone(&counter);
        handles.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                locks.lock("counter").await.unwrap();
                let current = counter.load(Ordering::SeqCst);
                tokio::time::sleep(Duration::from_micros(100)).await;
                counter.store(current + 1, Ordering::SeqCst);
                locks.unlock("counter").unwrap();
            }
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), TASKS * ROUNDS);
    assert!(locks.is_empty());
}

#[tokio::test]
async fn test_guards_serialize_per_id() {
    let locks = Arc::new(KeyedLock::new());
    let counter = Arc::new(AtomicU64::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let locks = Arc::clone(&locks);
        let counter = Arc::clone(&counter);
        handles.push(tokio::spawn(async move {
            let _guard = locks.lock_guard("guarded").await.unwrap();
            let current = counter.load(Ordering::SeqCst);
            tokio::task::yield_now().await;
            counter.store(current + 1, Ordering::SeqCst);
        }));
    }

    for result in futures::future::join_all(handles).await {
        result.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 8);
    assert!(!locks.contains("guarded"));
}

#[tokio::test]
async fn test_empty_id() {
    let locks = KeyedLock::new();

    assert_eq!(locks.lock("").await, Err(LocalLockError::EmptyId));
    assert_eq!(locks.unlock(""), Err(LocalLockError::EmptyId));
    assert!(locks.lock_guard("").await.is_err());
    assert_eq!(LocalLockError::EmptyId.to_string(), "lock id cannot be empty");
}

#[tokio::test]
async fn test_unlock_not_found() {
    let locks = KeyedLock::new();
    locks.lock("a").await.unwrap();

    let err = locks.unlock("b").unwrap_err();
    assert_eq!(err, LocalLockError::NotFound("b".to_string()));
    assert_eq!(err.to_string(), "lock id 'b' not found");

    locks.unlock("a").unwrap();
    assert_eq!(
        locks.unlock("a"),
        Err(LocalLockError::NotFound("a".to_string()))
    );
}
