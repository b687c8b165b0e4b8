//! Compare-and-swap behaviour under concurrent writers.

use std::sync::Arc;

use serde_json::json;

use tessera_persistence::backends::sqlite::SqliteBackend;
use tessera_persistence::core::VersionTracker;
use tessera_persistence::error::{ConcurrencyError, StorageError};

const WRITERS: usize = 16;

fn file_backend(dir: &tempfile::TempDir) -> Arc<SqliteBackend> {
    let backend = SqliteBackend::open(dir.path().join("concurrency.db"))
        .expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    Arc::new(backend)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_updates_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let backend = file_backend(&dir);
    backend
        .record_create("Account", "shared", json!({"balance": 0}))
        .await
        .unwrap();

    let mut handles = Vec::with_capacity(WRITERS);
    for writer in 0..WRITERS {
        let backend = Arc::clone(&backend);
        handles.push(tokio::spawn(async move {
            backend
                .record_update("Account", "shared", 1, json!({"balance": writer}))
                .await
        }));
    }

    let mut winners = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(entry) => {
                assert_eq!(entry.version_id, 2);
                winners += 1;
            }
            Err(StorageError::Concurrency(ConcurrencyError::VersionConflict {
                expected_version,
                actual_version,
                ..
            })) => {
                assert_eq!(expected_version, 1);
                assert_eq!(actual_version, 2);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(conflicts, WRITERS - 1);

    let history = backend.get_history("Account", "shared").await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_deletes_one_tombstone() {
    let dir = tempfile::tempdir().unwrap();
    let backend = file_backend(&dir);
    backend.record_create("Account", "doomed", json!({})).await.unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.record_delete("Account", "doomed", 1).await })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(backend.history_count("Account", "doomed").await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_creates_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let backend = file_backend(&dir);

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                backend
                    .record_create("Specimen", "race", json!({"by": i}))
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(backend.history_count("Specimen", "race").await.unwrap(), 1);
}
