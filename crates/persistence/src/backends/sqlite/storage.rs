//! VersionTracker implementation for SQLite.
//!
//! Every mutation runs inside an IMMEDIATE transaction, which takes the
//! database write lock before the head row is read. The head row is then
//! advanced with a conditional `UPDATE ... WHERE version_id = ?expected`;
//! zero affected rows means another writer got there first.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{OptionalExtension, Transaction, TransactionBehavior, params};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{RecreatePolicy, VersionTracker, check_version_match};
use crate::error::{BackendError, ConcurrencyError, ResourceError, StorageError, StorageResult};
use crate::types::{Document, VersionAction, VersionEntry};

use super::SqliteBackend;

fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| internal_error(format!("Failed to parse timestamp {:?}: {}", s, e)))
}

fn to_db_version(version_id: u64) -> StorageResult<i64> {
    i64::try_from(version_id)
        .map_err(|_| internal_error(format!("version id {} out of range", version_id)))
}

fn from_db_version(version_id: i64) -> StorageResult<u64> {
    u64::try_from(version_id)
        .map_err(|_| internal_error(format!("stored version id {} is negative", version_id)))
}

/// The head row of one key.
struct Head {
    version_id: u64,
    action: VersionAction,
    last_updated: DateTime<Utc>,
}

/// A raw `resource_versions` row.
struct VersionRow {
    resource_type: String,
    resource_id: String,
    version_id: i64,
    action: String,
    snapshot: String,
    recorded_at: String,
}

impl VersionRow {
    const COLUMNS: &'static str =
        "resource_type, resource_id, version_id, action, snapshot, recorded_at";

    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            resource_type: row.get(0)?,
            resource_id: row.get(1)?,
            version_id: row.get(2)?,
            action: row.get(3)?,
            snapshot: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }

    fn into_entry(self) -> StorageResult<VersionEntry> {
        let snapshot: Value = serde_json::from_str(&self.snapshot)
            .map_err(|e| serialization_error(format!("Failed to deserialize snapshot: {}", e)))?;
        let action = self.action.parse::<VersionAction>().map_err(internal_error)?;
        Ok(VersionEntry {
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            version_id: from_db_version(self.version_id)?,
            snapshot,
            action,
            timestamp: parse_timestamp(&self.recorded_at)?,
        })
    }
}

fn read_head(tx: &Transaction<'_>, resource_type: &str, id: &str) -> StorageResult<Option<Head>> {
    let row = tx
        .query_row(
            "SELECT version_id, action, last_updated FROM resource_heads
             WHERE resource_type = ?1 AND resource_id = ?2",
            params![resource_type, id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()
        .map_err(|e| internal_error(format!("Failed to read head: {}", e)))?;

    row.map(|(version_id, action, last_updated)| -> StorageResult<Head> {
        Ok(Head {
            version_id: from_db_version(version_id)?,
            action: action.parse::<VersionAction>().map_err(internal_error)?,
            last_updated: parse_timestamp(&last_updated)?,
        })
    })
    .transpose()
}

fn read_snapshot(
    tx: &Transaction<'_>,
    resource_type: &str,
    id: &str,
    version_id: u64,
) -> StorageResult<Value> {
    let snapshot: String = tx
        .query_row(
            "SELECT snapshot FROM resource_versions
             WHERE resource_type = ?1 AND resource_id = ?2 AND version_id = ?3",
            params![resource_type, id, to_db_version(version_id)?],
            |row| row.get(0),
        )
        .map_err(|e| internal_error(format!("Failed to read snapshot: {}", e)))?;
    serde_json::from_str(&snapshot)
        .map_err(|e| serialization_error(format!("Failed to deserialize snapshot: {}", e)))
}

fn insert_version(tx: &Transaction<'_>, entry: &VersionEntry) -> StorageResult<()> {
    let snapshot = serde_json::to_string(&entry.snapshot)
        .map_err(|e| serialization_error(format!("Failed to serialize snapshot: {}", e)))?;
    tx.execute(
        "INSERT INTO resource_versions
         (resource_type, resource_id, version_id, action, snapshot, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            entry.resource_type,
            entry.resource_id,
            to_db_version(entry.version_id)?,
            entry.action.as_str(),
            snapshot,
            format_timestamp(&entry.timestamp),
        ],
    )
    .map_err(|e| internal_error(format!("Failed to insert version: {}", e)))?;
    Ok(())
}

/// Advances the head from `expected` to the entry's version.
///
/// Returns false if the head no longer holds `expected`.
fn advance_head(tx: &Transaction<'_>, entry: &VersionEntry, expected: u64) -> StorageResult<bool> {
    let changed = tx
        .execute(
            "UPDATE resource_heads SET version_id = ?1, action = ?2, last_updated = ?3
             WHERE resource_type = ?4 AND resource_id = ?5 AND version_id = ?6",
            params![
                to_db_version(entry.version_id)?,
                entry.action.as_str(),
                format_timestamp(&entry.timestamp),
                entry.resource_type,
                entry.resource_id,
                to_db_version(expected)?,
            ],
        )
        .map_err(|e| internal_error(format!("Failed to update head: {}", e)))?;
    Ok(changed == 1)
}

impl SqliteBackend {
    /// Appends an update or delete after checking the expected version.
    fn append(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        action: VersionAction,
        snapshot: Option<Document>,
    ) -> StorageResult<VersionEntry> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let head = read_head(&tx, resource_type, id)?.ok_or_else(|| {
            StorageError::Resource(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })?;

        if head.action == VersionAction::Delete {
            return Err(StorageError::Resource(ResourceError::Gone {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                deleted_at: Some(head.last_updated),
            }));
        }

        if let Err(e) = check_version_match(resource_type, id, expected_version, head.version_id)
        {
            warn!(
                resource_type,
                id,
                expected_version,
                actual_version = head.version_id,
                "Version conflict"
            );
            return Err(e);
        }

        // Tombstones carry the last live snapshot.
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => read_snapshot(&tx, resource_type, id, head.version_id)?,
        };

        let entry = VersionEntry {
            resource_type: resource_type.to_string(),
            resource_id: id.to_string(),
            version_id: head.version_id + 1,
            snapshot,
            action,
            timestamp: Utc::now().trunc_subsecs(6),
        };

        if !advance_head(&tx, &entry, head.version_id)? {
            let actual_version = read_head(&tx, resource_type, id)?
                .map(|h| h.version_id)
                .unwrap_or(0);
            warn!(resource_type, id, expected_version, actual_version, "Version conflict");
            return Err(StorageError::Concurrency(ConcurrencyError::VersionConflict {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                expected_version,
                actual_version,
            }));
        }
        insert_version(&tx, &entry)?;
        tx.commit()?;

        debug!(
            resource_type,
            id,
            version_id = entry.version_id,
            action = %entry.action,
            "Recorded version"
        );
        Ok(entry)
    }
}

#[async_trait]
impl VersionTracker for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        snapshot: Document,
    ) -> StorageResult<VersionEntry> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let head = read_head(&tx, resource_type, id)?;
        let version_id = match &head {
            None => 1,
            Some(h)
                if h.action == VersionAction::Delete
                    && self.config().recreate_policy == RecreatePolicy::Resume =>
            {
                h.version_id + 1
            }
            Some(_) => {
                return Err(StorageError::Resource(ResourceError::AlreadyExists {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                }));
            }
        };

        let entry = VersionEntry {
            resource_type: resource_type.to_string(),
            resource_id: id.to_string(),
            version_id,
            snapshot,
            action: VersionAction::Create,
            timestamp: Utc::now().trunc_subsecs(6),
        };

        match &head {
            None => {
                tx.execute(
                    "INSERT INTO resource_heads
                     (resource_type, resource_id, version_id, action, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        entry.resource_type,
                        entry.resource_id,
                        to_db_version(entry.version_id)?,
                        entry.action.as_str(),
                        format_timestamp(&entry.timestamp),
                    ],
                )
                .map_err(|e| internal_error(format!("Failed to insert head: {}", e)))?;
            }
            Some(h) => {
                if !advance_head(&tx, &entry, h.version_id)? {
                    return Err(StorageError::Resource(ResourceError::AlreadyExists {
                        resource_type: resource_type.to_string(),
                        id: id.to_string(),
                    }));
                }
            }
        }
        insert_version(&tx, &entry)?;
        tx.commit()?;

        debug!(
            resource_type,
            id,
            version_id = entry.version_id,
            "Recorded create"
        );
        Ok(entry)
    }

    async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        snapshot: Document,
    ) -> StorageResult<VersionEntry> {
        self.append(
            resource_type,
            id,
            expected_version,
            VersionAction::Update,
            Some(snapshot),
        )
    }

    async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> StorageResult<VersionEntry> {
        self.append(resource_type, id, expected_version, VersionAction::Delete, None)
    }

    async fn get_history(
        &self,
        resource_type: &str,
        id: &str,
    ) -> StorageResult<Vec<VersionEntry>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM resource_versions
                 WHERE resource_type = ?1 AND resource_id = ?2
                 ORDER BY version_id ASC",
                VersionRow::COLUMNS
            ))
            .map_err(|e| internal_error(format!("Failed to prepare history query: {}", e)))?;

        let rows = stmt
            .query_map(params![resource_type, id], VersionRow::from_row)
            .map_err(|e| internal_error(format!("Failed to query history: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            let row = row.map_err(|e| internal_error(format!("Failed to read history row: {}", e)))?;
            entries.push(row.into_entry()?);
        }

        if entries.is_empty() {
            return Err(StorageError::Resource(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }));
        }
        Ok(entries)
    }

    async fn get_version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> StorageResult<VersionEntry> {
        let not_found = || {
            StorageError::Resource(ResourceError::VersionNotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                version_id,
            })
        };
        let Ok(db_version) = i64::try_from(version_id) else {
            return Err(not_found());
        };

        let conn = self.get_connection()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM resource_versions
                     WHERE resource_type = ?1 AND resource_id = ?2 AND version_id = ?3",
                    VersionRow::COLUMNS
                ),
                params![resource_type, id, db_version],
                VersionRow::from_row,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read version: {}", e)))?;

        row.ok_or_else(not_found)?.into_entry()
    }

    async fn current(&self, resource_type: &str, id: &str) -> StorageResult<Option<VersionEntry>> {
        let conn = self.get_connection()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM resource_versions
                     WHERE resource_type = ?1 AND resource_id = ?2
                     ORDER BY version_id DESC LIMIT 1",
                    VersionRow::COLUMNS
                ),
                params![resource_type, id],
                VersionRow::from_row,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read current version: {}", e)))?;

        row.map(VersionRow::into_entry).transpose()
    }

    async fn history_count(&self, resource_type: &str, id: &str) -> StorageResult<u64> {
        let conn = self.get_connection()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM resource_versions
                 WHERE resource_type = ?1 AND resource_id = ?2",
                params![resource_type, id],
                |row| row.get(0),
            )
            .map_err(|e| internal_error(format!("Failed to count history: {}", e)))?;
        from_db_version(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::sqlite::SqliteBackendConfig;
    use serde_json::json;

    fn create_test_backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend
    }

    #[tokio::test]
    async fn test_create_starts_at_one() {
        let backend = create_test_backend();
        let entry = backend
            .record_create("Specimen", "s1", json!({"status": "available"}))
            .await
            .unwrap();

        assert_eq!(entry.version_id, 1);
        assert_eq!(entry.action, VersionAction::Create);

        let stored = backend.get_version("Specimen", "s1", 1).await.unwrap();
        assert_eq!(stored, entry);
    }

    #[tokio::test]
    async fn test_create_twice_fails() {
        let backend = create_test_backend();
        backend.record_create("Specimen", "s1", json!({})).await.unwrap();
        let err = backend
            .record_create("Specimen", "s1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::AlreadyExists { .. })
        ));
        assert_eq!(backend.history_count("Specimen", "s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_same_id_different_types_are_independent() {
        let backend = create_test_backend();
        backend.record_create("Specimen", "x", json!({})).await.unwrap();
        let other = backend.record_create("Account", "x", json!({})).await.unwrap();
        assert_eq!(other.version_id, 1);
    }

    #[tokio::test]
    async fn test_update_appends_next_version() {
        let backend = create_test_backend();
        backend
            .record_create("Account", "a1", json!({"status": "active"}))
            .await
            .unwrap();
        let v2 = backend
            .record_update("Account", "a1", 1, json!({"status": "inactive"}))
            .await
            .unwrap();

        assert_eq!(v2.version_id, 2);
        assert_eq!(v2.action, VersionAction::Update);
        assert_eq!(v2.snapshot, json!({"status": "inactive"}));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_appends_nothing() {
        let backend = create_test_backend();
        backend.record_create("Account", "a1", json!({})).await.unwrap();
        backend.record_update("Account", "a1", 1, json!({"n": 1})).await.unwrap();

        let err = backend
            .record_update("Account", "a1", 1, json!({"n": 2}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Concurrency(ConcurrencyError::VersionConflict {
                expected_version: 1,
                actual_version: 2,
                ..
            })
        ));
        assert_eq!(backend.history_count("Account", "a1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let backend = create_test_backend();
        let err = backend
            .record_update("Account", "nope", 1, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Resource(ResourceError::NotFound { .. })));

        let err = backend.record_delete("Account", "nope", 1).await.unwrap_err();
        assert!(matches!(err, StorageError::Resource(ResourceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_keeps_last_snapshot() {
        let backend = create_test_backend();
        backend
            .record_create("Contract", "c1", json!({"status": "draft"}))
            .await
            .unwrap();
        let tombstone = backend.record_delete("Contract", "c1", 1).await.unwrap();

        assert_eq!(tombstone.version_id, 2);
        assert!(tombstone.is_deleted());
        assert_eq!(tombstone.snapshot, json!({"status": "draft"}));

        let current = backend.current("Contract", "c1").await.unwrap().unwrap();
        assert!(current.is_deleted());
    }

    #[tokio::test]
    async fn test_mutations_after_delete_are_gone() {
        let backend = create_test_backend();
        backend.record_create("Contract", "c1", json!({})).await.unwrap();
        backend.record_delete("Contract", "c1", 1).await.unwrap();

        let err = backend
            .record_update("Contract", "c1", 2, json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Resource(ResourceError::Gone { .. })));

        let err = backend.read_live("Contract", "c1").await.unwrap_err();
        assert!(matches!(err, StorageError::Resource(ResourceError::Gone { .. })));
    }

    #[tokio::test]
    async fn test_recreate_rejected_by_default() {
        let backend = create_test_backend();
        backend.record_create("Contract", "c1", json!({})).await.unwrap();
        backend.record_delete("Contract", "c1", 1).await.unwrap();

        let err = backend
            .record_create("Contract", "c1", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_recreate_resumes_numbering() {
        let config = SqliteBackendConfig {
            recreate_policy: RecreatePolicy::Resume,
            ..Default::default()
        };
        let backend = SqliteBackend::with_config(":memory:", config).unwrap();
        backend.init_schema().unwrap();

        backend.record_create("Contract", "c1", json!({"v": 1})).await.unwrap();
        backend.record_delete("Contract", "c1", 1).await.unwrap();
        let again = backend
            .record_create("Contract", "c1", json!({"v": 3}))
            .await
            .unwrap();

        assert_eq!(again.version_id, 3);
        assert_eq!(again.action, VersionAction::Create);

        let ids: Vec<u64> = backend
            .get_history("Contract", "c1")
            .await
            .unwrap()
            .iter()
            .map(|e| e.version_id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_history_and_versions() {
        let backend = create_test_backend();
        assert!(matches!(
            backend.get_history("Account", "a1").await.unwrap_err(),
            StorageError::Resource(ResourceError::NotFound { .. })
        ));
        assert!(backend.current("Account", "a1").await.unwrap().is_none());
        assert_eq!(backend.history_count("Account", "a1").await.unwrap(), 0);

        backend.record_create("Account", "a1", json!({"n": 1})).await.unwrap();
        backend.record_update("Account", "a1", 1, json!({"n": 2})).await.unwrap();

        let history = backend.get_history("Account", "a1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].snapshot, json!({"n": 1}));
        assert_eq!(history[1].snapshot, json!({"n": 2}));

        let err = backend.get_version("Account", "a1", 3).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::VersionNotFound { version_id: 3, .. })
        ));
        let err = backend.get_version("Account", "a1", u64::MAX).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Resource(ResourceError::VersionNotFound { .. })
        ));
    }
}
