//! Version tracking trait.
//!
//! Every mutation of a resource appends one immutable [`VersionEntry`] to
//! that resource's version log. For a fixed `(resource_type, id)` the log
//! holds versions `1..=N` with no gaps and no duplicates; version 1 is the
//! create.
//!
//! # Optimistic Locking
//!
//! `record_update` and `record_delete` take the version the caller last
//! observed. The check against the latest version and the append are one
//! atomic step: of several concurrent callers holding the same expected
//! version, exactly one succeeds and the others get
//! [`ConcurrencyError::VersionConflict`].

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConcurrencyError, ResourceError, StorageResult};
use crate::types::{Document, VersionEntry};

/// What `record_create` does when the latest entry for the key is a delete
/// tombstone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecreatePolicy {
    /// Fail with [`ResourceError::AlreadyExists`].
    #[default]
    Reject,
    /// Append `N+1` as a create, continuing the existing log.
    Resume,
}

impl fmt::Display for RecreatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecreatePolicy::Reject => write!(f, "reject"),
            RecreatePolicy::Resume => write!(f, "resume"),
        }
    }
}

impl FromStr for RecreatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(RecreatePolicy::Reject),
            "resume" => Ok(RecreatePolicy::Resume),
            _ => Err(format!("unknown recreate policy: {}", s)),
        }
    }
}

/// Append-only version log with compare-and-swap updates.
///
/// # Example
///
/// ```ignore
/// use tessera_persistence::core::VersionTracker;
///
/// async fn sign<T: VersionTracker>(tracker: &T) -> StorageResult<()> {
///     let v1 = tracker
///         .record_create("Contract", "c-1", json!({"status": "draft"}))
///         .await?;
///
///     let v2 = tracker
///         .record_update("Contract", "c-1", v1.version_id, json!({"status": "executed"}))
///         .await?;
///     assert_eq!(v2.version_id, 2);
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait VersionTracker: Send + Sync {
    /// Returns a short name for the backing store, used in logs.
    fn backend_name(&self) -> &'static str;

    /// Appends version 1 for a new key.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(AlreadyExists)` - the key already has a log
    ///   (subject to the backend's [`RecreatePolicy`] when it ends in a
    ///   tombstone)
    async fn record_create(
        &self,
        resource_type: &str,
        id: &str,
        snapshot: Document,
    ) -> StorageResult<VersionEntry>;

    /// Appends `latest + 1` if `latest == expected_version`.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - the key has no log
    /// * `StorageError::Resource(Gone)` - the latest entry is a tombstone
    /// * `StorageError::Concurrency(VersionConflict)` - the latest version
    ///   differs; nothing is appended
    async fn record_update(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
        snapshot: Document,
    ) -> StorageResult<VersionEntry>;

    /// Appends a delete tombstone carrying the last live snapshot.
    ///
    /// Same errors as [`record_update`](Self::record_update).
    async fn record_delete(
        &self,
        resource_type: &str,
        id: &str,
        expected_version: u64,
    ) -> StorageResult<VersionEntry>;

    /// Returns every entry for the key, ascending by version.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - the key has no log
    async fn get_history(&self, resource_type: &str, id: &str)
    -> StorageResult<Vec<VersionEntry>>;

    /// Returns one specific version.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(VersionNotFound)` - no such version
    async fn get_version(
        &self,
        resource_type: &str,
        id: &str,
        version_id: u64,
    ) -> StorageResult<VersionEntry>;

    /// Returns the latest entry, tombstones included.
    async fn current(&self, resource_type: &str, id: &str) -> StorageResult<Option<VersionEntry>>;

    /// Returns the number of entries in the key's log (0 when absent).
    async fn history_count(&self, resource_type: &str, id: &str) -> StorageResult<u64> {
        Ok(self
            .current(resource_type, id)
            .await?
            .map(|entry| entry.version_id)
            .unwrap_or(0))
    }

    /// Returns the latest entry if the resource is live.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - the key has no log
    /// * `StorageError::Resource(Gone)` - the latest entry is a tombstone
    async fn read_live(&self, resource_type: &str, id: &str) -> StorageResult<VersionEntry> {
        match self.current(resource_type, id).await? {
            None => Err(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            }
            .into()),
            Some(entry) if entry.is_deleted() => Err(ResourceError::Gone {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                deleted_at: Some(entry.timestamp),
            }
            .into()),
            Some(entry) => Ok(entry),
        }
    }
}

/// Returns a conflict error unless `expected == actual`.
pub fn check_version_match(
    resource_type: &str,
    id: &str,
    expected: u64,
    actual: u64,
) -> StorageResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ConcurrencyError::VersionConflict {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
            expected_version: expected,
            actual_version: actual,
        }
        .into())
    }
}

/// Strips weak-validator and quote decoration from an ETag.
///
/// ETags may be formatted as `W/"1"`, `"1"`, or just `1`.
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim()
        .trim_start_matches("W/")
        .trim_start_matches('"')
        .trim_end_matches('"')
}

/// Extracts the version number from an ETag, if it carries one.
pub fn etag_version(etag: &str) -> Option<u64> {
    normalize_etag(etag).parse().ok()
}
