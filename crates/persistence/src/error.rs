//! Error types for the persistence layer.
//!
//! Errors are grouped by category so callers can select an HTTP status by
//! matching on the variant instead of inspecting messages:
//!
//! - [`ResourceError`] - the addressed resource or version is missing, deleted or duplicated
//! - [`ConcurrencyError`] - optimistic concurrency (compare-and-swap) failures
//! - [`SearchError`] - the search configuration or a parameter value is unusable
//! - [`BackendError`] - infrastructure failures, propagated unchanged

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Resource state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Concurrency and versioning errors
    #[error(transparent)]
    Concurrency(#[from] ConcurrencyError),

    /// Search query construction errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors related to resource state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested resource has no version log.
    #[error("resource not found: {resource_type}/{id}")]
    NotFound { resource_type: String, id: String },

    /// A version log already exists for the given key.
    #[error("resource already exists: {resource_type}/{id}")]
    AlreadyExists { resource_type: String, id: String },

    /// The latest version of the resource is a delete tombstone.
    #[error("resource deleted: {resource_type}/{id}")]
    Gone {
        resource_type: String,
        id: String,
        deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    },

    /// The requested version of the resource was not found.
    #[error("version not found: {resource_type}/{id}/_history/{version_id}")]
    VersionNotFound {
        resource_type: String,
        id: String,
        version_id: u64,
    },
}

/// Errors related to concurrency control.
#[derive(Error, Debug)]
pub enum ConcurrencyError {
    /// The caller's expected version is not the latest one.
    #[error("version conflict on {resource_type}/{id}: expected {expected_version}, found {actual_version}")]
    VersionConflict {
        resource_type: String,
        id: String,
        expected_version: u64,
        actual_version: u64,
    },
}

/// Errors raised while building a search query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    /// A table or column name is not a plain SQL identifier.
    #[error("invalid SQL identifier: {identifier:?}")]
    InvalidIdentifier { identifier: String },

    /// A search parameter value could not be interpreted.
    #[error("invalid search parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for search query construction.
pub type SearchResult<T> = Result<T, SearchError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::ConnectionFailed {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Resource(ResourceError::NotFound {
            resource_type: "ServiceRequest".to_string(),
            id: "123".to_string(),
        });
        assert_eq!(err.to_string(), "resource not found: ServiceRequest/123");
    }

    #[test]
    fn test_concurrency_error_display() {
        let err = ConcurrencyError::VersionConflict {
            resource_type: "Specimen".to_string(),
            id: "s-1".to_string(),
            expected_version: 1,
            actual_version: 2,
        };
        assert_eq!(
            err.to_string(),
            "version conflict on Specimen/s-1: expected 1, found 2"
        );
    }

    #[test]
    fn test_version_not_found_display() {
        let err = ResourceError::VersionNotFound {
            resource_type: "DiagnosticReport".to_string(),
            id: "r1".to_string(),
            version_id: 7,
        };
        assert_eq!(
            err.to_string(),
            "version not found: DiagnosticReport/r1/_history/7"
        );
    }

    #[test]
    fn test_search_error_display() {
        let err = SearchError::InvalidIdentifier {
            identifier: "orders; DROP TABLE x".to_string(),
        };
        assert!(err.to_string().contains("invalid SQL identifier"));
    }

    #[test]
    fn test_storage_error_from_category() {
        let err: StorageError = ConcurrencyError::VersionConflict {
            resource_type: "Account".to_string(),
            id: "a".to_string(),
            expected_version: 3,
            actual_version: 4,
        }
        .into();
        assert!(matches!(err, StorageError::Concurrency(_)));

        let err: StorageError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            StorageError::Backend(BackendError::SerializationError { .. })
        ));
    }
}
