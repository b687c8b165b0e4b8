//! Error types for the REST layer.
//!
//! Storage, patch and search errors convert into [`RestError`], which renders
//! as an OperationOutcome with the matching HTTP status:
//!
//! | Error | HTTP Status | Issue Code |
//! |-------|-------------|------------|
//! | Malformed patch / bad search value | 400 | invalid |
//! | NotFound / VersionNotFound | 404 | not-found |
//! | VersionConflict / AlreadyExists | 409 | conflict |
//! | Gone | 410 | deleted |
//! | If-Match failure | 412 | conflict |
//! | Unsupported Content-Type | 415 | not-supported |
//! | Patch cannot be applied | 422 | processing |
//! | Backend failure | 500 | exception |

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;
use tessera_persistence::error::{
    BackendError, ConcurrencyError, ResourceError, SearchError, StorageError,
};
use tessera_persistence::patch::{PatchError, PatchErrorKind};
use tracing::error;

use crate::responses::operation_outcome::{
    Issue, IssueType, OperationOutcome, error_outcome, not_found_outcome,
};

/// The primary error type for REST operations.
#[derive(Debug)]
pub enum RestError {
    /// Resource not found (HTTP 404).
    NotFound {
        /// The resource type.
        resource_type: String,
        /// The resource ID.
        id: String,
    },

    /// Resource was deleted (HTTP 410 Gone).
    Gone {
        /// The resource type.
        resource_type: String,
        /// The resource ID.
        id: String,
    },

    /// Version not found for vread (HTTP 404).
    VersionNotFound {
        /// The resource type.
        resource_type: String,
        /// The resource ID.
        id: String,
        /// The version ID as requested.
        version_id: String,
    },

    /// Version conflict during update (HTTP 409).
    VersionConflict {
        /// The resource type.
        resource_type: String,
        /// The resource ID.
        id: String,
        /// Message describing the conflict.
        message: String,
    },

    /// If-Match precondition failed (HTTP 412).
    PreconditionFailed {
        /// Message describing why the precondition failed.
        message: String,
    },

    /// Bad request (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Unsupported media type (HTTP 415).
    UnsupportedMediaType {
        /// The unsupported content type.
        content_type: String,
    },

    /// Patch is well formed but cannot be applied (HTTP 422).
    UnprocessableEntity {
        /// Error message.
        message: String,
        /// JSON Pointer of the failing operation's target, when known.
        path: Option<String>,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::NotFound { resource_type, id } => {
                write!(f, "Resource not found: {}/{}", resource_type, id)
            }
            RestError::Gone { resource_type, id } => {
                write!(f, "Resource deleted: {}/{}", resource_type, id)
            }
            RestError::VersionNotFound {
                resource_type,
                id,
                version_id,
            } => {
                write!(
                    f,
                    "Version not found: {}/{}/_history/{}",
                    resource_type, id, version_id
                )
            }
            RestError::VersionConflict { message, .. } => {
                write!(f, "Version conflict: {}", message)
            }
            RestError::PreconditionFailed { message } => {
                write!(f, "Precondition failed: {}", message)
            }
            RestError::BadRequest { message } => {
                write!(f, "Bad request: {}", message)
            }
            RestError::UnsupportedMediaType { content_type } => {
                write!(f, "Unsupported media type: {}", content_type)
            }
            RestError::UnprocessableEntity { message, .. } => {
                write!(f, "Unprocessable entity: {}", message)
            }
            RestError::InternalError { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::NotFound { .. } | RestError::VersionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            RestError::Gone { .. } => StatusCode::GONE,
            RestError::VersionConflict { .. } => StatusCode::CONFLICT,
            RestError::PreconditionFailed { .. } => StatusCode::PRECONDITION_FAILED,
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            RestError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the OperationOutcome issue code for this error.
    pub fn issue_type(&self) -> IssueType {
        match self {
            RestError::NotFound { .. } | RestError::VersionNotFound { .. } => IssueType::NotFound,
            RestError::Gone { .. } => IssueType::Deleted,
            RestError::VersionConflict { .. } | RestError::PreconditionFailed { .. } => {
                IssueType::Conflict
            }
            RestError::BadRequest { .. } => IssueType::Invalid,
            RestError::UnsupportedMediaType { .. } => IssueType::NotSupported,
            RestError::UnprocessableEntity { .. } => IssueType::Processing,
            RestError::InternalError { .. } => IssueType::Exception,
        }
    }

    /// Renders this error as an OperationOutcome document.
    pub fn to_operation_outcome(&self) -> serde_json::Value {
        let diagnostics = match self {
            RestError::NotFound { resource_type, id } => {
                return not_found_outcome(resource_type, id);
            }
            RestError::UnprocessableEntity {
                message,
                path: None,
            } => return error_outcome(message),
            RestError::Gone { resource_type, id } => {
                format!("Resource {}/{} has been deleted", resource_type, id)
            }
            RestError::VersionNotFound {
                resource_type,
                id,
                version_id,
            } => format!(
                "Version {} of {}/{} not found",
                version_id, resource_type, id
            ),
            RestError::UnsupportedMediaType { content_type } => {
                format!("Content type '{}' is not supported", content_type)
            }
            RestError::VersionConflict { message, .. }
            | RestError::PreconditionFailed { message }
            | RestError::BadRequest { message }
            | RestError::UnprocessableEntity { message, .. }
            | RestError::InternalError { message } => message.clone(),
        };

        let mut issue = Issue::error(self.issue_type(), diagnostics);
        if let RestError::UnprocessableEntity {
            path: Some(path), ..
        } = self
        {
            issue = issue.at(path.clone());
        }

        OperationOutcome::new().with_issue(issue).to_json()
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(self.to_operation_outcome())).into_response()
    }
}

// Conversions from persistence errors

impl From<StorageError> for RestError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Resource(e) => e.into(),
            StorageError::Concurrency(e) => e.into(),
            StorageError::Search(e) => e.into(),
            StorageError::Backend(e) => e.into(),
        }
    }
}

impl From<ResourceError> for RestError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::NotFound { resource_type, id } => {
                RestError::NotFound { resource_type, id }
            }
            ResourceError::AlreadyExists { resource_type, id } => RestError::VersionConflict {
                message: format!("Resource {}/{} already exists", resource_type, id),
                resource_type,
                id,
            },
            ResourceError::Gone {
                resource_type, id, ..
            } => RestError::Gone { resource_type, id },
            ResourceError::VersionNotFound {
                resource_type,
                id,
                version_id,
            } => RestError::VersionNotFound {
                resource_type,
                id,
                version_id: version_id.to_string(),
            },
        }
    }
}

impl From<ConcurrencyError> for RestError {
    fn from(err: ConcurrencyError) -> Self {
        match err {
            ConcurrencyError::VersionConflict {
                resource_type,
                id,
                expected_version,
                actual_version,
            } => RestError::VersionConflict {
                resource_type,
                id,
                message: format!(
                    "Expected version {}, but found {}",
                    expected_version, actual_version
                ),
            },
        }
    }
}

impl From<SearchError> for RestError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::InvalidParameter { .. } => RestError::BadRequest {
                message: err.to_string(),
            },
            // Identifiers come from server configuration, not the request.
            SearchError::InvalidIdentifier { .. } => RestError::InternalError {
                message: err.to_string(),
            },
        }
    }
}

impl From<BackendError> for RestError {
    fn from(err: BackendError) -> Self {
        RestError::InternalError {
            message: err.to_string(),
        }
    }
}

impl From<PatchError> for RestError {
    fn from(err: PatchError) -> Self {
        match err.kind() {
            PatchErrorKind::Malformed => RestError::BadRequest {
                message: err.to_string(),
            },
            PatchErrorKind::Unprocessable => RestError::UnprocessableEntity {
                path: patch_error_path(&err),
                message: err.to_string(),
            },
        }
    }
}

fn patch_error_path(err: &PatchError) -> Option<String> {
    match err {
        PatchError::Malformed { .. } => None,
        PatchError::PathNotFound { path, .. }
        | PatchError::InvalidIndex { path, .. }
        | PatchError::InvalidTarget { path, .. }
        | PatchError::MoveIntoDescendant { path, .. }
        | PatchError::TestFailed { path, .. } => Some(path.clone()),
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::BadRequest {
            message: format!("Invalid JSON: {}", err),
        }
    }
}

/// Result type alias for REST operations.
pub type RestResult<T> = Result<T, RestError>;
