//! Read and version read interactions.
//!
//! - read: `GET [base]/[type]/[id]`
//! - vread: `GET [base]/[type]/[id]/_history/[vid]`

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tessera_persistence::VersionEntry;
use tessera_persistence::core::VersionTracker;

use crate::error::{RestError, RestResult};
use crate::responses::VersionHeaders;
use crate::state::AppState;

fn version_response(entry: VersionEntry) -> Response {
    let headers = VersionHeaders::from_entry(&entry).to_header_map();
    (StatusCode::OK, headers, Json(entry.snapshot)).into_response()
}

/// Reads one version of a resource.
///
/// A version that is a delete tombstone reads as 410 Gone.
pub async fn vread_response<T>(
    tracker: &T,
    resource_type: &str,
    id: &str,
    version_id: &str,
) -> RestResult<Response>
where
    T: VersionTracker + ?Sized,
{
    let not_found = || RestError::VersionNotFound {
        resource_type: resource_type.to_string(),
        id: id.to_string(),
        version_id: version_id.to_string(),
    };
    let vid: u64 = version_id.parse().map_err(|_| not_found())?;

    let entry = tracker.get_version(resource_type, id, vid).await?;
    if entry.is_deleted() {
        return Err(RestError::Gone {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        });
    }
    Ok(version_response(entry))
}

/// Handler for the read interaction.
///
/// # Response
///
/// - `200 OK` - current document with ETag and Last-Modified
/// - `404 Not Found` - resource does not exist
/// - `410 Gone` - resource was deleted
pub async fn read_handler<B>(
    State(state): State<AppState<B>>,
    Path((resource_type, id)): Path<(String, String)>,
) -> RestResult<Response>
where
    B: VersionTracker + 'static,
{
    let entry = state.backend().read_live(&resource_type, &id).await?;
    Ok(version_response(entry))
}

/// Handler for the vread interaction.
///
/// # Response
///
/// - `200 OK` - the requested version
/// - `404 Not Found` - resource or version does not exist
/// - `410 Gone` - the requested version is a delete
pub async fn vread_handler<B>(
    State(state): State<AppState<B>>,
    Path((resource_type, id, version_id)): Path<(String, String, String)>,
) -> RestResult<Response>
where
    B: VersionTracker + 'static,
{
    vread_response(state.backend(), &resource_type, &id, &version_id).await
}
