//! Patch interaction.
//!
//! `PATCH [base]/[type]/[id]`, with the patch format chosen by Content-Type:
//! - JSON Patch (RFC 6902) - `application/json-patch+json`
//! - JSON Merge Patch (RFC 7396) - `application/merge-patch+json`

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tessera_persistence::VersionEntry;
use tessera_persistence::core::{VersionTracker, etag_version};
use tessera_persistence::patch::PatchFormat;
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::responses::VersionHeaders;
use crate::state::AppState;

/// Selects the patch engine from a Content-Type header value.
///
/// Media type parameters such as `charset` are ignored.
pub fn patch_format_from_content_type(content_type: &str) -> RestResult<PatchFormat> {
    let unsupported = || RestError::UnsupportedMediaType {
        content_type: content_type.to_string(),
    };
    let mime: mime::Mime = content_type.parse().map_err(|_| unsupported())?;
    PatchFormat::from_media_type(mime.essence_str()).ok_or_else(unsupported)
}

/// Selects the patch engine from request headers.
///
/// # Errors
///
/// [`RestError::UnsupportedMediaType`] when Content-Type is missing or is
/// not one of the two patch media types.
pub fn patch_format(headers: &HeaderMap) -> RestResult<PatchFormat> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RestError::UnsupportedMediaType {
            content_type: "(none)".to_string(),
        })?;
    patch_format_from_content_type(content_type)
}

/// Checks an `If-Match` header against the current version.
///
/// `*` matches any version; otherwise one of the listed ETags must name
/// `version_id`. No header means no precondition.
pub fn check_if_match(headers: &HeaderMap, version_id: u64) -> RestResult<()> {
    let Some(value) = headers.get(header::IF_MATCH) else {
        return Ok(());
    };
    let value = value.to_str().map_err(|_| RestError::PreconditionFailed {
        message: "If-Match header is not valid ASCII".to_string(),
    })?;

    let matches = value
        .split(',')
        .map(str::trim)
        .any(|tag| tag == "*" || etag_version(tag) == Some(version_id));
    if matches {
        Ok(())
    } else {
        Err(RestError::PreconditionFailed {
            message: format!(
                "ETag mismatch: If-Match {}, current W/\"{}\"",
                value, version_id
            ),
        })
    }
}

/// Rejects patches that change `resourceType` or `id`, or that leave
/// something other than an object.
fn check_identity(original: &Value, patched: &Value) -> RestResult<()> {
    if !patched.is_object() {
        return Err(RestError::UnprocessableEntity {
            message: "Patched document must be a JSON object".to_string(),
            path: None,
        });
    }
    for field in ["resourceType", "id"] {
        if let Some(before) = original.get(field) {
            if patched.get(field) != Some(before) {
                return Err(RestError::BadRequest {
                    message: format!("Cannot change {} via patch", field),
                });
            }
        }
    }
    Ok(())
}

/// Applies a patch request to the current version and records the result.
///
/// Steps, each with its failure status:
/// 1. select the engine from Content-Type (415)
/// 2. read the live version (404, 410)
/// 3. honour If-Match (412)
/// 4. parse (400) and apply (422) the patch
/// 5. keep `resourceType` and `id` (400)
/// 6. record the update against the version read in step 2 (409)
pub async fn patch_resource<T>(
    tracker: &T,
    resource_type: &str,
    id: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> RestResult<VersionEntry>
where
    T: VersionTracker + ?Sized,
{
    let format = patch_format(headers)?;
    let current = tracker.read_live(resource_type, id).await?;
    check_if_match(headers, current.version_id)?;

    let patched = format.apply(&current.snapshot, body)?;
    check_identity(&current.snapshot, &patched)?;

    debug!(
        resource_type,
        id,
        format = format.media_type(),
        base_version = current.version_id,
        "Applied patch"
    );

    let entry = tracker
        .record_update(resource_type, id, current.version_id, patched)
        .await?;
    Ok(entry)
}

/// Handler for the patch interaction.
///
/// # Response
///
/// - `200 OK` - patched document with ETag and Last-Modified
/// - `400 Bad Request` - malformed patch, or `resourceType`/`id` changed
/// - `404 Not Found` - resource does not exist
/// - `409 Conflict` - a concurrent writer recorded a newer version
/// - `410 Gone` - resource was deleted
/// - `412 Precondition Failed` - If-Match does not name the current version
/// - `415 Unsupported Media Type` - unknown patch format
/// - `422 Unprocessable Entity` - patch cannot be applied to this document
pub async fn patch_handler<B>(
    State(state): State<AppState<B>>,
    Path((resource_type, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<Response>
where
    B: VersionTracker + 'static,
{
    let entry = patch_resource(state.backend(), &resource_type, &id, &headers, &body).await?;

    let headers = VersionHeaders::from_entry(&entry)
        .with_location(state.base_url(), &resource_type, &id)
        .to_header_map();
    Ok((StatusCode::OK, headers, Json(entry.snapshot)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(
            patch_format_from_content_type("application/json-patch+json").unwrap(),
            PatchFormat::JsonPatch
        );
        assert_eq!(
            patch_format_from_content_type("application/merge-patch+json; charset=utf-8").unwrap(),
            PatchFormat::MergePatch
        );
        for ct in ["application/json", "text/plain", "not a mime"] {
            let err = patch_format_from_content_type(ct).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        }
        let err = patch_format(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn test_if_match() {
        assert!(check_if_match(&HeaderMap::new(), 3).is_ok());
        assert!(check_if_match(&headers(&[(header::IF_MATCH, "W/\"3\"")]), 3).is_ok());
        assert!(check_if_match(&headers(&[(header::IF_MATCH, "\"3\"")]), 3).is_ok());
        assert!(check_if_match(&headers(&[(header::IF_MATCH, "*")]), 3).is_ok());
        assert!(check_if_match(&headers(&[(header::IF_MATCH, "W/\"1\", W/\"3\"")]), 3).is_ok());

        let err = check_if_match(&headers(&[(header::IF_MATCH, "W/\"2\"")]), 3).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn test_identity_checks() {
        let original = json!({"resourceType": "Account", "id": "a1", "status": "active"});
        assert!(check_identity(&original, &json!({"resourceType": "Account", "id": "a1"})).is_ok());
        assert!(check_identity(&json!({}), &json!({"id": "new"})).is_ok());

        let err = check_identity(&original, &json!({"resourceType": "Basic", "id": "a1"}))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = check_identity(&original, &json!({"resourceType": "Account"})).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = check_identity(&original, &json!([1])).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
