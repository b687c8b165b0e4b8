//! Document patching.
//!
//! Two patch formats are supported, selected by request media type:
//!
//! | Media type | Format | Engine |
//! |------------|--------|--------|
//! | `application/json-patch+json` | [RFC 6902](https://www.rfc-editor.org/rfc/rfc6902) | [`JsonPatch`] |
//! | `application/merge-patch+json` | [RFC 7396](https://www.rfc-editor.org/rfc/rfc7396) | [`merge_patch`] |
//!
//! Both engines are pure: they take the current document by reference and
//! return a new one.

mod json_patch;
mod merge;

pub use json_patch::{JsonPatch, OpKind, PatchError, PatchErrorKind, PatchOperation};
pub use merge::{merge_patch, merge_patch_in_place};

use serde_json::Value;

/// Media type of RFC 6902 patch documents.
pub const JSON_PATCH_MEDIA_TYPE: &str = "application/json-patch+json";

/// Media type of RFC 7396 patch documents.
pub const MERGE_PATCH_MEDIA_TYPE: &str = "application/merge-patch+json";

/// Patch format, as selected by the request's media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchFormat {
    /// JSON Patch (RFC 6902)
    JsonPatch,
    /// JSON Merge Patch (RFC 7396)
    MergePatch,
}

impl PatchFormat {
    /// Selects a format from a bare media type (no parameters).
    ///
    /// Matching is case-insensitive. Returns `None` for any other type.
    pub fn from_media_type(essence: &str) -> Option<Self> {
        if essence.eq_ignore_ascii_case(JSON_PATCH_MEDIA_TYPE) {
            Some(PatchFormat::JsonPatch)
        } else if essence.eq_ignore_ascii_case(MERGE_PATCH_MEDIA_TYPE) {
            Some(PatchFormat::MergePatch)
        } else {
            None
        }
    }

    /// Returns the media type for this format.
    pub fn media_type(&self) -> &'static str {
        match self {
            PatchFormat::JsonPatch => JSON_PATCH_MEDIA_TYPE,
            PatchFormat::MergePatch => MERGE_PATCH_MEDIA_TYPE,
        }
    }

    /// Parses `body` in this format and applies it to `document`.
    ///
    /// A body that is not valid JSON is reported as [`PatchError::Malformed`]
    /// for either format.
    pub fn apply(&self, document: &Value, body: &[u8]) -> Result<Value, PatchError> {
        match self {
            PatchFormat::JsonPatch => JsonPatch::parse(body)?.apply(document),
            PatchFormat::MergePatch => {
                let patch: Value =
                    serde_json::from_slice(body).map_err(|e| PatchError::Malformed {
                        index: None,
                        message: format!("invalid JSON: {e}"),
                    })?;
                Ok(merge_patch(document, &patch))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_media_type() {
        assert_eq!(
            PatchFormat::from_media_type("application/json-patch+json"),
            Some(PatchFormat::JsonPatch)
        );
        assert_eq!(
            PatchFormat::from_media_type("Application/Merge-Patch+JSON"),
            Some(PatchFormat::MergePatch)
        );
        assert_eq!(PatchFormat::from_media_type("application/json"), None);
    }

    #[test]
    fn test_apply_dispatches_on_format() {
        let doc = json!({"status": "draft", "intent": "order"});

        let out = PatchFormat::JsonPatch
            .apply(&doc, br#"[{"op": "remove", "path": "/intent"}]"#)
            .unwrap();
        assert_eq!(out, json!({"status": "draft"}));

        let out = PatchFormat::MergePatch
            .apply(&doc, br#"{"status": "active"}"#)
            .unwrap();
        assert_eq!(out, json!({"status": "active", "intent": "order"}));
    }

    #[test]
    fn test_apply_rejects_invalid_json() {
        for format in [PatchFormat::JsonPatch, PatchFormat::MergePatch] {
            let err = format.apply(&json!({}), b"{").unwrap_err();
            assert_eq!(err.kind(), PatchErrorKind::Malformed);
        }
    }
}
