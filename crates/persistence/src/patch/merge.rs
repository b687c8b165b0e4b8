//! JSON Merge Patch (RFC 7396).

use serde_json::{Map, Value};

/// Applies a merge patch, returning the merged copy.
///
/// For each member of an object patch, `null` removes the key, an object
/// merges recursively, and any other value (arrays included) replaces the
/// target member. A non-object patch replaces the whole document.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tessera_persistence::patch::merge_patch;
///
/// let doc = json!({"status": "draft", "note": [{"text": "a"}], "priority": "routine"});
/// let patch = json!({"status": "active", "priority": null, "note": []});
/// assert_eq!(merge_patch(&doc, &patch), json!({"status": "active", "note": []}));
/// ```
pub fn merge_patch(target: &Value, patch: &Value) -> Value {
    let mut merged = target.clone();
    merge_patch_in_place(&mut merged, patch);
    merged
}

/// Applies a merge patch to `target` in place. Never fails.
pub fn merge_patch_in_place(target: &mut Value, patch: &Value) {
    let Value::Object(members) = patch else {
        *target = patch.clone();
        return;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target_members) = target else {
        return;
    };

    for (key, value) in members {
        if value.is_null() {
            target_members.shift_remove(key);
        } else {
            let slot = target_members.entry(key.clone()).or_insert(Value::Null);
            merge_patch_in_place(slot, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_removes_member() {
        let out = merge_patch(&json!({"a": 1, "b": 2}), &json!({"a": null}));
        assert_eq!(out, json!({"b": 2}));
    }

    #[test]
    fn test_objects_merge_recursively() {
        let doc = json!({"subject": {"reference": "Patient/1", "display": "A"}});
        let out = merge_patch(&doc, &json!({"subject": {"display": "B"}}));
        assert_eq!(out, json!({"subject": {"reference": "Patient/1", "display": "B"}}));
    }

    #[test]
    fn test_arrays_replace() {
        let out = merge_patch(&json!({"a": [1, 2]}), &json!({"a": [3]}));
        assert_eq!(out, json!({"a": [3]}));
    }

    #[test]
    fn test_non_object_patch_replaces_document() {
        assert_eq!(merge_patch(&json!({"a": 1}), &json!("x")), json!("x"));
        assert_eq!(merge_patch(&json!({"a": 1}), &json!([1])), json!([1]));
    }

    #[test]
    fn test_nested_nulls_in_new_members_are_dropped() {
        let out = merge_patch(&json!({"a": "b"}), &json!({"a": {"c": null, "d": 1}}));
        assert_eq!(out, json!({"a": {"d": 1}}));
    }

    #[test]
    fn test_object_patch_onto_scalar_target() {
        assert_eq!(merge_patch(&json!("text"), &json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_member_order_is_preserved() {
        let out = merge_patch(&json!({"a": 1, "b": 2, "c": 3}), &json!({"b": 20, "d": 4}));
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_idempotent() {
        let doc = json!({"a": {"b": [1]}, "c": "x"});
        let patch = json!({"a": {"b": null, "e": {"f": null, "g": 1}}, "c": null});
        let once = merge_patch(&doc, &patch);
        assert_eq!(merge_patch(&once, &patch), once);
    }
}
