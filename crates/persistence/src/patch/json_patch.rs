//! JSON Patch (RFC 6902).
//!
//! A [`JsonPatch`] is parsed once from the request body and then applied to
//! a document. Application is atomic: operations run against a private copy
//! and the caller only ever sees the fully patched result or an error.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{JsonPointer, json_equal, parse_array_index};

/// The six RFC 6902 operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// `add`
    Add,
    /// `remove`
    Remove,
    /// `replace`
    Replace,
    /// `move`
    Move,
    /// `copy`
    Copy,
    /// `test`
    Test,
}

impl OpKind {
    /// Returns the wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
            OpKind::Replace => "replace",
            OpKind::Move => "move",
            OpKind::Copy => "copy",
            OpKind::Test => "test",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(OpKind::Add),
            "remove" => Some(OpKind::Remove),
            "replace" => Some(OpKind::Replace),
            "move" => Some(OpKind::Move),
            "copy" => Some(OpKind::Copy),
            "test" => Some(OpKind::Test),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a [`PatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchErrorKind {
    /// The patch document itself is invalid (HTTP 400).
    Malformed,
    /// The patch is valid but cannot be applied to this document (HTTP 422).
    Unprocessable,
}

/// Errors raised while parsing or applying a JSON Patch.
///
/// Every application error names the zero-based index of the failing
/// operation and its kind.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PatchError {
    /// The payload is not a valid patch document.
    #[error("malformed patch{}: {message}", .index.map(|i| format!(" (operation {i})")).unwrap_or_default())]
    Malformed {
        /// The offending operation, when the payload is an array.
        index: Option<usize>,
        message: String,
    },

    /// A path that must exist does not resolve.
    #[error("operation {index} ({op}): path \"{path}\" does not exist")]
    PathNotFound {
        index: usize,
        op: OpKind,
        path: String,
    },

    /// An array index is not canonical, is `-` outside of `add`, or is past
    /// the end of the array.
    #[error("operation {index} ({op}): invalid array index {token:?} in \"{path}\"")]
    InvalidIndex {
        index: usize,
        op: OpKind,
        path: String,
        token: String,
    },

    /// The operation cannot target this location.
    #[error("operation {index} ({op}): {message}")]
    InvalidTarget {
        index: usize,
        op: OpKind,
        path: String,
        message: String,
    },

    /// A move whose destination lies inside its source.
    #[error("operation {index} (move): cannot move \"{from}\" into its own child \"{path}\"")]
    MoveIntoDescendant {
        index: usize,
        from: String,
        path: String,
    },

    /// A test operation found a different value.
    #[error("operation {index} (test): value at \"{path}\" does not match")]
    TestFailed { index: usize, path: String },
}

impl PatchError {
    /// Returns whether this is a malformed-payload or an application failure.
    pub fn kind(&self) -> PatchErrorKind {
        match self {
            PatchError::Malformed { .. } => PatchErrorKind::Malformed,
            _ => PatchErrorKind::Unprocessable,
        }
    }

    /// Returns the index of the failing operation, if known.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            PatchError::Malformed { index, .. } => *index,
            PatchError::PathNotFound { index, .. }
            | PatchError::InvalidIndex { index, .. }
            | PatchError::InvalidTarget { index, .. }
            | PatchError::MoveIntoDescendant { index, .. }
            | PatchError::TestFailed { index, .. } => Some(*index),
        }
    }

    /// Returns the kind of the failing operation, if known.
    pub fn op(&self) -> Option<OpKind> {
        match self {
            PatchError::Malformed { .. } => None,
            PatchError::PathNotFound { op, .. }
            | PatchError::InvalidIndex { op, .. }
            | PatchError::InvalidTarget { op, .. } => Some(*op),
            PatchError::MoveIntoDescendant { .. } => Some(OpKind::Move),
            PatchError::TestFailed { .. } => Some(OpKind::Test),
        }
    }

    fn malformed(index: Option<usize>, message: impl Into<String>) -> Self {
        PatchError::Malformed {
            index,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Add { path: JsonPointer, value: Value },
    Remove { path: JsonPointer },
    Replace { path: JsonPointer, value: Value },
    Move { from: JsonPointer, path: JsonPointer },
    Copy { from: JsonPointer, path: JsonPointer },
    Test { path: JsonPointer, value: Value },
}

/// A single validated patch operation.
///
/// Only [`JsonPatch::parse`] and [`JsonPatch::from_value`] construct these.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOperation(Op);

impl PatchOperation {
    /// Returns the operation kind.
    pub fn kind(&self) -> OpKind {
        match &self.0 {
            Op::Add { .. } => OpKind::Add,
            Op::Remove { .. } => OpKind::Remove,
            Op::Replace { .. } => OpKind::Replace,
            Op::Move { .. } => OpKind::Move,
            Op::Copy { .. } => OpKind::Copy,
            Op::Test { .. } => OpKind::Test,
        }
    }

    /// Returns the target path.
    pub fn path(&self) -> &JsonPointer {
        match &self.0 {
            Op::Add { path, .. }
            | Op::Remove { path }
            | Op::Replace { path, .. }
            | Op::Move { path, .. }
            | Op::Copy { path, .. }
            | Op::Test { path, .. } => path,
        }
    }

    /// Returns the source path of a `move` or `copy`.
    pub fn from(&self) -> Option<&JsonPointer> {
        match &self.0 {
            Op::Move { from, .. } | Op::Copy { from, .. } => Some(from),
            _ => None,
        }
    }

    /// Returns the operand of an `add`, `replace` or `test`.
    pub fn value(&self) -> Option<&Value> {
        match &self.0 {
            Op::Add { value, .. } | Op::Replace { value, .. } | Op::Test { value, .. } => {
                Some(value)
            }
            _ => None,
        }
    }

    fn parse(index: usize, raw: &Value) -> Result<Self, PatchError> {
        let Value::Object(obj) = raw else {
            return Err(PatchError::malformed(
                Some(index),
                "operation must be a JSON object",
            ));
        };

        let op = match obj.get("op") {
            Some(Value::String(s)) => OpKind::parse(s).ok_or_else(|| {
                PatchError::malformed(Some(index), format!("unknown op {:?}", s))
            })?,
            Some(_) => return Err(PatchError::malformed(Some(index), "\"op\" must be a string")),
            None => return Err(PatchError::malformed(Some(index), "missing \"op\"")),
        };

        let path = pointer_member(obj, "path", index)?;

        let op = match op {
            OpKind::Add => Op::Add {
                path,
                value: value_member(obj, index)?,
            },
            OpKind::Remove => Op::Remove { path },
            OpKind::Replace => Op::Replace {
                path,
                value: value_member(obj, index)?,
            },
            OpKind::Move => Op::Move {
                from: pointer_member(obj, "from", index)?,
                path,
            },
            OpKind::Copy => Op::Copy {
                from: pointer_member(obj, "from", index)?,
                path,
            },
            OpKind::Test => Op::Test {
                path,
                value: value_member(obj, index)?,
            },
        };

        Ok(PatchOperation(op))
    }
}

fn pointer_member(
    obj: &Map<String, Value>,
    member: &str,
    index: usize,
) -> Result<JsonPointer, PatchError> {
    match obj.get(member) {
        Some(Value::String(s)) => JsonPointer::parse(s)
            .map_err(|e| PatchError::malformed(Some(index), format!("\"{member}\": {e}"))),
        Some(_) => Err(PatchError::malformed(
            Some(index),
            format!("\"{member}\" must be a string"),
        )),
        None => Err(PatchError::malformed(
            Some(index),
            format!("missing \"{member}\""),
        )),
    }
}

// A present `"value": null` is a legitimate operand.
fn value_member(obj: &Map<String, Value>, index: usize) -> Result<Value, PatchError> {
    obj.get("value")
        .cloned()
        .ok_or_else(|| PatchError::malformed(Some(index), "missing \"value\""))
}

/// A parsed RFC 6902 patch document.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tessera_persistence::patch::JsonPatch;
///
/// let doc = json!({"status": "draft", "note": []});
/// let patch = JsonPatch::parse(br#"[
///     {"op": "test", "path": "/status", "value": "draft"},
///     {"op": "replace", "path": "/status", "value": "active"},
///     {"op": "add", "path": "/note/-", "value": {"text": "signed"}}
/// ]"#).unwrap();
///
/// let patched = patch.apply(&doc).unwrap();
/// assert_eq!(patched, json!({"status": "active", "note": [{"text": "signed"}]}));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonPatch {
    operations: Vec<PatchOperation>,
}

impl JsonPatch {
    /// Parses a patch from raw request bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, PatchError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| PatchError::malformed(None, format!("invalid JSON: {e}")))?;
        Self::from_value(&value)
    }

    /// Builds a patch from an already-decoded JSON value.
    pub fn from_value(value: &Value) -> Result<Self, PatchError> {
        let Value::Array(items) = value else {
            return Err(PatchError::malformed(
                None,
                "patch document must be a JSON array",
            ));
        };

        let operations = items
            .iter()
            .enumerate()
            .map(|(index, raw)| PatchOperation::parse(index, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { operations })
    }

    /// Returns the operations in application order.
    pub fn operations(&self) -> &[PatchOperation] {
        &self.operations
    }

    /// Returns the number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true for an empty patch.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies the patch, returning the patched copy.
    ///
    /// The input is never modified. If any operation fails, the error is
    /// returned and the partially patched copy is discarded.
    pub fn apply(&self, document: &Value) -> Result<Value, PatchError> {
        let mut working = document.clone();
        for (index, operation) in self.operations.iter().enumerate() {
            apply_operation(&mut working, index, &operation.0)?;
        }
        Ok(working)
    }

    /// Applies the patch to `document`, leaving it untouched on failure.
    pub fn apply_in_place(&self, document: &mut Value) -> Result<(), PatchError> {
        *document = self.apply(document)?;
        Ok(())
    }
}

/// Error context for one operation against one pointer.
struct Site<'p> {
    index: usize,
    op: OpKind,
    path: &'p JsonPointer,
}

impl Site<'_> {
    fn not_found(&self) -> PatchError {
        PatchError::PathNotFound {
            index: self.index,
            op: self.op,
            path: self.path.to_string(),
        }
    }

    fn invalid_index(&self, token: &str) -> PatchError {
        PatchError::InvalidIndex {
            index: self.index,
            op: self.op,
            path: self.path.to_string(),
            token: token.to_string(),
        }
    }

    fn invalid_target(&self, message: &str) -> PatchError {
        PatchError::InvalidTarget {
            index: self.index,
            op: self.op,
            path: self.path.to_string(),
            message: message.to_string(),
        }
    }
}

fn apply_operation(doc: &mut Value, index: usize, op: &Op) -> Result<(), PatchError> {
    match op {
        Op::Add { path, value } => {
            let site = Site {
                index,
                op: OpKind::Add,
                path,
            };
            add(doc, &site, value.clone())
        }
        Op::Remove { path } => {
            let site = Site {
                index,
                op: OpKind::Remove,
                path,
            };
            remove(doc, &site).map(|_| ())
        }
        Op::Replace { path, value } => {
            let site = Site {
                index,
                op: OpKind::Replace,
                path,
            };
            *lookup_mut(doc, &site)? = value.clone();
            Ok(())
        }
        Op::Move { from, path } => {
            let source = Site {
                index,
                op: OpKind::Move,
                path: from,
            };
            if from == path {
                lookup(doc, &source)?;
                return Ok(());
            }
            if from.is_proper_prefix_of(path) {
                return Err(PatchError::MoveIntoDescendant {
                    index,
                    from: from.to_string(),
                    path: path.to_string(),
                });
            }
            let value = remove(doc, &source)?;
            let target = Site {
                index,
                op: OpKind::Move,
                path,
            };
            add(doc, &target, value)
        }
        Op::Copy { from, path } => {
            let source = Site {
                index,
                op: OpKind::Copy,
                path: from,
            };
            let value = lookup(doc, &source)?.clone();
            let target = Site {
                index,
                op: OpKind::Copy,
                path,
            };
            add(doc, &target, value)
        }
        Op::Test { path, value } => {
            let site = Site {
                index,
                op: OpKind::Test,
                path,
            };
            if json_equal(lookup(doc, &site)?, value) {
                Ok(())
            } else {
                Err(PatchError::TestFailed {
                    index,
                    path: path.to_string(),
                })
            }
        }
    }
}

fn lookup<'a>(doc: &'a Value, site: &Site<'_>) -> Result<&'a Value, PatchError> {
    let mut current = doc;
    for token in site.path.tokens() {
        current = match current {
            Value::Object(map) => map.get(token).ok_or_else(|| site.not_found())?,
            Value::Array(items) => {
                let i = parse_array_index(token).ok_or_else(|| site.invalid_index(token))?;
                items.get(i).ok_or_else(|| site.not_found())?
            }
            _ => return Err(site.not_found()),
        };
    }
    Ok(current)
}

fn walk_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    site: &Site<'_>,
) -> Result<&'a mut Value, PatchError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token).ok_or_else(|| site.not_found())?,
            Value::Array(items) => {
                let i = parse_array_index(token).ok_or_else(|| site.invalid_index(token))?;
                items.get_mut(i).ok_or_else(|| site.not_found())?
            }
            _ => return Err(site.not_found()),
        };
    }
    Ok(current)
}

fn lookup_mut<'a>(doc: &'a mut Value, site: &Site<'_>) -> Result<&'a mut Value, PatchError> {
    walk_mut(doc, site.path.tokens(), site)
}

fn add(doc: &mut Value, site: &Site<'_>, value: Value) -> Result<(), PatchError> {
    let Some((parent, last)) = site.path.split_last() else {
        *doc = value;
        return Ok(());
    };

    match walk_mut(doc, parent, site)? {
        Value::Object(map) => {
            // Overwriting keeps the member's position.
            map.insert(last.to_string(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            match parse_array_index(last) {
                Some(i) if i <= items.len() => {
                    items.insert(i, value);
                    Ok(())
                }
                _ => Err(site.invalid_index(last)),
            }
        }
        _ => Err(site.invalid_target("parent is neither an object nor an array")),
    }
}

fn remove(doc: &mut Value, site: &Site<'_>) -> Result<Value, PatchError> {
    let Some((parent, last)) = site.path.split_last() else {
        return Err(site.invalid_target("cannot remove the document root"));
    };

    match walk_mut(doc, parent, site)? {
        Value::Object(map) => map.shift_remove(last).ok_or_else(|| site.not_found()),
        Value::Array(items) => {
            let i = parse_array_index(last).ok_or_else(|| site.invalid_index(last))?;
            if i < items.len() {
                Ok(items.remove(i))
            } else {
                Err(site.not_found())
            }
        }
        _ => Err(site.not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(ops: Value) -> JsonPatch {
        JsonPatch::from_value(&ops).unwrap()
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = JsonPatch::parse(br#"{"op": "add"}"#).unwrap_err();
        assert_eq!(err.kind(), PatchErrorKind::Malformed);
        assert_eq!(err.operation_index(), None);

        let err = JsonPatch::parse(b"not json").unwrap_err();
        assert_eq!(err.kind(), PatchErrorKind::Malformed);
    }

    #[test]
    fn test_parse_reports_operation_index() {
        let err = JsonPatch::from_value(&json!([
            {"op": "remove", "path": "/a"},
            {"op": "frobnicate", "path": "/b"}
        ]))
        .unwrap_err();
        assert_eq!(err.operation_index(), Some(1));
        assert_eq!(err.kind(), PatchErrorKind::Malformed);
    }

    #[test]
    fn test_parse_requires_operands() {
        for bad in [
            json!([{"op": "add", "path": "/a"}]),
            json!([{"op": "replace", "path": "/a"}]),
            json!([{"op": "test", "path": "/a"}]),
            json!([{"op": "move", "path": "/a"}]),
            json!([{"op": "copy", "path": "/a", "from": "a"}]),
            json!([{"op": "remove"}]),
            json!([{"path": "/a"}]),
            json!(["add"]),
        ] {
            let err = JsonPatch::from_value(&bad).unwrap_err();
            assert_eq!(err.kind(), PatchErrorKind::Malformed, "{bad}");
        }
    }

    #[test]
    fn test_null_value_is_an_operand() {
        let p = patch(json!([{"op": "add", "path": "/a", "value": null}]));
        assert_eq!(p.operations()[0].value(), Some(&Value::Null));
        assert_eq!(p.apply(&json!({})).unwrap(), json!({"a": null}));
    }

    #[test]
    fn test_accessors() {
        let p = patch(json!([{"op": "move", "from": "/a", "path": "/b"}]));
        let op = &p.operations()[0];
        assert_eq!(op.kind(), OpKind::Move);
        assert_eq!(op.path().to_string(), "/b");
        assert_eq!(op.from().map(|f| f.to_string()), Some("/a".to_string()));
        assert!(op.value().is_none());
    }

    #[test]
    fn test_add_object_member_keeps_position_on_overwrite() {
        let doc = json!({"a": 1, "b": 2, "c": 3});
        let out = patch(json!([{"op": "add", "path": "/b", "value": 20}]))
            .apply(&doc)
            .unwrap();
        let keys: Vec<_> = out.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert_eq!(out["b"], 20);
    }

    #[test]
    fn test_add_array_insert_and_append() {
        let doc = json!({"items": [1, 3]});
        let out = patch(json!([
            {"op": "add", "path": "/items/1", "value": 2},
            {"op": "add", "path": "/items/-", "value": 4},
            {"op": "add", "path": "/items/4", "value": 5}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"items": [1, 2, 3, 4, 5]}));
    }

    #[test]
    fn test_add_index_past_end_fails() {
        let err = patch(json!([{"op": "add", "path": "/items/3", "value": 0}]))
            .apply(&json!({"items": [1]}))
            .unwrap_err();
        assert!(matches!(err, PatchError::InvalidIndex { index: 0, op: OpKind::Add, .. }));
        assert_eq!(err.kind(), PatchErrorKind::Unprocessable);
    }

    #[test]
    fn test_add_root_replaces_document() {
        let out = patch(json!([{"op": "add", "path": "", "value": [1]}]))
            .apply(&json!({"a": 1}))
            .unwrap();
        assert_eq!(out, json!([1]));
    }

    #[test]
    fn test_add_missing_parent_fails() {
        let err = patch(json!([{"op": "add", "path": "/a/b", "value": 1}]))
            .apply(&json!({}))
            .unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { .. }));
    }

    #[test]
    fn test_remove() {
        let doc = json!({"a": [1, 2, 3], "b": true});
        let out = patch(json!([
            {"op": "remove", "path": "/a/0"},
            {"op": "remove", "path": "/b"}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"a": [2, 3]}));
    }

    #[test]
    fn test_remove_errors() {
        let doc = json!({"a": [1]});
        let missing = patch(json!([{"op": "remove", "path": "/zzz"}]))
            .apply(&doc)
            .unwrap_err();
        assert!(matches!(missing, PatchError::PathNotFound { .. }));

        let dash = patch(json!([{"op": "remove", "path": "/a/-"}]))
            .apply(&doc)
            .unwrap_err();
        assert!(matches!(dash, PatchError::InvalidIndex { .. }));

        let root = patch(json!([{"op": "remove", "path": ""}]))
            .apply(&doc)
            .unwrap_err();
        assert!(matches!(root, PatchError::InvalidTarget { .. }));
    }

    #[test]
    fn test_replace_requires_existing_path() {
        let err = patch(json!([{"op": "replace", "path": "/x", "value": 1}]))
            .apply(&json!({}))
            .unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { op: OpKind::Replace, .. }));
    }

    #[test]
    fn test_move_and_copy() {
        let doc = json!({"a": {"b": 1}, "c": []});
        let out = patch(json!([
            {"op": "copy", "from": "/a/b", "path": "/c/-"},
            {"op": "move", "from": "/a", "path": "/d"}
        ]))
        .apply(&doc)
        .unwrap();
        assert_eq!(out, json!({"c": [1], "d": {"b": 1}}));
    }

    #[test]
    fn test_move_into_descendant_rejected() {
        let err = patch(json!([{"op": "move", "from": "/a", "path": "/a/b"}]))
            .apply(&json!({"a": {}}))
            .unwrap_err();
        assert!(matches!(err, PatchError::MoveIntoDescendant { index: 0, .. }));
    }

    #[test]
    fn test_move_onto_itself_is_noop() {
        let doc = json!({"a": 1});
        let out = patch(json!([{"op": "move", "from": "/a", "path": "/a"}]))
            .apply(&doc)
            .unwrap();
        assert_eq!(out, doc);

        let err = patch(json!([{"op": "move", "from": "/x", "path": "/x"}]))
            .apply(&doc)
            .unwrap_err();
        assert!(matches!(err, PatchError::PathNotFound { .. }));
    }

    #[test]
    fn test_test_compares_numbers_numerically() {
        let doc = json!({"n": 1});
        assert!(patch(json!([{"op": "test", "path": "/n", "value": 1.0}])).apply(&doc).is_ok());
        let err = patch(json!([{"op": "test", "path": "/n", "value": "1"}]))
            .apply(&doc)
            .unwrap_err();
        assert_eq!(err, PatchError::TestFailed { index: 0, path: "/n".to_string() });
    }

    #[test]
    fn test_failure_is_atomic() {
        let mut doc = json!({"status": "draft"});
        let before = doc.clone();
        let err = patch(json!([
            {"op": "replace", "path": "/status", "value": "active"},
            {"op": "test", "path": "/status", "value": "draft"}
        ]))
        .apply_in_place(&mut doc)
        .unwrap_err();
        assert_eq!(err.operation_index(), Some(1));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_non_canonical_index_rejected() {
        let err = patch(json!([{"op": "replace", "path": "/a/01", "value": 0}]))
            .apply(&json!({"a": [1, 2]}))
            .unwrap_err();
        assert!(matches!(err, PatchError::InvalidIndex { .. }));
    }

    #[test]
    fn test_error_display_names_operation() {
        let err = patch(json!([
            {"op": "add", "path": "/a", "value": 1},
            {"op": "remove", "path": "/missing"}
        ]))
        .apply(&json!({}))
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("operation 1"));
        assert!(message.contains("remove"));
    }
}
