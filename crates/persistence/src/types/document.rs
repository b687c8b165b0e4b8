//! The document model shared by the patch engines and the version log.
//!
//! A [`Document`] is a plain [`serde_json::Value`]. The workspace enables
//! `serde_json`'s `preserve_order` feature, so object members keep their
//! insertion order through every patch and merge.
//!
//! [`JsonPointer`] implements RFC 6901 addressing on top of it.

use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};
use thiserror::Error;

/// A JSON-like resource document.
pub type Document = Value;

/// Error returned when a JSON Pointer string is not well formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid JSON pointer {pointer:?}: {reason}")]
pub struct PointerError {
    /// The offending pointer text.
    pub pointer: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// A parsed RFC 6901 JSON Pointer.
///
/// The empty pointer `""` addresses the whole document. Every other pointer
/// starts with `/` and is split into reference tokens with `~1` and `~0`
/// unescaped to `/` and `~`.
///
/// # Examples
///
/// ```
/// use tessera_persistence::types::JsonPointer;
/// use serde_json::json;
///
/// let doc = json!({"code": {"coding": [{"system": "http://loinc.org", "code": "58410-2"}]}});
/// let ptr = JsonPointer::parse("/code/coding/0/code").unwrap();
/// assert_eq!(ptr.resolve(&doc), Some(&json!("58410-2")));
///
/// let escaped = JsonPointer::parse("/a~1b/m~0n").unwrap();
/// assert_eq!(escaped.tokens(), ["a/b", "m~n"]);
/// assert_eq!(escaped.to_string(), "/a~1b/m~0n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct JsonPointer {
    tokens: Vec<String>,
}

impl JsonPointer {
    /// The pointer addressing the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a pointer string.
    pub fn parse(pointer: &str) -> Result<Self, PointerError> {
        if pointer.is_empty() {
            return Ok(Self::root());
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(PointerError {
                pointer: pointer.to_string(),
                reason: "must be empty or start with '/'",
            });
        };

        let tokens = rest
            .split('/')
            .map(|raw| unescape_token(raw).ok_or_else(|| PointerError {
                pointer: pointer.to_string(),
                reason: "'~' must be followed by '0' or '1'",
            }))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { tokens })
    }

    /// Returns the unescaped reference tokens.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns true for the empty pointer.
    pub fn is_root(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Splits the pointer into its parent tokens and final token.
    ///
    /// Returns `None` for the root pointer.
    pub fn split_last(&self) -> Option<(&[String], &str)> {
        self.tokens
            .split_last()
            .map(|(last, parent)| (parent, last.as_str()))
    }

    /// Returns true when `self` addresses a strict ancestor of `other`.
    ///
    /// The comparison is token-wise, so `/a/b` is not a prefix of `/a/bc`.
    pub fn is_proper_prefix_of(&self, other: &JsonPointer) -> bool {
        self.tokens.len() < other.tokens.len() && other.tokens.starts_with(&self.tokens)
    }

    /// Resolves the pointer against a document.
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        resolve_tokens(document, &self.tokens)
    }

    /// Resolves the pointer against a document, mutably.
    pub fn resolve_mut<'a>(&self, document: &'a mut Value) -> Option<&'a mut Value> {
        resolve_tokens_mut(document, &self.tokens)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            write!(f, "/{}", token.replace('~', "~0").replace('/', "~1"))?;
        }
        Ok(())
    }
}

impl FromStr for JsonPointer {
    type Err = PointerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn unescape_token(raw: &str) -> Option<String> {
    if !raw.contains('~') {
        return Some(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => return None,
        }
    }
    Some(out)
}

/// Parses an array index token.
///
/// Only canonical decimal indices are accepted: `0`, or digits without a
/// leading zero. Signs, whitespace and `-` are rejected.
pub(crate) fn parse_array_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

fn resolve_tokens<'a>(document: &'a Value, tokens: &[String]) -> Option<&'a Value> {
    tokens.iter().try_fold(document, |current, token| match current {
        Value::Object(map) => map.get(token),
        Value::Array(items) => parse_array_index(token).and_then(|i| items.get(i)),
        _ => None,
    })
}

fn resolve_tokens_mut<'a>(
    document: &'a mut Value,
    tokens: &[String],
) -> Option<&'a mut Value> {
    tokens.iter().try_fold(document, |current, token| match current {
        Value::Object(map) => map.get_mut(token),
        Value::Array(items) => parse_array_index(token).and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// Structural equality with numeric comparison of numbers.
///
/// Unlike `Value`'s `PartialEq`, `1` and `1.0` are equal here. Object member
/// order is ignored.
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equal(x, y)))
        }
        _ => a == b,
    }
}

fn numbers_equal(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
