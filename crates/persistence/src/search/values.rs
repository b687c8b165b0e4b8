//! Search value parsing helpers.
//!
//! Search values may escape separator characters with `\`:
//! - `\,` (comma in values)
//! - `\|` (token system/code separator)
//! - `\$` (composite separator)
//! - `\\` (literal backslash)

/// Splits `input` on every `sep` not preceded by a backslash.
pub fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == sep {
            out.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    out.push(&input[start..]);
    out
}

/// Removes search escapes. Unknown escape sequences are kept verbatim.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | ',' | '$' | '|')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escapes `\`, `%` and `_` for use in `LIKE ... ESCAPE '\'`.
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns the code part of a token value.
///
/// `system|code` and `|code` yield `code`; a value without an unescaped `|`
/// is returned whole.
pub fn token_code(value: &str) -> &str {
    match split_unescaped(value, '|').as_slice() {
        [_, code] => *code,
        _ => value,
    }
}

/// Reduces a reference value to the bare target id.
///
/// `Type/id`, absolute URLs and `.../_history/n` suffixes all yield `id`.
pub fn normalize_reference(value: &str) -> &str {
    let value = value.trim();
    let value = match value.find("/_history/") {
        Some(pos) => &value[..pos],
        None => value,
    };
    let value = value.trim_end_matches('/');
    match value.rfind('/') {
        Some(pos) => &value[pos + 1..],
        None => value,
    }
}
