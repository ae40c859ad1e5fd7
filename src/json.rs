//! Flat-JSON field extraction and construction.
//!
//! The OTAM service speaks a narrow dialect: single-level objects whose
//! values are bare non-negative integers or quoted strings without escape
//! sequences. This module matches exactly that shape and nothing more.
//!
//! # Supported subset
//!
//! - A key is located by the literal pattern `"key":` (no whitespace between
//!   the closing quote and the colon).
//! - Spaces or tabs may follow the colon.
//! - String values run to the next `"`; escaped quotes are not recognised.
//! - Integer values are a run of ASCII digits; signs, fractions and exponents
//!   are not recognised.
//! - Nested objects and arrays are out of scope.
//!
//! Building is the reverse: [`build_object`] renders one `{"key":value}`
//! pair (string values escaped) and [`merge_objects`] splices two flat
//! objects by dropping the closing brace of the first and the opening brace
//! of the second. Neither validates its inputs.

use serde_json::Value;

/// Scalar value accepted by [`build_object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scalar<'a> {
    Str(&'a str),
    Int(i64),
}

impl<'a> From<&'a str> for Scalar<'a> {
    fn from(s: &'a str) -> Self {
        Scalar::Str(s)
    }
}

impl From<i64> for Scalar<'_> {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<u32> for Scalar<'_> {
    fn from(n: u32) -> Self {
        Scalar::Int(i64::from(n))
    }
}

impl From<i32> for Scalar<'_> {
    fn from(n: i32) -> Self {
        Scalar::Int(i64::from(n))
    }
}

/// Byte offset just past `"key":` and any following spaces or tabs.
fn value_start(text: &str, key: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut from = 0;
    while from < text.len() {
        let rel = text[from..].find('"')?;
        let open = from + rel;
        let name_start = open + 1;
        let rest = &text[name_start..];
        if rest.starts_with(key) && rest[key.len()..].starts_with("\":") {
            let mut idx = name_start + key.len() + 2;
            while idx < bytes.len() && (bytes[idx] == b' ' || bytes[idx] == b'\t') {
                idx += 1;
            }
            return Some(idx);
        }
        from = name_start;
    }
    None
}

/// Return the text between the quote pair following `"key":`.
///
/// `None` if the key is absent or its value is not a quoted string.
pub fn extract_string<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = value_start(text, key)?;
    let after_quote = text[start..].strip_prefix('"')?;
    let end = after_quote.find('"')?;
    Some(&after_quote[..end])
}

/// Return the integer formed by the digit run following `"key":`.
///
/// `None` if the key is absent, no digit follows, or the run overflows `u32`.
pub fn extract_int(text: &str, key: &str) -> Option<u32> {
    let start = value_start(text, key)?;
    let digits = text[start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    text[start..start + digits].parse().ok()
}

/// Escape `s` for embedding inside a JSON string literal (no surrounding quotes).
pub fn escape(s: &str) -> String {
    let quoted = Value::from(s).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}

/// Render a one-field object `{"key":value}`.
pub fn build_object<'a>(key: &str, value: impl Into<Scalar<'a>>) -> String {
    match value.into() {
        Scalar::Str(s) => format!("{{\"{key}\":{}}}", Value::from(s)),
        Scalar::Int(n) => format!("{{\"{key}\":{n}}}"),
    }
}

/// Splice two flat objects into one, keys of `a` first.
///
/// An empty object on either side yields the other side unchanged.
pub fn merge_objects(a: &str, b: &str) -> String {
    let a = a.trim();
    let b = b.trim();
    let a_body = a.strip_suffix('}').unwrap_or(a);
    let b_body = b.strip_prefix('{').unwrap_or(b);

    if a_body.trim_end() == "{" {
        return b.to_owned();
    }
    if b_body.trim_start() == "}" {
        return a.to_owned();
    }

    let mut out = String::with_capacity(a_body.len() + b_body.len() + 1);
    out.push_str(a_body);
    out.push(',');
    out.push_str(b_body);
    out
}

// ── Tests ─────────────────────────────────────────────────────
