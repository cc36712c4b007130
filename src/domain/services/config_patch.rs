//! Attribute-keyed patching of runtime config files.
//!
//! A config file is a term document. Patching finds every two-element tuple
//! whose first element is the atom `Key`,
//!
//! ```text
//! {Key, <term>}
//! ```
//!
//! and replaces the whole tuple with `{Key, "Value"}`. Everything else in
//! the document is left byte-for-byte untouched. The value term is skipped
//! with a small scanner that understands nesting (`{}`, `[]`, `()`),
//! double-quoted strings, quoted atoms and `%` line comments, so values that
//! contain braces or commas are replaced whole.

use super::overlay_writer::format_entry;

/// Replace every `{key, ...}` term in `text`. Returns the new text and the
/// number of replacements.
pub fn patch_term(text: &str, key: &str, value: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find('{') {
        let open = cursor + found;
        match match_keyed_tuple(text, open, key) {
            Some(close) => {
                out.push_str(&text[cursor..open]);
                out.push_str(&format_entry(key, value));
                cursor = close + 1;
                count += 1;
            }
            None => {
                out.push_str(&text[cursor..=open]);
                cursor = open + 1;
            }
        }
    }
    out.push_str(&text[cursor..]);
    (out, count)
}

/// Apply every `(key, value)` pair in order.
pub fn patch_attributes(text: &str, pairs: &[(String, String)]) -> String {
    pairs.iter().fold(text.to_string(), |acc, (key, value)| {
        let (patched, n) = patch_term(&acc, key, value);
        if n == 0 {
            tracing::trace!(key = %key, "attribute not present in config");
        }
        patched
    })
}

/// If a `{key, <term>}` tuple starts at `open`, return the index of its
/// closing brace.
fn match_keyed_tuple(text: &str, open: usize, key: &str) -> Option<usize> {
    let after_brace = skip_whitespace(text, open + 1);
    let rest = &text[after_brace..];
    if !rest.starts_with(key) {
        return None;
    }
    let after_key = skip_whitespace(text, after_brace + key.len());
    if text.as_bytes().get(after_key) != Some(&b',') {
        return None;
    }
    let value_end = skip_term(text, after_key + 1)?;
    let close = skip_whitespace(text, value_end);
    (text.as_bytes().get(close) == Some(&b'}')).then_some(close)
}

fn skip_whitespace(text: &str, mut i: usize) -> usize {
    let bytes = text.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Scan one term starting at `start`; returns the index just past it, or
/// `None` if the document ends first.
fn skip_term(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = skip_quoted(bytes, i)?,
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'{' | b'[' | b'(' => {
                depth += 1;
                i += 1;
            }
            b'}' | b']' | b')' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
                i += 1;
            }
            b',' if depth == 0 => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Skip a quoted string or atom starting at `start`; returns the index just
/// past the closing quote.
fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}
