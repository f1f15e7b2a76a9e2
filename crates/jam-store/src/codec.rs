//! Canonical text encoding of stored documents.
//!
//! Documents are stored as compact JSON text and parsed back on read.

use serde_json::Value;

use crate::StoreError;

/// Encode a document for storage.
pub fn encode(value: &Value) -> String {
    value.to_string()
}

/// Decode the text stored under `key`.
pub fn decode(key: &str, text: &str) -> Result<Value, StoreError> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Codec { key: key.to_owned(), reason: e.to_string() })
}

/// Redis glob pattern matching every key that starts with `prefix`.
///
/// Glob metacharacters inside the prefix are escaped so they match
/// literally.
pub fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('*');
    pattern
}
