//! Shallow combination of state fragments.

use serde_json::{Map, Value};

/// Shallow-combine state fragments into one object.
///
/// Later fragments overwrite keys of earlier ones. Fragments that are not
/// objects contribute nothing.
pub fn merge(fragments: impl IntoIterator<Item = Value>) -> Value {
    let mut merged = Map::new();
    for fragment in fragments {
        if let Value::Object(fields) = fragment {
            merged.extend(fields);
        }
    }
    Value::Object(merged)
}
