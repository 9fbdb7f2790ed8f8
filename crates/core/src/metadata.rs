// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! Dot-path lookup and truthiness over free-form metadata trees.
//!
//! Agent-written metadata is a generic JSON value; the core never imposes
//! a schema on it. Hook `when` conditions resolve a dot-path against the
//! full hook context and gate on the truthiness of whatever they find.

use serde_json::Value;

/// Descend `root` along a `.`-separated sequence of object keys.
///
/// Missing intermediate keys, non-object intermediates, and empty path
/// segments all resolve to `None`.
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Truthiness of a metadata value.
///
/// Follows the loose convention agents expect from their metadata files:
/// `null`, `false`, `0`, and `""` are falsy; everything else (including
/// empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Resolve `path` against `root` and test truthiness; a missing path is false.
pub fn path_is_truthy(root: &Value, path: &str) -> bool {
    lookup_path(root, path).map(is_truthy).unwrap_or(false)
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
