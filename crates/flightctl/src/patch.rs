//! JSON Patch (RFC 6902) computation for resource updates.
//!
//! [`diff`] compares a live resource against a desired document and emits
//! only the operations needed to make every field named in the desired
//! document match. Fields the desired document does not mention are left
//! alone, so server-populated data (status, resource versions, labels added
//! by controllers) never produces a patch.
//!
//! Rules:
//! - objects are compared key by key, recursively;
//! - arrays and scalars are replaced whole when they differ;
//! - a `null` in the desired document removes the key if it is present;
//! - an object made only of nulls adds nothing when the key is missing;
//! - `apiVersion`, `kind`, `status` and read-only metadata are never patched.

use crate::error::{Error, Result};
use json_patch::Patch;
use serde_json::{Map, Value, json};

/// Top-level fields that are never patched.
const FIXED_FIELDS: &[&str] = &["apiVersion", "kind", "status"];

/// Metadata fields that are never patched.
const FIXED_METADATA: &[&str] = &[
    "name",
    "resourceVersion",
    "generation",
    "creationTimestamp",
    "deletionTimestamp",
    "owner",
];

/// Compute the patch that converges `current` towards `desired`.
///
/// # Example
///
/// ```
/// use serde_json::json;
///
/// let current = json!({"metadata": {"name": "d1", "resourceVersion": "7"}, "status": {}});
/// let desired = json!({"metadata": {"name": "d1", "labels": {"site": "a"}}});
///
/// let patch = flightctl::patch::diff(&current, &desired).unwrap();
/// assert_eq!(patch.0.len(), 1);
/// ```
pub fn diff(current: &Value, desired: &Value) -> Result<Patch> {
    let mut ops = Vec::new();
    match (current, desired) {
        (Value::Object(cur), Value::Object(want)) => diff_object("", cur, want, &mut ops),
        _ if current != desired => ops.push(json!({
            "op": "replace",
            "path": "",
            "value": strip_nulls(desired),
        })),
        _ => {}
    }
    Ok(serde_json::from_value(Value::Array(ops))?)
}

/// Apply a patch to a copy of `doc`.
pub fn apply(doc: &Value, patch: &Patch) -> Result<Value> {
    let mut patched = doc.clone();
    json_patch::patch(&mut patched, patch).map_err(|e| Error::Patch(e.to_string()))?;
    Ok(patched)
}

/// Whether a patch contains no operations.
#[must_use]
pub fn is_empty(patch: &Patch) -> bool {
    patch.0.is_empty()
}

fn diff_object(
    path: &str,
    current: &Map<String, Value>,
    desired: &Map<String, Value>,
    ops: &mut Vec<Value>,
) {
    for (key, want) in desired {
        if is_fixed(path, key) {
            continue;
        }
        let child = format!("{}/{}", path, escape_token(key));

        match (current.get(key), want) {
            (None | Some(Value::Null), Value::Null) => {}
            (Some(_), Value::Null) => ops.push(json!({"op": "remove", "path": child})),
            (None, want) => {
                if let Some(value) = prune(want) {
                    ops.push(json!({"op": "add", "path": child, "value": value}));
                }
            }
            (Some(Value::Object(cur)), Value::Object(want)) => {
                diff_object(&child, cur, want, ops);
            }
            (Some(have), want) => {
                // Compare against what would be stored, not the raw definition
                let value = strip_nulls(want);
                if *have != value {
                    ops.push(json!({"op": "replace", "path": child, "value": value}));
                }
            }
        }
    }
}

fn is_fixed(path: &str, key: &str) -> bool {
    match path {
        "" => FIXED_FIELDS.contains(&key),
        "/metadata" => FIXED_METADATA.contains(&key),
        _ => false,
    }
}

/// Escape a key as a JSON Pointer reference token (RFC 6901).
fn escape_token(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Drop `null` members from objects; they mean "absent" in a desired document.
///
/// A member whose object consists only of nulls is dropped too, so
/// `labels: {gone: null}` asks for nothing rather than for an empty map.
#[must_use]
pub fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k.clone(), v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}

/// `None` for a null, or for a non-empty object made only of nulls.
fn prune(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) if !map.is_empty() => {
            let stripped = strip_nulls(value);
            if stripped.as_object().is_some_and(|m| m.is_empty()) {
                None
            } else {
                Some(stripped)
            }
        }
        other => Some(strip_nulls(other)),
    }
}
