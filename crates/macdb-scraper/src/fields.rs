//! Lookup helpers over loosely-typed JSON payloads.
//!
//! The source site's embedded data has shifted shape over time, so most
//! fields are read from a list of candidate keys or dotted paths and the
//! first usable value wins.

use serde_json::Value;

/// Walks a dotted path (`"props.pageProps.app"`) through nested objects.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, key| node.as_object()?.get(key))
}

/// `true` for `null`, blank strings, and empty arrays or objects.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// First non-empty value found at any of `paths`, in order.
#[must_use]
pub fn first_non_empty<'a>(root: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|p| get_path(root, p))
        .find(|v| !is_empty_value(v))
}

/// First non-blank string among `keys`, trimmed.
///
/// Numbers are accepted and rendered as strings so that ids and versions
/// serialized either way read the same.
#[must_use]
pub fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| get_path(obj, k))
        .find_map(scalar_string)
}

/// A string or number rendered as a trimmed, non-empty string.
#[must_use]
pub fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First value among `keys` that reads as a boolean (`true`, `"true"`, `1`).
#[must_use]
pub fn first_bool(obj: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|k| get_path(obj, k))
        .find_map(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        })
}

/// First value among `keys` that reads as a whole number.
#[must_use]
pub fn first_i64(obj: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|k| get_path(obj, k))
        .find_map(|v| match v {
            #[allow(clippy::cast_possible_truncation)]
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().replace(',', "").parse::<i64>().ok(),
            _ => None,
        })
}
