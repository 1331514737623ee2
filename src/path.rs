//! Access path resolution.
//!
//! An access path navigates a JSON model from the ambient scope: `.` (or an
//! empty path) is the scope itself, anything else is a dot-delimited list of
//! field names matched case-insensitively. A miss is never an error; it
//! yields `None` and the caller decides what "absent" means.

use serde_json::{Map, Value};

/// The identity path.
pub const CURRENT: &str = ".";

/// Resolve a dot-separated access path against a JSON value.
pub fn resolve<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path == CURRENT {
        return Some(value);
    }

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = get_ignore_case(map, part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

static NULL: Value = Value::Null;

/// Like [`resolve`], with a miss reported as JSON `null`.
pub fn resolve_or_null<'a>(value: &'a Value, path: &str) -> &'a Value {
    resolve(value, path).unwrap_or(&NULL)
}

/// Look up a key, preferring an exact match and falling back to the first
/// key that matches ignoring ASCII case.
pub fn get_ignore_case<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let model = json!({"a": 1});
        assert_eq!(resolve(&model, "."), Some(&model));
        assert_eq!(resolve(&model, ""), Some(&model));
    }

    #[test]
    fn test_nested() {
        let model = json!({"a": {"b": 5}});
        assert_eq!(resolve(&model, "a.b"), Some(&json!(5)));
    }

    #[test]
    fn test_missing_segment() {
        let model = json!({"a": {"b": 5}});
        assert_eq!(resolve(&model, "a.c"), None);
        assert_eq!(resolve(&model, "x"), None);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve(&json!({"A": 1}), "a"), Some(&json!(1)));
        assert_eq!(resolve(&json!({"Order": {"Total": 9}}), "order.TOTAL"), Some(&json!(9)));
    }

    #[test]
    fn test_exact_match_wins() {
        let model = json!({"name": "lower", "Name": "upper"});
        assert_eq!(resolve(&model, "Name"), Some(&json!("upper")));
        assert_eq!(resolve(&model, "name"), Some(&json!("lower")));
    }

    #[test]
    fn test_non_object_stops_resolution() {
        let model = json!({"a": 3, "list": [{"b": 1}]});
        assert_eq!(resolve(&model, "a.b"), None);
        assert_eq!(resolve(&model, "list.b"), None);
        assert_eq!(resolve(&json!(null), "a"), None);
    }

    #[test]
    fn test_no_partial_segment_match() {
        let model = json!({"items": 1});
        assert_eq!(resolve(&model, "item"), None);
    }

    #[test]
    fn test_miss_as_null() {
        let model = json!({"a": 1});
        assert_eq!(resolve_or_null(&model, "b"), &Value::Null);
        assert_eq!(resolve_or_null(&model, "a"), &json!(1));
    }
}
