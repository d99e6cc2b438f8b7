//! Building and merging value trees.
//!
//! Nothing here mutates its inputs: every call returns a new tree.

use super::path::PathSegment;
use serde_json::{Map, Value};

/// How arrays present on both sides of a merge are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrayMerge {
    /// The incoming array replaces the existing one
    #[default]
    Replace,
    /// Elements are merged index by index
    ByIndex,
}

/// Recursively merges `increment` into `base`.
///
/// A null base is replaced outright; objects merge key by key; arrays follow
/// `arrays`; anything else (scalars, mismatched shapes) takes the increment.
pub fn deep_merge(base: &Value, increment: &Value, arrays: ArrayMerge) -> Value {
    match (base, increment) {
        (Value::Null, _) => increment.clone(),
        (Value::Object(base), Value::Object(increment)) => {
            let mut merged = base.clone();
            for (key, incoming) in increment {
                let next = match base.get(key) {
                    Some(existing) => deep_merge(existing, incoming, arrays),
                    None => incoming.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (Value::Array(base), Value::Array(increment)) if arrays == ArrayMerge::ByIndex => {
            let len = base.len().max(increment.len());
            let merged = (0..len)
                .map(|index| match (base.get(index), increment.get(index)) {
                    (Some(existing), Some(incoming)) => deep_merge(existing, incoming, arrays),
                    (Some(existing), None) => existing.clone(),
                    (None, Some(incoming)) => incoming.clone(),
                    (None, None) => Value::Null,
                })
                .collect();
            Value::Array(merged)
        }
        _ => increment.clone(),
    }
}

/// Builds a single-branch tree holding `value` at `path`.
pub fn create_branch(path: &[PathSegment], value: Value) -> Value {
    path.iter().rev().fold(value, |inner, segment| {
        let mut level = Map::new();
        level.insert(segment.key.clone(), inner);
        Value::Object(level)
    })
}

/// Writes `value` at `path` into a copy of `root`.
///
/// `None` stands for an undefined value and never overwrites anything: the
/// tree comes back unchanged. Arrays at the written leaf are replaced whole.
pub fn write_back(path: &[PathSegment], value: Option<Value>, root: &Value) -> Value {
    match value {
        Some(value) => deep_merge(root, &create_branch(path, value), ArrayMerge::Replace),
        None => root.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(keys: &[&str]) -> Vec<PathSegment> {
        keys.iter().map(|key| PathSegment::field(*key)).collect()
    }

    #[test]
    fn test_null_base_takes_increment() {
        assert_eq!(deep_merge(&Value::Null, &json!({"a": 1}), ArrayMerge::Replace), json!({"a": 1}));
    }

    #[test]
    fn test_objects_merge_recursively() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": true});
        let increment = json!({"a": {"y": 3, "z": 4}});
        assert_eq!(
            deep_merge(&base, &increment, ArrayMerge::Replace),
            json!({"a": {"x": 1, "y": 3, "z": 4}, "b": true})
        );
    }

    #[test]
    fn test_arrays_replace_or_merge_by_index() {
        let base = json!([{"a": 1}, {"a": 2}, 3]);
        let increment = json!([{"b": 1}]);
        assert_eq!(deep_merge(&base, &increment, ArrayMerge::Replace), json!([{"b": 1}]));
        assert_eq!(
            deep_merge(&base, &increment, ArrayMerge::ByIndex),
            json!([{"a": 1, "b": 1}, {"a": 2}, 3])
        );
    }

    #[test]
    fn test_mismatched_shapes_take_increment() {
        assert_eq!(deep_merge(&json!({"a": 1}), &json!([1]), ArrayMerge::ByIndex), json!([1]));
        assert_eq!(deep_merge(&json!(1), &json!("x"), ArrayMerge::Replace), json!("x"));
    }

    #[test]
    fn test_write_back_preserves_siblings() {
        let root = json!({"a": {"b": 1, "c": 2}, "d": [1, 2]});
        let written = write_back(&path(&["a", "b"]), Some(json!(9)), &root);
        assert_eq!(written, json!({"a": {"b": 9, "c": 2}, "d": [1, 2]}));
        // input untouched
        assert_eq!(root["a"]["b"], 1);
    }

    #[test]
    fn test_write_back_replaces_arrays_at_the_leaf() {
        let root = json!({"rows": ["a", "b", "c"]});
        let written = write_back(&[PathSegment::list("rows")], Some(json!(["x"])), &root);
        assert_eq!(written, json!({"rows": ["x"]}));
    }

    #[test]
    fn test_write_back_is_idempotent() {
        let root = json!({"a": {"b": [1, {"c": 2}]}, "z": null});
        let p = path(&["a", "b"]);
        let once = write_back(&p, Some(json!([3])), &root);
        let twice = write_back(&p, Some(json!([3])), &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_undefined_never_overwrites() {
        let root = json!({"a": {"b": 1}});
        assert_eq!(write_back(&path(&["a", "b"]), None, &root), root);
        assert_eq!(write_back(&path(&["new", "deep"]), None, &root), root);
    }

    #[test]
    fn test_explicit_null_overwrites() {
        let root = json!({"a": 1});
        assert_eq!(write_back(&path(&["a"]), Some(Value::Null), &root), json!({"a": null}));
    }

    #[test]
    fn test_empty_path_merges_into_root() {
        let root = json!({"a": 1});
        assert_eq!(write_back(&[], Some(json!({"b": 2})), &root), json!({"a": 1, "b": 2}));
    }
}
