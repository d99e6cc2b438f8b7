//! Write-back path resolution.
//!
//! A control's write-back path is the list of keys used to reach its value in
//! the value tree. It normally mirrors the control's ancestor chain, but an
//! elevated control drops the plain (non-List) ancestors collected since the
//! last boundary, and a List always anchors the path: everything above it and
//! its immediate template field stay part of the path.

use super::schema::PropertyDefine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The part of a define that matters for path resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSegment {
    /// Object key of this level
    pub key: String,
    /// Whether the define is a List (array boundary)
    pub is_list: bool,
    /// Whether the define is elevated
    pub is_elevated: bool,
}

impl PathSegment {
    /// Plain object level.
    pub fn field(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_list: false,
            is_elevated: false,
        }
    }

    /// Elevated object level.
    pub fn elevated(key: impl Into<String>) -> Self {
        Self {
            is_elevated: true,
            ..Self::field(key)
        }
    }

    /// Array boundary.
    pub fn list(key: impl Into<String>) -> Self {
        Self {
            is_list: true,
            ..Self::field(key)
        }
    }
}

impl From<&PropertyDefine> for PathSegment {
    fn from(define: &PropertyDefine) -> Self {
        Self {
            key: define.key.clone(),
            is_list: define.is_list(),
            is_elevated: define.is_elevated,
        }
    }
}

/// Resolves the write-back path of the last define in `chain`.
///
/// `chain` runs from the schema root to the control itself, inclusive.
pub fn resolve_path(chain: &[PathSegment]) -> Vec<PathSegment> {
    let mut keyframes: Vec<PathSegment> = Vec::with_capacity(chain.len());
    let mut interpolated: Vec<PathSegment> = Vec::new();

    for segment in chain {
        if segment.is_elevated {
            interpolated.clear();
            keyframes.push(segment.clone());
        } else if segment.is_list {
            keyframes.append(&mut interpolated);
            keyframes.push(segment.clone());
        } else if keyframes.last().is_some_and(|last| last.is_list) {
            interpolated.clear();
            keyframes.push(segment.clone());
        } else {
            interpolated.push(segment.clone());
        }
    }

    keyframes.append(&mut interpolated);
    keyframes
}

/// Keys of a path, for logging and host callbacks.
pub fn path_keys(path: &[PathSegment]) -> Vec<&str> {
    path.iter().map(|segment| segment.key.as_str()).collect()
}

/// Reads the value stored at `path`, if every level exists.
pub fn get_property_value<'a>(path: &[PathSegment], values: &'a Value) -> Option<&'a Value> {
    path.iter()
        .try_fold(values, |current, segment| current.as_object()?.get(&segment.key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(path: &[PathSegment]) -> Vec<&str> {
        path_keys(path)
    }

    #[test]
    fn test_plain_chain_resolves_to_itself() {
        let chain = [PathSegment::field("a"), PathSegment::field("b"), PathSegment::field("c")];
        assert_eq!(resolve_path(&chain), chain.to_vec());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let chain = [
            PathSegment::field("a"),
            PathSegment::list("rows"),
            PathSegment::field("row"),
            PathSegment::elevated("x"),
        ];
        assert_eq!(resolve_path(&chain), resolve_path(&chain.clone()));
    }

    #[test]
    fn test_elevation_discards_interpolated_ancestors() {
        let chain = [PathSegment::field("a"), PathSegment::elevated("b")];
        assert_eq!(keys(&resolve_path(&chain)), vec!["b"]);
    }

    #[test]
    fn test_elevation_keeps_earlier_keyframes() {
        let chain = [
            PathSegment::elevated("a"),
            PathSegment::field("b"),
            PathSegment::elevated("c"),
            PathSegment::field("d"),
        ];
        assert_eq!(keys(&resolve_path(&chain)), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_list_boundary_is_hard() {
        let plain = [PathSegment::list("rows"), PathSegment::field("field")];
        let elevated = [PathSegment::list("rows"), PathSegment::elevated("field")];
        assert_eq!(keys(&resolve_path(&plain)), vec!["rows", "field"]);
        assert_eq!(keys(&resolve_path(&elevated)), vec!["rows", "field"]);
    }

    #[test]
    fn test_list_flushes_pending_ancestors() {
        let chain = [
            PathSegment::field("group"),
            PathSegment::list("rows"),
            PathSegment::field("row"),
            PathSegment::field("inner"),
        ];
        assert_eq!(keys(&resolve_path(&chain)), vec!["group", "rows", "row", "inner"]);
    }

    #[test]
    fn test_elevation_cannot_escape_a_list() {
        let chain = [
            PathSegment::field("group"),
            PathSegment::list("rows"),
            PathSegment::field("row"),
            PathSegment::field("panel"),
            PathSegment::elevated("inner"),
        ];
        assert_eq!(keys(&resolve_path(&chain)), vec!["group", "rows", "row", "inner"]);
    }

    #[test]
    fn test_reads_nested_values() {
        let values = json!({"a": {"b": 3}, "list": [1, 2]});
        let path = [PathSegment::field("a"), PathSegment::field("b")];
        assert_eq!(get_property_value(&path, &values), Some(&json!(3)));
        assert_eq!(get_property_value(&[PathSegment::list("list")], &values), Some(&json!([1, 2])));
        assert_eq!(get_property_value(&[PathSegment::field("missing")], &values), None);
        assert_eq!(get_property_value(&[], &values), Some(&values));
    }
}
