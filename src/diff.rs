//! Deep value comparison and head/tail array diffing.
//!
//! The diff is not a full LCS: it trims the unchanged head and tail of the two
//! arrays and reports whatever remains as in-place modifications, additions or
//! deletions. Interior moves therefore show up as modify/add/delete pairs,
//! which is fine for the short, hand-edited lists the property panel deals with.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Kind of change reported by [`array_diffs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffKind {
    /// A new element exists at `index` in the target array
    Add,
    /// The element at `index` was replaced in place
    Modify,
    /// The source element at `index` no longer exists
    Delete,
}

/// A single change between two arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayDiff {
    /// What happened at `index`
    #[serde(rename = "type")]
    pub kind: DiffKind,
    /// Target index for `Add`/`Modify`, source index for `Delete`
    pub index: usize,
    /// The new value for `Add`/`Modify`; `None` for deletions found by trimming
    pub value: Option<Value>,
}

impl ArrayDiff {
    fn new(kind: DiffKind, index: usize, value: Option<Value>) -> Self {
        Self { kind, index, value }
    }
}

/// Compares two JSON values for deep equality.
///
/// Numbers compare by numeric value, so `1` and `1.0` are equal even though
/// `serde_json` stores them differently.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x == y {
                return true;
            }
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

/// Computes the changes turning `source` into `target`.
///
/// The result is sorted by index. See the module docs for the trimming rules.
pub fn array_diffs(source: &[Value], target: &[Value]) -> Vec<ArrayDiff> {
    if source.is_empty() && target.is_empty() {
        return Vec::new();
    }
    if source.is_empty() {
        return target
            .iter()
            .enumerate()
            .map(|(index, value)| ArrayDiff::new(DiffKind::Add, index, Some(value.clone())))
            .collect();
    }
    if target.is_empty() {
        return source
            .iter()
            .enumerate()
            .map(|(index, value)| ArrayDiff::new(DiffKind::Delete, index, Some(value.clone())))
            .collect();
    }

    let mut source_left: BTreeMap<usize, &Value> = source.iter().enumerate().collect();
    let mut target_left: BTreeMap<usize, &Value> = BTreeMap::new();

    // Head: same index, same value.
    for (index, item) in target.iter().enumerate() {
        let unchanged = source_left
            .get(&index)
            .is_some_and(|existing| values_equal(item, existing));
        if unchanged {
            source_left.remove(&index);
        } else {
            target_left.insert(index, item);
        }
    }

    // Tail: same distance from the end, stop at the first mismatch.
    for (offset, item) in target.iter().rev().enumerate() {
        let Some(source_index) = source.len().checked_sub(offset + 1) else {
            break;
        };
        let target_index = target.len() - offset - 1;
        let unchanged = source_left
            .get(&source_index)
            .is_some_and(|existing| values_equal(item, existing));
        if !unchanged {
            break;
        }
        target_left.remove(&target_index);
        source_left.remove(&source_index);
    }

    let mut diffs = Vec::with_capacity(target_left.len() + source_left.len());
    for (index, value) in target_left {
        let kind = if source_left.remove(&index).is_some() {
            DiffKind::Modify
        } else {
            DiffKind::Add
        };
        diffs.push(ArrayDiff::new(kind, index, Some(value.clone())));
    }
    for index in source_left.into_keys() {
        diffs.push(ArrayDiff::new(DiffKind::Delete, index, None));
    }
    diffs.sort_by_key(|diff| diff.index);
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arr(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap_or_default()
    }

    #[test]
    fn test_both_empty_yields_nothing() {
        assert!(array_diffs(&[], &[]).is_empty());
    }

    #[test]
    fn test_empty_source_adds_everything() {
        let diffs = array_diffs(&[], &arr(json!(["a", "b"])));
        assert_eq!(
            diffs,
            vec![
                ArrayDiff::new(DiffKind::Add, 0, Some(json!("a"))),
                ArrayDiff::new(DiffKind::Add, 1, Some(json!("b"))),
            ]
        );
    }

    #[test]
    fn test_empty_target_deletes_everything() {
        let diffs = array_diffs(&arr(json!([1, 2])), &[]);
        assert_eq!(diffs.len(), 2);
        assert!(diffs.iter().all(|d| d.kind == DiffKind::Delete));
        assert_eq!(diffs[1].index, 1);
    }

    #[test]
    fn test_interior_change_is_a_single_modify() {
        let diffs = array_diffs(&arr(json!([1, 2, 3])), &arr(json!([1, 9, 3])));
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Modify, 1, Some(json!(9)))]);
    }

    #[test]
    fn test_append_is_a_single_add() {
        let diffs = array_diffs(&arr(json!([1, 2])), &arr(json!([1, 2, 3])));
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Add, 2, Some(json!(3)))]);
    }

    #[test]
    fn test_truncation_is_a_single_delete() {
        let diffs = array_diffs(&arr(json!([1, 2, 3])), &arr(json!([1, 2])));
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Delete, 2, None)]);
    }

    #[test]
    fn test_insertion_at_front_is_anchored_by_tail() {
        let diffs = array_diffs(&arr(json!(["a", "b"])), &arr(json!(["x", "a", "b"])));
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Add, 0, Some(json!("x")))]);
    }

    #[test]
    fn test_removal_from_front_is_a_delete() {
        let diffs = array_diffs(&arr(json!(["x", "a", "b"])), &arr(json!(["a", "b"])));
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Delete, 0, None)]);
    }

    #[test]
    fn test_objects_compare_by_value() {
        let source = arr(json!([{"k": 1, "v": [1, 2]}, {"k": 2}]));
        let target = arr(json!([{"v": [1, 2], "k": 1.0}, {"k": 3}]));
        let diffs = array_diffs(&source, &target);
        assert_eq!(diffs, vec![ArrayDiff::new(DiffKind::Modify, 1, Some(json!({"k": 3})))]);
    }

    #[test]
    fn test_values_equal_is_strict_about_null_and_missing() {
        assert!(!values_equal(&json!({"a": null}), &json!({})));
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!("1"), &json!(1)));
    }
}
