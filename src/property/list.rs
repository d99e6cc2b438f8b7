//! Row identity for List controls.
//!
//! A List control renders one row per array element and needs a stable id per
//! row (collapse state, focus, widget ids) even when the bound array is
//! replaced from outside. [`ListState`] keeps that identity map; replacements
//! are diffed against the state's own decoded view and only the rows that
//! actually changed are touched.
//!
//! [`ListBinding`] couples the state with a trailing-edge [`Debouncer`] that
//! delays pushing local edits to the owning form.

use super::analyse::analyse_with;
use super::getter::GetterRunner;
use super::schema::PropertyDefine;
use crate::diff::{array_diffs, values_equal, ArrayDiff, DiffKind};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use uuid::Uuid;

/// Stable identity of one List row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(Uuid);

impl RowId {
    fn new() -> Self {
        RowId(Uuid::new_v4())
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A row in the identity map.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRow {
    /// Sort key; rows decode in ascending index order
    pub index: u64,
    /// The element value
    pub value: Value,
}

/// Inputs of the List state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    /// User appended a row
    AddRow(Value),
    /// User removed a row
    DeleteRow(RowId),
    /// User edited a row
    ModifyRow(RowId, Value),
    /// The bound array changed upstream
    Replace(Vec<Value>),
}

/// Identity map of a List control.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    rows: HashMap<RowId, ListRow>,
    next_index: u64,
    last_emitted: Option<Vec<Value>>,
}

impl ListState {
    /// Builds the map for an initial array.
    pub fn seed(values: &[Value]) -> Self {
        let mut state = Self::default();
        for value in values {
            state.push_row(value.clone());
        }
        state
    }

    /// Applies one event and returns the next state.
    pub fn apply(mut self, event: ListEvent) -> Self {
        match event {
            ListEvent::AddRow(value) => {
                self.push_row(value);
            }
            ListEvent::DeleteRow(id) => {
                if self.rows.remove(&id).is_none() {
                    log::debug!("Delete of unknown list row {id}");
                }
            }
            ListEvent::ModifyRow(id, value) => match self.rows.get_mut(&id) {
                Some(row) => row.value = value,
                None => log::debug!("Edit of unknown list row {id}"),
            },
            ListEvent::Replace(values) => {
                self.reconcile(&values);
            }
        }
        self
    }

    fn push_row(&mut self, value: Value) -> RowId {
        let id = RowId::new();
        self.rows.insert(
            id,
            ListRow {
                index: self.next_index,
                value,
            },
        );
        self.next_index += 1;
        id
    }

    /// Row ids in display order.
    pub fn ordered_ids(&self) -> Vec<RowId> {
        let mut ids: Vec<(u64, RowId)> = self.rows.iter().map(|(id, row)| (row.index, *id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Rows in display order.
    pub fn rows(&self) -> Vec<(RowId, &Value)> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|id| self.rows.get(&id).map(|row| (id, &row.value)))
            .collect()
    }

    /// A single row.
    pub fn row(&self, id: RowId) -> Option<&ListRow> {
        self.rows.get(&id)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The plain array this map represents.
    pub fn decode(&self) -> Vec<Value> {
        self.rows().into_iter().map(|(_, value)| value.clone()).collect()
    }

    /// Records the array that was last pushed upstream.
    pub fn mark_emitted(&mut self, values: Vec<Value>) {
        self.last_emitted = Some(values);
    }

    /// Brings the map in line with an upstream array and returns the diff
    /// that was applied.
    ///
    /// Only the first upstream array seen after an emit can be its echo; the
    /// emitted array is forgotten either way, so a later identical array
    /// (an undo/redo of the same edit) reconciles normally.
    pub fn reconcile(&mut self, external: &[Value]) -> Vec<ArrayDiff> {
        if let Some(emitted) = self.last_emitted.take() {
            if emitted.len() == external.len() && emitted.iter().zip(external).all(|(a, b)| values_equal(a, b)) {
                return Vec::new();
            }
        }

        let current = self.decode();
        let diffs = array_diffs(&current, external);
        if diffs.is_empty() {
            return diffs;
        }

        let ids = self.ordered_ids();
        let mut deleted = BTreeSet::new();
        let mut added = BTreeMap::new();
        for diff in &diffs {
            match diff.kind {
                DiffKind::Modify => {
                    if let Some(row) = ids.get(diff.index).and_then(|id| self.rows.get_mut(id)) {
                        row.value = diff.value.clone().unwrap_or(Value::Null);
                    }
                }
                DiffKind::Delete => {
                    deleted.insert(diff.index);
                }
                DiffKind::Add => {
                    added.insert(diff.index, diff.value.clone().unwrap_or(Value::Null));
                }
            }
        }

        for index in &deleted {
            if let Some(id) = ids.get(*index) {
                self.rows.remove(id);
            }
        }

        // Surviving rows keep their relative order; new rows slot in at their target index.
        let mut kept = ids
            .iter()
            .enumerate()
            .filter(|(index, _)| !deleted.contains(index))
            .map(|(_, id)| *id);
        let mut order = Vec::with_capacity(external.len());
        for position in 0..external.len() {
            if let Some(value) = added.remove(&position) {
                order.push(self.push_row(value));
            } else if let Some(id) = kept.next() {
                order.push(id);
            }
        }
        for (index, id) in order.iter().enumerate() {
            if let Some(row) = self.rows.get_mut(id) {
                row.index = index as u64;
            }
        }
        self.next_index = order.len() as u64;

        if !values_equal(&Value::Array(self.decode()), &Value::Array(external.to_vec())) {
            log::warn!("List rows drifted from the bound array; rebuilding by position");
            self.rebuild(external, &order);
        }

        log::debug!("Reconciled list rows: {} change(s)", diffs.len());
        diffs
    }

    fn rebuild(&mut self, external: &[Value], order: &[RowId]) {
        self.rows.clear();
        self.next_index = 0;
        for (position, value) in external.iter().enumerate() {
            let id = order.get(position).copied().unwrap_or_else(RowId::new);
            self.rows.insert(
                id,
                ListRow {
                    index: self.next_index,
                    value: value.clone(),
                },
            );
            self.next_index += 1;
        }
    }
}

/// Trailing-edge debouncer over caller-supplied timestamps (seconds).
///
/// Every `schedule` re-arms the deadline; only the most recent value fires.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay: f64,
    pending: Option<(f64, T)>,
}

impl<T> Debouncer<T> {
    /// Creates a debouncer with the given window.
    pub fn new(delay: f64) -> Self {
        Self { delay, pending: None }
    }

    /// Replaces any pending value and restarts the window at `now`.
    pub fn schedule(&mut self, value: T, now: f64) {
        self.pending = Some((now + self.delay, value));
    }

    /// Takes the pending value once its window has elapsed.
    pub fn poll(&mut self, now: f64) -> Option<T> {
        match &self.pending {
            Some((deadline, _)) if now >= *deadline => self.pending.take().map(|(_, value)| value),
            _ => None,
        }
    }

    /// Seconds until the pending value fires.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.pending.as_ref().map(|(deadline, _)| (deadline - now).max(0.0))
    }

    /// True while a value is waiting.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A List control's row identity plus its debounced upstream emission.
#[derive(Debug, Clone)]
pub struct ListBinding {
    state: ListState,
    emitter: Debouncer<Vec<Value>>,
    last_external: Vec<Value>,
}

impl ListBinding {
    /// Seeds the binding from the array currently bound to the control.
    pub fn new(initial: &[Value], delay: f64) -> Self {
        let mut state = ListState::seed(initial);
        state.mark_emitted(initial.to_vec());
        Self {
            state,
            emitter: Debouncer::new(delay),
            last_external: initial.to_vec(),
        }
    }

    /// Current identity map.
    pub fn state(&self) -> &ListState {
        &self.state
    }

    /// Applies a local edit right away and schedules the upstream push.
    pub fn edit(&mut self, event: ListEvent, now: f64) {
        self.state = std::mem::take(&mut self.state).apply(event);
        self.emitter.schedule(self.state.decode(), now);
    }

    /// Feeds the array currently bound upstream. Only a change since the
    /// previous call triggers reconciliation.
    pub fn observe(&mut self, external: &[Value]) -> Vec<ArrayDiff> {
        let unchanged = self.last_external.len() == external.len()
            && self.last_external.iter().zip(external).all(|(a, b)| values_equal(a, b));
        if unchanged {
            return Vec::new();
        }
        self.last_external = external.to_vec();
        self.state.reconcile(external)
    }

    /// Returns the array to push upstream once the debounce window elapsed.
    pub fn poll(&mut self, now: f64) -> Option<Vec<Value>> {
        let values = self.emitter.poll(now)?;
        self.state.mark_emitted(values.clone());
        Some(values)
    }

    /// Seconds until a pending push fires.
    pub fn remaining(&self, now: f64) -> Option<f64> {
        self.emitter.remaining(now)
    }
}

/// Value tree a row's template is rendered against: `{template.key: row}`.
pub fn row_scope(template: &PropertyDefine, row: &Value) -> Value {
    let mut scope = Map::new();
    scope.insert(template.key.clone(), row.clone());
    Value::Object(scope)
}

/// Extracts the row value back out of a row scope.
pub fn row_from_scope(template: &PropertyDefine, scope: &Value) -> Value {
    scope.get(&template.key).cloned().unwrap_or(Value::Null)
}

/// Initial value of a row added by the user, built from the template's defaults.
pub fn template_default(template: &PropertyDefine, runner: &mut GetterRunner, injects: &Value) -> Value {
    let analysis = analyse_with(std::slice::from_ref(template), runner, injects);
    row_from_scope(template, &analysis.defaults)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::schema::{CollapseParams, Ctrl, InputParams};
    use serde_json::json;

    fn values(value: Value) -> Vec<Value> {
        value.as_array().cloned().unwrap_or_default()
    }

    #[test]
    fn test_seed_decodes_to_the_initial_array() {
        let state = ListState::seed(&values(json!(["a", "b", "c"])));
        assert_eq!(state.decode(), values(json!(["a", "b", "c"])));
        assert_eq!(state.len(), 3);
    }

    #[test]
    fn test_replacement_keeps_identity_of_unchanged_ends() {
        let mut state = ListState::seed(&values(json!(["a", "b", "c"])));
        let before = state.ordered_ids();

        let diffs = state.reconcile(&values(json!(["a", "x", "c"])));
        assert_eq!(diffs.len(), 1);
        assert_eq!(state.ordered_ids(), before);
        assert_eq!(state.row(before[1]).unwrap().value, json!("x"));
        assert_eq!(state.decode(), values(json!(["a", "x", "c"])));
    }

    #[test]
    fn test_echo_of_emitted_array_is_ignored() {
        let mut state = ListState::seed(&values(json!(["a"])));
        let emitted = values(json!(["a", "b"]));
        state.mark_emitted(emitted.clone());
        assert!(state.reconcile(&emitted).is_empty());
        assert_eq!(state.decode(), values(json!(["a"])));
    }

    #[test]
    fn test_insertion_at_front_keeps_existing_rows() {
        let mut state = ListState::seed(&values(json!(["a", "b"])));
        let before = state.ordered_ids();
        state.reconcile(&values(json!(["x", "a", "b"])));
        let after = state.ordered_ids();
        assert_eq!(state.decode(), values(json!(["x", "a", "b"])));
        assert_eq!(&after[1..], &before[..]);
        assert!(!before.contains(&after[0]));
    }

    #[test]
    fn test_interior_insert_still_decodes_correctly() {
        let mut state = ListState::seed(&values(json!(["a", "b", "c"])));
        let before = state.ordered_ids();
        state.reconcile(&values(json!(["a", "x", "b", "c"])));
        let after = state.ordered_ids();
        assert_eq!(state.decode(), values(json!(["a", "x", "b", "c"])));
        assert_eq!(after[0], before[0]);
        assert_eq!(after[2], before[1]);
        assert_eq!(after[3], before[2]);
    }

    #[test]
    fn test_removal_and_clear() {
        let mut state = ListState::seed(&values(json!([1, 2, 3])));
        let before = state.ordered_ids();
        state.reconcile(&values(json!([1, 3])));
        assert_eq!(state.decode(), values(json!([1, 3])));
        assert_eq!(state.ordered_ids()[0], before[0]);

        state.reconcile(&[]);
        assert!(state.is_empty());
        state.reconcile(&values(json!([7])));
        assert_eq!(state.decode(), values(json!([7])));
    }

    #[test]
    fn test_user_events_apply_immediately() {
        let state = ListState::seed(&values(json!(["a"])));
        let first = state.ordered_ids()[0];
        let state = state.apply(ListEvent::AddRow(json!("b")));
        let second = state.ordered_ids()[1];
        let state = state.apply(ListEvent::ModifyRow(first, json!("A")));
        assert_eq!(state.decode(), values(json!(["A", "b"])));
        let state = state.apply(ListEvent::DeleteRow(first));
        assert_eq!(state.ordered_ids(), vec![second]);
        let state = state.apply(ListEvent::Replace(values(json!(["b", "c"]))));
        assert_eq!(state.ordered_ids()[0], second);
        assert_eq!(state.decode(), values(json!(["b", "c"])));
    }

    #[test]
    fn test_new_rows_sort_after_existing_ones() {
        let state = ListState::seed(&values(json!([1, 2])))
            .apply(ListEvent::AddRow(json!(3)))
            .apply(ListEvent::AddRow(json!(4)));
        let indices: Vec<u64> = state.ordered_ids().iter().map(|id| state.row(*id).unwrap().index).collect();
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(state.decode(), values(json!([1, 2, 3, 4])));
    }

    #[test]
    fn test_debouncer_fires_only_after_quiet_window() {
        let mut debouncer = Debouncer::new(0.1);
        debouncer.schedule(1, 0.0);
        assert_eq!(debouncer.poll(0.05), None);
        debouncer.schedule(2, 0.05);
        assert_eq!(debouncer.poll(0.12), None);
        assert_eq!(debouncer.poll(0.15), Some(2));
        assert!(!debouncer.is_pending());
        assert_eq!(debouncer.poll(1.0), None);
    }

    #[test]
    fn test_binding_emits_after_debounce_and_suppresses_the_echo() {
        let initial = values(json!(["a", "b"]));
        let mut binding = ListBinding::new(&initial, 0.1);
        let ids = binding.state().ordered_ids();

        binding.edit(ListEvent::ModifyRow(ids[1], json!("B")), 1.0);
        // Upstream has not seen the edit yet; the stale array must not revert it.
        assert!(binding.observe(&initial).is_empty());
        assert_eq!(binding.state().decode(), values(json!(["a", "B"])));
        assert_eq!(binding.poll(1.05), None);

        let emitted = binding.poll(1.2).unwrap();
        assert_eq!(emitted, values(json!(["a", "B"])));
        assert!(binding.observe(&emitted).is_empty());
        assert_eq!(binding.state().ordered_ids(), ids);
    }

    #[test]
    fn test_binding_reconciles_undo_and_redo_of_an_emitted_edit() {
        let mut binding = ListBinding::new(&values(json!(["a", "b"])), 0.1);
        let ids = binding.state().ordered_ids();

        binding.edit(ListEvent::DeleteRow(ids[1]), 0.0);
        let emitted = binding.poll(0.2).unwrap();
        assert_eq!(emitted, values(json!(["a"])));
        assert!(binding.observe(&emitted).is_empty());

        // Undo restores the row upstream
        binding.observe(&values(json!(["a", "b"])));
        assert_eq!(binding.state().decode(), values(json!(["a", "b"])));

        // Redo drops it again; no longer an echo
        let diffs = binding.observe(&values(json!(["a"])));
        assert_eq!(diffs.len(), 1);
        assert_eq!(binding.state().decode(), values(json!(["a"])));
        assert_eq!(binding.state().ordered_ids()[0], ids[0]);
    }

    #[test]
    fn test_echo_is_only_suppressed_once() {
        let mut state = ListState::seed(&values(json!(["a"])));
        let emitted = values(json!(["a", "b"]));
        state.mark_emitted(emitted.clone());
        assert!(state.reconcile(&emitted).is_empty());
        assert_eq!(state.reconcile(&emitted).len(), 1);
        assert_eq!(state.decode(), emitted);
    }

    #[test]
    fn test_binding_follows_upstream_changes() {
        let mut binding = ListBinding::new(&values(json!([1, 2, 3])), 0.1);
        let ids = binding.state().ordered_ids();
        let diffs = binding.observe(&values(json!([1, 2])));
        assert_eq!(diffs.len(), 1);
        assert_eq!(binding.state().ordered_ids(), ids[..2].to_vec());
    }

    #[test]
    fn test_row_scope_wraps_and_unwraps() {
        let template = PropertyDefine::new("", Ctrl::Input(InputParams::default()));
        let scope = row_scope(&template, &json!({"k": 1}));
        assert_eq!(scope, json!({"": {"k": 1}}));
        assert_eq!(row_from_scope(&template, &scope), json!({"k": 1}));
    }

    #[test]
    fn test_template_defaults_seed_new_rows() {
        let scalar = PropertyDefine::new(
            "field",
            Ctrl::Input(InputParams {
                default: Some("row".into()),
                ..Default::default()
            }),
        );
        let mut runner = GetterRunner::new();
        assert_eq!(template_default(&scalar, &mut runner, &json!({})), json!("row"));

        let object = PropertyDefine::new(
            "",
            Ctrl::Collapse {
                children: vec![
                    PropertyDefine::new(
                        "key",
                        Ctrl::Input(InputParams {
                            default: Some("Accept".into()),
                            ..Default::default()
                        }),
                    ),
                    PropertyDefine::new("value", Ctrl::Input(InputParams::default())),
                ],
                params: CollapseParams::default(),
            },
        );
        assert_eq!(template_default(&object, &mut runner, &json!({})), json!({"key": "Accept"}));

        let bare = PropertyDefine::new("x", Ctrl::Input(InputParams::default()));
        assert_eq!(template_default(&bare, &mut runner, &json!({})), Value::Null);
    }
}
