//! Undo/redo functionality for tracking and reversing user actions.
//!
//! Every action knows how to reverse itself: applying an action to the
//! pipeline returns the action that undoes the application, so undo and
//! redo share one code path.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Represents different types of actions that can be undone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum UndoAction {
    /// A node was moved from one position to another
    NodeMoved {
        node_id: NodeId,
        old_position: (f32, f32),
        new_position: (f32, f32),
    },
    /// A node's params were edited in the property panel
    ParamsChanged {
        node_id: NodeId,
        old_params: Value,
        new_params: Value,
    },
    /// A line's params were edited in the property panel
    LineParamsChanged {
        line_id: String,
        old_params: Option<Value>,
        new_params: Option<Value>,
    },
    /// Nodes were created (added from the catalog or pasted)
    NodesCreated {
        node_ids: Vec<NodeId>,
    },
    /// Nodes were deleted together with the lines touching them
    NodesDeleted {
        nodes: Vec<PipelineNode>,
        lines: Vec<Line>,
    },
    /// A line was created
    LineCreated {
        line_id: String,
    },
    /// A line was deleted
    LineDeleted {
        line: Line,
        index: usize,
    },
    /// A node's label was changed
    NodeRenamed {
        node_id: NodeId,
        old_label: String,
        new_label: String,
    },
}

/// Manages undo/redo history for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UndoHistory {
    /// Stack of actions that can be undone
    #[serde(skip)]
    undo_stack: Vec<UndoAction>,
    /// Stack of actions that can be redone
    #[serde(skip)]
    redo_stack: Vec<UndoAction>,
}

impl UndoHistory {
    /// Creates a new empty undo history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action to the undo history.
    ///
    /// This clears the redo stack since a new action invalidates any previously undone actions.
    pub fn push_action(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();

        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Returns true if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pops the most recent action from the undo stack.
    pub fn pop_undo(&mut self) -> Option<UndoAction> {
        self.undo_stack.pop()
    }

    /// Pops the most recent action from the redo stack.
    pub fn pop_redo(&mut self) -> Option<UndoAction> {
        self.redo_stack.pop()
    }

    /// Pushes an action onto the redo stack.
    pub fn push_redo(&mut self, action: UndoAction) {
        self.redo_stack.push(action);
    }

    /// Pushes the reverse of a redone action back onto the undo stack, keeping the redo stack.
    pub fn push_undo(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Extension methods for applying undo/redo actions to a pipeline.
pub trait UndoablePipeline {
    /// Reverses `action` and returns the action that re-applies it.
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction>;

    /// Re-applies an undone action.
    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction>;
}

impl UndoablePipeline for Pipeline {
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        match action {
            UndoAction::NodeMoved {
                node_id,
                old_position,
                new_position,
            } => self.move_node(*node_id, *old_position).then(|| UndoAction::NodeMoved {
                node_id: *node_id,
                old_position: *new_position,
                new_position: *old_position,
            }),
            UndoAction::ParamsChanged {
                node_id,
                old_params,
                new_params,
            } => {
                self.set_node_params(*node_id, old_params.clone()).ok()?;
                Some(UndoAction::ParamsChanged {
                    node_id: *node_id,
                    old_params: new_params.clone(),
                    new_params: old_params.clone(),
                })
            }
            UndoAction::LineParamsChanged {
                line_id,
                old_params,
                new_params,
            } => {
                let line = self.lines.iter_mut().find(|line| line.id == *line_id)?;
                line.params = old_params.clone();
                Some(UndoAction::LineParamsChanged {
                    line_id: line_id.clone(),
                    old_params: new_params.clone(),
                    new_params: old_params.clone(),
                })
            }
            UndoAction::NodesCreated { node_ids } => {
                let removed = self.delete_nodes(node_ids);
                if removed.nodes.is_empty() {
                    return None;
                }
                Some(UndoAction::NodesDeleted {
                    nodes: removed.nodes,
                    lines: removed.lines,
                })
            }
            UndoAction::NodesDeleted { nodes, lines } => {
                for node in nodes {
                    self.add_node(node.clone());
                }
                for line in lines {
                    self.insert_line(line.clone());
                }
                Some(UndoAction::NodesCreated {
                    node_ids: nodes.iter().map(|node| node.id).collect(),
                })
            }
            UndoAction::LineCreated { line_id } => {
                let index = self.lines.iter().position(|line| line.id == *line_id)?;
                let line = self.lines.remove(index);
                Some(UndoAction::LineDeleted { line, index })
            }
            UndoAction::LineDeleted { line, index } => {
                if *index <= self.lines.len() {
                    self.lines.insert(*index, line.clone());
                } else {
                    self.lines.push(line.clone());
                }
                Some(UndoAction::LineCreated {
                    line_id: line.id.clone(),
                })
            }
            UndoAction::NodeRenamed {
                node_id,
                old_label,
                new_label,
            } => {
                self.rename_node(*node_id, old_label.clone()).ok()?;
                Some(UndoAction::NodeRenamed {
                    node_id: *node_id,
                    old_label: new_label.clone(),
                    new_label: old_label.clone(),
                })
            }
        }
    }

    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        // Redo is just applying the reverse of an undo
        self.apply_undo(action)
    }
}
