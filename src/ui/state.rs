//! Application state management structures.
//!
//! This module contains the state structures that track the designer's
//! current UI state: selection, the connect form, file operations and the
//! persisted settings.

use super::property_panel::PropertyEditor;
use super::undo::UndoHistory;
use crate::constants::PROPERTY_PANEL_WIDTH;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};

/// What the property panel is showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A node's own params
    Node(NodeId),
    /// A line's params, shaped by its target action
    Line(String),
}

/// State related to user interactions with nodes and lines.
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InteractionState {
    /// What the property panel is editing
    #[serde(skip)]
    pub selection: Option<Selection>,
    /// Nodes ticked in the node list for copy/delete
    #[serde(skip)]
    pub checked_nodes: Vec<NodeId>,
    /// Node currently being renamed
    #[serde(skip)]
    pub editing_node_label: Option<NodeId>,
    /// Temporary storage for the label while renaming
    #[serde(skip)]
    pub temp_node_label: String,
    /// Source endpoint picked in the connect form
    #[serde(skip)]
    pub connect_source: Option<String>,
    /// Target endpoint picked in the connect form
    #[serde(skip)]
    pub connect_target: Option<String>,
    /// Last refusal of the connect form
    #[serde(skip)]
    pub connect_error: Option<String>,
    /// Nodes copied with Ctrl+C
    #[serde(skip)]
    pub clipboard: Clipboard,
}

impl InteractionState {
    /// The selected node, if a node is selected.
    pub fn selected_node(&self) -> Option<NodeId> {
        match &self.selection {
            Some(Selection::Node(id)) => Some(*id),
            _ => None,
        }
    }

    /// Clears selection and in-progress edits.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.checked_nodes.clear();
        self.editing_node_label = None;
        self.temp_node_label.clear();
    }
}

/// State related to file operations and persistence.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FileState {
    /// Current file path for save/load operations
    #[serde(skip)]
    pub current_path: Option<String>,
    /// Flag indicating if the pipeline has unsaved changes
    #[serde(skip)]
    pub has_unsaved_changes: bool,
    /// Save requested this frame
    #[serde(skip)]
    pub pending_save_operation: Option<PendingSaveOperation>,
    /// Load requested this frame
    #[serde(skip)]
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Channel for receiving file operation results from async contexts
    #[serde(skip)]
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    /// Receiving end polled once per frame
    #[serde(skip)]
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
    /// Whether to show an unsaved-changes confirmation dialog
    #[serde(skip)]
    pub show_unsaved_dialog: bool,
    /// The action the user attempted that requires confirmation
    #[serde(skip)]
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// One-shot flag to allow the next close request to proceed after user confirmation
    #[serde(skip)]
    pub allow_close_on_next_request: bool,
    /// Last file operation failure, shown in the status bar
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            has_unsaved_changes: false,
            pending_save_operation: None,
            pending_load_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
            last_error: None,
        }
    }
}

/// Represents a pending save operation type.
#[derive(Debug)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker)
    SaveAs,
    /// Save to the existing file path
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug)]
pub enum PendingLoadOperation {
    /// Load from a file (show file picker)
    Load,
}

/// Messages sent from async file operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path
    SaveCompleted(String),
    /// Load operation completed successfully with path and content
    LoadCompleted(String, String),
    /// Operation failed with an error message
    OperationFailed(String),
}

/// Pending confirmation actions that may require user approval due to unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// User is attempting to create a new pipeline
    New,
    /// User is attempting to open a file
    Open,
    /// User is attempting to quit the application
    Quit,
}

/// The main application structure containing UI state and the pipeline being edited.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerApp {
    /// The pipeline being edited
    pub pipeline: Pipeline,
    /// Selection and form state
    pub interaction: InteractionState,
    /// File operations state
    pub file: FileState,
    /// Undo/redo history for tracking and reversing actions
    pub undo_history: UndoHistory,
    /// Schema form renderer and its caches
    #[serde(skip)]
    pub property_editor: PropertyEditor,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Remembered width of the properties panel across sessions
    pub properties_panel_width: f32,
}

impl Default for DesignerApp {
    fn default() -> Self {
        Self {
            pipeline: Pipeline::default(),
            interaction: InteractionState::default(),
            file: FileState::default(),
            undo_history: UndoHistory::new(),
            property_editor: PropertyEditor::new(),
            dark_mode: true,
            properties_panel_width: PROPERTY_PANEL_WIDTH,
        }
    }
}

impl DesignerApp {
    /// Serializes the application state to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes application state from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Restores persisted state, falling back to defaults when the stored state is unreadable.
    pub fn restore(storage: Option<&dyn eframe::Storage>) -> Self {
        let Some(json) = storage.and_then(|storage| storage.get_string("app_state")) else {
            return Self::default();
        };
        match Self::from_json(&json) {
            Ok(app) => app,
            Err(err) => {
                log::warn!("Ignoring unreadable app state: {err}");
                Self::default()
            }
        }
    }
}
