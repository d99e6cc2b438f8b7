//! User interface of the pipeline designer.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main [`DesignerApp`]
//! - `property_panel` - Schema-driven property forms
//! - `file_ops` - Native file save/load
//! - `undo` - Undo/redo history

mod file_ops;
mod property_panel;
mod state;
mod undo;

pub use property_panel::{PropertyChange, PropertyEditor};
pub use state::{DesignerApp, Selection};
pub use undo::{UndoAction, UndoHistory, UndoablePipeline};

use self::state::PendingConfirmAction;
use crate::catalog::{self, NodeTemplate};
use crate::constants::PASTE_OFFSET;
use crate::types::*;
use eframe::egui;
use serde_json::{json, Value};

impl eframe::App for DesignerApp {
    /// Persist settings and the open pipeline between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.to_json() {
            Ok(json) => storage.set_string("app_state", json),
            Err(err) => log::error!("Failed to serialize app state: {err}"),
        }
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.set_visuals(if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        });

        self.handle_pending_operations(ctx);
        self.handle_undo_redo_keys(ctx);
        self.handle_clipboard_keys(ctx);
        self.handle_delete_key(ctx);
        self.handle_file_shortcuts(ctx);

        if ctx.input(|i| i.viewport().close_requested()) {
            if self.file.has_unsaved_changes && !self.file.allow_close_on_next_request {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                self.file.show_unsaved_dialog = true;
                self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
            } else {
                self.file.allow_close_on_next_request = false;
            }
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });

        egui::SidePanel::left("pipeline_panel")
            .resizable(true)
            .default_width(220.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.draw_pipeline_panel(ui));
            });

        let viewport_width = ctx.input(|i| i.screen_rect().width());
        let max_width = (viewport_width * 0.6).max(180.0);
        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(self.properties_panel_width.clamp(180.0, max_width))
            .show(ctx, |ui| {
                self.properties_panel_width = ui.available_width().clamp(180.0, max_width);
                egui::ScrollArea::vertical().show(ui, |ui| self.draw_properties_panel(ui));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| self.draw_lines_panel(ui));
        });

        if self.file.show_unsaved_dialog {
            self.draw_unsaved_dialog(ctx);
        }
    }
}

impl DesignerApp {
    /// Handles file-related keyboard shortcuts: New, Open, Save and Save As.
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (save_as, save, open, new) = ctx.input(|i| {
            let cmd = i.modifiers.command;
            let shift = i.modifiers.shift;
            (
                i.key_pressed(egui::Key::S) && cmd && shift,
                i.key_pressed(egui::Key::S) && cmd && !shift,
                i.key_pressed(egui::Key::O) && cmd,
                i.key_pressed(egui::Key::N) && cmd,
            )
        });
        if save_as {
            self.save_as_pipeline();
        } else if save {
            self.save_pipeline();
        }
        if open {
            self.confirm_or(PendingConfirmAction::Open);
        }
        if new {
            self.confirm_or(PendingConfirmAction::New);
        }
    }

    /// Runs `action` right away, or asks first when there are unsaved changes.
    fn confirm_or(&mut self, action: PendingConfirmAction) {
        if self.file.has_unsaved_changes {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(action);
            return;
        }
        match action {
            PendingConfirmAction::New => self.new_pipeline(),
            PendingConfirmAction::Open => self.load_pipeline(),
            PendingConfirmAction::Quit => {}
        }
    }

    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        let (title, confirm_label) = match self.file.pending_confirm_action {
            Some(PendingConfirmAction::Quit) => ("Unsaved changes: quit?", "Discard and Quit"),
            Some(PendingConfirmAction::New) => ("Unsaved changes: create new?", "Discard and Create New"),
            Some(PendingConfirmAction::Open) => ("Unsaved changes: open file?", "Discard and Open"),
            None => ("Unsaved changes", "Discard"),
        };
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    if ui.button(confirm_label).clicked() {
                        match self.file.pending_confirm_action.take() {
                            Some(PendingConfirmAction::New) => self.new_pipeline(),
                            Some(PendingConfirmAction::Open) => self.load_pipeline(),
                            Some(PendingConfirmAction::Quit) => {
                                self.file.allow_close_on_next_request = true;
                                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                            }
                            None => {}
                        }
                        self.file.show_unsaved_dialog = false;
                    }
                    if ui.button("Cancel").clicked() {
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                });
            });
    }

    /// Handles undo/redo keyboard shortcuts.
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift) {
            self.perform_undo();
        } else if ctx.input(|i| {
            (i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift)
                || (i.key_pressed(egui::Key::Y) && i.modifiers.command)
        }) {
            self.perform_redo();
        }
    }

    /// Copies the checked nodes on Ctrl+C and pastes them on Ctrl+V.
    fn handle_clipboard_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (copy, paste) = ctx.input(|i| {
            (
                i.events.iter().any(|e| matches!(e, egui::Event::Copy)),
                i.events.iter().any(|e| matches!(e, egui::Event::Paste(_))),
            )
        });
        if copy {
            self.copy_nodes();
        }
        if paste {
            self.paste_nodes();
        }
    }

    /// Deletes the checked nodes, or the selected node or line, on Delete.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() || !ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            return;
        }
        if let Some(Selection::Line(line_id)) = self.interaction.selection.clone() {
            self.delete_line(&line_id);
        } else {
            self.delete_nodes();
        }
    }

    /// Nodes an action applies to: the checked ones, else the selected one.
    fn target_nodes(&self) -> Vec<NodeId> {
        if !self.interaction.checked_nodes.is_empty() {
            return self.interaction.checked_nodes.clone();
        }
        self.interaction.selected_node().into_iter().collect()
    }

    /// Adds a node from a catalog template and selects it.
    fn add_node_from_template(&mut self, template: &NodeTemplate) -> NodeId {
        let index = self.pipeline.nodes.len() as f32;
        let node = template.instantiate((index * PASTE_OFFSET, index * PASTE_OFFSET));
        let id = self.pipeline.add_node(node);
        self.undo_history.push_action(UndoAction::NodesCreated { node_ids: vec![id] });
        self.interaction.selection = Some(Selection::Node(id));
        self.file.has_unsaved_changes = true;
        log::debug!("Added {} node {id}", template.name);
        id
    }

    fn delete_nodes(&mut self) {
        let ids = self.target_nodes();
        if ids.is_empty() {
            return;
        }
        let removed = self.pipeline.delete_nodes(&ids);
        if removed.nodes.is_empty() {
            return;
        }
        self.undo_history.push_action(UndoAction::NodesDeleted {
            nodes: removed.nodes,
            lines: removed.lines,
        });
        self.interaction.clear_selection();
        self.file.has_unsaved_changes = true;
    }

    fn delete_line(&mut self, line_id: &str) {
        let Some(index) = self.pipeline.lines.iter().position(|line| line.id == line_id) else {
            return;
        };
        if let Some(line) = self.pipeline.disconnect(line_id) {
            self.undo_history.push_action(UndoAction::LineDeleted { line, index });
            self.interaction.selection = None;
            self.file.has_unsaved_changes = true;
        }
    }

    fn copy_nodes(&mut self) {
        let ids = self.target_nodes();
        if !ids.is_empty() {
            self.interaction.clipboard = self.pipeline.copy_nodes(&ids);
            log::debug!("Copied {} node(s)", ids.len());
        }
    }

    fn paste_nodes(&mut self) {
        if self.interaction.clipboard.is_empty() {
            return;
        }
        let offset = (PASTE_OFFSET, PASTE_OFFSET);
        let ids = self.pipeline.paste(&self.interaction.clipboard, offset);
        // Repeated pastes cascade instead of stacking.
        for node in &mut self.interaction.clipboard.nodes {
            node.position = (node.position.0 + offset.0, node.position.1 + offset.1);
        }
        self.interaction.checked_nodes = ids.clone();
        self.undo_history.push_action(UndoAction::NodesCreated { node_ids: ids });
        self.file.has_unsaved_changes = true;
    }

    fn connect_endpoints(&mut self, source_id: &str, target_id: &str) {
        match self.pipeline.connect(source_id, target_id) {
            Ok(line) => {
                let line_id = line.id.clone();
                self.undo_history.push_action(UndoAction::LineCreated {
                    line_id: line_id.clone(),
                });
                self.interaction.selection = Some(Selection::Line(line_id));
                self.interaction.connect_error = None;
                self.file.has_unsaved_changes = true;
            }
            Err(err) => {
                log::debug!("Connect refused: {err}");
                self.interaction.connect_error = Some(err.to_string());
            }
        }
    }

    fn commit_node_label(&mut self, node_id: NodeId) {
        let new_label = self.interaction.temp_node_label.trim().to_string();
        self.interaction.editing_node_label = None;
        if new_label.is_empty() {
            return;
        }
        if let Ok(old_label) = self.pipeline.rename_node(node_id, new_label.clone()) {
            if old_label != new_label {
                self.undo_history.push_action(UndoAction::NodeRenamed {
                    node_id,
                    old_label,
                    new_label,
                });
                self.file.has_unsaved_changes = true;
            }
        }
    }

    fn apply_node_change(&mut self, node_id: NodeId, change: PropertyChange) {
        match self.pipeline.set_node_params(node_id, change.values.clone()) {
            Ok(old_params) => {
                self.undo_history.push_action(UndoAction::ParamsChanged {
                    node_id,
                    old_params,
                    new_params: change.values,
                });
                self.file.has_unsaved_changes = true;
            }
            Err(err) => log::warn!("Dropped property change: {err}"),
        }
    }

    fn apply_line_change(&mut self, line_id: &str, change: PropertyChange) {
        match self.pipeline.set_line_params(line_id, change.values.clone()) {
            Ok(old_params) => {
                self.undo_history.push_action(UndoAction::LineParamsChanged {
                    line_id: line_id.to_string(),
                    old_params,
                    new_params: Some(change.values),
                });
                self.file.has_unsaved_changes = true;
            }
            Err(err) => log::warn!("Dropped property change: {err}"),
        }
    }

    /// Performs an undo operation.
    fn perform_undo(&mut self) {
        if let Some(action) = self.undo_history.pop_undo() {
            if let Some(redo_action) = self.pipeline.apply_undo(&action) {
                self.undo_history.push_redo(redo_action);
                self.after_history_step();
            }
        }
    }

    /// Performs a redo operation.
    fn perform_redo(&mut self) {
        if let Some(action) = self.undo_history.pop_redo() {
            if let Some(undo_action) = self.pipeline.apply_redo(&action) {
                // push_action would clear the redo stack
                self.undo_history.push_undo(undo_action);
                self.after_history_step();
            }
        }
    }

    fn after_history_step(&mut self) {
        self.file.has_unsaved_changes = true;
        let stale = match &self.interaction.selection {
            Some(Selection::Node(id)) => !self.pipeline.nodes.contains_key(id),
            Some(Selection::Line(id)) => self.pipeline.line(id).is_none(),
            None => false,
        };
        if stale {
            self.interaction.selection = None;
        }
        let nodes = &self.pipeline.nodes;
        self.interaction.checked_nodes.retain(|id| nodes.contains_key(id));
        self.interaction.editing_node_label = None;
    }

    /// Context handed to getters as `injects`.
    fn injects(&self, node_id: Option<NodeId>) -> Value {
        json!({
            "pipelineId": self.pipeline.id,
            "nodeId": node_id,
            "variables": self.pipeline.variables,
        })
    }

    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.confirm_or(PendingConfirmAction::New);
            }
            if ui.button("Open").clicked() {
                self.confirm_or(PendingConfirmAction::Open);
            }
            if ui.button("Save").clicked() {
                self.save_pipeline();
            }
            if ui.button("Save As").clicked() {
                self.save_as_pipeline();
            }
            ui.separator();
            if ui.add_enabled(self.undo_history.can_undo(), egui::Button::new("Undo")).clicked() {
                self.perform_undo();
            }
            if ui.add_enabled(self.undo_history.can_redo(), egui::Button::new("Redo")).clicked() {
                self.perform_redo();
            }
            ui.separator();
            ui.menu_button("Add node", |ui| {
                for template in catalog::templates() {
                    if ui.button(template.name.as_str()).clicked() {
                        self.add_node_from_template(&template);
                        ui.close();
                    }
                }
            });
            let has_targets = !self.target_nodes().is_empty();
            if ui.add_enabled(has_targets, egui::Button::new("Copy")).clicked() {
                self.copy_nodes();
            }
            let can_paste = !self.interaction.clipboard.is_empty();
            if ui.add_enabled(can_paste, egui::Button::new("Paste")).clicked() {
                self.paste_nodes();
            }
            if ui.add_enabled(has_targets, egui::Button::new("Delete")).clicked() {
                self.delete_nodes();
            }
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let icon = if self.dark_mode { "🌙" } else { "☀" };
                if ui.button(icon).on_hover_text("Toggle theme").clicked() {
                    self.dark_mode = !self.dark_mode;
                }
            });
        });
    }

    fn draw_status_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let path = self.file.current_path.as_deref().unwrap_or("(not saved)");
            ui.label(path);
            if self.file.has_unsaved_changes {
                ui.label(egui::RichText::new("● modified").weak());
            }
            if let Some(error) = &self.file.last_error {
                ui.colored_label(ui.visuals().error_fg_color, error.as_str());
            }
        });
    }

    fn draw_pipeline_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Pipeline");
        let mut changed = ui.text_edit_singleline(&mut self.pipeline.name).changed();
        changed |= ui
            .add(
                egui::TextEdit::multiline(&mut self.pipeline.descriptions)
                    .hint_text("Description")
                    .desired_rows(2),
            )
            .changed();
        if changed {
            self.file.has_unsaved_changes = true;
        }

        ui.separator();
        ui.heading("Nodes");
        if self.pipeline.nodes.is_empty() {
            ui.label(egui::RichText::new("Add a node from the toolbar").weak());
        }
        let nodes: Vec<(NodeId, String, NodeType)> = self
            .pipeline
            .sorted_nodes()
            .into_iter()
            .map(|node| (node.id, node.label.clone(), node.node_type))
            .collect();
        for (id, label, node_type) in nodes {
            ui.horizontal(|ui| {
                let mut checked = self.interaction.checked_nodes.contains(&id);
                if ui.checkbox(&mut checked, "").changed() {
                    if checked {
                        self.interaction.checked_nodes.push(id);
                    } else {
                        self.interaction.checked_nodes.retain(|other| *other != id);
                    }
                }
                let selected = self.interaction.selected_node() == Some(id);
                if ui
                    .selectable_label(selected, label.as_str())
                    .on_hover_text(format!("{node_type:?}"))
                    .clicked()
                {
                    self.interaction.selection = Some(Selection::Node(id));
                    self.interaction.editing_node_label = None;
                }
            });
        }
    }

    /// Event and out-pin endpoints as (id, display text).
    fn source_endpoints(&self) -> Vec<(String, String)> {
        let mut sources = Vec::new();
        for node in self.pipeline.sorted_nodes() {
            for event in &node.events {
                sources.push((event.id.clone(), format!("{} / {}", node.label, event.label)));
            }
            for action in &node.actions {
                for pin in &action.out_pins {
                    sources.push((pin.id.clone(), format!("{} / {} / {}", node.label, action.label, pin.label)));
                }
            }
        }
        sources
    }

    /// Action endpoints as (id, display text).
    fn target_endpoints(&self) -> Vec<(String, String)> {
        self.pipeline
            .sorted_nodes()
            .into_iter()
            .flat_map(|node| {
                node.actions
                    .iter()
                    .map(move |action| (action.id.clone(), format!("{} / {}", node.label, action.label)))
            })
            .collect()
    }

    fn endpoint_text(&self, endpoint_id: &str) -> String {
        match self.pipeline.endpoint_node(endpoint_id) {
            Some(node) => format!("{} / {}", node.label, node.endpoint_label(endpoint_id).unwrap_or("?")),
            None => endpoint_id.to_string(),
        }
    }

    fn draw_lines_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Connect");
        let sources = self.source_endpoints();
        let targets = self.target_endpoints();
        endpoint_combo(ui, "connect_source", "From", &sources, &mut self.interaction.connect_source);
        endpoint_combo(ui, "connect_target", "To", &targets, &mut self.interaction.connect_target);
        let pair = self
            .interaction
            .connect_source
            .clone()
            .zip(self.interaction.connect_target.clone());
        if ui.add_enabled(pair.is_some(), egui::Button::new("Connect")).clicked() {
            if let Some((source, target)) = pair {
                self.connect_endpoints(&source, &target);
            }
        }
        if let Some(error) = &self.interaction.connect_error {
            ui.colored_label(ui.visuals().error_fg_color, error.as_str());
        }

        ui.separator();
        ui.heading("Lines");
        if self.pipeline.lines.is_empty() {
            ui.label(egui::RichText::new("No lines yet").weak());
        }
        let lines: Vec<(String, String, String, bool)> = self
            .pipeline
            .lines
            .iter()
            .map(|line| {
                (
                    line.id.clone(),
                    self.endpoint_text(&line.source_id),
                    self.endpoint_text(&line.target_id),
                    line.params.is_some(),
                )
            })
            .collect();
        let mut delete = None;
        for (line_id, source, target, has_params) in lines {
            ui.horizontal(|ui| {
                let selected = self.interaction.selection == Some(Selection::Line(line_id.clone()));
                let text = if has_params {
                    format!("{source} → {target} ⚙")
                } else {
                    format!("{source} → {target}")
                };
                if ui.selectable_label(selected, text).clicked() {
                    self.interaction.selection = Some(Selection::Line(line_id.clone()));
                }
                if ui.small_button("🗑").on_hover_text("Delete line").clicked() {
                    delete = Some(line_id.clone());
                }
            });
        }
        if let Some(line_id) = delete {
            self.delete_line(&line_id);
        }
    }

    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Properties");
        ui.separator();
        match self.interaction.selection.clone() {
            Some(Selection::Node(id)) => self.draw_node_properties(ui, id),
            Some(Selection::Line(id)) => self.draw_line_properties(ui, &id),
            None => {
                ui.label("Select a node or a line to edit its properties.");
            }
        }
    }

    fn draw_node_properties(&mut self, ui: &mut egui::Ui, node_id: NodeId) {
        let Some(node) = self.pipeline.nodes.get(&node_id) else {
            ui.label("Node no longer exists.");
            return;
        };
        let label = node.label.clone();

        ui.horizontal(|ui| {
            ui.label("Label:");
            if self.interaction.editing_node_label == Some(node_id) {
                let response = ui.text_edit_singleline(&mut self.interaction.temp_node_label);
                if response.lost_focus() {
                    self.commit_node_label(node_id);
                } else {
                    response.request_focus();
                }
            } else if ui.button(label.as_str()).on_hover_text("Rename").clicked() {
                self.interaction.editing_node_label = Some(node_id);
                self.interaction.temp_node_label = label.clone();
            }
        });

        let injects = self.injects(Some(node_id));
        let Some(node) = self.pipeline.nodes.get(&node_id) else {
            return;
        };
        ui.label(egui::RichText::new(format!("{:?} · {:?}", node.node_type, node.status)).weak());
        ui.separator();
        let change = self
            .property_editor
            .show(ui, ("node", node_id), &node.param_defines, &node.params, &injects);
        if let Some(change) = change {
            self.apply_node_change(node_id, change);
        }
    }

    fn draw_line_properties(&mut self, ui: &mut egui::Ui, line_id: &str) {
        let Some(line) = self.pipeline.line(line_id) else {
            ui.label("Line no longer exists.");
            return;
        };
        ui.label(format!("From: {}", self.endpoint_text(&line.source_id)));
        ui.label(format!("To: {}", self.endpoint_text(&line.target_id)));
        ui.separator();

        let Some(action) = self.pipeline.line_target_action(line) else {
            ui.label("The target action no longer exists.");
            return;
        };
        let injects = self.injects(EndpointId::decode(&line.target_id).map(|endpoint| endpoint.node_id));
        let values = match &line.params {
            Some(params) => params.clone(),
            None => self.property_editor.defaults(&action.param_defines, &injects),
        };
        let change = self
            .property_editor
            .show(ui, ("line", line_id), &action.param_defines, &values, &injects);
        if let Some(change) = change {
            self.apply_line_change(line_id, change);
        }
    }
}

fn endpoint_combo(
    ui: &mut egui::Ui,
    id_salt: &str,
    label: &str,
    endpoints: &[(String, String)],
    picked: &mut Option<String>,
) {
    ui.horizontal(|ui| {
        ui.label(label);
        let selected_text = picked
            .as_ref()
            .and_then(|id| endpoints.iter().find(|(endpoint, _)| endpoint == id))
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| "Choose…".to_string());
        egui::ComboBox::from_id_salt(id_salt)
            .selected_text(selected_text)
            .width(260.0)
            .show_ui(ui, |ui| {
                for (id, text) in endpoints {
                    ui.selectable_value(picked, Some(id.clone()), text.as_str());
                }
            });
    });
}

#[cfg(test)]
mod tests;
