use super::state::FileOperationResult;
use super::*;
use crate::catalog::template_for;
use crate::property::schema::{InputParams, ListParams};
use crate::property::Ctrl;
use crate::property::PropertyDefine;
use eframe::egui;
use serde_json::json;

/// Runs a single egui frame with the provided input events.
fn run_ui_with(events: Vec<egui::Event>, mut f: impl FnMut(&egui::Context)) -> egui::FullOutput {
    run_ui_on(&egui::Context::default(), raw_input(events, 0.0), |ctx| f(ctx))
}

fn raw_input(events: Vec<egui::Event>, time: f64) -> egui::RawInput {
    let mut raw = egui::RawInput::default();
    raw.screen_rect = Some(egui::Rect::from_min_size(
        egui::Pos2::ZERO,
        egui::vec2(1200.0, 800.0),
    ));
    raw.time = Some(time);
    raw.events = events;
    raw
}

fn run_ui_on(
    ctx: &egui::Context,
    raw: egui::RawInput,
    mut f: impl FnMut(&egui::Context),
) -> egui::FullOutput {
    ctx.run(raw, |ctx| {
        ctx.set_visuals(egui::Visuals::dark());
        f(ctx);
    })
}

fn command_key(key: egui::Key, modifiers: egui::Modifiers) -> egui::Event {
    egui::Event::Key {
        key,
        physical_key: None,
        pressed: true,
        repeat: false,
        modifiers,
    }
}

/// App with one Test node and one Http node, wired event -> request.
fn wired_app() -> (DesignerApp, NodeId, NodeId, String) {
    let mut app = DesignerApp::default();
    let test_id = app.add_node_from_template(&template_for(NodeType::Test));
    let http_id = app.add_node_from_template(&template_for(NodeType::Http));
    let source = EndpointId::new(test_id, "event").to_string();
    let target = EndpointId::new(http_id, "request").to_string();
    app.connect_endpoints(&source, &target);
    let line_id = encode_line_id(&source, &target);
    (app, test_id, http_id, line_id)
}

#[test]
fn undo_operation_removes_last_created_node() {
    let mut app = DesignerApp::default();
    let id = app.add_node_from_template(&template_for(NodeType::Http));
    assert!(app.pipeline.nodes.contains_key(&id));
    assert_eq!(app.interaction.selected_node(), Some(id));
    assert!(app.file.has_unsaved_changes);

    app.perform_undo();
    assert!(app.pipeline.nodes.is_empty());
    assert_eq!(app.interaction.selection, None, "stale selection is cleared");

    app.perform_redo();
    assert!(app.pipeline.nodes.contains_key(&id));
}

#[test]
fn deleting_nodes_takes_their_lines_and_undo_restores_both() {
    let (mut app, test_id, _, line_id) = wired_app();
    assert!(app.pipeline.line(&line_id).is_some());

    app.interaction.checked_nodes = vec![test_id];
    app.delete_nodes();
    assert!(!app.pipeline.nodes.contains_key(&test_id));
    assert!(app.pipeline.lines.is_empty());
    assert!(app.interaction.checked_nodes.is_empty());

    app.perform_undo();
    assert!(app.pipeline.nodes.contains_key(&test_id));
    assert!(app.pipeline.line(&line_id).is_some());
}

#[test]
fn connecting_seeds_line_params_and_reports_refusals() {
    let (mut app, test_id, http_id, line_id) = wired_app();
    let line = app.pipeline.line(&line_id).expect("line exists");
    assert_eq!(line.status, LineStatus::DefaultWithParam);
    let params = line.params.clone().expect("params seeded from the action schema");
    assert!(params.get("api").is_some());
    assert_eq!(app.interaction.selection, Some(Selection::Line(line_id.clone())));
    assert_eq!(app.interaction.connect_error, None);

    // Same pair again
    let source = EndpointId::new(test_id, "event").to_string();
    let target = EndpointId::new(http_id, "request").to_string();
    app.connect_endpoints(&source, &target);
    assert!(app.interaction.connect_error.is_some());
    assert_eq!(app.pipeline.lines.len(), 1);

    // Undo the first connect
    app.perform_undo();
    assert!(app.pipeline.lines.is_empty());
}

#[test]
fn deleting_a_line_undoes_back_into_place() {
    let (mut app, test_id, http_id, line_id) = wired_app();
    let second_source = EndpointId::new(test_id, "event2").to_string();
    let target = EndpointId::new(http_id, "request").to_string();
    app.connect_endpoints(&second_source, &target);
    assert_eq!(app.pipeline.lines.len(), 2);

    app.delete_line(&line_id);
    assert_eq!(app.pipeline.lines.len(), 1);

    app.perform_undo();
    assert_eq!(app.pipeline.lines[0].id, line_id, "line returns to its index");
}

#[test]
fn property_changes_are_undoable() {
    let mut app = DesignerApp::default();
    let id = app.add_node_from_template(&template_for(NodeType::Http));
    let old_params = app.pipeline.nodes[&id].params.clone();

    let mut new_params = old_params.clone();
    new_params["api"] = json!("https://example.com");
    app.apply_node_change(
        id,
        PropertyChange {
            values: new_params.clone(),
            path: Vec::new(),
            value: json!("https://example.com"),
        },
    );
    assert_eq!(app.pipeline.nodes[&id].params, new_params);

    app.perform_undo();
    assert_eq!(app.pipeline.nodes[&id].params, old_params);
    app.perform_redo();
    assert_eq!(app.pipeline.nodes[&id].params, new_params);
}

#[test]
fn line_property_changes_are_undoable() {
    let (mut app, _, _, line_id) = wired_app();
    let seeded = app.pipeline.line(&line_id).and_then(|line| line.params.clone());

    app.apply_line_change(
        &line_id,
        PropertyChange {
            values: json!({"api": "/ping"}),
            path: Vec::new(),
            value: json!("/ping"),
        },
    );
    assert_eq!(
        app.pipeline.line(&line_id).and_then(|line| line.params.clone()),
        Some(json!({"api": "/ping"}))
    );

    app.perform_undo();
    assert_eq!(app.pipeline.line(&line_id).and_then(|line| line.params.clone()), seeded);
}

#[test]
fn renaming_a_node_trims_and_records_history() {
    let mut app = DesignerApp::default();
    let id = app.add_node_from_template(&template_for(NodeType::Http));

    app.interaction.editing_node_label = Some(id);
    app.interaction.temp_node_label = "  Fetch user  ".to_string();
    app.commit_node_label(id);
    assert_eq!(app.pipeline.nodes[&id].label, "Fetch user");
    assert_eq!(app.interaction.editing_node_label, None);

    // Blank labels are ignored
    app.interaction.temp_node_label = "   ".to_string();
    app.commit_node_label(id);
    assert_eq!(app.pipeline.nodes[&id].label, "Fetch user");

    app.perform_undo();
    assert_eq!(app.pipeline.nodes[&id].label, "Http");
}

#[test]
fn copy_paste_creates_fresh_nodes_and_cascades() {
    let (mut app, test_id, http_id, _) = wired_app();
    app.interaction.checked_nodes = vec![test_id, http_id];
    app.copy_nodes();

    app.paste_nodes();
    assert_eq!(app.pipeline.nodes.len(), 4);
    assert_eq!(app.pipeline.lines.len(), 2, "internal lines are pasted too");
    let first_paste = app.interaction.checked_nodes.clone();
    assert_eq!(first_paste.len(), 2);
    assert!(!first_paste.contains(&test_id));

    app.paste_nodes();
    assert_eq!(app.pipeline.nodes.len(), 6);
    let original = app.pipeline.nodes[&test_id].position;
    let mut positions: Vec<(f32, f32)> = app
        .pipeline
        .nodes
        .values()
        .filter(|node| node.node_type == NodeType::Test)
        .map(|node| node.position)
        .collect();
    positions.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_eq!(positions[0], original);
    assert_eq!(positions[1], (original.0 + PASTE_OFFSET, original.1 + PASTE_OFFSET));
    assert_eq!(positions[2], (original.0 + 2.0 * PASTE_OFFSET, original.1 + 2.0 * PASTE_OFFSET));

    app.perform_undo();
    assert_eq!(app.pipeline.nodes.len(), 4);
}

#[test]
fn moving_a_node_is_reversible() {
    let mut pipeline = Pipeline::default();
    let node = template_for(NodeType::Http).instantiate((0.0, 0.0));
    let id = pipeline.add_node(node);
    pipeline.move_node(id, (10.0, 20.0));

    let action = UndoAction::NodeMoved {
        node_id: id,
        old_position: (0.0, 0.0),
        new_position: (10.0, 20.0),
    };
    let redo = pipeline.apply_undo(&action).expect("node exists");
    assert_eq!(pipeline.nodes[&id].position, (0.0, 0.0));
    pipeline.apply_redo(&redo);
    assert_eq!(pipeline.nodes[&id].position, (10.0, 20.0));
}

#[test]
fn undo_history_is_capped() {
    let mut history = UndoHistory::new();
    for _ in 0..crate::constants::MAX_UNDO_HISTORY + 5 {
        history.push_action(UndoAction::NodesCreated { node_ids: Vec::new() });
    }
    let mut count = 0;
    while history.pop_undo().is_some() {
        count += 1;
    }
    assert_eq!(count, crate::constants::MAX_UNDO_HISTORY);
}

#[test]
fn keyboard_shortcuts_undo_and_redo() {
    let mut app = DesignerApp::default();
    let id = app.add_node_from_template(&template_for(NodeType::Http));

    let ctx = egui::Context::default();
    let mut raw = raw_input(vec![command_key(egui::Key::Z, egui::Modifiers::COMMAND)], 0.0);
    raw.modifiers = egui::Modifiers::COMMAND;
    run_ui_on(&ctx, raw, |ctx| app.handle_undo_redo_keys(ctx));
    assert!(!app.pipeline.nodes.contains_key(&id));

    let mut raw = raw_input(vec![command_key(egui::Key::Y, egui::Modifiers::COMMAND)], 0.1);
    raw.modifiers = egui::Modifiers::COMMAND;
    run_ui_on(&ctx, raw, |ctx| app.handle_undo_redo_keys(ctx));
    assert!(app.pipeline.nodes.contains_key(&id));
}

#[test]
fn copy_and_paste_events_duplicate_the_selection() {
    let mut app = DesignerApp::default();
    app.add_node_from_template(&template_for(NodeType::Http));

    run_ui_with(vec![egui::Event::Copy], |ctx| app.handle_clipboard_keys(ctx));
    assert!(!app.interaction.clipboard.is_empty());

    run_ui_with(vec![egui::Event::Paste(String::new())], |ctx| app.handle_clipboard_keys(ctx));
    assert_eq!(app.pipeline.nodes.len(), 2);
}

#[test]
fn property_panel_renders_every_control_without_emitting() {
    let mut app = DesignerApp::default();
    let id = app.add_node_from_template(&template_for(NodeType::Test));
    let before = app.pipeline.nodes[&id].params.clone();

    let ctx = egui::Context::default();
    for frame in 0..3 {
        run_ui_on(&ctx, raw_input(Vec::new(), frame as f64 * 0.05), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| app.draw_properties_panel(ui));
        });
    }
    assert_eq!(app.pipeline.nodes[&id].params, before);
    assert!(app.undo_history.can_undo());
    assert_eq!(app.pipeline.nodes.len(), 1);
}

#[test]
fn line_panel_renders_the_target_action_schema() {
    let (mut app, _, _, line_id) = wired_app();
    app.interaction.selection = Some(Selection::Line(line_id.clone()));
    let before = app.pipeline.line(&line_id).and_then(|line| line.params.clone());

    run_ui_with(Vec::new(), |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| {
            app.draw_properties_panel(ui);
            app.draw_lines_panel(ui);
            app.draw_pipeline_panel(ui);
        });
    });
    assert_eq!(app.pipeline.line(&line_id).and_then(|line| line.params.clone()), before);
}

#[test]
fn list_with_bad_template_renders_without_edits() {
    let schema = vec![PropertyDefine::new(
        "rows",
        Ctrl::List {
            template: vec![
                PropertyDefine::new("a", Ctrl::Input(InputParams::default())),
                PropertyDefine::new("b", Ctrl::Input(InputParams::default())),
            ],
            params: ListParams::default(),
        },
    )];
    let values = json!({"rows": ["x"]});
    let mut editor = PropertyEditor::new();

    let mut change = None;
    run_ui_with(Vec::new(), |ctx| {
        egui::CentralPanel::default().show(ctx, |ui| {
            change = editor.show(ui, "bad", &schema, &values, &json!({}));
        });
    });
    assert_eq!(change, None);
}

#[test]
fn list_follows_external_values_without_echoing() {
    let schema = vec![PropertyDefine::new(
        "tags",
        Ctrl::List {
            template: vec![PropertyDefine::new("", Ctrl::Input(InputParams::default()))],
            params: ListParams::default(),
        },
    )];
    let mut editor = PropertyEditor::new();
    let ctx = egui::Context::default();

    let mut changes = Vec::new();
    for (frame, values) in [json!({"tags": ["a"]}), json!({"tags": ["a", "b"]}), json!({"tags": []})]
        .iter()
        .enumerate()
    {
        // Frames well apart so any pending emit would have fired
        run_ui_on(&ctx, raw_input(Vec::new(), frame as f64), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                changes.extend(editor.show(ui, "tags", &schema, values, &json!({})));
            });
        });
    }
    assert!(changes.is_empty(), "external updates are not emitted back: {changes:?}");
}

#[test]
fn loading_a_file_replaces_the_pipeline_and_clears_history() {
    let (mut app, _, _, _) = wired_app();
    let mut other = Pipeline::new("Loaded");
    other.add_node(template_for(NodeType::Http).instantiate((0.0, 0.0)));
    let json = other.to_json().expect("serializes");

    app.apply_file_result(FileOperationResult::LoadCompleted("/tmp/loaded.json".into(), json));
    assert_eq!(app.pipeline.name, "Loaded");
    assert_eq!(app.pipeline.nodes.len(), 1);
    assert_eq!(app.file.current_path.as_deref(), Some("/tmp/loaded.json"));
    assert!(!app.file.has_unsaved_changes);
    assert!(!app.undo_history.can_undo());
    assert_eq!(app.interaction.selection, None);
}

#[test]
fn failed_file_operations_keep_the_pipeline() {
    let (mut app, _, _, _) = wired_app();
    app.apply_file_result(FileOperationResult::LoadCompleted("/tmp/bad.json".into(), "{not json".into()));
    assert_eq!(app.pipeline.nodes.len(), 2);
    assert!(app.file.last_error.is_some());

    app.apply_file_result(FileOperationResult::SaveCompleted("/tmp/ok.json".into()));
    assert_eq!(app.file.last_error, None);
    assert!(!app.file.has_unsaved_changes);

    app.apply_file_result(FileOperationResult::OperationFailed("disk full".into()));
    assert_eq!(app.file.last_error.as_deref(), Some("disk full"));
}

#[test]
fn new_pipeline_waits_for_confirmation_when_dirty() {
    let mut app = DesignerApp::default();
    app.add_node_from_template(&template_for(NodeType::Http));

    app.confirm_or(PendingConfirmAction::New);
    assert!(app.file.show_unsaved_dialog);
    assert_eq!(app.pipeline.nodes.len(), 1);

    app.file.has_unsaved_changes = false;
    app.confirm_or(PendingConfirmAction::New);
    assert!(app.pipeline.nodes.is_empty());
}

#[test]
fn app_state_round_trips_through_json() {
    let (mut app, _, _, _) = wired_app();
    app.dark_mode = false;
    let json = app.to_json().expect("serializes");

    let restored = DesignerApp::from_json(&json).expect("deserializes");
    assert_eq!(restored.pipeline, app.pipeline);
    assert!(!restored.dark_mode);
    assert_eq!(restored.interaction.selection, None);
}

#[test]
fn restore_falls_back_to_defaults_without_storage() {
    let app = DesignerApp::restore(None);
    assert!(app.pipeline.nodes.is_empty());
    assert!(app.dark_mode);
}

#[test]
fn injects_carry_variables_and_node_id() {
    let mut app = DesignerApp::default();
    app.pipeline.variables.insert("host".into(), json!("localhost"));
    let id = app.add_node_from_template(&template_for(NodeType::Http));

    let injects = app.injects(Some(id));
    assert_eq!(injects["variables"]["host"], json!("localhost"));
    assert_eq!(injects["nodeId"], json!(id.to_string()));
}
