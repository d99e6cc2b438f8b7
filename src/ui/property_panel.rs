//! Schema-driven property form.
//!
//! [`PropertyEditor`] renders a control schema against a value tree and
//! reports edits as [`PropertyChange`]s. Analyses are cached per schema text
//! so decorated ids, and with them widget and List row state, stay stable
//! across frames.

use crate::constants::{ANALYSIS_CACHE_LIMIT, LIST_EMIT_DEBOUNCE_SECS};
use crate::diff::values_equal;
use crate::property::list::{row_from_scope, row_scope, template_default};
use crate::property::schema::{Ctrl, PropertyParam, SelectOption};
use crate::property::{
    analyse_with, encode, get_property_value, write_back, Analysis, CtrlType, DecoratedNode, GetterRunner,
    ListBinding, ListEvent, PathSegment, PropertyDefine,
};
use eframe::egui;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

/// An edit made through the form.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// The whole value tree after the edit
    pub values: Value,
    /// Path of the control that changed
    pub path: Vec<PathSegment>,
    /// Its new value
    pub value: Value,
}

/// One control edit: the write-back path and the new value.
type Edit = (Vec<PathSegment>, Value);

#[derive(Clone, Copy)]
struct RenderCx<'a> {
    values: &'a Value,
    injects: &'a Value,
    now: f64,
}

struct ListSlot {
    form: egui::Id,
    binding: ListBinding,
}

/// Renders schemas as egui forms.
#[derive(Default)]
pub struct PropertyEditor {
    analyses: HashMap<String, Rc<Analysis>>,
    lists: HashMap<egui::Id, ListSlot>,
    touched: HashSet<egui::Id>,
    runner: GetterRunner,
}

impl PropertyEditor {
    /// Creates an editor with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decorated tree of `schema`. Only the decoration is reused from the
    /// cache; defaults depend on `injects` and come from [`Self::defaults`].
    fn analysis(&mut self, schema: &[PropertyDefine], injects: &Value) -> Rc<Analysis> {
        let text = encode(schema);
        if let Some(analysis) = self.analyses.get(&text) {
            return Rc::clone(analysis);
        }
        if self.analyses.len() >= ANALYSIS_CACHE_LIMIT {
            log::debug!("Dropping {} cached schema analyses", self.analyses.len());
            self.analyses.clear();
        }
        let analysis = Rc::new(analyse_with(schema, &mut self.runner, injects));
        self.analyses.insert(text, Rc::clone(&analysis));
        analysis
    }

    /// Default value tree of `schema`, with getters evaluated against `injects`.
    pub fn defaults(&mut self, schema: &[PropertyDefine], injects: &Value) -> Value {
        analyse_with(schema, &mut self.runner, injects).defaults
    }

    /// Renders `schema` bound to `values`.
    ///
    /// `id_salt` identifies the form; List rows keep their identity for as
    /// long as the same form keeps rendering them. Returns the last edit of
    /// the frame, with `values` reflecting every edit made in it.
    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        id_salt: impl std::hash::Hash,
        schema: &[PropertyDefine],
        values: &Value,
        injects: &Value,
    ) -> Option<PropertyChange> {
        let form = egui::Id::new(id_salt);
        if schema.is_empty() {
            ui.label(egui::RichText::new("No properties").weak());
            return None;
        }

        let analysis = self.analysis(schema, injects);
        let cx = RenderCx {
            values,
            injects,
            now: ui.input(|i| i.time),
        };
        self.touched.clear();
        let edits = ui.push_id(form, |ui| self.render_nodes(ui, form, form, &analysis.decorated, cx)).inner;

        let touched = std::mem::take(&mut self.touched);
        self.lists.retain(|id, slot| slot.form != form || touched.contains(id));

        let mut tree = values.clone();
        let mut last = None;
        for (path, value) in edits {
            tree = write_back(&path, Some(value.clone()), &tree);
            last = Some((path, value));
        }
        last.map(|(path, value)| PropertyChange {
            values: tree,
            path,
            value,
        })
    }

    fn param<T: DeserializeOwned>(
        &mut self,
        param: &Option<PropertyParam>,
        node: &DecoratedNode,
        cx: RenderCx<'_>,
    ) -> Option<T> {
        self.runner.resolve(param.as_ref(), &node.ctrl, cx.values, cx.injects)
    }

    fn render_nodes(
        &mut self,
        ui: &mut egui::Ui,
        form: egui::Id,
        scope: egui::Id,
        nodes: &[DecoratedNode],
        cx: RenderCx<'_>,
    ) -> Vec<Edit> {
        let mut edits = Vec::new();
        for node in nodes {
            edits.extend(self.render_node(ui, form, scope, node, cx));
        }
        edits
    }

    fn render_node(
        &mut self,
        ui: &mut egui::Ui,
        form: egui::Id,
        scope: egui::Id,
        node: &DecoratedNode,
        cx: RenderCx<'_>,
    ) -> Vec<Edit> {
        let id = scope.with(node.id);
        let current = get_property_value(&node.path, cx.values).cloned().unwrap_or(Value::Null);
        let define = &node.ctrl;

        let value = match &define.ctrl {
            Ctrl::Input(p) => {
                let placeholder: String = self.param(&p.placeholder, node, cx).unwrap_or_default();
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let limit: Option<usize> = self.param(&p.maxlength, node, cx);
                labeled(ui, define, |ui| {
                    let mut text = value_text(&current);
                    let mut edit = egui::TextEdit::singleline(&mut text).hint_text(placeholder);
                    if let Some(limit) = limit {
                        edit = edit.char_limit(limit);
                    }
                    let changed = ui.add_enabled(!disabled, edit).changed();
                    changed.then_some(Value::String(text))
                })
            }
            Ctrl::TextArea(p) => {
                let placeholder: String = self.param(&p.placeholder, node, cx).unwrap_or_default();
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let limit: Option<usize> = self.param(&p.maxlength, node, cx);
                labeled(ui, define, |ui| {
                    let mut text = value_text(&current);
                    let mut edit = egui::TextEdit::multiline(&mut text)
                        .hint_text(placeholder)
                        .desired_rows(3);
                    if let Some(limit) = limit {
                        edit = edit.char_limit(limit);
                    }
                    let changed = ui.add_enabled(!disabled, edit).changed();
                    changed.then_some(Value::String(text))
                })
            }
            Ctrl::InputNumber(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let min: f64 = self.param(&p.min, node, cx).unwrap_or(f64::NEG_INFINITY);
                let max: f64 = self.param(&p.max, node, cx).unwrap_or(f64::INFINITY);
                let precision: Option<usize> = self.param(&p.precision, node, cx);
                labeled(ui, define, |ui| {
                    let mut number = current.as_f64().unwrap_or(0.0);
                    let mut drag = egui::DragValue::new(&mut number).range(min..=max);
                    if let Some(precision) = precision {
                        drag = drag.max_decimals(precision);
                    }
                    let changed = ui.add_enabled(!disabled, drag).changed();
                    changed.then(|| number_value(number))
                })
            }
            Ctrl::Checkbox(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let options: Vec<SelectOption> = self.param(&p.options, node, cx).unwrap_or_default();
                let layout: String = self.param(&p.layout, node, cx).unwrap_or_default();
                labeled(ui, define, |ui| {
                    ui.add_enabled_ui(!disabled, |ui| {
                        if options.is_empty() {
                            let mut checked = current.as_bool().unwrap_or(false);
                            return ui.checkbox(&mut checked, "").changed().then_some(Value::Bool(checked));
                        }
                        let selected: Vec<Value> = current.as_array().cloned().unwrap_or_default();
                        let mut render = |ui: &mut egui::Ui| {
                            let mut changed = None;
                            for option in &options {
                                let mut checked = selected.iter().any(|v| values_equal(v, &option.value));
                                if ui.checkbox(&mut checked, option_text(&option.label)).changed() {
                                    changed = Some(toggle_option(&options, &selected, &option.value, checked));
                                }
                            }
                            changed
                        };
                        if layout == "vertical" {
                            ui.vertical(|ui| render(ui)).inner
                        } else {
                            ui.horizontal_wrapped(|ui| render(ui)).inner
                        }
                    })
                    .inner
                })
            }
            Ctrl::ColorPicker(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let allow_clear = self.param(&p.allow_clear, node, cx).unwrap_or(false);
                labeled(ui, define, |ui| {
                    ui.add_enabled_ui(!disabled, |ui| {
                        ui.horizontal(|ui| {
                            let mut rgb = current.as_str().and_then(parse_hex_color).unwrap_or([0, 0, 0]);
                            let mut changed = ui
                                .color_edit_button_srgb(&mut rgb)
                                .changed()
                                .then(|| Value::String(format_hex_color(rgb)));
                            ui.label(value_text(&current));
                            if allow_clear && !current.is_null() && ui.small_button("Clear").clicked() {
                                changed = Some(Value::Null);
                            }
                            changed
                        })
                        .inner
                    })
                    .inner
                })
            }
            Ctrl::DatePicker(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let format: Option<String> = self.param(&p.format, node, cx);
                let placeholder: String = self
                    .param(&p.placeholder, node, cx)
                    .or(format)
                    .unwrap_or_else(|| "YYYY-MM-DD".to_string());
                labeled(ui, define, |ui| text_field(ui, &current, placeholder, disabled))
            }
            Ctrl::TimePicker(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let format: Option<String> = self.param(&p.format, node, cx);
                let placeholder: String = self
                    .param(&p.placeholder, node, cx)
                    .or(format)
                    .unwrap_or_else(|| "HH:mm:ss".to_string());
                labeled(ui, define, |ui| text_field(ui, &current, placeholder, disabled))
            }
            Ctrl::Radio(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let options: Vec<SelectOption> = self.param(&p.options, node, cx).unwrap_or_default();
                let option_type: String = self.param(&p.option_type, node, cx).unwrap_or_default();
                labeled(ui, define, |ui| {
                    ui.add_enabled_ui(!disabled, |ui| {
                        ui.horizontal_wrapped(|ui| {
                            let mut changed = None;
                            for option in &options {
                                let selected = values_equal(&current, &option.value);
                                let text = option_text(&option.label);
                                let clicked = if option_type == "button" {
                                    ui.selectable_label(selected, text).clicked()
                                } else {
                                    ui.radio(selected, text).clicked()
                                };
                                if clicked && !selected {
                                    changed = Some(option.value.clone());
                                }
                            }
                            changed
                        })
                        .inner
                    })
                    .inner
                })
            }
            Ctrl::Slider(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let min: f64 = self.param(&p.min, node, cx).unwrap_or(0.0);
                let max: f64 = self.param(&p.max, node, cx).unwrap_or(100.0);
                let step: Option<f64> = self.param(&p.step, node, cx);
                labeled(ui, define, |ui| {
                    let mut number = current.as_f64().unwrap_or(min);
                    let mut slider = egui::Slider::new(&mut number, min..=max);
                    if let Some(step) = step.filter(|step| *step > 0.0) {
                        slider = slider.step_by(step);
                    }
                    let changed = ui.add_enabled(!disabled, slider).changed();
                    changed.then(|| number_value(number))
                })
            }
            Ctrl::Switch(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                labeled(ui, define, |ui| switch(ui, &current, disabled))
            }
            Ctrl::CollapseSwitch(_) => labeled(ui, define, |ui| switch(ui, &current, false)),
            Ctrl::Select(p) => {
                let disabled = self.param(&p.disabled, node, cx).unwrap_or(false);
                let placeholder: String = self.param(&p.placeholder, node, cx).unwrap_or_default();
                let options: Vec<SelectOption> = self.param(&p.options, node, cx).unwrap_or_default();
                labeled(ui, define, |ui| {
                    let selected_text = options
                        .iter()
                        .find(|option| values_equal(&current, &option.value))
                        .map(|option| option_text(&option.label))
                        .unwrap_or(placeholder);
                    ui.add_enabled_ui(!disabled, |ui| {
                        let mut changed = None;
                        egui::ComboBox::from_id_salt(id)
                            .selected_text(selected_text)
                            .show_ui(ui, |ui| {
                                for option in &options {
                                    let selected = values_equal(&current, &option.value);
                                    if ui.selectable_label(selected, option_text(&option.label)).clicked() && !selected {
                                        changed = Some(option.value.clone());
                                    }
                                }
                            });
                        changed
                    })
                    .inner
                })
            }
            Ctrl::Divider(p) => {
                let vertical = self.param::<String>(&p.r#type, node, cx).as_deref() == Some("vertical");
                let label_color: Option<String> = self.param(&p.label_color, node, cx);
                if vertical {
                    ui.add(egui::Separator::default().vertical());
                } else {
                    ui.separator();
                }
                if let Some(label) = &define.label {
                    let mut text = egui::RichText::new(label).strong();
                    if let Some([r, g, b]) = label_color.as_deref().and_then(parse_hex_color) {
                        text = text.color(egui::Color32::from_rgb(r, g, b));
                    }
                    ui.label(text);
                }
                None
            }
            Ctrl::Collapse { .. } => return self.render_collapse(ui, form, id, node, cx),
            Ctrl::Flex { params, .. } => {
                let gap: Option<f32> = self.param(&params.gap, node, cx);
                return ui
                    .horizontal_wrapped(|ui| {
                        if let Some(gap) = gap {
                            ui.spacing_mut().item_spacing.x = gap;
                        }
                        self.render_nodes(ui, form, id, &node.children, cx)
                    })
                    .inner;
            }
            Ctrl::Grid { params, .. } => {
                let columns: usize = self.param(&params.columns, node, cx).unwrap_or(2).max(1);
                let gap: f32 = self.param(&params.gap, node, cx).unwrap_or(8.0);
                return egui::Grid::new(id)
                    .num_columns(columns)
                    .spacing([gap, gap])
                    .show(ui, |ui| {
                        let mut edits = Vec::new();
                        for (index, child) in node.children.iter().enumerate() {
                            edits.extend(ui.vertical(|ui| self.render_node(ui, form, id, child, cx)).inner);
                            if (index + 1) % columns == 0 {
                                ui.end_row();
                            }
                        }
                        edits
                    })
                    .inner;
            }
            Ctrl::List { .. } => self.render_list(ui, form, id, node, &current, cx).map(Value::Array),
            Ctrl::Unknown(unknown) => {
                ui.label(
                    egui::RichText::new(format!("Unsupported control '{}'", unknown.type_name))
                        .weak()
                        .italics(),
                );
                None
            }
        };

        value.map(|value| (node.path.clone(), value)).into_iter().collect()
    }

    fn render_collapse(
        &mut self,
        ui: &mut egui::Ui,
        form: egui::Id,
        id: egui::Id,
        node: &DecoratedNode,
        cx: RenderCx<'_>,
    ) -> Vec<Edit> {
        let header_switch = node
            .children
            .iter()
            .find(|child| child.ctrl.ctrl_type() == Some(CtrlType::CollapseSwitch));
        let switch_value = header_switch.and_then(|child| get_property_value(&child.path, cx.values));
        let enabled = switch_value.and_then(Value::as_bool).unwrap_or(true);
        let body: Vec<&DecoratedNode> = node
            .children
            .iter()
            .filter(|child| header_switch.map_or(true, |switch| switch.id != child.id))
            .collect();

        let mut edits = Vec::new();
        let state = egui::collapsing_header::CollapsingState::load_with_default_open(ui.ctx(), id, true);
        let header = state.show_header(ui, |ui| {
            let label = ui.strong(node.ctrl.display_label());
            if let Some(tip) = &node.ctrl.tip {
                label.on_hover_text(tip);
            }
            let switch = header_switch?;
            let mut on = enabled;
            ui.checkbox(&mut on, "")
                .on_hover_text(switch.ctrl.display_label())
                .changed()
                .then(|| (switch.path.clone(), Value::Bool(on)))
        });
        let (_, header_edit, body_edits) = header.body(|ui| {
            ui.add_enabled_ui(enabled, |ui| {
                let mut edits = Vec::new();
                for child in body {
                    edits.extend(self.render_node(ui, form, id, child, cx));
                }
                edits
            })
            .inner
        });
        edits.extend(header_edit.inner);
        if let Some(body_edits) = body_edits {
            edits.extend(body_edits.inner);
        }
        edits
    }

    fn render_list(
        &mut self,
        ui: &mut egui::Ui,
        form: egui::Id,
        id: egui::Id,
        node: &DecoratedNode,
        current: &Value,
        cx: RenderCx<'_>,
    ) -> Option<Vec<Value>> {
        let template = match node.ctrl.list_template() {
            Ok(template) => template.clone(),
            Err(err) => {
                ui.colored_label(ui.visuals().error_fg_color, err.to_string());
                return None;
            }
        };

        let external = current.as_array().cloned().unwrap_or_default();
        self.touched.insert(id);
        let slot = self.lists.entry(id).or_insert_with(|| ListSlot {
            form,
            binding: ListBinding::new(&external, LIST_EMIT_DEBOUNCE_SECS),
        });
        slot.binding.observe(&external);
        let rows: Vec<_> = slot
            .binding
            .state()
            .rows()
            .into_iter()
            .map(|(row_id, value)| (row_id, value.clone()))
            .collect();

        let row_analysis = self.analysis(std::slice::from_ref(&template), cx.injects);
        let mut events = Vec::new();
        ui.group(|ui| {
            let label = ui.strong(node.ctrl.display_label());
            if let Some(tip) = &node.ctrl.tip {
                label.on_hover_text(tip);
            }
            for (index, (row_id, row_value)) in rows.iter().enumerate() {
                let row_id = *row_id;
                let row_tree = row_scope(&template, row_value);
                let row_cx = RenderCx {
                    values: &row_tree,
                    ..cx
                };
                ui.push_id(row_id.to_string(), |ui| {
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(format!("#{}", index + 1)).weak());
                        if ui.small_button("🗑").on_hover_text("Remove row").clicked() {
                            events.push(ListEvent::DeleteRow(row_id));
                        }
                    });
                    let edits = self.render_nodes(ui, form, id.with(row_id), &row_analysis.decorated, row_cx);
                    if !edits.is_empty() {
                        let tree = edits
                            .into_iter()
                            .fold(row_tree.clone(), |tree, (path, value)| write_back(&path, Some(value), &tree));
                        events.push(ListEvent::ModifyRow(row_id, row_from_scope(&template, &tree)));
                    }
                });
            }
            if ui.button("➕ Add row").clicked() {
                events.push(ListEvent::AddRow(template_default(&template, &mut self.runner, cx.injects)));
            }
        });

        let binding = &mut self.lists.get_mut(&id)?.binding;
        for event in events {
            binding.edit(event, cx.now);
        }
        if let Some(remaining) = binding.remaining(cx.now) {
            ui.ctx().request_repaint_after(Duration::from_secs_f64(remaining));
        }
        binding.poll(cx.now)
    }
}

fn labeled<R>(ui: &mut egui::Ui, define: &PropertyDefine, add: impl FnOnce(&mut egui::Ui) -> R) -> R {
    ui.vertical(|ui| {
        let label = ui.label(define.display_label());
        if let Some(tip) = &define.tip {
            label.on_hover_text(tip);
        }
        add(ui)
    })
    .inner
}

fn text_field(ui: &mut egui::Ui, current: &Value, placeholder: String, disabled: bool) -> Option<Value> {
    let mut text = value_text(current);
    let edit = egui::TextEdit::singleline(&mut text).hint_text(placeholder);
    let changed = ui.add_enabled(!disabled, edit).changed();
    changed.then_some(Value::String(text))
}

fn switch(ui: &mut egui::Ui, current: &Value, disabled: bool) -> Option<Value> {
    let mut on = current.as_bool().unwrap_or(false);
    let text = if on { "On" } else { "Off" };
    let changed = ui.add_enabled(!disabled, egui::Checkbox::new(&mut on, text)).changed();
    changed.then_some(Value::Bool(on))
}

/// Text shown for a value in a text field.
fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn option_text(label: &Value) -> String {
    match label {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Integral numbers are written as JSON integers.
fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        Value::from(number as i64)
    } else {
        serde_json::Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

/// Checked option values after toggling one, in option order.
fn toggle_option(options: &[SelectOption], selected: &[Value], value: &Value, checked: bool) -> Value {
    let picked = options
        .iter()
        .filter(|option| {
            if values_equal(&option.value, value) {
                checked
            } else {
                selected.iter().any(|v| values_equal(v, &option.value))
            }
        })
        .map(|option| option.value.clone())
        .collect();
    Value::Array(picked)
}

fn parse_hex_color(text: &str) -> Option<[u8; 3]> {
    let hex = text.strip_prefix('#').filter(|hex| hex.is_ascii())?;
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => hex[..6].to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(expanded.get(i..i + 2)?, 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

fn format_hex_color([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}
