//! Node templates available from the toolbar.
//!
//! Templates use node-local endpoint ids (`request`, `onSuccess`); instantiating
//! a template prefixes them with the new node's id.

use crate::property::schema::{
    CheckboxParams, CollapseParams, CollapseSwitchParams, ColorPickerParams, DatePickerParams, DividerParams,
    FlexParams, GridParams, InputNumberParams, InputParams, ListParams, RadioParams, SelectParams, SliderParams,
    SwitchParams, TextAreaParams, TimePickerParams,
};
use crate::property::{analyse, Ctrl, PropertyDefine, PropertyParam};
use crate::types::{Action, EndpointId, Event, EventParamDefine, NodeStatus, NodeType, OutPin, PipelineNode};
use serde_json::json;
use uuid::Uuid;

/// Blueprint of a node.
#[derive(Debug, Clone)]
pub struct NodeTemplate {
    /// Display name, also the new node's label
    pub name: String,
    /// Kind of node produced
    pub node_type: NodeType,
    /// Schema of the node's own params
    pub properties: Vec<PropertyDefine>,
    /// Events with node-local ids
    pub events: Vec<Event>,
    /// Actions with node-local ids
    pub actions: Vec<Action>,
}

impl NodeTemplate {
    /// Creates a node from this template at `position`.
    ///
    /// The node's params start out as the defaults of the template's schema.
    pub fn instantiate(&self, position: (f32, f32)) -> PipelineNode {
        let id = Uuid::new_v4();
        let events = self
            .events
            .iter()
            .map(|event| Event {
                id: EndpointId::new(id, &event.id).to_string(),
                ..event.clone()
            })
            .collect();
        let actions = self
            .actions
            .iter()
            .map(|action| Action {
                id: EndpointId::new(id, &action.id).to_string(),
                out_pins: action
                    .out_pins
                    .iter()
                    .map(|pin| OutPin {
                        id: EndpointId::out_pin(id, &action.id, &pin.id).to_string(),
                        ..pin.clone()
                    })
                    .collect(),
                ..action.clone()
            })
            .collect();

        PipelineNode {
            id,
            label: self.name.clone(),
            node_type: self.node_type,
            status: NodeStatus::Normal,
            events,
            actions,
            params: analyse(&self.properties).defaults,
            param_defines: self.properties.clone(),
            position,
        }
    }
}

/// Every template, in toolbar order.
pub fn templates() -> Vec<NodeTemplate> {
    vec![test_template(), http_template()]
}

/// Template for a node type.
pub fn template_for(node_type: NodeType) -> NodeTemplate {
    match node_type {
        NodeType::Test => test_template(),
        NodeType::Http => http_template(),
    }
}

fn event(id: &str, label: &str) -> Event {
    Event {
        id: id.to_string(),
        label: label.to_string(),
        param_defines: Vec::new(),
    }
}

fn out_pin(id: &str, label: &str) -> OutPin {
    OutPin {
        id: id.to_string(),
        label: label.to_string(),
        param_defines: Vec::new(),
    }
}

fn input(key: &str, label: &str) -> PropertyDefine {
    PropertyDefine::new(key, Ctrl::Input(InputParams::default())).with_label(label)
}

fn http_template() -> NodeTemplate {
    let header = PropertyDefine::new(
        "",
        Ctrl::Collapse {
            children: vec![input("key", "Name"), input("value", "Value")],
            params: CollapseParams::default(),
        },
    )
    .with_label("Header");

    NodeTemplate {
        name: "Http".to_string(),
        node_type: NodeType::Http,
        properties: Vec::new(),
        events: Vec::new(),
        actions: vec![Action {
            id: "request".to_string(),
            label: "Request".to_string(),
            out_pins: vec![
                OutPin {
                    param_defines: vec![EventParamDefine {
                        key: "response".to_string(),
                        label: "Response body".to_string(),
                        tip: None,
                    }],
                    ..out_pin("onSuccess", "On success")
                },
                OutPin {
                    param_defines: vec![EventParamDefine {
                        key: "error".to_string(),
                        label: "Error message".to_string(),
                        tip: None,
                    }],
                    ..out_pin("onFail", "On failure")
                },
            ],
            param_defines: vec![
                input("api", "Endpoint URL"),
                input("params", "Query params"),
                PropertyDefine::new(
                    "headers",
                    Ctrl::List {
                        template: vec![header],
                        params: ListParams::default(),
                    },
                )
                .with_label("Headers"),
            ],
        }],
    }
}

/// A schema touching every control kind, elevation and a List.
fn playground_schema() -> Vec<PropertyDefine> {
    let options = json!([
        {"label": "Alpha", "value": "a"},
        {"label": "Beta", "value": "b"},
        {"label": "Gamma", "value": "c"}
    ]);
    vec![
        PropertyDefine::new(
            "Input",
            Ctrl::Input(InputParams {
                default: Some(PropertyParam::getter("() => 'Input'")),
                placeholder: Some("Type here".into()),
                ..Default::default()
            }),
        )
        .with_label("Input")
        .with_tip("Default comes from a getter"),
        PropertyDefine::new(
            "TextArea",
            Ctrl::TextArea(TextAreaParams {
                default: Some("TextArea".into()),
                ..Default::default()
            }),
        )
        .with_label("TextArea"),
        PropertyDefine::new(
            "Collapse",
            Ctrl::Collapse {
                children: vec![
                    PropertyDefine::new(
                        "enabled",
                        Ctrl::CollapseSwitch(CollapseSwitchParams {
                            default: Some(true.into()),
                        }),
                    ),
                    PropertyDefine::new(
                        "Input_global",
                        Ctrl::Input(InputParams {
                            default: Some(PropertyParam::getter("() => 'input_global'")),
                            ..Default::default()
                        }),
                    )
                    .with_label("Elevated input")
                    .elevated(),
                    PropertyDefine::new(
                        "Input_scope",
                        Ctrl::Input(InputParams {
                            default: Some("Input_scope".into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Scoped input"),
                    PropertyDefine::new(
                        "InputNumber",
                        Ctrl::InputNumber(InputNumberParams {
                            default: Some(json!(3).into()),
                            min: Some(json!(0).into()),
                            max: Some(json!(10).into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Number"),
                    PropertyDefine::new(
                        "Slider",
                        Ctrl::Slider(SliderParams {
                            default: Some(json!(30).into()),
                            min: Some(json!(0).into()),
                            max: Some(json!(100).into()),
                            step: Some(json!(5).into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Slider"),
                ],
                params: CollapseParams::default(),
            },
        )
        .with_label("Collapse"),
        PropertyDefine::new("", Ctrl::Divider(DividerParams::default())).with_label("Choices"),
        PropertyDefine::new(
            "choices",
            Ctrl::Grid {
                children: vec![
                    PropertyDefine::new(
                        "Checkbox",
                        Ctrl::Checkbox(CheckboxParams {
                            default: Some(json!(["a"]).into()),
                            options: Some(options.clone().into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Checkbox")
                    .elevated(),
                    PropertyDefine::new(
                        "Radio",
                        Ctrl::Radio(RadioParams {
                            default: Some("b".into()),
                            options: Some(options.clone().into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Radio")
                    .elevated(),
                    PropertyDefine::new(
                        "Select",
                        Ctrl::Select(SelectParams {
                            default: Some("c".into()),
                            options: Some(options.into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Select")
                    .elevated(),
                    PropertyDefine::new(
                        "Switch",
                        Ctrl::Switch(SwitchParams {
                            default: Some(false.into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Switch")
                    .elevated(),
                ],
                params: GridParams {
                    columns: Some(json!(2).into()),
                    ..Default::default()
                },
            },
        ),
        PropertyDefine::new(
            "when",
            Ctrl::Flex {
                children: vec![
                    PropertyDefine::new(
                        "ColorPicker",
                        Ctrl::ColorPicker(ColorPickerParams {
                            default: Some("#1677ff".into()),
                            ..Default::default()
                        }),
                    )
                    .with_label("Color"),
                    PropertyDefine::new("DatePicker", Ctrl::DatePicker(DatePickerParams::default()))
                        .with_label("Date"),
                    PropertyDefine::new("TimePicker", Ctrl::TimePicker(TimePickerParams::default()))
                        .with_label("Time"),
                ],
                params: FlexParams::default(),
            },
        ),
        PropertyDefine::new(
            "List",
            Ctrl::List {
                template: vec![PropertyDefine::new(
                    "item",
                    Ctrl::Input(InputParams {
                        default: Some("row".into()),
                        ..Default::default()
                    }),
                )],
                params: ListParams {
                    default: Some(json!(["a", "b"]).into()),
                },
            },
        )
        .with_label("List"),
    ]
}

fn test_template() -> NodeTemplate {
    NodeTemplate {
        name: "Test".to_string(),
        node_type: NodeType::Test,
        properties: playground_schema(),
        events: vec![event("event", "Event 1"), event("event2", "Event 2")],
        actions: vec![
            Action {
                id: "action".to_string(),
                label: "Action with params".to_string(),
                out_pins: vec![out_pin("outPin1", "Out 1"), out_pin("outPin2", "Out 2")],
                param_defines: playground_schema(),
            },
            Action {
                id: "action2".to_string(),
                label: "Action without params".to_string(),
                out_pins: vec![out_pin("outPin1", "Out 1"), out_pin("outPin2", "Out 2")],
                param_defines: Vec::new(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{decode, encode};
    use crate::types::{EndpointKind, Pipeline};

    #[test]
    fn test_instantiate_prefixes_endpoint_ids() {
        let node = template_for(NodeType::Http).instantiate((10.0, 20.0));
        assert_eq!(node.label, "Http");
        assert_eq!(node.position, (10.0, 20.0));
        assert_eq!(node.actions[0].id, format!("request@{}", node.id));
        assert_eq!(node.actions[0].out_pins[1].id, format!("onFail@request@{}", node.id));
        assert_eq!(node.endpoint_kind(&node.actions[0].out_pins[0].id), Some(EndpointKind::OutPin));
    }

    #[test]
    fn test_node_params_start_as_schema_defaults() {
        let node = template_for(NodeType::Test).instantiate((0.0, 0.0));
        assert_eq!(node.params["Input"], json!("Input"));
        assert_eq!(node.params["Input_global"], json!("input_global"));
        assert_eq!(node.params["Collapse"]["Input_scope"], json!("Input_scope"));
        assert_eq!(node.params["Collapse"]["enabled"], json!(true));
        assert_eq!(node.params["Radio"], json!("b"));
        assert_eq!(node.params["List"], json!(["a", "b"]));
        assert!(node.params.get("choices").is_none());
    }

    #[test]
    fn test_templates_survive_the_codec() {
        for template in templates() {
            assert_eq!(decode(&encode(&template.properties)), template.properties);
            for action in &template.actions {
                assert_eq!(decode(&encode(&action.param_defines)), action.param_defines);
            }
        }
    }

    #[test]
    fn test_http_lines_carry_request_params() {
        let mut pipeline = Pipeline::new("p");
        let test = pipeline.add_node(template_for(NodeType::Test).instantiate((0.0, 0.0)));
        let http = pipeline.add_node(template_for(NodeType::Http).instantiate((200.0, 0.0)));
        let source = pipeline.nodes[&test].events[0].id.clone();
        let target = pipeline.nodes[&http].actions[0].id.clone();
        let line = pipeline.connect(&source, &target).unwrap();
        assert_eq!(line.params, Some(json!({})));
    }
}
