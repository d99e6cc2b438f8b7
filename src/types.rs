//! Core data types of the pipeline designer.
//!
//! A [`Pipeline`] holds nodes, the lines wiring their endpoints together,
//! pipeline variables and the canvas viewport. Endpoints (events, actions and
//! action out-pins) carry string ids that embed the owning node id, so a line
//! can be traced back to its nodes from its id alone.

use crate::constants::{ENDPOINT_ID_SEPARATOR, LINE_ID_SEPARATOR};
use crate::property::{analyse, PropertyDefine};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for pipeline nodes.
pub type NodeId = Uuid;

/// Kind of template a node was created from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Playground node exercising every control kind
    Test,
    /// Issues an HTTP request
    Http,
}

/// Display status of a node.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Idle
    #[default]
    Normal,
    /// Work in progress
    Loading,
    /// Needs attention
    Warning,
    /// Finished successfully
    Success,
    /// Failed
    Error,
    /// Highlighted
    Active,
}

/// Display status of a line.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LineStatus {
    /// Plain line
    #[default]
    Default,
    /// Line that cannot be satisfied
    Invalid,
    /// Highlighted line
    Active,
    /// Plain line carrying params
    DefaultWithParam,
    /// Invalid line carrying params
    InvalidWithParam,
    /// Highlighted line carrying params
    ActiveWithParam,
}

/// What an endpoint id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// A node event; lines start here
    Event,
    /// A node action; lines end here
    Action,
    /// An action result; lines start here
    OutPin,
}

/// Decoded form of an endpoint id: `action@node` or `outPin@action@node`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointId {
    /// Owning node
    pub node_id: NodeId,
    /// Event or action id local to the node
    pub event_action_id: String,
    /// Out-pin id local to the action
    pub out_pin_id: Option<String>,
}

impl EndpointId {
    /// Endpoint of an event or action.
    pub fn new(node_id: NodeId, event_action_id: impl Into<String>) -> Self {
        Self {
            node_id,
            event_action_id: event_action_id.into(),
            out_pin_id: None,
        }
    }

    /// Endpoint of an action out-pin.
    pub fn out_pin(node_id: NodeId, action_id: impl Into<String>, out_pin_id: impl Into<String>) -> Self {
        Self {
            node_id,
            event_action_id: action_id.into(),
            out_pin_id: Some(out_pin_id.into()),
        }
    }

    /// Parses an encoded endpoint id. Returns `None` when the node part is not a node id.
    pub fn decode(id: &str) -> Option<Self> {
        let mut parts = id.rsplit(ENDPOINT_ID_SEPARATOR);
        let node_id = Uuid::parse_str(parts.next()?).ok()?;
        let event_action_id = parts.next()?.to_string();
        let out_pin_id = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            node_id,
            event_action_id,
            out_pin_id,
        })
    }

    /// Same endpoint on another node.
    pub fn with_node(&self, node_id: NodeId) -> Self {
        Self {
            node_id,
            ..self.clone()
        }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(out_pin) = &self.out_pin_id {
            write!(f, "{out_pin}{ENDPOINT_ID_SEPARATOR}")?;
        }
        write!(f, "{}{ENDPOINT_ID_SEPARATOR}{}", self.event_action_id, self.node_id)
    }
}

/// Builds a line id from its endpoint ids.
pub fn encode_line_id(source_id: &str, target_id: &str) -> String {
    format!("{source_id}{LINE_ID_SEPARATOR}{target_id}")
}

/// Splits a line id into its source and target endpoint ids.
pub fn decode_line_id(line_id: &str) -> Option<(&str, &str)> {
    line_id.split_once(LINE_ID_SEPARATOR)
}

/// Describes a value an event or out-pin hands to the next action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventParamDefine {
    /// Field name
    pub key: String,
    /// Display text
    pub label: String,
    /// Optional help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

/// A node event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Endpoint id
    pub id: String,
    /// Display text
    pub label: String,
    /// Values the event provides
    #[serde(default)]
    pub param_defines: Vec<EventParamDefine>,
}

/// A result of an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutPin {
    /// Endpoint id
    pub id: String,
    /// Display text
    pub label: String,
    /// Values the out-pin provides
    #[serde(default)]
    pub param_defines: Vec<EventParamDefine>,
}

/// A node action. Lines into an action carry params shaped by its schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Endpoint id
    pub id: String,
    /// Display text
    pub label: String,
    /// Results of the action
    #[serde(default)]
    pub out_pins: Vec<OutPin>,
    /// Schema of the params a line into this action carries
    #[serde(default)]
    pub param_defines: Vec<PropertyDefine>,
}

/// A single node in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// User-displayable name of the node
    pub label: String,
    /// Template the node was created from
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Current display status
    #[serde(default)]
    pub status: NodeStatus,
    /// Events the node raises
    #[serde(default)]
    pub events: Vec<Event>,
    /// Actions the node performs
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Values bound to `param_defines`
    #[serde(default)]
    pub params: Value,
    /// Schema of the node's own params
    #[serde(default)]
    pub param_defines: Vec<PropertyDefine>,
    /// Position on the canvas as (x, y) coordinates
    pub position: (f32, f32),
}

impl PipelineNode {
    /// Looks up an action by endpoint id.
    pub fn action(&self, id: &str) -> Option<&Action> {
        self.actions.iter().find(|action| action.id == id)
    }

    /// Resolves which of this node's endpoints `id` names.
    pub fn endpoint_kind(&self, id: &str) -> Option<EndpointKind> {
        if self.events.iter().any(|event| event.id == id) {
            return Some(EndpointKind::Event);
        }
        for action in &self.actions {
            if action.id == id {
                return Some(EndpointKind::Action);
            }
            if action.out_pins.iter().any(|pin| pin.id == id) {
                return Some(EndpointKind::OutPin);
            }
        }
        None
    }

    /// Display label of an endpoint.
    pub fn endpoint_label(&self, id: &str) -> Option<&str> {
        if let Some(event) = self.events.iter().find(|event| event.id == id) {
            return Some(&event.label);
        }
        for action in &self.actions {
            if action.id == id {
                return Some(&action.label);
            }
            if let Some(pin) = action.out_pins.iter().find(|pin| pin.id == id) {
                return Some(&pin.label);
            }
        }
        None
    }

    /// Copy of the node under a new id, with every endpoint id rewritten.
    fn rekeyed(&self, id: NodeId) -> Self {
        let rekey = |endpoint: &str| match EndpointId::decode(endpoint) {
            Some(decoded) => decoded.with_node(id).to_string(),
            None => endpoint.to_string(),
        };
        let mut node = self.clone();
        node.id = id;
        for event in &mut node.events {
            event.id = rekey(&event.id);
        }
        for action in &mut node.actions {
            action.id = rekey(&action.id);
            for pin in &mut action.out_pins {
                pin.id = rekey(&pin.id);
            }
        }
        node
    }
}

/// A directed line from an event or out-pin to an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// `source&target`
    pub id: String,
    /// Endpoint the line starts from
    pub source_id: String,
    /// Action endpoint the line ends at
    pub target_id: String,
    /// Current display status
    #[serde(default)]
    pub status: LineStatus,
    /// Values bound to the target action's `param_defines`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Line {
    /// Creates a line between two endpoint ids.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        let source_id = source_id.into();
        let target_id = target_id.into();
        Self {
            id: encode_line_id(&source_id, &target_id),
            source_id,
            target_id,
            status: LineStatus::Default,
            params: None,
        }
    }

    /// Node ids at both ends, when the endpoint ids decode.
    pub fn node_ids(&self) -> Option<(NodeId, NodeId)> {
        let source = EndpointId::decode(&self.source_id)?;
        let target = EndpointId::decode(&self.target_id)?;
        Some((source.node_id, target.node_id))
    }
}

/// Canvas pan and zoom.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    /// Pan offset in canvas units
    pub offset: (f32, f32),
    /// Zoom factor
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset: (0.0, 0.0),
            zoom: 1.0,
        }
    }
}

/// Reasons an edit of the pipeline was refused.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    /// No node owns the endpoint
    #[error("endpoint '{0}' does not exist")]
    UnknownEndpoint(String),
    /// Lines must start at an event or an out-pin
    #[error("endpoint '{0}' cannot start a line")]
    InvalidSource(String),
    /// Lines must end at an action
    #[error("endpoint '{0}' cannot end a line")]
    InvalidTarget(String),
    /// Both ends belong to the same node
    #[error("a line cannot connect a node to itself")]
    SelfLink,
    /// The same two endpoints are already connected
    #[error("line '{0}' already exists")]
    DuplicateLine(String),
    /// No such node
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    /// No such line
    #[error("line '{0}' does not exist")]
    UnknownLine(String),
}

/// Nodes and the lines strictly between them, ready to be pasted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Clipboard {
    /// Copied nodes
    pub nodes: Vec<PipelineNode>,
    /// Copied lines
    pub lines: Vec<Line>,
}

impl Clipboard {
    /// True when nothing was copied.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// What [`Pipeline::delete_nodes`] removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Removed {
    /// Removed nodes
    pub nodes: Vec<PipelineNode>,
    /// Lines removed with them
    pub lines: Vec<Line>,
}

/// A pipeline definition: the document the designer edits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Unique identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Free-form notes
    #[serde(default)]
    pub descriptions: String,
    /// All nodes, indexed by their id
    pub nodes: HashMap<NodeId, PipelineNode>,
    /// All lines
    #[serde(default)]
    pub lines: Vec<Line>,
    /// Pipeline-level variables
    #[serde(default)]
    pub variables: Map<String, Value>,
    /// Canvas pan and zoom
    #[serde(default)]
    pub viewport: Viewport,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new("Untitled pipeline")
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            descriptions: String::new(),
            nodes: HashMap::new(),
            lines: Vec::new(),
            variables: Map::new(),
            viewport: Viewport::default(),
        }
    }

    /// Serialize the pipeline to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a pipeline from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Nodes ordered by label, then id.
    pub fn sorted_nodes(&self) -> Vec<&PipelineNode> {
        let mut nodes: Vec<&PipelineNode> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.label.cmp(&b.label).then(a.id.cmp(&b.id)));
        nodes
    }

    /// Adds a node and returns its id.
    pub fn add_node(&mut self, node: PipelineNode) -> NodeId {
        let id = node.id;
        self.nodes.insert(id, node);
        id
    }

    /// Moves a node. Returns `false` when the node does not exist.
    pub fn move_node(&mut self, id: NodeId, position: (f32, f32)) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    /// Renames a node and returns the previous label.
    pub fn rename_node(&mut self, id: NodeId, label: impl Into<String>) -> Result<String, PipelineError> {
        let node = self.nodes.get_mut(&id).ok_or(PipelineError::UnknownNode(id))?;
        Ok(std::mem::replace(&mut node.label, label.into()))
    }

    /// Replaces a node's params and returns the previous ones.
    pub fn set_node_params(&mut self, id: NodeId, params: Value) -> Result<Value, PipelineError> {
        let node = self.nodes.get_mut(&id).ok_or(PipelineError::UnknownNode(id))?;
        Ok(std::mem::replace(&mut node.params, params))
    }

    /// Replaces a line's params and returns the previous ones.
    pub fn set_line_params(&mut self, line_id: &str, params: Value) -> Result<Option<Value>, PipelineError> {
        let line = self
            .lines
            .iter_mut()
            .find(|line| line.id == line_id)
            .ok_or_else(|| PipelineError::UnknownLine(line_id.to_string()))?;
        Ok(line.params.replace(params))
    }

    /// Finds the node owning an endpoint id.
    pub fn endpoint_node(&self, endpoint_id: &str) -> Option<&PipelineNode> {
        let decoded = EndpointId::decode(endpoint_id)?;
        self.nodes.get(&decoded.node_id)
    }

    /// The action a line ends at.
    pub fn line_target_action(&self, line: &Line) -> Option<&Action> {
        self.endpoint_node(&line.target_id)?.action(&line.target_id)
    }

    /// Looks a line up by id.
    pub fn line(&self, line_id: &str) -> Option<&Line> {
        self.lines.iter().find(|line| line.id == line_id)
    }

    /// Connects an event or out-pin to an action.
    ///
    /// The new line's params are seeded from the defaults of the target
    /// action's schema.
    pub fn connect(&mut self, source_id: &str, target_id: &str) -> Result<&Line, PipelineError> {
        let source = self
            .endpoint_node(source_id)
            .ok_or_else(|| PipelineError::UnknownEndpoint(source_id.to_string()))?;
        match source.endpoint_kind(source_id) {
            Some(EndpointKind::Event) | Some(EndpointKind::OutPin) => {}
            Some(EndpointKind::Action) => return Err(PipelineError::InvalidSource(source_id.to_string())),
            None => return Err(PipelineError::UnknownEndpoint(source_id.to_string())),
        }
        let source_node = source.id;

        let target = self
            .endpoint_node(target_id)
            .ok_or_else(|| PipelineError::UnknownEndpoint(target_id.to_string()))?;
        let action = match target.endpoint_kind(target_id) {
            Some(EndpointKind::Action) => target.action(target_id),
            Some(_) => return Err(PipelineError::InvalidTarget(target_id.to_string())),
            None => return Err(PipelineError::UnknownEndpoint(target_id.to_string())),
        };
        if target.id == source_node {
            return Err(PipelineError::SelfLink);
        }

        let mut line = Line::new(source_id, target_id);
        if self.line(&line.id).is_some() {
            return Err(PipelineError::DuplicateLine(line.id));
        }
        if let Some(action) = action.filter(|action| !action.param_defines.is_empty()) {
            line.params = Some(analyse(&action.param_defines).defaults);
            line.status = LineStatus::DefaultWithParam;
        }

        log::debug!("Connected {source_id} -> {target_id}");
        self.lines.push(line);
        Ok(&self.lines[self.lines.len() - 1])
    }

    /// Inserts a previously removed line as-is.
    pub fn insert_line(&mut self, line: Line) {
        if self.line(&line.id).is_none() {
            self.lines.push(line);
        }
    }

    /// Removes a line.
    pub fn disconnect(&mut self, line_id: &str) -> Option<Line> {
        let index = self.lines.iter().position(|line| line.id == line_id)?;
        Some(self.lines.remove(index))
    }

    /// Removes nodes and every line touching them.
    pub fn delete_nodes(&mut self, ids: &[NodeId]) -> Removed {
        let mut removed = Removed::default();
        for id in ids {
            if let Some(node) = self.nodes.remove(id) {
                removed.nodes.push(node);
            }
        }

        let nodes = &self.nodes;
        let (kept, dropped): (Vec<Line>, Vec<Line>) = self.lines.drain(..).partition(|line| match line.node_ids() {
            Some((source, target)) => nodes.contains_key(&source) && nodes.contains_key(&target),
            None => false,
        });
        self.lines = kept;
        removed.lines = dropped;
        removed
    }

    /// Copies nodes and the lines whose both ends are among them.
    pub fn copy_nodes(&self, ids: &[NodeId]) -> Clipboard {
        let selected: HashSet<NodeId> = ids.iter().copied().filter(|id| self.nodes.contains_key(id)).collect();
        let nodes = ids.iter().filter_map(|id| self.nodes.get(id)).cloned().collect();
        let lines = self
            .lines
            .iter()
            .filter(|line| match line.node_ids() {
                Some((source, target)) => selected.contains(&source) && selected.contains(&target),
                None => false,
            })
            .cloned()
            .collect();
        Clipboard { nodes, lines }
    }

    /// Pastes a clipboard under fresh ids, shifted by `offset`.
    ///
    /// Returns the ids of the pasted nodes in clipboard order.
    pub fn paste(&mut self, clipboard: &Clipboard, offset: (f32, f32)) -> Vec<NodeId> {
        let id_changes: HashMap<NodeId, NodeId> =
            clipboard.nodes.iter().map(|node| (node.id, Uuid::new_v4())).collect();

        let mut pasted = Vec::with_capacity(clipboard.nodes.len());
        for node in &clipboard.nodes {
            let Some(&new_id) = id_changes.get(&node.id) else {
                continue;
            };
            let mut node = node.rekeyed(new_id);
            node.position = (node.position.0 + offset.0, node.position.1 + offset.1);
            pasted.push(self.add_node(node));
        }

        let remap = |endpoint: &str| {
            let decoded = EndpointId::decode(endpoint)?;
            let node_id = id_changes.get(&decoded.node_id)?;
            Some(decoded.with_node(*node_id).to_string())
        };
        for line in &clipboard.lines {
            let (Some(source_id), Some(target_id)) = (remap(&line.source_id), remap(&line.target_id)) else {
                log::warn!("Skipping pasted line '{}' with endpoints outside the clipboard", line.id);
                continue;
            };
            let mut new_line = Line::new(source_id, target_id);
            new_line.status = line.status;
            new_line.params = line.params.clone();
            self.insert_line(new_line);
        }

        log::info!("Pasted {} node(s)", pasted.len());
        pasted
    }
}
