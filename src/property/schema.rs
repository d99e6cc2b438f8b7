//! Control schema model for the property editor.
//!
//! A schema is a list of [`PropertyDefine`] nodes. Each node binds a control
//! kind ([`Ctrl`]) to a `key` in the value tree; container kinds nest further
//! nodes and a `List` describes its elements with a single template node.
//!
//! Every parameter is a [`PropertyParam`]: either a literal JSON value or a
//! [`Getter`], a JavaScript function source evaluated against the control, the
//! current values and the host's injected context.

use super::SchemaError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// The control kinds understood by the property editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CtrlType {
    /// Single line text input
    Input,
    /// Multi line text input
    TextArea,
    /// Numeric input
    InputNumber,
    /// Group of checkboxes bound to an array of selected values
    Checkbox,
    /// Color picker bound to a color string
    ColorPicker,
    /// Date picker bound to a formatted date string
    DatePicker,
    /// Time picker bound to a formatted time string
    TimePicker,
    /// Radio group bound to the selected option value
    Radio,
    /// Numeric slider
    Slider,
    /// Boolean toggle
    Switch,
    /// Boolean toggle rendered in the header of its parent Collapse
    CollapseSwitch,
    /// Drop-down selection
    Select,
    /// Presentation-only separator
    Divider,
    /// Collapsible object container
    Collapse,
    /// Flowing object container
    Flex,
    /// Grid object container
    Grid,
    /// Array container with a single element template
    List,
}

impl CtrlType {
    /// Every control kind, in catalog order.
    pub const ALL: [CtrlType; 17] = [
        CtrlType::Input,
        CtrlType::TextArea,
        CtrlType::InputNumber,
        CtrlType::Checkbox,
        CtrlType::ColorPicker,
        CtrlType::DatePicker,
        CtrlType::TimePicker,
        CtrlType::Radio,
        CtrlType::Slider,
        CtrlType::Switch,
        CtrlType::CollapseSwitch,
        CtrlType::Select,
        CtrlType::Divider,
        CtrlType::Collapse,
        CtrlType::Flex,
        CtrlType::Grid,
        CtrlType::List,
    ];

    /// Name used in the `type` field of encoded schemas.
    pub fn as_str(self) -> &'static str {
        match self {
            CtrlType::Input => "Input",
            CtrlType::TextArea => "TextArea",
            CtrlType::InputNumber => "InputNumber",
            CtrlType::Checkbox => "Checkbox",
            CtrlType::ColorPicker => "ColorPicker",
            CtrlType::DatePicker => "DatePicker",
            CtrlType::TimePicker => "TimePicker",
            CtrlType::Radio => "Radio",
            CtrlType::Slider => "Slider",
            CtrlType::Switch => "Switch",
            CtrlType::CollapseSwitch => "CollapseSwitch",
            CtrlType::Select => "Select",
            CtrlType::Divider => "Divider",
            CtrlType::Collapse => "Collapse",
            CtrlType::Flex => "Flex",
            CtrlType::Grid => "Grid",
            CtrlType::List => "List",
        }
    }

    /// Parses an encoded `type` name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.as_str() == name)
    }

    /// Human readable name shown in control pickers.
    pub fn display_name(self) -> &'static str {
        match self {
            CtrlType::Input => "Text input",
            CtrlType::TextArea => "Text area",
            CtrlType::InputNumber => "Number input",
            CtrlType::Checkbox => "Checkboxes",
            CtrlType::ColorPicker => "Color picker",
            CtrlType::DatePicker => "Date picker",
            CtrlType::TimePicker => "Time picker",
            CtrlType::Radio => "Radio group",
            CtrlType::Slider => "Slider",
            CtrlType::Switch => "Switch",
            CtrlType::CollapseSwitch => "Collapse switch",
            CtrlType::Select => "Drop-down",
            CtrlType::Divider => "Divider",
            CtrlType::Collapse => "Collapse panel",
            CtrlType::Flex => "Flex container",
            CtrlType::Grid => "Grid container",
            CtrlType::List => "List container",
        }
    }

    /// Containers whose children bind into an object.
    pub fn is_object_container(self) -> bool {
        matches!(self, CtrlType::Collapse | CtrlType::Flex | CtrlType::Grid)
    }

    /// Containers whose value is an array.
    pub fn is_array_container(self) -> bool {
        matches!(self, CtrlType::List)
    }

    /// A fully populated example define of this kind, as encoded JSON.
    pub fn example(self) -> Value {
        let params = match self {
            CtrlType::Input => json!({"default": "", "placeholder": "", "disabled": false, "maxlength": 256}),
            CtrlType::TextArea => json!({"default": "", "placeholder": "", "disabled": false, "resize": "vertical"}),
            CtrlType::InputNumber => json!({
                "default": 0, "placeholder": "", "disabled": false,
                "min": -1000, "max": 1000, "precision": 0, "controls": true
            }),
            CtrlType::Checkbox => json!({"default": [], "disabled": false, "options": [], "layout": "vertical"}),
            CtrlType::ColorPicker => json!({
                "default": "", "disabled": false, "allowClear": true, "format": "hex", "mode": "single"
            }),
            CtrlType::DatePicker => json!({
                "default": "", "placeholder": "", "disabled": false, "allowClear": true,
                "mode": "date", "format": "YYYY-MM-DD"
            }),
            CtrlType::TimePicker => json!({
                "default": "", "placeholder": "", "disabled": false, "allowClear": true, "format": "HH:mm:ss"
            }),
            CtrlType::Radio => json!({
                "default": "", "disabled": false, "options": [],
                "isBlock": true, "optionType": "button", "buttonStyle": "solid"
            }),
            CtrlType::Slider => json!({"default": 0, "disabled": false, "min": 0, "max": 100, "step": 1}),
            CtrlType::Switch => json!({"default": false, "disabled": false}),
            CtrlType::CollapseSwitch => json!({"default": true}),
            CtrlType::Select => json!({"default": "", "placeholder": "", "disabled": false, "options": []}),
            CtrlType::Divider => json!({
                "lineColor": "#cccccc", "labelColor": "#cccccc", "type": "horizontal", "variant": "solid"
            }),
            CtrlType::Collapse => json!({}),
            CtrlType::Flex => json!({"gap": 8}),
            CtrlType::Grid => json!({"columns": 2, "gap": 8}),
            CtrlType::List => json!({"default": []}),
        };
        let mut example = json!({
            "key": "",
            "label": "",
            "tip": "",
            "type": self.as_str(),
            "isElevated": false,
            "params": params,
        });
        if self.is_object_container() {
            example["children"] = json!([]);
        }
        if self.is_array_container() {
            example["template"] = json!([]);
        }
        example
    }
}

/// JavaScript source of a getter function.
///
/// Getters are called as `getter.call(ctrl, ctrl, values, injects)` inside the
/// sandboxed script engine and must be free of side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Getter {
    source: String,
}

impl Getter {
    /// Wraps function source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }

    /// The function source as written.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Returns true when `text` is shaped like a JavaScript function expression:
/// `function (..) {..}`, `x => ..` or `(..) => ..`.
pub fn looks_like_function(text: &str) -> bool {
    let text = text.trim();
    if let Some(rest) = text.strip_prefix("function") {
        return rest.starts_with(|c: char| c == '(' || c == '*' || c.is_whitespace());
    }
    let Some(arrow) = text.find("=>") else {
        return false;
    };
    let head = text[..arrow].trim();
    if head.starts_with('(') && head.ends_with(')') {
        return true;
    }
    is_identifier(head)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// A control parameter: a literal or a getter.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyParam {
    /// Literal JSON value
    Value(Value),
    /// Function evaluated on demand
    Getter(Getter),
}

impl PropertyParam {
    /// Creates a getter parameter from function source.
    pub fn getter(source: impl Into<String>) -> Self {
        PropertyParam::Getter(Getter::new(source))
    }

    /// The literal value, if this is not a getter.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            PropertyParam::Value(value) => Some(value),
            PropertyParam::Getter(_) => None,
        }
    }
}

impl From<Value> for PropertyParam {
    fn from(value: Value) -> Self {
        PropertyParam::Value(value)
    }
}

impl From<&str> for PropertyParam {
    fn from(value: &str) -> Self {
        PropertyParam::Value(Value::String(value.to_string()))
    }
}

impl From<bool> for PropertyParam {
    fn from(value: bool) -> Self {
        PropertyParam::Value(Value::Bool(value))
    }
}

impl From<f64> for PropertyParam {
    fn from(value: f64) -> Self {
        PropertyParam::Value(json!(value))
    }
}

/// Wire tag of a getter: `{"$getter": "<source>"}`.
const GETTER_TAG: &str = "$getter";
/// Wire tag of a literal that would otherwise read as a getter.
const VALUE_TAG: &str = "$value";

/// The single-entry `{tag: value}` object, if `value` is one.
fn tagged<'a>(value: &'a Value, tag: &str) -> Option<&'a Value> {
    match value.as_object() {
        Some(map) if map.len() == 1 => map.get(tag),
        _ => None,
    }
}

/// Literals that need the `$value` wrapper to decode back as themselves.
fn is_ambiguous_literal(value: &Value) -> bool {
    match value {
        Value::String(text) => looks_like_function(text),
        other => tagged(other, GETTER_TAG).is_some() || tagged(other, VALUE_TAG).is_some(),
    }
}

impl Serialize for PropertyParam {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tagged = Map::new();
        match self {
            PropertyParam::Value(value) if !is_ambiguous_literal(value) => return value.serialize(serializer),
            PropertyParam::Value(value) => tagged.insert(VALUE_TAG.to_string(), value.clone()),
            PropertyParam::Getter(getter) => {
                tagged.insert(GETTER_TAG.to_string(), Value::String(getter.source().to_string()))
            }
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PropertyParam {
    /// Accepts the tagged forms plus bare function source, which older
    /// documents used for getters.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if let Some(Value::String(source)) = tagged(&value, GETTER_TAG) {
            return Ok(PropertyParam::Getter(Getter::new(source.clone())));
        }
        if let Some(inner) = tagged(&value, VALUE_TAG) {
            return Ok(PropertyParam::Value(inner.clone()));
        }
        Ok(match value {
            Value::String(text) if looks_like_function(&text) => PropertyParam::Getter(Getter::new(text)),
            other => PropertyParam::Value(other),
        })
    }
}

/// Label/value pair used by Checkbox, Radio and Select.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    /// Text shown to the user
    pub label: Value,
    /// Value written into the value tree
    pub value: Value,
}

macro_rules! params_struct {
    ($(#[$doc:meta])* $name:ident { $($(#[$fdoc:meta])* $field:ident),* $(,)? }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub struct $name {
            $(
                $(#[$fdoc])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<PropertyParam>,
            )*
        }
    };
}

params_struct!(
    /// Parameters of `Input`.
    InputParams {
        /// Initial value
        default,
        /// Text shown while empty
        placeholder,
        /// Read-only when true
        disabled,
        /// Maximum number of characters
        maxlength,
    }
);

params_struct!(
    /// Parameters of `TextArea`.
    TextAreaParams {
        /// Initial value
        default,
        /// Text shown while empty
        placeholder,
        /// Read-only when true
        disabled,
        /// Maximum number of characters
        maxlength,
        /// `none` or `vertical`
        resize,
    }
);

params_struct!(
    /// Parameters of `InputNumber`.
    InputNumberParams {
        /// Initial value
        default,
        /// Text shown while empty
        placeholder,
        /// Read-only when true
        disabled,
        /// Smallest accepted value
        min,
        /// Largest accepted value
        max,
        /// Number of decimals
        precision,
        /// Show the step buttons
        controls,
    }
);

params_struct!(
    /// Parameters of `Checkbox`.
    CheckboxParams {
        /// Initially checked option values
        default,
        /// Read-only when true
        disabled,
        /// `[{label, value}]`
        options,
        /// `vertical` or `horizontal`
        layout,
    }
);

params_struct!(
    /// Parameters of `ColorPicker`.
    ColorPickerParams {
        /// Initial color
        default,
        /// Read-only when true
        disabled,
        /// Offer a clear button
        allow_clear,
        /// `rgb`, `hex` or `hsb`
        format,
        /// `single` and/or `gradient`
        mode,
    }
);

params_struct!(
    /// Parameters of `DatePicker`.
    DatePickerParams {
        /// Initial date string
        default,
        /// Read-only when true
        disabled,
        /// Text shown while empty
        placeholder,
        /// Offer a clear button
        allow_clear,
        /// `time`, `date`, `week`, `month`, `quarter` or `year`
        mode,
        /// Display format, e.g. `YYYY-MM-DD`
        format,
    }
);

params_struct!(
    /// Parameters of `TimePicker`.
    TimePickerParams {
        /// Initial time string
        default,
        /// Text shown while empty
        placeholder,
        /// Read-only when true
        disabled,
        /// Offer a clear button
        allow_clear,
        /// Display format, e.g. `HH:mm:ss`
        format,
    }
);

params_struct!(
    /// Parameters of `Radio`.
    RadioParams {
        /// Initially selected value
        default,
        /// Read-only when true
        disabled,
        /// `[{label, value}]`
        options,
        /// Stretch to the full width
        is_block,
        /// `default` or `button`
        option_type,
        /// `outline` or `solid`
        button_style,
    }
);

params_struct!(
    /// Parameters of `Slider`.
    SliderParams {
        /// Initial value
        default,
        /// Read-only when true
        disabled,
        /// Lower bound
        min,
        /// Upper bound
        max,
        /// Step size
        step,
    }
);

params_struct!(
    /// Parameters of `Switch`.
    SwitchParams {
        /// Initial state
        default,
        /// Read-only when true
        disabled,
    }
);

params_struct!(
    /// Parameters of `CollapseSwitch`.
    CollapseSwitchParams {
        /// Whether the panel starts switched on
        default,
    }
);

params_struct!(
    /// Parameters of `Select`.
    SelectParams {
        /// Initially selected value
        default,
        /// Read-only when true
        disabled,
        /// Text shown while nothing is selected
        placeholder,
        /// `[{label, value}]`
        options,
    }
);

params_struct!(
    /// Parameters of `Divider`.
    DividerParams {
        /// Line color
        line_color,
        /// Label color
        label_color,
        /// `horizontal` or `vertical`
        r#type,
        /// `dashed`, `dotted` or `solid`
        variant,
    }
);

params_struct!(
    /// Parameters of `Flex`.
    FlexParams {
        /// Spacing between children
        gap,
    }
);

params_struct!(
    /// Parameters of `Grid`.
    GridParams {
        /// Number of columns
        columns,
        /// Spacing between cells
        gap,
    }
);

params_struct!(
    /// Parameters of `Collapse`.
    CollapseParams {}
);

params_struct!(
    /// Parameters of `List`.
    ListParams {
        /// Initial array
        default,
    }
);

/// A control kind together with its kind-specific parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Ctrl {
    /// Single line text input
    Input(InputParams),
    /// Multi line text input
    TextArea(TextAreaParams),
    /// Numeric input
    InputNumber(InputNumberParams),
    /// Checkbox group
    Checkbox(CheckboxParams),
    /// Color picker
    ColorPicker(ColorPickerParams),
    /// Date picker
    DatePicker(DatePickerParams),
    /// Time picker
    TimePicker(TimePickerParams),
    /// Radio group
    Radio(RadioParams),
    /// Numeric slider
    Slider(SliderParams),
    /// Boolean toggle
    Switch(SwitchParams),
    /// Toggle shown in the parent Collapse header
    CollapseSwitch(CollapseSwitchParams),
    /// Drop-down selection
    Select(SelectParams),
    /// Separator line
    Divider(DividerParams),
    /// Collapsible group of object fields
    Collapse {
        /// Nested fields
        children: Vec<PropertyDefine>,
        /// Parameters
        params: CollapseParams,
    },
    /// Flowing group of object fields
    Flex {
        /// Nested fields
        children: Vec<PropertyDefine>,
        /// Parameters
        params: FlexParams,
    },
    /// Grid of object fields
    Grid {
        /// Nested fields
        children: Vec<PropertyDefine>,
        /// Parameters
        params: GridParams,
    },
    /// Dynamic array; `template` must hold exactly one element define
    List {
        /// Element template
        template: Vec<PropertyDefine>,
        /// Parameters
        params: ListParams,
    },
    /// A kind this version does not know, kept verbatim
    Unknown(UnknownCtrl),
}

/// Encoded fields of a control kind this build does not recognise.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownCtrl {
    /// The `type` as written
    pub type_name: String,
    /// Raw `params`
    pub params: Option<Value>,
    /// Nested `children`, decoded leniently
    pub children: Option<Vec<PropertyDefine>>,
    /// Nested `template`, decoded leniently
    pub template: Option<Vec<PropertyDefine>>,
    /// Any other fields
    pub extra: Map<String, Value>,
}

impl Ctrl {
    /// The kind, or `None` for [`Ctrl::Unknown`].
    pub fn ctrl_type(&self) -> Option<CtrlType> {
        Some(match self {
            Ctrl::Input(_) => CtrlType::Input,
            Ctrl::TextArea(_) => CtrlType::TextArea,
            Ctrl::InputNumber(_) => CtrlType::InputNumber,
            Ctrl::Checkbox(_) => CtrlType::Checkbox,
            Ctrl::ColorPicker(_) => CtrlType::ColorPicker,
            Ctrl::DatePicker(_) => CtrlType::DatePicker,
            Ctrl::TimePicker(_) => CtrlType::TimePicker,
            Ctrl::Radio(_) => CtrlType::Radio,
            Ctrl::Slider(_) => CtrlType::Slider,
            Ctrl::Switch(_) => CtrlType::Switch,
            Ctrl::CollapseSwitch(_) => CtrlType::CollapseSwitch,
            Ctrl::Select(_) => CtrlType::Select,
            Ctrl::Divider(_) => CtrlType::Divider,
            Ctrl::Collapse { .. } => CtrlType::Collapse,
            Ctrl::Flex { .. } => CtrlType::Flex,
            Ctrl::Grid { .. } => CtrlType::Grid,
            Ctrl::List { .. } => CtrlType::List,
            Ctrl::Unknown(_) => return None,
        })
    }

    /// The encoded `type` name.
    pub fn type_name(&self) -> &str {
        match self {
            Ctrl::Unknown(unknown) => &unknown.type_name,
            known => known.ctrl_type().map(CtrlType::as_str).unwrap_or_default(),
        }
    }

    /// The `default` parameter, for kinds that have one.
    pub fn default_param(&self) -> Option<&PropertyParam> {
        match self {
            Ctrl::Input(p) => p.default.as_ref(),
            Ctrl::TextArea(p) => p.default.as_ref(),
            Ctrl::InputNumber(p) => p.default.as_ref(),
            Ctrl::Checkbox(p) => p.default.as_ref(),
            Ctrl::ColorPicker(p) => p.default.as_ref(),
            Ctrl::DatePicker(p) => p.default.as_ref(),
            Ctrl::TimePicker(p) => p.default.as_ref(),
            Ctrl::Radio(p) => p.default.as_ref(),
            Ctrl::Slider(p) => p.default.as_ref(),
            Ctrl::Switch(p) => p.default.as_ref(),
            Ctrl::CollapseSwitch(p) => p.default.as_ref(),
            Ctrl::Select(p) => p.default.as_ref(),
            Ctrl::List { params, .. } => params.default.as_ref(),
            Ctrl::Divider(_) | Ctrl::Collapse { .. } | Ctrl::Flex { .. } | Ctrl::Grid { .. } | Ctrl::Unknown(_) => None,
        }
    }

    /// Object-shaped children of container kinds; empty for everything else.
    pub fn children(&self) -> &[PropertyDefine] {
        match self {
            Ctrl::Collapse { children, .. } | Ctrl::Flex { children, .. } | Ctrl::Grid { children, .. } => children,
            Ctrl::Unknown(unknown) => unknown.children.as_deref().unwrap_or_default(),
            _ => &[],
        }
    }
}

/// One node of a control schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EncodedDefine", into = "EncodedDefine")]
pub struct PropertyDefine {
    /// Field name in the value tree
    pub key: String,
    /// Display label
    pub label: Option<String>,
    /// Hover tip
    pub tip: Option<String>,
    /// Bind at the nearest elevated/List scope instead of the lexical parent
    pub is_elevated: bool,
    /// Control kind and parameters
    pub ctrl: Ctrl,
}

impl PropertyDefine {
    /// Creates a define bound to `key`.
    pub fn new(key: impl Into<String>, ctrl: Ctrl) -> Self {
        Self {
            key: key.into(),
            label: None,
            tip: None,
            is_elevated: false,
            ctrl,
        }
    }

    /// Sets the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the hover tip.
    pub fn with_tip(mut self, tip: impl Into<String>) -> Self {
        self.tip = Some(tip.into());
        self
    }

    /// Marks the define as elevated.
    pub fn elevated(mut self) -> Self {
        self.is_elevated = true;
        self
    }

    /// The kind, or `None` for unknown kinds.
    pub fn ctrl_type(&self) -> Option<CtrlType> {
        self.ctrl.ctrl_type()
    }

    /// True for `List` defines.
    pub fn is_list(&self) -> bool {
        matches!(self.ctrl, Ctrl::List { .. })
    }

    /// Label to display, falling back to the key.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.key)
    }

    /// The single element template of a `List`.
    pub fn list_template(&self) -> Result<&PropertyDefine, SchemaError> {
        match &self.ctrl {
            Ctrl::List { template, .. } => match template.as_slice() {
                [only] => Ok(only),
                other => Err(SchemaError::ListTemplateCardinality {
                    key: self.key.clone(),
                    count: other.len(),
                }),
            },
            other => Err(SchemaError::NotAList {
                key: self.key.clone(),
                type_name: other.type_name().to_string(),
            }),
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Wire shape of a define; the codec's text format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedDefine {
    #[serde(default)]
    key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tip: Option<String>,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "is_false")]
    is_elevated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<PropertyDefine>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    template: Option<Vec<PropertyDefine>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

fn decode_params<T: for<'de> Deserialize<'de> + Default>(params: Option<Value>) -> Result<T, SchemaError> {
    match params {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

fn encode_params<T: Serialize>(params: &T) -> Option<Value> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) if map.is_empty() => None,
        Ok(value) => Some(value),
        Err(err) => {
            log::error!("Failed to encode control params: {err}");
            None
        }
    }
}

impl TryFrom<EncodedDefine> for PropertyDefine {
    type Error = SchemaError;

    fn try_from(encoded: EncodedDefine) -> Result<Self, Self::Error> {
        let EncodedDefine {
            key,
            label,
            tip,
            type_name,
            is_elevated,
            params,
            children,
            template,
            extra,
        } = encoded;

        let ctrl = match CtrlType::parse(&type_name) {
            Some(CtrlType::Input) => Ctrl::Input(decode_params(params)?),
            Some(CtrlType::TextArea) => Ctrl::TextArea(decode_params(params)?),
            Some(CtrlType::InputNumber) => Ctrl::InputNumber(decode_params(params)?),
            Some(CtrlType::Checkbox) => Ctrl::Checkbox(decode_params(params)?),
            Some(CtrlType::ColorPicker) => Ctrl::ColorPicker(decode_params(params)?),
            Some(CtrlType::DatePicker) => Ctrl::DatePicker(decode_params(params)?),
            Some(CtrlType::TimePicker) => Ctrl::TimePicker(decode_params(params)?),
            Some(CtrlType::Radio) => Ctrl::Radio(decode_params(params)?),
            Some(CtrlType::Slider) => Ctrl::Slider(decode_params(params)?),
            Some(CtrlType::Switch) => Ctrl::Switch(decode_params(params)?),
            Some(CtrlType::CollapseSwitch) => Ctrl::CollapseSwitch(decode_params(params)?),
            Some(CtrlType::Select) => Ctrl::Select(decode_params(params)?),
            Some(CtrlType::Divider) => Ctrl::Divider(decode_params(params)?),
            Some(CtrlType::Collapse) => Ctrl::Collapse {
                children: children.unwrap_or_default(),
                params: decode_params(params)?,
            },
            Some(CtrlType::Flex) => Ctrl::Flex {
                children: children.unwrap_or_default(),
                params: decode_params(params)?,
            },
            Some(CtrlType::Grid) => Ctrl::Grid {
                children: children.unwrap_or_default(),
                params: decode_params(params)?,
            },
            // Older documents put the List element under `children`.
            Some(CtrlType::List) => Ctrl::List {
                template: template.or(children).unwrap_or_default(),
                params: decode_params(params)?,
            },
            None => {
                log::warn!("Unknown control type '{type_name}' for key '{key}', keeping it verbatim");
                Ctrl::Unknown(UnknownCtrl {
                    type_name,
                    params,
                    children,
                    template,
                    extra,
                })
            }
        };

        Ok(PropertyDefine {
            key,
            label,
            tip,
            is_elevated,
            ctrl,
        })
    }
}

impl From<PropertyDefine> for EncodedDefine {
    fn from(define: PropertyDefine) -> Self {
        let type_name = define.ctrl.type_name().to_string();
        let mut encoded = EncodedDefine {
            key: define.key,
            label: define.label,
            tip: define.tip,
            type_name,
            is_elevated: define.is_elevated,
            params: None,
            children: None,
            template: None,
            extra: Map::new(),
        };
        match define.ctrl {
            Ctrl::Input(p) => encoded.params = encode_params(&p),
            Ctrl::TextArea(p) => encoded.params = encode_params(&p),
            Ctrl::InputNumber(p) => encoded.params = encode_params(&p),
            Ctrl::Checkbox(p) => encoded.params = encode_params(&p),
            Ctrl::ColorPicker(p) => encoded.params = encode_params(&p),
            Ctrl::DatePicker(p) => encoded.params = encode_params(&p),
            Ctrl::TimePicker(p) => encoded.params = encode_params(&p),
            Ctrl::Radio(p) => encoded.params = encode_params(&p),
            Ctrl::Slider(p) => encoded.params = encode_params(&p),
            Ctrl::Switch(p) => encoded.params = encode_params(&p),
            Ctrl::CollapseSwitch(p) => encoded.params = encode_params(&p),
            Ctrl::Select(p) => encoded.params = encode_params(&p),
            Ctrl::Divider(p) => encoded.params = encode_params(&p),
            Ctrl::Collapse { children, params } => {
                encoded.params = encode_params(&params);
                encoded.children = Some(children);
            }
            Ctrl::Flex { children, params } => {
                encoded.params = encode_params(&params);
                encoded.children = Some(children);
            }
            Ctrl::Grid { children, params } => {
                encoded.params = encode_params(&params);
                encoded.children = Some(children);
            }
            Ctrl::List { template, params } => {
                encoded.params = encode_params(&params);
                encoded.template = Some(template);
            }
            Ctrl::Unknown(unknown) => {
                encoded.params = unknown.params;
                encoded.children = unknown.children;
                encoded.template = unknown.template;
                encoded.extra = unknown.extra;
            }
        }
        encoded
    }
}
