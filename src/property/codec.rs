//! Text encoding of control schemas.
//!
//! Schemas are stored as pretty-printed JSON. Getter params are written as
//! their function source and turned back into getters on decode, so the
//! text stays human diffable and a round trip keeps getter behaviour.

use super::schema::PropertyDefine;
use super::SchemaError;
use crate::constants::SCHEMA_INDENT;
use serde::Serialize;

/// Encodes `schema` to text.
pub fn encode(schema: &[PropertyDefine]) -> String {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(SCHEMA_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    if let Err(err) = schema.serialize(&mut serializer) {
        log::error!("Failed to encode schema: {err}");
        return "[]".to_string();
    }
    String::from_utf8(buffer).unwrap_or_else(|err| {
        log::error!("Encoded schema is not UTF-8: {err}");
        "[]".to_string()
    })
}

/// Decodes schema text, reporting why it failed.
pub fn try_decode(text: &str) -> Result<Vec<PropertyDefine>, SchemaError> {
    Ok(serde_json::from_str(text)?)
}

/// Decodes schema text; malformed input yields an empty schema.
pub fn decode(text: &str) -> Vec<PropertyDefine> {
    try_decode(text).unwrap_or_else(|err| {
        log::error!("Failed to decode schema: {err}");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::getter::GetterRunner;
    use crate::property::schema::{
        CollapseParams, Ctrl, InputParams, ListParams, PropertyParam, SelectOption, SelectParams,
        SliderParams,
    };
    use serde_json::json;

    fn sample() -> Vec<PropertyDefine> {
        vec![
            PropertyDefine::new(
                "name",
                Ctrl::Input(InputParams {
                    default: Some("hi".into()),
                    placeholder: Some("Your name".into()),
                    ..Default::default()
                }),
            )
            .with_label("Name")
            .with_tip("Shown on the node"),
            PropertyDefine::new(
                "group",
                Ctrl::Collapse {
                    children: vec![
                        PropertyDefine::new(
                            "level",
                            Ctrl::Slider(SliderParams {
                                default: Some(json!(3).into()),
                                min: Some(json!(0).into()),
                                max: Some(json!(10).into()),
                                ..Default::default()
                            }),
                        )
                        .elevated(),
                        PropertyDefine::new(
                            "mode",
                            Ctrl::Select(SelectParams {
                                options: Some(json!([{"label": "A", "value": "a"}]).into()),
                                ..Default::default()
                            }),
                        ),
                    ],
                    params: CollapseParams::default(),
                },
            ),
            PropertyDefine::new(
                "rows",
                Ctrl::List {
                    template: vec![PropertyDefine::new("cell", Ctrl::Input(InputParams::default()))],
                    params: ListParams {
                        default: Some(json!(["a"]).into()),
                    },
                },
            ),
        ]
    }

    #[test]
    fn test_literal_schema_round_trips() {
        let schema = sample();
        assert_eq!(decode(&encode(&schema)), schema);
    }

    #[test]
    fn test_encoded_text_uses_wire_names() {
        let text = encode(&sample());
        let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(raw[1]["children"][0]["isElevated"], json!(true));
        assert_eq!(raw[2]["type"], json!("List"));
        assert_eq!(raw[2]["template"][0]["key"], json!("cell"));
        assert!(raw[0].get("isElevated").is_none());
        assert!(text.contains("\n    {"));
    }

    #[test]
    fn test_getters_round_trip_with_same_behaviour() {
        let source = "(ctrl, values, injects) => values.base * 2 + injects.offset";
        let schema = vec![PropertyDefine::new(
            "double",
            Ctrl::Input(InputParams {
                default: Some(PropertyParam::getter(source)),
                ..Default::default()
            }),
        )];
        let text = encode(&schema);
        assert!(text.contains(source));

        let restored = decode(&text);
        assert_eq!(restored, schema);

        let mut runner = GetterRunner::new();
        let values = json!({"base": 4});
        let injects = json!({"offset": 1});
        let run = |runner: &mut GetterRunner, define: &PropertyDefine| {
            let param = define.ctrl.default_param().unwrap();
            runner.run(param, define, &values, &injects)
        };
        assert_eq!(run(&mut runner, &restored[0]), run(&mut runner, &schema[0]));
        assert_eq!(run(&mut runner, &restored[0]), Some(json!(9)));
    }

    #[test]
    fn test_function_like_literals_stay_literals() {
        let input = |default: PropertyParam| {
            PropertyDefine::new(
                "note",
                Ctrl::Input(InputParams {
                    default: Some(default),
                    ..Default::default()
                }),
            )
        };
        let schema = vec![
            input("function of the node".into()),
            input("a => b".into()),
            input(json!({"$getter": "() => 1"}).into()),
            input(json!({"$value": 2}).into()),
        ];
        assert_eq!(decode(&encode(&schema)), schema);
    }

    #[test]
    fn test_getters_are_tagged_and_bare_source_still_decodes() {
        let schema = vec![PropertyDefine::new(
            "n",
            Ctrl::Input(InputParams {
                default: Some(PropertyParam::getter("() => 1")),
                ..Default::default()
            }),
        )];
        let raw: serde_json::Value = serde_json::from_str(&encode(&schema)).unwrap();
        assert_eq!(raw[0]["params"]["default"], json!({"$getter": "() => 1"}));

        let legacy = decode(r#"[{"key": "n", "type": "Input", "params": {"default": "() => 1"}}]"#);
        assert_eq!(legacy, schema);
    }

    #[test]
    fn test_malformed_text_decodes_to_empty() {
        assert!(decode("{ not json").is_empty());
        assert!(decode("{\"key\": \"a\"}").is_empty());
        assert!(decode(r#"[{"key": "a", "type": "Input", "params": 5}]"#).is_empty());
        assert!(try_decode("").is_err());
    }

    #[test]
    fn test_unknown_kinds_do_not_abort_siblings() {
        let text = r#"[
            {"key": "a", "type": "Input", "params": {"default": "x"}},
            {"key": "r", "type": "Rating", "params": {"stars": 5}, "children": [
                {"key": "inner", "type": "Switch"}
            ], "shape": "star"},
            {"key": "b", "type": "Select", "params": {"options": [{"label": 1, "value": 1}]}}
        ]"#;
        let schema = decode(text);
        assert_eq!(schema.len(), 3);
        assert_eq!(schema[1].ctrl.type_name(), "Rating");
        assert_eq!(schema[1].ctrl.children().len(), 1);

        let Ctrl::Select(params) = &schema[2].ctrl else {
            panic!("expected a Select");
        };
        let options: Vec<SelectOption> =
            serde_json::from_value(params.options.as_ref().unwrap().as_value().unwrap().clone()).unwrap();
        assert_eq!(options.len(), 1);

        // Unknown kinds survive a re-encode untouched.
        let again: serde_json::Value = serde_json::from_str(&encode(&schema)).unwrap();
        assert_eq!(again[1]["shape"], json!("star"));
        assert_eq!(again[1]["params"]["stars"], json!(5));
    }
}
