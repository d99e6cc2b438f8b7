//! Sandboxed JavaScript engine for property getters.
//!
//! Getter params are stored as JavaScript function source. They run inside a
//! boa context that has no file system or network APIs, with `eval` and the
//! `Function` constructor removed and loop/recursion limits applied, so a
//! schema loaded from disk cannot do more than compute a value.

use crate::constants::{
    SCRIPT_LOOP_ITERATION_LIMIT, SCRIPT_MAX_ARRAY_LEN, SCRIPT_MAX_VALUE_DEPTH, SCRIPT_RECURSION_LIMIT,
};
use boa_engine::property::NonMaxU32;
use boa_engine::{
    js_string, object::builtins::JsArray, property::PropertyKey, Context, JsObject, JsResult,
    JsString, JsValue, Source,
};
use serde_json::Value;
use thiserror::Error;

/// Failures while running a getter.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The sandbox could not be prepared
    #[error("failed to set up script sandbox: {0}")]
    Setup(String),
    /// The source did not compile or threw while evaluating
    #[error("script evaluation failed: {0}")]
    Evaluation(String),
    /// The source evaluated to something that cannot be called
    #[error("getter source does not evaluate to a function")]
    NotAFunction,
    /// A value could not cross the JSON boundary
    #[error("value conversion failed: {0}")]
    Conversion(String),
}

/// JavaScript engine used to evaluate getter functions.
pub struct JavaScriptEngine {
    context: Context,
}

impl JavaScriptEngine {
    /// Creates an engine with the sandbox applied.
    pub fn new() -> Result<Self, ScriptError> {
        let mut context = Context::default();
        Self::setup_sandbox(&mut context).map_err(|e| ScriptError::Setup(e.to_string()))?;
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(SCRIPT_LOOP_ITERATION_LIMIT);
        context
            .runtime_limits_mut()
            .set_recursion_limit(SCRIPT_RECURSION_LIMIT);
        Ok(Self { context })
    }

    fn setup_sandbox(context: &mut Context) -> JsResult<()> {
        let undefined = JsValue::undefined();
        context.register_global_property(
            js_string!("eval"),
            undefined.clone(),
            Default::default(),
        )?;

        let global = context.global_object().clone();
        global.set(js_string!("Function"), undefined, false, context)?;
        Ok(())
    }

    /// Evaluates `source` to a function and calls it as
    /// `fn.call(ctrl, ctrl, values, injects)`.
    ///
    /// Returns `Ok(None)` when the function returns `undefined`.
    pub fn call_getter(
        &mut self,
        source: &str,
        ctrl: &Value,
        values: &Value,
        injects: &Value,
    ) -> Result<Option<Value>, ScriptError> {
        let wrapped = format!("({})", source.trim());
        let function = self
            .context
            .eval(Source::from_bytes(wrapped.as_str()))
            .map_err(|e| ScriptError::Evaluation(e.to_string()))?;
        let callable = function.as_callable().ok_or(ScriptError::NotAFunction)?;

        let this = self.json_to_js_value(ctrl)?;
        let args = [
            this.clone(),
            self.json_to_js_value(values)?,
            self.json_to_js_value(injects)?,
        ];
        let result = callable
            .call(&this, &args, &mut self.context)
            .map_err(|e| ScriptError::Evaluation(e.to_string()))?;

        if result.is_undefined() {
            return Ok(None);
        }
        self.js_value_to_json(&result).map(Some)
    }

    fn json_to_js_value(&mut self, value: &Value) -> Result<JsValue, ScriptError> {
        match value {
            Value::Null => Ok(JsValue::null()),
            Value::Bool(b) => Ok(JsValue::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                    Ok(JsValue::from(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(JsValue::from(f))
                } else {
                    Err(ScriptError::Conversion(format!("unsupported number {n}")))
                }
            }
            Value::String(s) => Ok(JsValue::String(JsString::from(s.as_str()))),
            Value::Array(arr) => {
                let js_array = JsArray::new(&mut self.context);
                for (index, item) in arr.iter().enumerate() {
                    let js_item = self.json_to_js_value(item)?;
                    js_array
                        .set(index as u32, js_item, false, &mut self.context)
                        .map_err(|e| ScriptError::Conversion(e.to_string()))?;
                }
                Ok(js_array.into())
            }
            Value::Object(obj) => {
                let js_obj = JsObject::default();
                for (key, val) in obj {
                    let js_val = self.json_to_js_value(val)?;
                    js_obj
                        .set(JsString::from(key.as_str()), js_val, false, &mut self.context)
                        .map_err(|e| ScriptError::Conversion(e.to_string()))?;
                }
                Ok(JsValue::Object(js_obj))
            }
        }
    }

    fn js_value_to_json(&mut self, js_value: &JsValue) -> Result<Value, ScriptError> {
        self.js_value_to_json_at(js_value, 0)
    }

    /// `depth` counts the arrays and objects entered so far; cyclic values
    /// run into the limit instead of recursing forever.
    fn js_value_to_json_at(&mut self, js_value: &JsValue, depth: usize) -> Result<Value, ScriptError> {
        if depth > SCRIPT_MAX_VALUE_DEPTH {
            return Err(ScriptError::Conversion(format!(
                "value nested deeper than {SCRIPT_MAX_VALUE_DEPTH} levels"
            )));
        }
        match js_value {
            JsValue::Null | JsValue::Undefined => Ok(Value::Null),
            JsValue::Boolean(b) => Ok(Value::Bool(*b)),
            JsValue::String(s) => s
                .to_std_string()
                .map(Value::String)
                .map_err(|_| ScriptError::Conversion("invalid string".to_string())),
            JsValue::Rational(r) => Ok(serde_json::Number::from_f64(*r)
                .map(Value::Number)
                .unwrap_or(Value::Null)),
            JsValue::Integer(i) => Ok(Value::Number(serde_json::Number::from(*i))),
            JsValue::BigInt(_) => Err(ScriptError::Conversion("BigInt not supported".to_string())),
            JsValue::Symbol(_) => Err(ScriptError::Conversion("Symbol not supported".to_string())),
            JsValue::Object(obj) => {
                if obj.is_array() {
                    let length = obj
                        .get(js_string!("length"), &mut self.context)
                        .map_err(|e| ScriptError::Conversion(e.to_string()))?;
                    let length = match length {
                        JsValue::Integer(len) => len.max(0) as u32,
                        JsValue::Rational(len) => len as u32,
                        _ => 0,
                    };
                    if length as usize > SCRIPT_MAX_ARRAY_LEN {
                        return Err(ScriptError::Conversion(format!(
                            "array of length {length} exceeds {SCRIPT_MAX_ARRAY_LEN}"
                        )));
                    }

                    let mut array = Vec::new();
                    for i in 0..length {
                        let index = NonMaxU32::new(i)
                            .ok_or_else(|| ScriptError::Conversion("array index overflow".to_string()))?;
                        let element = obj
                            .get(PropertyKey::Index(index), &mut self.context)
                            .map_err(|e| ScriptError::Conversion(e.to_string()))?;
                        array.push(self.js_value_to_json_at(&element, depth + 1)?);
                    }
                    Ok(Value::Array(array))
                } else if obj.is_callable() {
                    Err(ScriptError::Conversion("functions cannot be returned".to_string()))
                } else {
                    let mut map = serde_json::Map::new();
                    let keys = obj
                        .own_property_keys(&mut self.context)
                        .map_err(|e| ScriptError::Conversion(e.to_string()))?;

                    for key in keys {
                        let key_str = match &key {
                            PropertyKey::String(s) => s
                                .to_std_string()
                                .map_err(|_| ScriptError::Conversion("invalid key".to_string()))?,
                            PropertyKey::Index(idx) => idx.get().to_string(),
                            PropertyKey::Symbol(_) => continue,
                        };
                        let value = obj
                            .get(key, &mut self.context)
                            .map_err(|e| ScriptError::Conversion(e.to_string()))?;
                        if value.is_undefined() {
                            continue;
                        }
                        map.insert(key_str, self.js_value_to_json_at(&value, depth + 1)?);
                    }
                    Ok(Value::Object(map))
                }
            }
        }
    }
}
