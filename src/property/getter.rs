//! Evaluation of property params.
//!
//! Literal params are returned as-is. Getters run in a lazily created
//! [`JavaScriptEngine`]; a getter that fails to compile, throws, or returns
//! `undefined` yields `None` and the failure is logged, never propagated.

use super::schema::{PropertyDefine, PropertyParam};
use crate::script_engine::JavaScriptEngine;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Runs property params against the current values and injected context.
#[derive(Default)]
pub struct GetterRunner {
    engine: Option<JavaScriptEngine>,
    engine_unavailable: bool,
}

impl GetterRunner {
    /// Creates a runner; the script engine is only built when a getter is met.
    pub fn new() -> Self {
        Self::default()
    }

    fn engine(&mut self) -> Option<&mut JavaScriptEngine> {
        if self.engine.is_none() && !self.engine_unavailable {
            match JavaScriptEngine::new() {
                Ok(engine) => self.engine = Some(engine),
                Err(err) => {
                    log::error!("Getter params disabled: {err}");
                    self.engine_unavailable = true;
                }
            }
        }
        self.engine.as_mut()
    }

    /// Evaluates `param` for `ctrl`. `None` means "no value".
    pub fn run(
        &mut self,
        param: &PropertyParam,
        ctrl: &PropertyDefine,
        values: &Value,
        injects: &Value,
    ) -> Option<Value> {
        let getter = match param {
            PropertyParam::Value(value) => return Some(value.clone()),
            PropertyParam::Getter(getter) => getter,
        };
        let ctrl_json = serde_json::to_value(ctrl).unwrap_or_else(|err| {
            log::warn!("Failed to encode control '{}' for getter: {err}", ctrl.key);
            Value::Null
        });
        let engine = self.engine()?;
        match engine.call_getter(getter.source(), &ctrl_json, values, injects) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Getter for '{}' failed: {err}", ctrl.key);
                None
            }
        }
    }

    /// Evaluates an optional param and converts the result to `T`.
    ///
    /// Missing params, failed getters and values of the wrong shape all give `None`.
    pub fn resolve<T: DeserializeOwned>(
        &mut self,
        param: Option<&PropertyParam>,
        ctrl: &PropertyDefine,
        values: &Value,
        injects: &Value,
    ) -> Option<T> {
        let value = self.run(param?, ctrl, values, injects)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                log::debug!("Param of '{}' has an unexpected shape: {err}", ctrl.key);
                None
            }
        }
    }
}
