//! Name-based parameter binding.
//!
//! The binder looks up every declared parameter in the request data, coerces
//! the raw value toward the declared type and falls back to defaults. A
//! trailing variadic parameter collects whatever the named parameters left
//! unclaimed. Failures never yield a silent `null`; they surface as
//! [`BindError`] and abort only the invocation being bound.

use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::dispatch::HandlerError;
use crate::registry::{ParamDescriptor, ParamType};

/// Errors raised while binding request data to a handler's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A parameter without default is absent from the request data.
    #[error("missing required parameter '{name}'")]
    Missing { name: String },
    /// The value cannot be coerced to the declared type.
    #[error("parameter '{name}' expects {expected}, got {found}")]
    Coercion {
        name: String,
        expected: ParamType,
        found: String,
    },
}

/// Arguments bound for one invocation, in declared order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    /// Builds arguments from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Returns the bound value for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// Returns the value at position `index`.
    #[must_use]
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.values.get(index).map(|(_, value)| value)
    }

    /// Number of bound arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when nothing was bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in declared order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Integer argument.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not an
    /// integer.
    pub fn int(&self, name: &str) -> Result<i64, HandlerError> {
        self.typed(name, "int", Value::as_i64)
    }

    /// Float argument.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not a
    /// number.
    pub fn float(&self, name: &str) -> Result<f64, HandlerError> {
        self.typed(name, "float", Value::as_f64)
    }

    /// Boolean argument.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not a
    /// boolean.
    pub fn bool(&self, name: &str) -> Result<bool, HandlerError> {
        self.typed(name, "bool", Value::as_bool)
    }

    /// String argument.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not a
    /// string.
    pub fn str(&self, name: &str) -> Result<&str, HandlerError> {
        self.typed(name, "string", Value::as_str)
    }

    /// Object argument, including the variadic collector.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not an
    /// object.
    pub fn object(&self, name: &str) -> Result<&Map<String, Value>, HandlerError> {
        self.typed(name, "object", Value::as_object)
    }

    /// Array argument.
    ///
    /// # Errors
    ///
    /// Returns a 400 [`HandlerError`] when the argument is absent or not an
    /// array.
    pub fn array(&self, name: &str) -> Result<&Vec<Value>, HandlerError> {
        self.typed(name, "array", Value::as_array)
    }

    fn typed<'a, T>(
        &'a self,
        name: &str,
        expected: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, HandlerError> {
        let value = self
            .get(name)
            .ok_or_else(|| HandlerError::invalid_argument(name, "argument is not bound"))?;
        extract(value)
            .ok_or_else(|| HandlerError::invalid_argument(name, format!("expected {expected}")))
    }
}

/// Binds `data` to the declared parameters.
///
/// # Errors
///
/// Returns [`BindError::Missing`] for an absent parameter without default and
/// [`BindError::Coercion`] when a value cannot be converted.
pub fn bind(params: &[ParamDescriptor], data: &Map<String, Value>) -> Result<Arguments, BindError> {
    let mut values = Vec::with_capacity(params.len());
    for param in params {
        if param.is_variadic() {
            let rest: Map<String, Value> = data
                .iter()
                .filter(|(key, _)| !params.iter().any(|p| !p.is_variadic() && p.name() == *key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            values.push((param.name().to_owned(), Value::Object(rest)));
            continue;
        }

        let value = match data.get(param.name()).filter(|value| !value.is_null()) {
            Some(raw) => coerce(raw, param.ty()).ok_or_else(|| BindError::Coercion {
                name: param.name().to_owned(),
                expected: param.ty(),
                found: describe(raw),
            })?,
            None => param
                .default_value()
                .cloned()
                .ok_or_else(|| BindError::Missing {
                    name: param.name().to_owned(),
                })?,
        };
        values.push((param.name().to_owned(), value));
    }
    Ok(Arguments { values })
}

/// Coerces `value` toward `ty`, returning `None` when that is not possible.
#[must_use]
pub fn coerce(value: &Value, ty: ParamType) -> Option<Value> {
    match ty {
        ParamType::Any => Some(value.clone()),
        ParamType::Int => coerce_int(value).map(Value::from),
        ParamType::Float => coerce_float(value)
            .and_then(Number::from_f64)
            .map(Value::Number),
        ParamType::Bool => coerce_bool(value).map(Value::Bool),
        ParamType::String => coerce_string(value).map(Value::String),
        ParamType::Array => match value {
            Value::Array(_) => Some(value.clone()),
            Value::Object(_) | Value::Null => None,
            scalar => Some(Value::Array(vec![scalar.clone()])),
        },
        ParamType::Object => value.is_object().then(|| value.clone()),
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && float.abs() < 9.0e15)
                .and_then(|float| format!("{float:.0}").parse().ok())
        }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|float| float.is_finite()),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(flag) => format!("bool {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string {text:?}"),
        Value::Array(_) => "array".to_owned(),
        Value::Object(_) => "object".to_owned(),
    }
}
