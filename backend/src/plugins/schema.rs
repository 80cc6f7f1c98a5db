//! Coarse type checking of parameters against the human-readable hints that
//! actions declare (`"number (ex: 587)"`, `"boolean"`, `"'on' or 'off'"`).

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    /// Free-form hint; any value is accepted.
    Any,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("missing parameter '{0}'")]
    Missing(String),
    #[error("parameter '{name}' must be {expected}")]
    WrongType { name: String, expected: &'static str },
}

impl ParamKind {
    /// The leading word of the hint decides the kind.
    pub fn from_hint(hint: &str) -> Self {
        let word: String = hint
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();
        match word.as_str() {
            "string" | "str" | "text" => Self::String,
            "number" | "float" => Self::Number,
            "integer" | "int" => Self::Integer,
            "boolean" | "bool" => Self::Boolean,
            "array" | "list" => Self::Array,
            "object" | "map" => Self::Object,
            _ => Self::Any,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Integer => "an integer",
            Self::Boolean => "a boolean",
            Self::Array => "an array",
            Self::Object => "an object",
            Self::Any => "any value",
        }
    }

    /// Returns the accepted (possibly coerced) value, or `None` on mismatch.
    fn accept(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (Self::Any, v) => Some(v.clone()),
            (Self::String, Value::String(_))
            | (Self::Boolean, Value::Bool(_))
            | (Self::Array, Value::Array(_))
            | (Self::Object, Value::Object(_)) => Some(value.clone()),
            (Self::Number, Value::Number(_)) => Some(value.clone()),
            (Self::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (Self::Number, Value::String(s)) => {
                if let Ok(whole) = s.trim().parse::<i64>() {
                    return Some(Value::from(whole));
                }
                let parsed: f64 = s.trim().parse().ok()?;
                Number::from_f64(parsed).map(Value::Number)
            }
            (Self::Integer, Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                trimmed.parse::<u64>().ok().map(Value::from)
            }
            _ => None,
        }
    }
}

/// Checks every declared parameter is present with an acceptable type.
///
/// Numeric strings are coerced for number kinds. Undeclared parameters are
/// passed through untouched.
pub fn check(
    schema: &BTreeMap<String, String>,
    parameters: &Map<String, Value>,
) -> Result<Map<String, Value>, SchemaError> {
    let mut checked = parameters.clone();
    for (name, hint) in schema {
        let kind = ParamKind::from_hint(hint);
        let value = match parameters.get(name) {
            Some(Value::Null) | None => return Err(SchemaError::Missing(name.clone())),
            Some(value) => value,
        };
        let accepted = kind.accept(value).ok_or_else(|| SchemaError::WrongType {
            name: name.clone(),
            expected: kind.describe(),
        })?;
        checked.insert(name.clone(), accepted);
    }
    Ok(checked)
}
