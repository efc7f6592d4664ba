// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative plugin config schemas.
//!
//! The admin layer stores configs as untyped JSON; validation coerces
//! them against the declared field table on the way in (int accepts a
//! numeric string, bool accepts "true"/"1") and masks sensitive fields
//! on the way out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Config validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("missing required field {0}")]
    MissingRequired(String),

    #[error("field {field} expects {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("config must be a JSON object")]
    NotAnObject,
}

/// Field value types a schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
    Arraystring,
    Arrayint,
    Arraybool,
    Arrayobject,
    Object,
}

/// One declared config field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Masked when configs are read back out to API clients.
    #[serde(default)]
    pub sensitive: bool,
    /// Field table for `object` / `arrayobject` values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<Vec<ConfigField>>,
}

/// Validate and coerce a raw config against a schema. Returns the
/// typed config with defaults filled in. Unknown keys are preserved.
pub fn validate_config(schema: &[ConfigField], raw: &Value) -> Result<Value, SchemaError> {
    let raw = raw.as_object().ok_or(SchemaError::NotAnObject)?;
    let mut out = raw.clone();

    for field in schema {
        match raw.get(&field.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &field.default {
                    out.insert(field.name.clone(), default.clone());
                } else if field.required {
                    return Err(SchemaError::MissingRequired(field.name.clone()));
                }
            }
            Some(value) => {
                let coerced = coerce(field, value)?;
                out.insert(field.name.clone(), coerced);
            }
        }
    }
    Ok(Value::Object(out))
}

fn coerce(field: &ConfigField, value: &Value) -> Result<Value, SchemaError> {
    let wrong = |expected: &'static str| SchemaError::WrongType {
        field: field.name.clone(),
        expected,
    };
    match field.field_type {
        FieldType::String => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(wrong("a string")),
        },
        FieldType::Int => coerce_int(value).ok_or_else(|| wrong("an integer")),
        FieldType::Bool => coerce_bool(value).ok_or_else(|| wrong("a boolean")),
        FieldType::Arraystring => coerce_array(value, |v| match v {
            Value::String(_) => Some(v.clone()),
            Value::Number(n) => Some(Value::String(n.to_string())),
            _ => None,
        })
        .ok_or_else(|| wrong("an array of strings")),
        FieldType::Arrayint => {
            coerce_array(value, coerce_int).ok_or_else(|| wrong("an array of integers"))
        }
        FieldType::Arraybool => {
            coerce_array(value, coerce_bool).ok_or_else(|| wrong("an array of booleans"))
        }
        FieldType::Arrayobject => match value {
            Value::Array(items) => {
                let nested = field.nested.as_deref().unwrap_or(&[]);
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(validate_config(nested, item).map_err(|_| wrong("an array of objects"))?);
                }
                Ok(Value::Array(out))
            }
            _ => Err(wrong("an array of objects")),
        },
        FieldType::Object => match value {
            Value::Object(_) => match field.nested.as_deref() {
                Some(nested) => validate_config(nested, value),
                None => Ok(value.clone()),
            },
            _ => Err(wrong("an object")),
        },
    }
}

fn coerce_int(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n.as_f64().map(|f| Value::from(f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        _ => None,
    }
}

fn coerce_array(value: &Value, item: impl Fn(&Value) -> Option<Value>) -> Option<Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(item)
            .collect::<Option<Vec<Value>>>()
            .map(Value::Array),
        _ => None,
    }
}

/// Replace sensitive field values for API read-out. The stored config
/// keeps the real values.
pub fn mask_config(schema: &[ConfigField], config: &Value) -> Value {
    let Some(object) = config.as_object() else {
        return config.clone();
    };
    let mut out = object.clone();
    for field in schema {
        if field.sensitive && out.contains_key(&field.name) {
            out.insert(field.name.clone(), Value::String("***".into()));
            continue;
        }
        if let (Some(nested), Some(value)) = (field.nested.as_deref(), object.get(&field.name)) {
            match value {
                Value::Object(_) => {
                    out.insert(field.name.clone(), mask_config(nested, value));
                }
                Value::Array(items) => {
                    out.insert(
                        field.name.clone(),
                        Value::Array(items.iter().map(|v| mask_config(nested, v)).collect()),
                    );
                }
                _ => {}
            }
        }
    }
    Value::Object(out)
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
