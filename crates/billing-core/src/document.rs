//! Lenient access to flat JSON documents.
//!
//! Catalog and purchase documents are flat string-keyed objects whose fields
//! may be missing or carry an unexpected primitive type. Accessors never fail:
//! a missing or unusable value yields the type's default.

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// A parsed flat JSON object.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Parse a JSON object. Syntax errors and non-object documents are
    /// rejected.
    pub fn parse(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(CoreError::MalformedRecord(format!(
                "expected a JSON object, got {}",
                value_kind(&other)
            ))),
        }
    }

    /// String field; numbers and booleans are rendered, anything else is "".
    pub fn opt_str(&self, key: &str) -> String {
        match self.fields.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    /// Integer field; floats are truncated, numeric strings are parsed,
    /// anything else is 0.
    pub fn opt_i64(&self, key: &str) -> i64 {
        match self.fields.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => parse_lenient_i64(s).unwrap_or(0),
            _ => 0,
        }
    }

    /// Whether the field is present (even if null).
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

fn parse_lenient_i64(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
