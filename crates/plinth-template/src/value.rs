/*
 * value.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The runtime value type and its output formatting.
//!
//! Every expression, filter, and function in the template language produces a
//! [`Value`]. Conversion from site data (front matter, data files) happens in
//! the content layer; this crate only consumes the result, plus the JSON
//! bridge in [`Value::from_json`].

use chrono::{DateTime, FixedOffset};

use crate::model::Object;

/// Calendar pattern used whenever a timestamp reaches output.
///
/// Renders like `January 7, 2026` (day unpadded).
pub const DATE_FORMAT: &str = "%B %-d, %Y";

/// A value flowing through template evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A string value.
    Str(String),

    /// An integer value.
    Int(i64),

    /// A boolean value.
    Bool(bool),

    /// A timestamp value.
    Date(DateTime<FixedOffset>),

    /// An ordered sequence of values.
    List(Vec<Value>),

    /// An opaque object reference (page, site, menu entry, config).
    Object(Object),

    /// The absent value. Unknown names, disallowed methods, and unregistered
    /// functions all resolve to this instead of raising.
    Nil,
}

impl Value {
    /// Truthiness for conditional evaluation.
    ///
    /// The falsy set is closed: boolean false, nil, the empty string, and the
    /// empty sequence. Everything else is truthy, including integer zero and
    /// the string `"false"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Nil => false,
            Value::Int(_) | Value::Date(_) | Value::Object(_) => true,
        }
    }

    /// Render this value as final output text.
    ///
    /// - strings pass through
    /// - booleans and integers stringify canonically
    /// - timestamps format with [`DATE_FORMAT`]
    /// - a sequence of strings joins with `", "`
    /// - a sequence of objects joins representative titles with `", "`
    /// - any other sequence reports its element count
    /// - an object renders its representative title/name
    /// - nil renders as the empty string
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::List(items) => render_list(items),
            Value::Object(obj) => obj.representative(),
            Value::Nil => String::new(),
        }
    }

    /// Convert a JSON value into a template value.
    ///
    /// Numbers outside the integer range and JSON objects have no counterpart
    /// in the template value model; both degrade to strings of their JSON
    /// serialization so data files never abort a render.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Str(n.to_string()),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Str(json.to_string()),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

fn render_list(items: &[Value]) -> String {
    if items.is_empty() {
        return String::new();
    }
    if items.iter().all(|v| matches!(v, Value::Str(_))) {
        return items
            .iter()
            .map(Value::render)
            .collect::<Vec<_>>()
            .join(", ");
    }
    if items.iter().all(|v| matches!(v, Value::Object(_))) {
        return items
            .iter()
            .map(|v| match v {
                Value::Object(obj) => obj.representative(),
                _ => unreachable!(),
            })
            .collect::<Vec<_>>()
            .join(", ");
    }
    items.len().to_string()
}
