//! Canonical runtime value domain
//!
//! This module defines the closed set of value kinds a normalized record
//! may contain, and the tagged-union [`Value`] type that carries them.
//! Raw records arrive as loosely-typed JSON-ish trees; everything the
//! engine does downstream (coercion, path addressing, script marshalling)
//! dispatches on the explicit discriminant instead of reflection.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

/// The closed enumeration of value kinds a field definition may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Binary,
    String,
    UInt64,
    Int64,
    Float64,
    Array,
    Map,
    Timestamp,
    Null,
    /// Accept the value as-is; no coercion, null rules still apply
    Any,
}

impl ValueKind {
    /// Resolve a definition-document type literal to its kind.
    ///
    /// The accepted lexicon is fixed: `string`, `binary`, `int`, `uint`,
    /// `float`, `bool`, `time`, `array`, `map`, `any`.
    pub fn from_name(name: &str) -> Option<ValueKind> {
        match name {
            "string" => Some(ValueKind::String),
            "binary" => Some(ValueKind::Binary),
            "int" => Some(ValueKind::Int64),
            "uint" => Some(ValueKind::UInt64),
            "float" => Some(ValueKind::Float64),
            "bool" => Some(ValueKind::Bool),
            "time" => Some(ValueKind::Timestamp),
            "array" => Some(ValueKind::Array),
            "map" => Some(ValueKind::Map),
            "any" => Some(ValueKind::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Binary => "binary",
            ValueKind::String => "string",
            ValueKind::UInt64 => "uint",
            ValueKind::Int64 => "int",
            ValueKind::Float64 => "float",
            ValueKind::Array => "array",
            ValueKind::Map => "map",
            ValueKind::Timestamp => "time",
            ValueKind::Null => "null",
            ValueKind::Any => "any",
        }
    }
}

/// A string-keyed record, raw or normalized.
pub type ValueMap = HashMap<String, Value>;

/// One dynamically-typed runtime value.
///
/// Host-side numerics are already canonicalized to the three 64-bit
/// kinds at construction, so coercion never has to widen `i32`/`u8`/...
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Array(Vec<Value>),
    Map(ValueMap),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int64,
            Value::UInt(_) => ValueKind::UInt64,
            Value::Float(_) => ValueKind::Float64,
            Value::String(_) => ValueKind::String,
            Value::Binary(_) => ValueKind::Binary,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Array(_) => ValueKind::Array,
            Value::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Re-encode as a `serde_json::Value`.
    ///
    /// Binary becomes an array of byte-sized numbers, timestamps an
    /// RFC-3339 string; both survive a trip back through [`Value::from`]
    /// only up to those representations.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::UInt(u) => serde_json::Value::from(*u),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Binary(b) => serde_json::Value::Array(b.iter().map(|v| serde_json::Value::from(*v)).collect()),
            Value::Timestamp(t) => {
                serde_json::Value::String(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

/// Convert a JSON object literal into a raw record map.
///
/// Non-object documents produce an empty map; raw records are objects by
/// construction upstream.
pub fn map_from_json(v: serde_json::Value) -> ValueMap {
    match Value::from(v) {
        Value::Map(m) => m,
        _ => ValueMap::new(),
    }
}
