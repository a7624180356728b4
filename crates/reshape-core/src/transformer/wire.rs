//! Isolated-marshalling backend
//!
//! Models an execution environment that does not share memory layout
//! with the host: records cross the boundary as a compact
//! self-describing binary encoding (MessagePack), injected as a byte
//! buffer and decoded on the far side before the script runs; the
//! return path re-encodes the result and decodes it back into host
//! values. Timestamp and binary values travel in tagged single-key
//! wrappers so the encoding can tell opaque bytes from integer arrays
//! (and instants from plain strings) on round-trip.
//!
//! Behavior must match the reflection backend exactly; only the
//! boundary-crossing strategy differs.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::error::{Error, Result};
use crate::schema::{FieldDefinition, Schema};
use crate::value::{Value, ValueMap};
use chrono::{DateTime, SecondsFormat, Utc};
use rhai::Dynamic;

use super::runtime::{clamp_precision, element_def, field_def, SandboxCore, ScriptRuntime};

/// Tag keys of the boundary encoding's wrapper objects.
const TIME_TAG: &str = "$time";
const BINARY_TAG: &str = "$binary";

pub(crate) struct WireRuntime {
    core: SandboxCore,
}

impl WireRuntime {
    pub(crate) fn new() -> Self {
        WireRuntime {
            core: SandboxCore::new(),
        }
    }
}

impl ScriptRuntime for WireRuntime {
    fn set_environment(&mut self, env: ValueMap) {
        self.core.set_environment(env);
    }

    fn load_script(&mut self, script: &str) -> Result<()> {
        self.core.load_script(script)
    }

    fn compile(&mut self, script: &str) -> Result<()> {
        self.core.compile(script)
    }

    fn is_ready(&self) -> bool {
        self.core.is_ready()
    }

    fn execute(&mut self, schema: Option<&Schema>, record: &ValueMap) -> Result<Vec<ValueMap>> {
        // Host side: encode, cross the boundary, decode in-sandbox shape
        let source = inject(encode_record(schema, record)?)?;
        let env_map = self.core.environment().clone();
        let env = inject(encode_record(None, &env_map)?)?;

        let result = self.core.run(source, env)?;
        if result.is_unit() {
            return Ok(Vec::new());
        }

        // Return path: re-encode the sandbox result, decode as host values
        let json = extract(result)?;
        Ok(rows_from_json(json))
    }
}

/// Host-side encoding: a `Value` tree becomes a tagged JSON-model tree,
/// then MessagePack bytes. Unsigned values wrap into the sandbox's i64
/// integer domain, like the reflection backend.
fn encode_value(def: Option<&FieldDefinition>, value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::UInt(u) => serde_json::Value::from(*u as i64),
        Value::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
        }
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Binary(bytes) => serde_json::json!({
            BINARY_TAG: bytes.iter().map(|b| *b as i64).collect::<Vec<_>>()
        }),
        Value::Timestamp(t) => serde_json::json!({
            TIME_TAG: clamp_precision(def, *t).to_rfc3339_opts(SecondsFormat::AutoSi, true)
        }),
        Value::Array(items) => {
            let sub = element_def(def);
            serde_json::Value::Array(items.iter().map(|v| encode_value(sub, v)).collect())
        }
        Value::Map(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), encode_value(field_def(def, k), v)))
                .collect(),
        ),
    }
}

fn encode_record(schema: Option<&Schema>, record: &ValueMap) -> Result<Vec<u8>> {
    let mut doc = serde_json::Map::new();
    for (key, value) in record {
        let def = schema.and_then(|s| s.field(key));
        doc.insert(key.clone(), encode_value(def, value));
    }
    rmp_serde::to_vec(&serde_json::Value::Object(doc)).map_err(Error::marshal)
}

/// Far side of the boundary: decode the byte buffer into sandbox values
/// and resolve tag wrappers into sandbox-native shapes.
fn inject(bytes: Vec<u8>) -> Result<Dynamic> {
    let decoded: Dynamic = rmp_serde::from_slice(&bytes).map_err(Error::marshal)?;
    Ok(untag(decoded))
}

fn untag(d: Dynamic) -> Dynamic {
    if d.is_array() {
        let items = d.into_array().unwrap_or_default();
        return Dynamic::from_array(items.into_iter().map(untag).collect());
    }
    if d.is_map() {
        let map = d.try_cast::<rhai::Map>().unwrap_or_default();

        if map.len() == 1 {
            if let Some(tag) = map.get(TIME_TAG) {
                if let Ok(text) = tag.clone().into_string() {
                    if let Ok(t) = DateTime::parse_from_rfc3339(&text) {
                        return Dynamic::from(t.with_timezone(&Utc));
                    }
                }
            }
            if let Some(tag) = map.get(BINARY_TAG) {
                if tag.is_array() {
                    let bytes = tag
                        .clone()
                        .into_array()
                        .unwrap_or_default()
                        .into_iter()
                        .map(|v| v.as_int().unwrap_or(0) as u8)
                        .collect();
                    return Dynamic::from_blob(bytes);
                }
            }
        }

        let mut out = rhai::Map::new();
        for (key, v) in map {
            out.insert(key, untag(v));
        }
        return out.into();
    }
    d
}

/// Far-side return encoding: sanitize, re-tag sandbox-native shapes,
/// serialize, and decode on the host side.
fn extract(result: Dynamic) -> Result<serde_json::Value> {
    let tagged = retag(result);
    let bytes = rmp_serde::to_vec(&tagged).map_err(Error::marshal)?;
    rmp_serde::from_slice(&bytes).map_err(Error::marshal)
}

fn retag(d: Dynamic) -> Dynamic {
    if let Some(t) = d.clone().try_cast::<DateTime<Utc>>() {
        let mut map = rhai::Map::new();
        map.insert(
            TIME_TAG.into(),
            Dynamic::from(t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        );
        return map.into();
    }
    if d.is_blob() {
        let bytes = d.into_blob().unwrap_or_default();
        let mut map = rhai::Map::new();
        map.insert(
            BINARY_TAG.into(),
            Dynamic::from_array(bytes.into_iter().map(|b| Dynamic::from(b as i64)).collect()),
        );
        return map.into();
    }
    if d.is_array() {
        let items = d.into_array().unwrap_or_default();
        return Dynamic::from_array(items.into_iter().map(retag).collect());
    }
    if d.is_map() {
        let map = d.try_cast::<rhai::Map>().unwrap_or_default();
        let mut out = rhai::Map::new();
        for (key, v) in map {
            if v.is_unit() {
                // The sandbox's absent sentinel: deleted from the output
                continue;
            }
            out.insert(key, retag(v));
        }
        return out.into();
    }
    d
}

/// Host-side decoding of the returned document, resolving tag wrappers
/// back into host value kinds and applying the array/float sanitization
/// rules.
fn value_from_wire(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Object(map) => {
            if map.len() == 1 {
                if let Some(serde_json::Value::String(text)) = map.get(TIME_TAG) {
                    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
                        return Value::Timestamp(t.with_timezone(&Utc));
                    }
                }
                if let Some(serde_json::Value::Array(items)) = map.get(BINARY_TAG) {
                    return Value::Binary(
                        items
                            .iter()
                            .map(|v| v.as_i64().unwrap_or(0) as u8)
                            .collect(),
                    );
                }
            }
            Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, value_from_wire(v)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(value_from_wire).collect())
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            } else {
                Value::Null
            }
        }
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Null => Value::Null,
    }
}

fn rows_from_json(json: serde_json::Value) -> Vec<ValueMap> {
    match json {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match value_from_wire(item) {
                Value::Map(m) => Some(m),
                _ => None,
            })
            .collect(),
        other => match value_from_wire(other) {
            Value::Map(m) => vec![m],
            _ => Vec::new(),
        },
    }
}
