//! In-process reflection-marshalling backend
//!
//! Host values are exposed to the sandbox by direct structural
//! conversion: maps, arrays and scalars map one-to-one onto their
//! rhai-native equivalents, binary becomes a blob, and timestamps cross
//! as a registered host `DateTime` (truncated per the declared precision
//! rule in [`super::runtime::clamp_precision`]). Cheap when the sandbox
//! shares the host's memory space.
//!
//! The return path doubles as the output sanitizer: unit-valued map
//! entries (the sandbox's "absent" sentinel) are deleted, unit array
//! elements are nulled in place so positions survive, and non-finite
//! floats become null.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::error::Result;
use crate::schema::{FieldDefinition, Schema};
use crate::value::{Value, ValueMap};
use chrono::{DateTime, Utc};
use rhai::Dynamic;

use super::runtime::{clamp_precision, element_def, field_def, SandboxCore, ScriptRuntime};

pub(crate) struct ReflectRuntime {
    core: SandboxCore,
}

impl ReflectRuntime {
    pub(crate) fn new() -> Self {
        ReflectRuntime {
            core: SandboxCore::new(),
        }
    }
}

impl ScriptRuntime for ReflectRuntime {
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
        let source = record_to_dynamic(schema, record);
        let env = record_to_dynamic(None, self.core.environment());

        let result = self.core.run(source, env)?;
        Ok(collect_rows(result))
    }
}

/// Split a script result into output rows: unit means no rows, a map is
/// one row, an array yields one row per structured element.
pub(crate) fn collect_rows(result: Dynamic) -> Vec<ValueMap> {
    if result.is_unit() {
        return Vec::new();
    }
    if result.is_array() {
        return result
            .into_array()
            .unwrap_or_default()
            .into_iter()
            .filter_map(row_from_dynamic)
            .collect();
    }
    row_from_dynamic(result).into_iter().collect()
}

fn row_from_dynamic(d: Dynamic) -> Option<ValueMap> {
    match dynamic_to_value(d) {
        Value::Map(m) => Some(m),
        _ => None,
    }
}

pub(crate) fn record_to_dynamic(schema: Option<&Schema>, record: &ValueMap) -> Dynamic {
    let mut out = rhai::Map::new();
    for (key, value) in record {
        let def = schema.and_then(|s| s.field(key));
        out.insert(key.as_str().into(), value_to_dynamic(def, value));
    }
    out.into()
}

pub(crate) fn value_to_dynamic(def: Option<&FieldDefinition>, value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        // The sandbox integer domain is i64; larger unsigned values wrap
        Value::UInt(u) => (*u as i64).into(),
        Value::Float(f) => (*f).into(),
        Value::String(s) => s.clone().into(),
        Value::Binary(b) => Dynamic::from_blob(b.clone()),
        Value::Timestamp(t) => Dynamic::from(clamp_precision(def, *t)),
        Value::Array(items) => {
            let sub = element_def(def);
            Dynamic::from_array(items.iter().map(|v| value_to_dynamic(sub, v)).collect())
        }
        Value::Map(map) => {
            let mut out = rhai::Map::new();
            for (key, v) in map {
                out.insert(key.as_str().into(), value_to_dynamic(field_def(def, key), v));
            }
            out.into()
        }
    }
}

/// Convert a sandbox value back into the host domain, sanitizing as it
/// goes. Host types with no record representation collapse to null.
pub(crate) fn dynamic_to_value(d: Dynamic) -> Value {
    if d.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = d.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = d.as_int() {
        return Value::Int(i);
    }
    if let Ok(f) = d.as_float() {
        if !f.is_finite() {
            return Value::Null;
        }
        return Value::Float(f);
    }
    if d.is_string() {
        return match d.into_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::Null,
        };
    }
    if d.is_blob() {
        return match d.into_blob() {
            Ok(b) => Value::Binary(b),
            Err(_) => Value::Null,
        };
    }
    if d.is_array() {
        let items = d.into_array().unwrap_or_default();
        // Absent elements are nulled in place; arrays keep positions
        return Value::Array(items.into_iter().map(dynamic_to_value).collect());
    }
    if d.is_map() {
        let map = d.try_cast::<rhai::Map>().unwrap_or_default();
        let mut out = ValueMap::new();
        for (key, v) in map {
            if v.is_unit() {
                // Absent map entries are deleted from the output
                continue;
            }
            out.insert(key.to_string(), dynamic_to_value(v));
        }
        return Value::Map(out);
    }
    if d.is::<DateTime<Utc>>() {
        return match d.try_cast::<DateTime<Utc>>() {
            Some(t) => Value::Timestamp(t),
            None => Value::Null,
        };
    }

    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_round_trip() {
        for v in [
            Value::Bool(true),
            Value::Int(-5),
            Value::Float(1.25),
            Value::String("x".into()),
            Value::Binary(vec![1, 2]),
        ] {
            assert_eq!(dynamic_to_value(value_to_dynamic(None, &v)), v);
        }
    }

    #[test]
    fn unit_map_entries_are_deleted() {
        let mut map = rhai::Map::new();
        map.insert("keep".into(), Dynamic::from(1_i64));
        map.insert("drop".into(), Dynamic::UNIT);
        let v = dynamic_to_value(map.into());
        let m = v.as_map().unwrap();
        assert!(m.contains_key("keep"));
        assert!(!m.contains_key("drop"));
    }

    #[test]
    fn unit_array_elements_become_null_in_place() {
        let arr: rhai::Array = vec![Dynamic::from(1_i64), Dynamic::UNIT, Dynamic::from(3_i64)];
        let v = dynamic_to_value(Dynamic::from_array(arr));
        assert_eq!(
            v,
            Value::Array(vec![Value::Int(1), Value::Null, Value::Int(3)])
        );
    }

    #[test]
    fn non_finite_floats_are_nulled() {
        assert_eq!(dynamic_to_value(Dynamic::from(f64::NAN)), Value::Null);
        assert_eq!(dynamic_to_value(Dynamic::from(f64::INFINITY)), Value::Null);
    }

    #[test]
    fn unit_result_means_no_rows() {
        assert!(collect_rows(Dynamic::UNIT).is_empty());
    }
}
