//! Typed, path-addressed reads over a normalized record
//!
//! [`Record`] binds a schema to one normalized record and answers
//! single-field lookups: resolve the governing definition, walk the raw
//! tree by the same segments (honoring `[N]` index segments), and apply
//! coercion once more defensively. A miss at any segment is a documented
//! not-found outcome.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::coercion;
use crate::schema::{parse_path, parse_path_entry, FieldDefinition, Schema};
use crate::value::{Value, ValueMap};

/// A read-oriented view over a schema plus one normalized record.
#[derive(Debug, Clone)]
pub struct Record<'a> {
    schema: &'a Schema,
    data: ValueMap,
}

/// One resolved field: its governing definition and the coerced value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue<'a> {
    pub definition: &'a FieldDefinition,
    pub data: Value,
}

impl<'a> Record<'a> {
    pub fn new(schema: &'a Schema, data: ValueMap) -> Self {
        Record { schema, data }
    }

    /// The underlying normalized record.
    pub fn data(&self) -> &ValueMap {
        &self.data
    }

    pub fn into_data(self) -> ValueMap {
        self.data
    }

    /// Fetch the value at `path`, typed by its schema definition.
    ///
    /// Returns `None` when the path has no governing definition or the
    /// record tree does not contain the addressed slot.
    pub fn get_value(&self, path: &str) -> Option<TypedValue<'a>> {
        let parts = parse_path(path);
        let mut def = self.schema.resolve_segments(&parts)?;

        // An index on the last segment addresses one element, so the
        // element definition governs the coercion
        if let Some(last) = parts.last() {
            if parse_path_entry(last).1.is_some() {
                while def.kind == crate::value::ValueKind::Array {
                    def = def.subtype.as_deref()?;
                }
            }
        }

        let raw = walk(&self.data, &parts)?;
        let data = coercion::coerce(def, raw).unwrap_or(Value::Null);
        Some(TypedValue {
            definition: def,
            data,
        })
    }
}

fn walk<'v>(data: &'v ValueMap, parts: &[String]) -> Option<&'v Value> {
    let mut current: Option<&Value> = None;
    let mut map = Some(data);

    for part in parts {
        let (key, index) = parse_path_entry(part);
        let mut value = map?.get(key)?;

        if let (Some(i), Value::Array(items)) = (index, value) {
            value = items.get(i)?;
        }

        map = value.as_map();
        current = Some(value);
    }

    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{map_from_json, ValueKind};
    use serde_json::json;

    fn schema() -> Schema {
        Schema::from_document(&json!({
            "name": {"type": "string"},
            "object": {
                "type": "map",
                "fields": {
                    "title": {"type": "string"},
                    "tags": {"type": "array", "subtype": "string"}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn scan_gives_typed_reads() {
        let s = schema();
        let raw = map_from_json(json!({
            "name": 42,
            "object": {"title": "hello", "tags": ["a", "b"]}
        }));
        let record = s.scan(&raw);

        let v = record.get_value("name").unwrap();
        assert_eq!(v.definition.kind, ValueKind::String);
        assert_eq!(v.data, Value::String("42".into()));

        let v = record.get_value("object.title").unwrap();
        assert_eq!(v.data, Value::String("hello".into()));
    }

    #[test]
    fn array_index_segments() {
        let s = schema();
        let raw = map_from_json(json!({
            "object": {"tags": ["a", "b"]}
        }));
        let record = s.scan(&raw);

        let v = record.get_value("object.tags[1]").unwrap();
        assert_eq!(v.data, Value::String("b".into()));
        assert!(record.get_value("object.tags[9]").is_none());
    }

    #[test]
    fn misses_are_not_found() {
        let s = schema();
        let raw = map_from_json(json!({"name": "x"}));
        let record = s.scan(&raw);

        assert!(record.get_value("nope").is_none());
        assert!(record.get_value("object.title").is_none());
        assert!(record.get_value("name.deeper").is_none());
    }
}
