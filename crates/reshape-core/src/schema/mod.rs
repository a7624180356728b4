//! Schema tree, definition resolution, and record normalization
//!
//! A [`Schema`] maps field names to [`FieldDefinition`]s. It is built
//! once from a definition document and never mutated afterwards; share
//! it across threads behind an `Arc`. Field names may themselves contain
//! dots, representing explicit flattened-path fields.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

pub mod definition;
pub mod path;

pub use definition::FieldDefinition;
pub use path::{parse_path, parse_path_entry};

use crate::coercion;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::value::{Value, ValueKind, ValueMap};
use std::collections::HashMap;

/// Raw-record keys with this prefix are pipeline metadata: passed through
/// normalization untouched, never coerced.
pub const INTERNAL_PREFIX: char = '$';

/// An immutable mapping of field name to definition, possibly nested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: HashMap<String, FieldDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Schema {
            fields: HashMap::new(),
        }
    }

    /// Build a schema from a JSON definition document.
    pub fn from_json(text: &str) -> Result<Schema> {
        let doc: serde_json::Value = serde_json::from_str(text)?;
        Self::from_document(&doc)
    }

    /// Build a schema from an already-parsed definition document.
    pub fn from_document(doc: &serde_json::Value) -> Result<Schema> {
        let obj = doc.as_object().ok_or(Error::InvalidSchemaDocument)?;
        let mut schema = Schema::new();
        for (name, value) in obj {
            schema.insert(name.clone(), FieldDefinition::from_document(name, value)?);
        }
        Ok(schema)
    }

    pub(crate) fn insert(&mut self, name: String, def: FieldDefinition) {
        self.fields.insert(name, def);
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldDefinition)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Find the definition governing a dotted/indexed path, or `None`.
    ///
    /// A miss is a documented outcome, not an error: the normalizer and
    /// record view use it pervasively to mean "silently skip".
    pub fn resolve(&self, value_path: &str) -> Option<&FieldDefinition> {
        self.resolve_segments(&parse_path(value_path))
    }

    /// Segment-level resolution. Array definitions are unwrapped through
    /// to their element type before the next key is consulted; a
    /// non-container asked to resolve a further segment is a miss.
    pub(crate) fn resolve_segments(&self, parts: &[String]) -> Option<&FieldDefinition> {
        let mut fields = &self.fields;
        let mut def: Option<&FieldDefinition> = None;

        for entry in parts {
            if let Some(mut current) = def {
                if current.kind == ValueKind::Array {
                    while current.kind == ValueKind::Array {
                        current = current.subtype.as_deref()?;
                    }
                    if current.kind != ValueKind::Map {
                        // Scalar element type: the remaining segments can
                        // only be index addressing, governed by this def
                        return Some(current);
                    }
                }
                match current.kind {
                    ValueKind::Map => fields = &current.fields.as_ref()?.fields,
                    _ => return None,
                }
            }

            let (key, _) = parse_path_entry(entry);
            def = Some(fields.get(key)?);
        }

        def
    }

    /// Produce the canonical form of a raw record: every schema-known
    /// field coerced to its declared kind, internal `$`-keys passed
    /// through, flattened path keys resolved and stored under their
    /// literal key.
    pub fn normalize(&self, data: &ValueMap) -> ValueMap {
        let mut result = ValueMap::new();

        for (name, def) in &self.fields {
            if name.starts_with(INTERNAL_PREFIX) {
                continue;
            }
            // A schema field that is itself a flattened path only
            // participates when the path resolves against this schema
            if name.contains('.') && self.resolve(name).is_none() {
                continue;
            }
            let Some(value) = data.get(name) else {
                continue;
            };
            result.insert(name.clone(), apply(def, value));
        }

        for (key, value) in data {
            if key.starts_with(INTERNAL_PREFIX) {
                result.insert(key.clone(), value.clone());
                continue;
            }
            if !key.contains('.') {
                continue;
            }
            let Some(def) = self.resolve(key) else {
                // Speculative path update for a field this schema version
                // does not know; dropped without complaint
                continue;
            };
            match coercion::coerce(def, value) {
                Ok(v) => {
                    result.insert(key.clone(), v);
                }
                Err(err) => {
                    tracing::debug!(key, %err, "dropping unconvertible flattened path key");
                }
            }
        }

        result
    }

    /// Normalize and wrap in a typed, path-addressable [`Record`] view.
    pub fn scan(&self, data: &ValueMap) -> Record<'_> {
        Record::new(self, self.normalize(data))
    }
}

/// Per-field coercion with normalization semantics: a failed coercion
/// becomes null, or the kind's zero value for `notNull` fields.
fn apply(def: &FieldDefinition, value: &Value) -> Value {
    match coercion::coerce(def, value) {
        Ok(v) => v,
        Err(err) => {
            tracing::debug!(%err, "field value has no representation in its declared kind");
            if def.not_null {
                coercion::zero_value(def.kind)
            } else {
                Value::Null
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::map_from_json;
    use serde_json::json;

    fn schema(doc: serde_json::Value) -> Schema {
        Schema::from_document(&doc).unwrap()
    }

    fn nested_schema() -> Schema {
        schema(json!({
            "name": {"type": "string"},
            "object": {
                "type": "map",
                "fields": {
                    "title": {"type": "string"},
                    "tags": {"type": "array", "subtype": "string"}
                }
            },
            "rows": {
                "type": "array",
                "subtype": {
                    "type": "map",
                    "fields": {"id": {"type": "int"}}
                }
            }
        }))
    }

    #[test]
    fn resolve_plain_and_nested() {
        let s = nested_schema();
        assert_eq!(s.resolve("name").unwrap().kind, ValueKind::String);
        assert_eq!(s.resolve("object.title").unwrap().kind, ValueKind::String);
        assert!(s.resolve("object.missing").is_none());
        assert!(s.resolve("missing").is_none());
    }

    #[test]
    fn resolve_through_arrays() {
        let s = nested_schema();
        assert_eq!(s.resolve("rows.id").unwrap().kind, ValueKind::Int64);
        assert_eq!(s.resolve("rows[0].id").unwrap().kind, ValueKind::Int64);
        assert_eq!(s.resolve("object.tags").unwrap().kind, ValueKind::Array);
        // Scalar element types terminate resolution at the element def
        assert_eq!(s.resolve("object.tags.0").unwrap().kind, ValueKind::String);
    }

    #[test]
    fn resolve_past_scalar_is_a_miss() {
        let s = nested_schema();
        assert!(s.resolve("name.anything").is_none());
    }

    #[test]
    fn normalize_coerces_known_fields_and_drops_unknown() {
        let s = schema(json!({
            "name": {"type": "string"},
            "balance": {"type": "int"}
        }));
        let raw = map_from_json(json!({
            "name": "Fred",
            "balance": "123456",
            "unknown": true
        }));
        let out = s.normalize(&raw);
        assert_eq!(out.get("name"), Some(&Value::String("Fred".into())));
        assert_eq!(out.get("balance"), Some(&Value::Int(123456)));
        assert!(!out.contains_key("unknown"));
    }

    #[test]
    fn normalize_recurses_into_map_fields() {
        let s = nested_schema();
        let raw = map_from_json(json!({
            "object": {"title": 42, "dropped": "x"}
        }));
        let out = s.normalize(&raw);
        let object = out.get("object").unwrap().as_map().unwrap();
        assert_eq!(object.get("title"), Some(&Value::String("42".into())));
        assert!(!object.contains_key("dropped"));
    }

    #[test]
    fn internal_fields_pass_through_untouched() {
        let s = schema(json!({"name": {"type": "string"}}));
        let raw = map_from_json(json!({
            "name": "x",
            "$removedFields": ["a", "b"]
        }));
        let out = s.normalize(&raw);
        assert_eq!(
            out.get("$removedFields"),
            Some(&Value::Array(vec![
                Value::String("a".into()),
                Value::String("b".into())
            ]))
        );
    }

    #[test]
    fn flattened_path_keys_are_independent_of_the_nested_tree() {
        let s = nested_schema();
        let raw = map_from_json(json!({
            "object.title": "X",
            "object": {"title": "Y"}
        }));
        let out = s.normalize(&raw);
        assert_eq!(out.get("object.title"), Some(&Value::String("X".into())));
        let nested = out.get("object").unwrap().as_map().unwrap();
        assert_eq!(nested.get("title"), Some(&Value::String("Y".into())));
    }

    #[test]
    fn unresolvable_flattened_keys_are_dropped() {
        let s = nested_schema();
        let raw = map_from_json(json!({"object.nope.deep": 1}));
        let out = s.normalize(&raw);
        assert!(out.is_empty());
    }

    #[test]
    fn flattened_array_index_keys_resolve_to_element_type() {
        let s = nested_schema();
        let raw = map_from_json(json!({"object.tags.0": 7}));
        let out = s.normalize(&raw);
        // Governed by the array's element definition (string)
        assert_eq!(out.get("object.tags.0"), Some(&Value::String("7".into())));
    }

    #[test]
    fn array_all_or_nothing_nulls_the_field() {
        let s = schema(json!({
            "nums": {"type": "array", "subtype": "int"}
        }));
        let raw = map_from_json(json!({"nums": ["a", "b", "c"]}));
        let out = s.normalize(&raw);
        assert_eq!(out.get("nums"), Some(&Value::Null));

        let raw = map_from_json(json!({"nums": ["1", 2]}));
        let out = s.normalize(&raw);
        assert_eq!(
            out.get("nums"),
            Some(&Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let s = nested_schema();
        let raw = map_from_json(json!({
            "name": 17,
            "object": {"title": "t", "tags": [1, 2]},
            "rows": [{"id": "5"}]
        }));
        let once = s.normalize(&raw);
        let twice = s.normalize(&once);
        assert_eq!(once, twice);
    }
}
