//! Field definitions and definition-document parsing
//!
//! A definition document is a string-keyed JSON object; every entry needs
//! a `type` literal and, depending on the type, a `subtype` (arrays), a
//! `fields` object (maps) or a `precision` hint (time). Malformed
//! documents fail construction with a distinguishable error per cause;
//! nothing is deferred to normalization time.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::coercion::time::TimeInfo;
use crate::error::{Error, Result};
use crate::value::ValueKind;

use super::Schema;

/// The typed contract for one field: kind, nullability, and kind-specific
/// metadata. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub kind: ValueKind,
    /// Null input coalesces to the kind's zero value instead of null
    pub not_null: bool,
    /// Element definition; present iff `kind` is array
    pub subtype: Option<Box<FieldDefinition>>,
    /// Nested schema; present iff `kind` is map
    pub fields: Option<Schema>,
    /// Precision hint; only meaningful for time fields
    pub time_info: Option<TimeInfo>,
    /// Unrecognized document keys, retained opaquely
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl FieldDefinition {
    pub fn new(kind: ValueKind) -> Self {
        FieldDefinition {
            kind,
            not_null: false,
            subtype: None,
            fields: None,
            time_info: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Parse one field entry of a definition document.
    pub fn from_document(field: &str, doc: &serde_json::Value) -> Result<FieldDefinition> {
        let obj = doc
            .as_object()
            .ok_or_else(|| Error::InvalidTypeDefinition {
                field: field.to_string(),
            })?;

        let type_name = match obj.get("type") {
            Some(serde_json::Value::String(s)) => s.as_str(),
            _ => {
                return Err(Error::InvalidTypeDefinition {
                    field: field.to_string(),
                })
            }
        };

        let kind = ValueKind::from_name(type_name).ok_or_else(|| Error::UnknownType {
            field: field.to_string(),
            name: type_name.to_string(),
        })?;

        let mut def = FieldDefinition::new(kind);

        match obj.get("notNull") {
            None => {}
            Some(serde_json::Value::Bool(b)) => def.not_null = *b,
            Some(_) => {
                return Err(Error::InvalidNotNullDefinition {
                    field: field.to_string(),
                })
            }
        }

        match kind {
            ValueKind::Array => {
                let subtype = obj.get("subtype").ok_or_else(|| Error::InvalidArraySubtype {
                    field: field.to_string(),
                })?;
                def.subtype = Some(Box::new(Self::subtype_from_document(field, obj, subtype)?));
            }
            ValueKind::Map => {
                def.fields = Some(Self::fields_from_document(field, obj.get("fields"))?);
            }
            ValueKind::Timestamp => {
                def.time_info = Some(TimeInfo::from_props(obj));
            }
            _ => {}
        }

        for (key, value) in obj {
            match key.as_str() {
                "type" | "fields" | "notNull" | "subtype" => continue,
                _ => {
                    def.metadata.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(def)
    }

    /// An array `subtype` is either a bare type name (with map field sets
    /// hoisted from the sibling `fields` key, a legacy compatibility
    /// path) or a full nested definition object.
    fn subtype_from_document(
        field: &str,
        parent: &serde_json::Map<String, serde_json::Value>,
        subtype: &serde_json::Value,
    ) -> Result<FieldDefinition> {
        match subtype {
            serde_json::Value::String(name) => {
                let mut doc = serde_json::Map::new();
                doc.insert("type".to_string(), serde_json::Value::String(name.clone()));
                if let Some(fields) = parent.get("fields") {
                    doc.insert("fields".to_string(), fields.clone());
                }
                Self::from_document(field, &serde_json::Value::Object(doc))
            }
            serde_json::Value::Object(_) => Self::from_document(field, subtype),
            _ => Err(Error::InvalidArraySubtype {
                field: field.to_string(),
            }),
        }
    }

    fn fields_from_document(field: &str, fields: Option<&serde_json::Value>) -> Result<Schema> {
        match fields {
            Some(serde_json::Value::Object(entries)) => {
                let mut schema = Schema::new();
                for (name, value) in entries {
                    schema.insert(name.clone(), FieldDefinition::from_document(name, value)?);
                }
                Ok(schema)
            }
            _ => Err(Error::InvalidFieldsDefinition {
                field: field.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coercion::time::TimePrecision;
    use serde_json::json;

    #[test]
    fn scalar_definition() {
        let def = FieldDefinition::from_document("name", &json!({"type": "string"})).unwrap();
        assert_eq!(def.kind, ValueKind::String);
        assert!(!def.not_null);
    }

    #[test]
    fn missing_type_fails() {
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({})),
            Err(Error::InvalidTypeDefinition { .. })
        ));
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": 5})),
            Err(Error::InvalidTypeDefinition { .. })
        ));
    }

    #[test]
    fn unknown_type_fails() {
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": "varchar"})),
            Err(Error::UnknownType { .. })
        ));
    }

    #[test]
    fn array_requires_subtype() {
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": "array"})),
            Err(Error::InvalidArraySubtype { .. })
        ));

        let def =
            FieldDefinition::from_document("x", &json!({"type": "array", "subtype": "int"}))
                .unwrap();
        assert_eq!(def.subtype.as_ref().unwrap().kind, ValueKind::Int64);
    }

    #[test]
    fn map_requires_fields() {
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": "map"})),
            Err(Error::InvalidFieldsDefinition { .. })
        ));
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": "map", "fields": null})),
            Err(Error::InvalidFieldsDefinition { .. })
        ));
    }

    #[test]
    fn legacy_array_of_maps_hoists_sibling_fields() {
        let def = FieldDefinition::from_document(
            "x",
            &json!({
                "type": "array",
                "subtype": "map",
                "fields": {"title": {"type": "string"}}
            }),
        )
        .unwrap();
        let subtype = def.subtype.unwrap();
        assert_eq!(subtype.kind, ValueKind::Map);
        assert!(subtype.fields.unwrap().field("title").is_some());
    }

    #[test]
    fn nested_array_subtype_object() {
        let def = FieldDefinition::from_document(
            "x",
            &json!({
                "type": "array",
                "subtype": {"type": "array", "subtype": "uint"}
            }),
        )
        .unwrap();
        let inner = def.subtype.unwrap();
        assert_eq!(inner.kind, ValueKind::Array);
        assert_eq!(inner.subtype.unwrap().kind, ValueKind::UInt64);
    }

    #[test]
    fn not_null_must_be_boolean() {
        assert!(matches!(
            FieldDefinition::from_document("x", &json!({"type": "int", "notNull": "yes"})),
            Err(Error::InvalidNotNullDefinition { .. })
        ));
    }

    #[test]
    fn precision_parsed_and_unknown_tolerated() {
        let def = FieldDefinition::from_document(
            "x",
            &json!({"type": "time", "precision": "microsecond"}),
        )
        .unwrap();
        assert_eq!(
            def.time_info.unwrap().precision,
            Some(TimePrecision::Microsecond)
        );

        let def =
            FieldDefinition::from_document("x", &json!({"type": "time", "precision": "eon"}))
                .unwrap();
        assert_eq!(def.time_info.unwrap().precision, None);
    }

    #[test]
    fn extra_keys_are_retained_as_metadata() {
        let def = FieldDefinition::from_document(
            "x",
            &json!({"type": "string", "comment": "primary key"}),
        )
        .unwrap();
        assert_eq!(def.metadata.get("comment"), Some(&json!("primary key")));
    }
}
