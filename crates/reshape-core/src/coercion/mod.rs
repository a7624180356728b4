//! Value coercion engine
//!
//! One conversion primitive per target kind, plus [`coerce`], which
//! dispatches on a field definition. Two regimes apply:
//!
//! - In record-normalization context the four leaf kinds (`int`, `uint`,
//!   `float`, `bool`) swallow parse failures into the kind's zero value.
//! - Array element coercion is strict: any failing element invalidates
//!   the whole array field, so the normalizer can null it.
//!
//! Structural mismatches (`binary`, `map`, and structured values landing
//! on a `string` field) always surface as [`CoerceError`] so the caller
//! decides whether the field becomes null or zero.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

pub mod time;

use crate::schema::FieldDefinition;
use crate::value::{Value, ValueKind};
use chrono::DateTime;
use thiserror::Error;
use time::{TimeInfo, TimeValue};

/// A value could not be represented as its declared kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// The source shape has no conversion to the target kind
    #[error("Cannot represent {actual} value as {expected}")]
    InvalidType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A string literal did not parse as the target kind
    #[error("Unparsable {expected} literal: '{literal}'")]
    Unparsable {
        expected: &'static str,
        literal: String,
    },
}

impl CoerceError {
    fn invalid(expected: ValueKind, actual: &Value) -> Self {
        CoerceError::InvalidType {
            expected: expected.name(),
            actual: actual.kind().name(),
        }
    }

    fn unparsable(expected: ValueKind, literal: &str) -> Self {
        CoerceError::Unparsable {
            expected: expected.name(),
            literal: literal.to_string(),
        }
    }
}

/// The zero value substituted for null input on `notNull` fields.
pub fn zero_value(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Binary => Value::Binary(Vec::new()),
        ValueKind::String => Value::String(String::new()),
        ValueKind::UInt64 => Value::UInt(0),
        ValueKind::Int64 => Value::Int(0),
        ValueKind::Float64 => Value::Float(0.0),
        ValueKind::Array => Value::Array(Vec::new()),
        ValueKind::Map => Value::Map(Default::default()),
        ValueKind::Timestamp => Value::Timestamp(DateTime::UNIX_EPOCH),
        ValueKind::Null | ValueKind::Any => Value::Null,
    }
}

/// Integer-literal parsing with the documented overflow contract: a
/// too-large literal wraps (two's complement), a too-negative literal
/// clamps to `i64::MIN`.
fn parse_int_literal(s: &str) -> Result<i64, CoerceError> {
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<i128>() {
        Ok(v) if v > i64::MAX as i128 => Ok(v as i64),
        Ok(_) => Ok(i64::MIN),
        Err(_) => Err(CoerceError::unparsable(ValueKind::Int64, s)),
    }
}

/// Unsigned-literal parsing; out-of-range literals (including negative
/// ones) wrap to the low 64 bits.
fn parse_uint_literal(s: &str) -> Result<u64, CoerceError> {
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<i128>() {
        Ok(v) => Ok(v as u64),
        Err(_) => Err(CoerceError::unparsable(ValueKind::UInt64, s)),
    }
}

fn parse_bool_literal(s: &str) -> Result<bool, CoerceError> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(CoerceError::unparsable(ValueKind::Bool, s)),
    }
}

pub fn try_int(value: &Value) -> Result<i64, CoerceError> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => Ok(*u as i64),
        Value::Float(f) => Ok(*f as i64),
        Value::Bool(b) => Ok(*b as i64),
        Value::String(s) => parse_int_literal(s),
        Value::Timestamp(t) => Ok(t.timestamp()),
        _ => Err(CoerceError::invalid(ValueKind::Int64, value)),
    }
}

pub fn try_uint(value: &Value) -> Result<u64, CoerceError> {
    match value {
        Value::Int(i) => Ok(*i as u64),
        Value::UInt(u) => Ok(*u),
        Value::Float(f) => Ok(*f as u64),
        Value::Bool(b) => Ok(*b as u64),
        Value::String(s) => parse_uint_literal(s),
        Value::Timestamp(t) => Ok(t.timestamp() as u64),
        _ => Err(CoerceError::invalid(ValueKind::UInt64, value)),
    }
}

pub fn try_float(value: &Value) -> Result<f64, CoerceError> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        Value::Float(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| CoerceError::unparsable(ValueKind::Float64, s)),
        Value::Timestamp(t) => Ok(t.timestamp() as f64),
        _ => Err(CoerceError::invalid(ValueKind::Float64, value)),
    }
}

pub fn try_bool(value: &Value) -> Result<bool, CoerceError> {
    match value {
        Value::Int(i) => Ok(*i > 0),
        Value::UInt(u) => Ok(*u > 0),
        Value::Float(f) => Ok(*f > 0.0),
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool_literal(s),
        Value::Timestamp(_) => Ok(true),
        _ => Err(CoerceError::invalid(ValueKind::Bool, value)),
    }
}

/// String rendering: base-10 integers, shortest round-trippable floats,
/// `true`/`false`, RFC-3339 timestamps. Structured values are not
/// silently absorbed; they surface as invalid-type so the normalizer can
/// null the field.
pub fn try_string(value: &Value) -> Result<String, CoerceError> {
    match value {
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::String(s) => Ok(s.clone()),
        Value::Timestamp(t) => Ok(t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        Value::Binary(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        Value::Array(_) | Value::Map(_) => Err(CoerceError::invalid(ValueKind::String, value)),
        Value::Null => Ok(String::new()),
    }
}

/// Binary accepts raw bytes, UTF-8 string bytes, or an array of small
/// integers truncated to one byte each. Anything else is an invalid-type
/// error rather than silent empty bytes.
pub fn try_binary(value: &Value) -> Result<Vec<u8>, CoerceError> {
    match value {
        Value::Binary(b) => Ok(b.clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => Ok(items
            .iter()
            .map(|v| try_uint(v).unwrap_or(0) as u8)
            .collect()),
        _ => Err(CoerceError::invalid(ValueKind::Binary, value)),
    }
}

/// Coerce `value` into the shape `def` declares, with normalization-
/// context semantics: leaf-kind parse failures collapse to the kind's
/// zero value, structural mismatches surface as errors.
pub fn coerce(def: &FieldDefinition, value: &Value) -> Result<Value, CoerceError> {
    coerce_with(def, value, false)
}

/// All-or-nothing element coercion used inside arrays: leaf-kind parse
/// failures are errors here so one bad element invalidates the field.
pub(crate) fn coerce_strict(def: &FieldDefinition, value: &Value) -> Result<Value, CoerceError> {
    coerce_with(def, value, true)
}

fn leaf<T>(result: Result<T, CoerceError>, strict: bool, zero: T) -> Result<T, CoerceError> {
    if strict {
        result
    } else {
        Ok(result.unwrap_or(zero))
    }
}

fn coerce_with(def: &FieldDefinition, value: &Value, strict: bool) -> Result<Value, CoerceError> {
    if value.is_null() {
        if !def.not_null {
            return Ok(Value::Null);
        }
        return Ok(zero_value(def.kind));
    }

    match def.kind {
        ValueKind::Int64 => leaf(try_int(value), strict, 0).map(Value::Int),
        ValueKind::UInt64 => leaf(try_uint(value), strict, 0).map(Value::UInt),
        ValueKind::Float64 => leaf(try_float(value), strict, 0.0).map(Value::Float),
        ValueKind::Bool => leaf(try_bool(value), strict, false).map(Value::Bool),
        ValueKind::String => try_string(value).map(Value::String),
        ValueKind::Binary => try_binary(value).map(Value::Binary),
        ValueKind::Timestamp => {
            let info = def.time_info.clone().unwrap_or_else(TimeInfo::default);
            match info.resolve(value) {
                TimeValue::Empty => Ok(Value::Null),
                TimeValue::At(t) => Ok(Value::Timestamp(t)),
            }
        }
        ValueKind::Array => match value {
            Value::Array(items) => {
                let subtype = def
                    .subtype
                    .as_deref()
                    .ok_or_else(|| CoerceError::invalid(ValueKind::Array, value))?;
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(coerce_strict(subtype, item)?);
                }
                Ok(Value::Array(out))
            }
            _ => Err(CoerceError::invalid(ValueKind::Array, value)),
        },
        ValueKind::Map => match value {
            Value::Map(map) => match &def.fields {
                Some(schema) => Ok(Value::Map(schema.normalize(map))),
                None => Ok(Value::Map(map.clone())),
            },
            _ => Err(CoerceError::invalid(ValueKind::Map, value)),
        },
        ValueKind::Null => Ok(Value::Null),
        ValueKind::Any => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDefinition;
    use chrono::{TimeZone, Utc};

    fn def(kind: ValueKind) -> FieldDefinition {
        FieldDefinition::new(kind)
    }

    fn not_null(kind: ValueKind) -> FieldDefinition {
        let mut d = FieldDefinition::new(kind);
        d.not_null = true;
        d
    }

    #[test]
    fn numeric_to_bool() {
        assert_eq!(coerce(&def(ValueKind::Bool), &Value::Int(5)), Ok(Value::Bool(true)));
        assert_eq!(coerce(&def(ValueKind::Bool), &Value::Int(0)), Ok(Value::Bool(false)));
        assert_eq!(coerce(&def(ValueKind::Bool), &Value::Int(-1)), Ok(Value::Bool(false)));
    }

    #[test]
    fn bool_to_string() {
        assert_eq!(
            coerce(&def(ValueKind::String), &Value::Bool(true)),
            Ok(Value::String("true".into()))
        );
    }

    #[test]
    fn bool_lexicon_is_case_insensitive() {
        for s in ["true", "T", "1", "TRUE"] {
            assert_eq!(try_bool(&Value::String(s.into())), Ok(true), "{s}");
        }
        for s in ["false", "f", "0", "False"] {
            assert_eq!(try_bool(&Value::String(s.into())), Ok(false), "{s}");
        }
        assert_eq!(try_bool(&Value::String("yes".into())).is_err(), true);
        // Lenient context swallows the failure into false
        assert_eq!(
            coerce(&def(ValueKind::Bool), &Value::String("yes".into())),
            Ok(Value::Bool(false))
        );
    }

    #[test]
    fn integer_overflow_contract() {
        // One past i64::MAX wraps to i64::MIN
        assert_eq!(
            try_int(&Value::String("9223372036854775808".into())),
            Ok(i64::MIN)
        );
        // Too-negative literals clamp to i64::MIN
        assert_eq!(
            try_int(&Value::String("-9223372036854775809".into())),
            Ok(i64::MIN)
        );
        // Unsigned wraps in both directions
        assert_eq!(try_uint(&Value::String("-1".into())), Ok(u64::MAX));
        assert_eq!(try_uint(&Value::String("18446744073709551616".into())), Ok(0));
        assert_eq!(
            try_uint(&Value::String("18446744073709551615".into())),
            Ok(u64::MAX)
        );
    }

    #[test]
    fn negative_int_wraps_to_uint() {
        assert_eq!(try_uint(&Value::Int(-1)), Ok(u64::MAX));
    }

    #[test]
    fn unparsable_numeric_strings_coerce_to_zero() {
        assert_eq!(coerce(&def(ValueKind::Int64), &Value::String("abc".into())), Ok(Value::Int(0)));
        assert_eq!(coerce(&def(ValueKind::Float64), &Value::String("abc".into())), Ok(Value::Float(0.0)));
    }

    #[test]
    fn float_string_renders_without_trailing_zeros() {
        assert_eq!(try_string(&Value::Float(11.15)), Ok("11.15".to_string()));
        assert_eq!(try_string(&Value::Float(5.0)), Ok("5".to_string()));
    }

    #[test]
    fn timestamp_to_integer_is_unix_seconds() {
        let t = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(try_int(&Value::Timestamp(t)), Ok(1609459200));
        assert_eq!(try_bool(&Value::Timestamp(t)), Ok(true));
    }

    #[test]
    fn structured_value_on_string_field_is_invalid_type() {
        let err = coerce(&def(ValueKind::String), &Value::Map(Default::default()));
        assert!(err.is_err());
    }

    #[test]
    fn binary_accepts_bytes_strings_and_small_int_arrays() {
        assert_eq!(
            try_binary(&Value::String("abc".into())),
            Ok(vec![0x61, 0x62, 0x63])
        );
        assert_eq!(
            try_binary(&Value::Array(vec![Value::Int(12), Value::Int(34)])),
            Ok(vec![0x0C, 0x22])
        );
        // Element values above one byte truncate
        assert_eq!(try_binary(&Value::Array(vec![Value::Int(260)])), Ok(vec![4]));
        assert!(try_binary(&Value::Int(7)).is_err());
    }

    #[test]
    fn not_null_coalesces_to_zero_values() {
        assert_eq!(coerce(&not_null(ValueKind::Bool), &Value::Null), Ok(Value::Bool(false)));
        assert_eq!(
            coerce(&not_null(ValueKind::String), &Value::Null),
            Ok(Value::String(String::new()))
        );
        assert_eq!(coerce(&def(ValueKind::Bool), &Value::Null), Ok(Value::Null));
    }

    #[test]
    fn array_elements_are_all_or_nothing() {
        let mut arr = FieldDefinition::new(ValueKind::Array);
        arr.subtype = Some(Box::new(FieldDefinition::new(ValueKind::Int64)));

        let bad = Value::Array(vec![
            Value::String("a".into()),
            Value::String("b".into()),
        ]);
        assert!(coerce(&arr, &bad).is_err());

        let good = Value::Array(vec![Value::String("1".into()), Value::Int(2)]);
        assert_eq!(
            coerce(&arr, &good),
            Ok(Value::Array(vec![Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn empty_timestamp_string_is_null_even_when_not_null() {
        let d = not_null(ValueKind::Timestamp);
        assert_eq!(coerce(&d, &Value::String(String::new())), Ok(Value::Null));
        assert_eq!(
            coerce(&d, &Value::String("abc".into())),
            Ok(Value::Timestamp(chrono::DateTime::UNIX_EPOCH))
        );
    }
}
