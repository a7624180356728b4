//! Timestamp resolution rules
//!
//! A `time` field accepts native timestamps, epoch integers interpreted
//! per the declared precision (auto-detected from magnitude when no
//! precision is declared), and strings parsed as RFC-3339 with a relaxed
//! fallback (space separator, missing UTC suffix). Two outcomes must stay
//! distinguishable: an empty string resolves to null, while a non-empty
//! unparsable string resolves to the zero time instant.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::value::Value;
use chrono::{DateTime, Duration, Utc};

const MICROS_THRESHOLD: i64 = 1_000_000_000_000_000;
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Declared resolution of an epoch-integer `time` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimePrecision {
    Second,
    Millisecond,
    Microsecond,
}

impl TimePrecision {
    /// Case-insensitive precision literal lookup. Unrecognized literals
    /// resolve to `None`, which means magnitude auto-detection.
    pub fn from_name(name: &str) -> Option<TimePrecision> {
        match name.to_ascii_lowercase().as_str() {
            "second" => Some(TimePrecision::Second),
            "millisecond" => Some(TimePrecision::Millisecond),
            "microsecond" => Some(TimePrecision::Microsecond),
            _ => None,
        }
    }
}

/// Per-field timestamp metadata attached to `time` definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeInfo {
    /// `None` means auto-detect from the epoch value's magnitude
    pub precision: Option<TimePrecision>,
}

/// Resolution outcome; `Empty` is the distinguished empty-string case
/// that normalizes to null rather than the zero instant.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeValue {
    Empty,
    At(DateTime<Utc>),
}

fn zero_instant() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl TimeInfo {
    pub fn new(precision: Option<TimePrecision>) -> Self {
        TimeInfo { precision }
    }

    /// Read a `precision` key out of a definition-document property map.
    pub fn from_props(props: &serde_json::Map<String, serde_json::Value>) -> Self {
        let precision = props
            .get("precision")
            .and_then(|v| v.as_str())
            .and_then(TimePrecision::from_name);
        TimeInfo { precision }
    }

    fn from_epoch(&self, epoch: i64) -> DateTime<Utc> {
        let duration = match self.precision {
            Some(TimePrecision::Second) => Duration::try_seconds(epoch),
            Some(TimePrecision::Millisecond) => Duration::try_milliseconds(epoch),
            Some(TimePrecision::Microsecond) => Some(Duration::microseconds(epoch)),
            None => {
                // No declared precision: infer from magnitude
                if epoch >= MICROS_THRESHOLD {
                    Some(Duration::microseconds(epoch))
                } else if epoch >= MILLIS_THRESHOLD {
                    Duration::try_milliseconds(epoch)
                } else {
                    Duration::try_seconds(epoch)
                }
            }
        };

        duration
            .and_then(|d| zero_instant().checked_add_signed(d))
            .unwrap_or_else(zero_instant)
    }

    fn from_string(&self, text: &str) -> TimeValue {
        if text.is_empty() {
            return TimeValue::Empty;
        }

        if let Ok(t) = DateTime::parse_from_rfc3339(text) {
            return TimeValue::At(t.with_timezone(&Utc));
        }

        // Relax the date/time separator and a missing UTC suffix
        let mut relaxed = text.replacen(' ', "T", 1);
        if !relaxed.ends_with('Z') {
            relaxed.push('Z');
        }

        match DateTime::parse_from_rfc3339(&relaxed) {
            Ok(t) => TimeValue::At(t.with_timezone(&Utc)),
            Err(_) => TimeValue::At(zero_instant()),
        }
    }

    /// Resolve an arbitrary runtime value into a timestamp.
    ///
    /// Shapes with no timestamp interpretation (bool, containers) resolve
    /// to the zero instant, matching the leaf-kind swallowing rule.
    pub fn resolve(&self, value: &Value) -> TimeValue {
        match value {
            Value::Timestamp(t) => TimeValue::At(*t),
            Value::Int(i) => TimeValue::At(self.from_epoch(*i)),
            Value::UInt(u) => TimeValue::At(self.from_epoch(*u as i64)),
            Value::Float(f) => TimeValue::At(self.from_epoch(*f as i64)),
            Value::String(s) => self.from_string(s),
            _ => TimeValue::At(zero_instant()),
        }
    }
}
