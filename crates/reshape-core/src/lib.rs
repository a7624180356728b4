//! Reshape Core - Schema-governed record transformation engine
//!
//! This crate is the data-shaping layer of a change-data-capture
//! pipeline: upstream capture components deliver heterogeneous
//! key-value records, downstream sinks require records of a precise,
//! predictable shape.
//!
//! # Main Components
//!
//! - **Value Domain**: The canonical runtime value kinds and the
//!   coercion rules between them
//! - **Schema**: Immutable, possibly nested field definitions built from
//!   a JSON definition document
//! - **Normalization**: Coercing raw records into canonical form,
//!   including flattened path keys for sparse partial updates
//! - **Record View**: Typed, path-addressed single-field reads
//! - **Transformer**: Script-driven record transformation over pooled
//!   sandbox execution contexts, with two interchangeable marshalling
//!   backends
//!
//! # Example
//!
//! ```
//! use reshape_core::{Schema, Transformer, value::map_from_json};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! fn main() -> reshape_core::Result<()> {
//!     let schema = Arc::new(Schema::from_json(r#"{
//!         "name":    { "type": "string" },
//!         "balance": { "type": "int" }
//!     }"#)?);
//!
//!     let mut transformer = Transformer::new(Some(schema.clone()), Some(schema));
//!     transformer.set_script("#{ name: source.name, balance: source.balance + 100 }")?;
//!
//!     let input = map_from_json(json!({"name": "Fred", "balance": "20"}));
//!     let rows = transformer.transform(None, &input)?;
//!     assert_eq!(rows.len(), 1);
//!     Ok(())
//! }
//! ```

pub mod coercion;
pub mod error;
pub mod record;
pub mod schema;
pub mod transformer;
pub mod value;

// Re-export main types for convenience
pub use coercion::{coerce, time::TimeInfo, time::TimePrecision, CoerceError};
pub use error::{Error, Result};
pub use record::{Record, TypedValue};
pub use schema::{parse_path, parse_path_entry, FieldDefinition, Schema};
pub use transformer::{RuntimeKind, ScriptRuntime, Transformer};
pub use value::{Value, ValueKind, ValueMap};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
