//! Error types for the reshape core library
//!
//! Every failure cause a caller may want to distinguish gets its own
//! variant: schema-construction problems are fatal and reported at build
//! time, script problems at `set_script` or per transform call. Per-field
//! coercion failures are deliberately *not* represented here; the
//! normalizer resolves them locally to null/zero (see `coercion`).
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use thiserror::Error;

/// Main error type for reshape operations
#[derive(Error, Debug)]
pub enum Error {
    /// A definition document entry is missing its `type` key, or the key
    /// is not a string
    #[error("Invalid type definition for field '{field}'")]
    InvalidTypeDefinition { field: String },

    /// A definition document names a type literal outside the accepted set
    #[error("Unknown type '{name}' for field '{field}'")]
    UnknownType { field: String, name: String },

    /// An array definition without a usable `subtype`
    #[error("Array type requires subtype (field '{field}')")]
    InvalidArraySubtype { field: String },

    /// A map definition without a `fields` object, or a `fields` value of
    /// the wrong shape
    #[error("Invalid fields definition for field '{field}'")]
    InvalidFieldsDefinition { field: String },

    /// A `notNull` key holding anything but a boolean
    #[error("Invalid notNull definition for field '{field}'")]
    InvalidNotNullDefinition { field: String },

    /// The definition document itself is not a JSON object
    #[error("Schema document is not an object")]
    InvalidSchemaDocument,

    /// JSON parsing of a schema document failed
    #[error("Schema document parse error: {source}")]
    SchemaParse {
        #[from]
        source: serde_json::Error,
    },

    /// A transformation script failed to compile
    #[error("Script compilation failed: {message}")]
    ScriptCompile { message: String },

    /// A compiled script raised an exception while running against a record
    #[error("Script execution failed: {message}")]
    ScriptRuntime { message: String },

    /// The script-runtime boundary encoding could not round-trip a record
    #[error("Marshalling error at the script boundary: {message}")]
    Marshal { message: String },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn compile(err: impl std::fmt::Display) -> Self {
        Error::ScriptCompile {
            message: err.to_string(),
        }
    }

    pub(crate) fn runtime(err: impl std::fmt::Display) -> Self {
        Error::ScriptRuntime {
            message: err.to_string(),
        }
    }

    pub(crate) fn marshal(err: impl std::fmt::Display) -> Self {
        Error::Marshal {
            message: err.to_string(),
        }
    }
}
