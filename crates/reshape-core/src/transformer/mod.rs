//! Record transformation orchestration
//!
//! A [`Transformer`] ties the pieces together: normalize input against
//! the source schema, run the transformation script in a pooled sandbox
//! context, then normalize every output record against the destination
//! schema (falling back to the source schema, falling back to
//! pass-through).
//!
//! # Module Organization
//!
//! - [`runtime`] - The [`ScriptRuntime`] contract and context pooling
//! - [`reflect`] - In-process reflection-marshalling backend
//! - [`wire`] - Serialized-boundary backend for isolated execution
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

pub mod runtime;

pub(crate) mod reflect;
pub(crate) mod wire;

pub use runtime::{RuntimeKind, ScriptRuntime};

use crate::error::Result;
use crate::schema::Schema;
use crate::value::ValueMap;
use runtime::ContextPool;
use std::sync::Arc;

/// The default script: a normalizing passthrough.
const IDENTITY_SCRIPT: &str = "source";

/// Schema-governed, script-driven record transformer.
///
/// Long-lived state is limited to the compiled script artifact and the
/// pool of sandbox execution contexts; records are created fresh per
/// call and carry no identity beyond it.
pub struct Transformer {
    source: Option<Arc<Schema>>,
    dest: Option<Arc<Schema>>,
    script: String,
    preamble: Option<String>,
    pool: ContextPool,
}

impl Transformer {
    /// Create a transformer with the in-process runtime backend.
    pub fn new(source: Option<Arc<Schema>>, dest: Option<Arc<Schema>>) -> Self {
        Self::with_runtime(source, dest, RuntimeKind::default())
    }

    /// Create a transformer with an explicit runtime backend; the choice
    /// changes deployment characteristics, never transform results.
    pub fn with_runtime(
        source: Option<Arc<Schema>>,
        dest: Option<Arc<Schema>>,
        kind: RuntimeKind,
    ) -> Self {
        Transformer {
            source,
            dest,
            script: IDENTITY_SCRIPT.to_string(),
            preamble: None,
            pool: ContextPool::new(kind),
        }
    }

    pub fn runtime_kind(&self) -> RuntimeKind {
        self.pool.kind()
    }

    /// Set the transformation script body.
    ///
    /// The script sees the normalized input as `source` and the caller
    /// environment as `env`; its result value drives the output row
    /// convention (unit: none, map: one, array of maps: many).
    /// Compilation errors are fatal here, not deferred to first use.
    pub fn set_script(&mut self, script: &str) -> Result<()> {
        let mut probe = runtime::new_runtime(self.pool.kind());
        probe.compile(script)?;

        self.script = script.to_string();
        // Pooled contexts hold previously compiled state; retire them
        self.pool.clear();
        Ok(())
    }

    /// Set a side-effecting preamble (helper functions) loaded into every
    /// context before the script body.
    pub fn load_script(&mut self, preamble: &str) -> Result<()> {
        let mut probe = runtime::new_runtime(self.pool.kind());
        probe.load_script(preamble)?;

        self.preamble = Some(preamble.to_string());
        self.pool.clear();
        Ok(())
    }

    pub fn set_source_schema(&mut self, schema: Arc<Schema>) {
        self.source = Some(schema);
    }

    pub fn set_destination_schema(&mut self, schema: Arc<Schema>) {
        self.dest = Some(schema);
    }

    /// Run the transformation against one input record.
    ///
    /// Returns zero or more output records; a script that returns unit
    /// suppresses output without error. A script exception aborts this
    /// call only, and the pooled context stays reusable.
    pub fn transform(&self, env: Option<&ValueMap>, input: &ValueMap) -> Result<Vec<ValueMap>> {
        let data = match &self.source {
            Some(schema) => schema.normalize(input),
            None => input.clone(),
        };

        let mut ctx = self.pool.acquire();
        if !ctx.is_ready() {
            // Lazy first-use priming of a fresh context
            if let Some(preamble) = &self.preamble {
                ctx.load_script(preamble)?;
            }
            ctx.compile(&self.script)?;
        }
        ctx.set_environment(env.cloned().unwrap_or_default());

        let outputs = ctx.execute(self.source.as_deref(), &data)?;
        drop(ctx);

        Ok(outputs
            .into_iter()
            .map(|record| match (&self.dest, &self.source) {
                (Some(dest), _) => dest.normalize(&record),
                (None, Some(source)) => source.normalize(&record),
                (None, None) => record,
            })
            .collect())
    }
}
