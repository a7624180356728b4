//! Script-runtime contract and execution-context pooling
//!
//! [`ScriptRuntime`] is the narrow seam the transformer depends on:
//! compile a script, bind an environment, execute against one record.
//! Two interchangeable backends implement it with different marshalling
//! strategies (see [`super::reflect`] and [`super::wire`]); both embed
//! the same rhai sandbox, so the shared engine setup and compilation
//! logic live here in [`SandboxCore`].
//!
//! Contexts are pooled: one checkout per call, exclusive use, returned
//! on every path by the [`PooledContext`] guard. Each sandbox instance
//! is single-threaded internally; the pool is the only shared mutable
//! state.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::coercion::time::TimePrecision;
use crate::error::{Error, Result};
use crate::schema::{FieldDefinition, Schema};
use crate::value::{ValueKind, ValueMap};
use chrono::{DateTime, Utc};
use rhai::{Dynamic, Engine, Scope, AST};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Backend selection: a deployment decision, not a behavioral one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeKind {
    /// Host values cross into the sandbox by direct structural conversion
    #[default]
    InProcess,
    /// Records cross a serialized binary boundary, as they would for an
    /// isolated execution environment
    Isolated,
}

/// The pluggable sandboxed execution capability that runs user
/// transformation scripts.
pub trait ScriptRuntime: Send {
    /// Bind caller-supplied environment values under the `env` name.
    fn set_environment(&mut self, env: ValueMap);

    /// Run a side-effecting preamble (helper function definitions).
    fn load_script(&mut self, script: &str) -> Result<()>;

    /// Compile the transformation script body. Fatal on syntax errors.
    fn compile(&mut self, script: &str) -> Result<()>;

    /// Whether this context has been primed with a compiled script.
    fn is_ready(&self) -> bool;

    /// Execute the compiled script against one record, returning zero or
    /// more output records. `schema` is the source schema, consulted for
    /// marshalling decisions that depend on declared definitions.
    fn execute(&mut self, schema: Option<&Schema>, record: &ValueMap) -> Result<Vec<ValueMap>>;
}

pub(crate) fn new_runtime(kind: RuntimeKind) -> Box<dyn ScriptRuntime> {
    match kind {
        RuntimeKind::InProcess => Box::new(super::reflect::ReflectRuntime::new()),
        RuntimeKind::Isolated => Box::new(super::wire::WireRuntime::new()),
    }
}

/// Shared sandbox state: a configured engine plus compiled script parts.
pub(crate) struct SandboxCore {
    engine: Engine,
    preamble: Option<AST>,
    body: Option<AST>,
    env: ValueMap,
}

impl SandboxCore {
    pub(crate) fn new() -> Self {
        let mut engine = Engine::new();

        // Console-style logging is a debugging convenience, routed to the
        // host's subscriber rather than stdout
        engine.on_print(|text| tracing::info!(target: "reshape_core::script", "{text}"));
        engine.on_debug(|text, source, pos| {
            tracing::debug!(target: "reshape_core::script", ?source, %pos, "{text}")
        });

        engine
            .register_type_with_name::<DateTime<Utc>>("Timestamp")
            .register_fn("timestamp", |t: &mut DateTime<Utc>| t.timestamp())
            .register_fn("timestamp_millis", |t: &mut DateTime<Utc>| {
                t.timestamp_millis()
            })
            .register_fn("to_string", |t: &mut DateTime<Utc>| t.to_rfc3339())
            .register_fn("==", |a: DateTime<Utc>, b: DateTime<Utc>| a == b);

        SandboxCore {
            engine,
            preamble: None,
            body: None,
            env: ValueMap::new(),
        }
    }

    pub(crate) fn set_environment(&mut self, env: ValueMap) {
        self.env = env;
    }

    pub(crate) fn environment(&self) -> &ValueMap {
        &self.env
    }

    pub(crate) fn load_script(&mut self, script: &str) -> Result<()> {
        let ast = self.engine.compile(script).map_err(Error::compile)?;
        self.preamble = Some(match self.preamble.take() {
            Some(existing) => existing.merge(&ast),
            None => ast,
        });
        Ok(())
    }

    pub(crate) fn compile(&mut self, script: &str) -> Result<()> {
        let ast = self.engine.compile(script).map_err(Error::compile)?;
        self.body = Some(ast);
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.body.is_some()
    }

    /// Evaluate the compiled script with `source` and `env` bound in
    /// scope, returning the script's result value.
    pub(crate) fn run(&self, source: Dynamic, env: Dynamic) -> Result<Dynamic> {
        let body = self
            .body
            .as_ref()
            .ok_or_else(|| Error::runtime("no compiled script"))?;
        let ast = match &self.preamble {
            Some(pre) => pre.merge(body),
            None => body.clone(),
        };

        let mut scope = Scope::new();
        scope.push_constant("source", source);
        scope.push_constant("env", env);

        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(Error::runtime)
    }
}

/// Truncate a timestamp to the sandbox's native (millisecond) date
/// resolution when its declared precision is coarse; microsecond and
/// auto-precision fields keep full fidelity across the boundary.
pub(crate) fn clamp_precision(def: Option<&FieldDefinition>, t: DateTime<Utc>) -> DateTime<Utc> {
    let coarse = def
        .filter(|d| d.kind == ValueKind::Timestamp)
        .and_then(|d| d.time_info.as_ref())
        .map(|info| {
            matches!(
                info.precision,
                Some(TimePrecision::Second) | Some(TimePrecision::Millisecond)
            )
        })
        .unwrap_or(false);

    if coarse {
        DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
    } else {
        t
    }
}

/// Definition context for marshalling one value's children.
pub(crate) fn element_def(def: Option<&FieldDefinition>) -> Option<&FieldDefinition> {
    def.filter(|d| d.kind == ValueKind::Array)
        .and_then(|d| d.subtype.as_deref())
}

pub(crate) fn field_def<'a>(
    def: Option<&'a FieldDefinition>,
    key: &str,
) -> Option<&'a FieldDefinition> {
    def.filter(|d| d.kind == ValueKind::Map)
        .and_then(|d| d.fields.as_ref())
        .and_then(|schema| schema.field(key))
}

/// Elastic free list of primed-on-demand execution contexts.
pub(crate) struct ContextPool {
    kind: RuntimeKind,
    contexts: Mutex<Vec<Box<dyn ScriptRuntime>>>,
}

impl ContextPool {
    pub(crate) fn new(kind: RuntimeKind) -> Self {
        ContextPool {
            kind,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn kind(&self) -> RuntimeKind {
        self.kind
    }

    /// Check out a context, constructing a fresh one when the pool is
    /// empty. The guard returns it on drop, on success and error paths
    /// alike.
    pub(crate) fn acquire(&self) -> PooledContext<'_> {
        let ctx = self
            .contexts
            .lock()
            .expect("context pool poisoned")
            .pop()
            .unwrap_or_else(|| new_runtime(self.kind));
        PooledContext {
            pool: self,
            ctx: Some(ctx),
        }
    }

    /// Drop all pooled contexts; used when the script changes so stale
    /// compiled state is never reused.
    pub(crate) fn clear(&self) {
        self.contexts.lock().expect("context pool poisoned").clear();
    }

    fn release(&self, ctx: Box<dyn ScriptRuntime>) {
        self.contexts.lock().expect("context pool poisoned").push(ctx);
    }
}

/// Exclusive checkout of one pooled context.
pub(crate) struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<Box<dyn ScriptRuntime>>,
}

impl Deref for PooledContext<'_> {
    type Target = dyn ScriptRuntime;

    fn deref(&self) -> &Self::Target {
        self.ctx.as_deref().expect("context taken")
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx.as_deref_mut().expect("context taken")
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}
