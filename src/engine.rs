//! Script engine and execution pipeline
//!
//! The [`Engine`] owns the script runtime, one persistent context, and the
//! native function table. Every [`Engine::run`] call goes through the same
//! stages:
//!
//! 1. context: created on first use with all registered natives installed,
//!    then reused so global bindings persist between calls
//! 2. read: a readable `file_name` replaces the inline source
//! 3. compile: the text is prepared for the engine
//! 4. execute: the engine runs the script; a non-`undefined` completion
//!    value is stringified
//! 5. drain: pending engine jobs run to completion before returning
//!
//! A failure in any stage becomes a [`Diagnostic`] in the output; `run`
//! itself never fails. There is no timeout: a script that does not
//! terminate blocks `run` indefinitely.

use std::fmt;
use std::fs;

use log::{debug, error, trace, warn};
use rquickjs::context::EvalOptions;
use rquickjs::{Context, Ctx, Runtime};

use crate::config::EngineConfig;
use crate::error::{Diagnostic, Error, Result, Stage};
use crate::native::{NativeFn, NativeTable};
use crate::value::{stringify, JsValue, Value};

/// Origin name of inline source text
pub const UNNAMED: &str = "unnamed";

/// Source text and its origin, for one compile/execute cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
    source: String,
    origin: String,
}

impl ScriptUnit {
    pub fn inline(source: &str) -> Self {
        ScriptUnit {
            source: source.to_string(),
            origin: UNNAMED.to_string(),
        }
    }

    /// Resolve the text to run
    ///
    /// A non-empty, readable `file_name` supersedes `source`; its line
    /// endings are normalized to CRLF. Otherwise `source` runs as
    /// `unnamed`.
    pub fn load(source: &str, file_name: &str) -> Self {
        if file_name.is_empty() {
            return Self::inline(source);
        }
        match fs::read_to_string(file_name) {
            Ok(text) => ScriptUnit {
                source: normalize_line_endings(&text),
                origin: file_name.to_string(),
            },
            Err(e) => {
                debug!("cannot read {}: {}; running inline source", file_name, e);
                Self::inline(source)
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Rewrite bare LF line terminators as CRLF
pub fn normalize_line_endings(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len() + text.len() / 32);
    let mut previous = '\0';
    for c in text.chars() {
        if c == '\n' && previous != '\r' {
            normalized.push('\r');
        }
        normalized.push(c);
        previous = c;
    }
    normalized
}

/// A unit accepted by the compile stage
///
/// Owned by the pipeline call that produced it and consumed by execution.
#[derive(Debug)]
pub struct CompiledScript {
    source: String,
    origin: String,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// String form of the completion value
    Value(String),
    /// The script completed with `undefined`
    Undefined,
    Failure(Diagnostic),
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionResult::Value(text) => f.write_str(text),
            ExecutionResult::Undefined => Ok(()),
            ExecutionResult::Failure(diagnostic) => write!(f, "{}", diagnostic),
        }
    }
}

/// Script engine instance
///
/// Construct once, register natives with [`Engine::set`], then call
/// [`Engine::run`] any number of times. Natives must be registered before
/// the first run or [`Engine::with`]; later registrations are not visible
/// to the context already created.
pub struct Engine {
    // Field order is release order: context before runtime
    context: Option<Context>,
    natives: NativeTable,
    runtime: Runtime,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Runtime::new()?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        debug!("engine created with {:?}", config);

        Ok(Engine {
            context: None,
            natives: NativeTable::new(),
            runtime,
            config,
        })
    }

    /// Engine with [`EngineConfig::default`]
    pub fn default_engine() -> Result<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Version tag reported to users and by the `version()` binding
    pub fn version() -> String {
        format!("{} (QuickJS)", env!("CARGO_PKG_VERSION"))
    }

    /// Bind a native callback as global `name`
    ///
    /// Re-registering a name replaces the callback for contexts created
    /// afterwards.
    pub fn set(&mut self, name: &str, function: NativeFn) {
        let replaced = self.natives.register(name, function);
        if self.context.is_some() {
            warn!(
                "native function {} registered after context creation; the current context keeps its bindings",
                name
            );
        } else if replaced {
            debug!("native function {} replaced", name);
        } else {
            debug!("native function {} registered", name);
        }
    }

    pub fn natives(&self) -> &NativeTable {
        &self.natives
    }

    /// Run `source`, or the contents of `file_name` when it is readable
    ///
    /// Returns the string form of the completion value, an empty string
    /// for `undefined`, or a formatted diagnostic.
    pub fn run(&mut self, source: &str, file_name: &str) -> String {
        let unit = ScriptUnit::load(source, file_name);
        match self.evaluate(&unit) {
            Ok(result) => result.to_string(),
            Err(e) => {
                error!("{} failed: {}", unit.origin(), e);
                e.to_string()
            }
        }
    }

    /// Run one unit through the pipeline
    ///
    /// Script failures are an [`ExecutionResult::Failure`]; `Err` is kept
    /// for engine failures such as context creation running out of memory.
    pub fn evaluate(&mut self, unit: &ScriptUnit) -> Result<ExecutionResult> {
        let context = self.context()?;
        let outcome = match Self::compile(unit) {
            Ok(script) => context.with(|ctx| Self::execute(&ctx, script)),
            Err(diagnostic) => Ok(ExecutionResult::Failure(diagnostic)),
        };
        self.drain_jobs();
        outcome
    }

    /// Access the persistent context directly
    ///
    /// The [`Scope`] and every value derived from it are confined to `f`.
    pub fn with<F, R>(&mut self, f: F) -> Result<R>
    where
        F: for<'js> FnOnce(Scope<'js>) -> Result<R>,
    {
        let context = self.context()?;
        let result = context.with(|ctx| f(Scope { ctx }));
        self.drain_jobs();
        result
    }

    /// The persistent context, created with all natives on first use
    fn context(&mut self) -> Result<Context> {
        if let Some(context) = &self.context {
            return Ok(context.clone());
        }
        let context = Context::full(&self.runtime)?;
        context.with(|ctx| self.natives.install(&ctx))?;
        debug!("context created with {} native functions", self.natives.len());
        self.context = Some(context.clone());
        Ok(context)
    }

    fn compile(unit: &ScriptUnit) -> std::result::Result<CompiledScript, Diagnostic> {
        // Source text is handed to the engine as a C string
        if let Some(offset) = unit.source.find('\0') {
            let before = &unit.source[..offset];
            let line = before.matches('\n').count() as u32 + 1;
            let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) as u32;
            return Err(Diagnostic::located(
                Stage::Compile,
                &unit.origin,
                line,
                column,
                "SyntaxError: unexpected null character".to_string(),
            ));
        }
        trace!("compiled {} ({} bytes)", unit.origin, unit.source.len());
        Ok(CompiledScript {
            source: unit.source.clone(),
            origin: unit.origin.clone(),
        })
    }

    fn execute(ctx: &Ctx<'_>, script: CompiledScript) -> Result<ExecutionResult> {
        match eval_script(ctx, &script.source) {
            Ok(value) if value.is_undefined() => Ok(ExecutionResult::Undefined),
            Ok(value) => Ok(ExecutionResult::Value(stringify(&value))),
            Err(rquickjs::Error::Exception) => {
                let thrown = ctx.catch();
                let diagnostic = Diagnostic::from_thrown(&thrown, &script.origin, Some(&script.source));
                debug!("{:?} failure in {}", diagnostic.stage, script.origin);
                Ok(ExecutionResult::Failure(diagnostic))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Run queued engine jobs until none remain
    fn drain_jobs(&self) {
        let mut executed = 0usize;
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => executed += 1,
                Ok(false) => break,
                Err(_) => warn!("pending job raised an uncaught exception"),
            }
        }
        if executed > 0 {
            trace!("drained {} pending jobs", executed);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // The context goes first; the runtime is released after it
        self.context.take();
        debug!("engine released");
    }
}

/// Evaluate global (sloppy-mode) script code
fn eval_script<'js>(ctx: &Ctx<'js>, source: &str) -> rquickjs::Result<JsValue<'js>> {
    let mut options = EvalOptions::default();
    options.global = true;
    options.strict = false;
    ctx.eval_with_options(source, options)
}

/// Handle on the engine's persistent context
///
/// Only available inside [`Engine::with`]; values obtained here cannot
/// escape it.
pub struct Scope<'js> {
    ctx: Ctx<'js>,
}

impl<'js> Scope<'js> {
    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    /// Read a global binding
    pub fn global(&self, name: &str) -> Result<Value<'js>> {
        let value: JsValue<'js> = self.ctx.globals().get(name)?;
        Value::from_engine(value)
    }

    /// Define or overwrite a global binding
    pub fn set_global(&self, name: &str, value: impl Into<Value<'js>>) -> Result<()> {
        let handle = value.into().to_engine(&self.ctx)?;
        self.ctx.globals().set(name, handle)?;
        Ok(())
    }

    pub fn to_engine(&self, value: &Value<'js>) -> Result<JsValue<'js>> {
        value.to_engine(&self.ctx)
    }

    /// Evaluate script text in the persistent context
    ///
    /// Exceptions come back as [`Error::Script`].
    pub fn eval(&self, source: &str) -> Result<Value<'js>> {
        match eval_script(&self.ctx, source) {
            Ok(value) => Value::from_engine(value),
            Err(rquickjs::Error::Exception) => {
                let thrown = self.ctx.catch();
                Err(Diagnostic::from_thrown(&thrown, UNNAMED, Some(source)).into())
            }
            Err(e) => Err(Error::Engine(e)),
        }
    }
}
