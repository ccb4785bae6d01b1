//! jseasy - a small embedding bridge for a JavaScript engine
//!
//! Host programs register native functions, run scripts and exchange
//! values with them through a tagged [`Value`] instead of raw engine
//! handles. Script failures come back as located [`Diagnostic`]s.
//!
//! # Features
//! - Persistent script state across runs
//! - Native functions resolved through an index table
//! - Container views with ordered keys and a depth-bounded printer
//! - A read-eval-print shell with one-line and include modes
//!
//! # Example
//! ```no_run
//! use jseasy::{Argument, Engine, Result};
//!
//! fn twice(args: &mut Argument<'_>) -> Result<()> {
//!     let n = args.get(0)?.as_i32()?;
//!     args.set_result(n * 2)
//! }
//!
//! let mut engine = Engine::default_engine()?;
//! engine.set("twice", twice);
//! assert_eq!(engine.run("twice(21)", ""), "42");
//! # Ok::<(), jseasy::Error>(())
//! ```

// Values crossing the bridge
pub mod value;
pub mod array;
pub mod function;

// Native callbacks
pub mod argument;
pub mod native;

// Execution
pub mod config;
pub mod engine;
pub mod error;

// Shell
pub mod bindings;
pub mod repl;

// Re-export main types
pub use argument::Argument;
pub use array::{print_container, ArrayView, Key};
pub use config::EngineConfig;
pub use engine::{CompiledScript, Engine, ExecutionResult, Scope, ScriptUnit};
pub use error::{Diagnostic, Error, Result, Stage};
pub use function::FunctionHandle;
pub use native::{NativeFn, NativeTable};
pub use repl::{BootMode, BufReadLines, Input, LineReader, ReplDriver};
pub use value::{stringify, JsValue, Kind, Value};
