//! Native function table
//!
//! Host callbacks are stored in a table and exposed to scripts through
//! engine function objects that carry only the callback's index. When a
//! script calls one, the index is resolved back through the table; engine
//! memory is never reinterpreted as a function pointer.

use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, error};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function};

use crate::argument::Argument;
use crate::error::{Error, Result};
use crate::value::JsValue;

/// Native callback signature
///
/// The callback reads its arguments and sets its return value through the
/// [`Argument`]. Returning an error raises a script exception at the call
/// site.
pub type NativeFn = for<'js> fn(&mut Argument<'js>) -> Result<()>;

/// Name → callback bindings, in registration order
#[derive(Default, Clone)]
pub struct NativeTable {
    names: Vec<String>,
    functions: Vec<NativeFn>,
    index: HashMap<String, usize>,
}

impl NativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`; returns true when an earlier binding was replaced
    pub fn register(&mut self, name: &str, function: NativeFn) -> bool {
        match self.index.get(name) {
            Some(&id) => {
                self.functions[id] = function;
                true
            }
            None => {
                self.index.insert(name.to_string(), self.functions.len());
                self.names.push(name.to_string());
                self.functions.push(function);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Freeze the callbacks for one context
    fn snapshot(&self) -> Registry {
        Registry {
            functions: self.functions.clone().into(),
        }
    }

    /// Define every binding as a global of the context behind `ctx`
    pub(crate) fn install(&self, ctx: &Ctx<'_>) -> Result<()> {
        let registry = self.snapshot();
        let globals = ctx.globals();
        for (id, name) in self.names.iter().enumerate() {
            let function = native_to_engine(ctx, registry.clone(), id)?;
            globals.set(name.as_str(), function)?;
            debug!("installed native function {} as #{}", name, id);
        }
        Ok(())
    }
}

/// Callbacks frozen at context creation, shared by that context's functions
#[derive(Clone)]
struct Registry {
    functions: Rc<[NativeFn]>,
}

impl Registry {
    fn resolve(&self, id: usize) -> Result<NativeFn> {
        self.functions.get(id).copied().ok_or(Error::UnknownNative(id))
    }
}

/// Wrap registry slot `id` in an engine function object
fn native_to_engine<'js>(ctx: &Ctx<'js>, registry: Registry, id: usize) -> Result<JsValue<'js>> {
    let function = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            dispatch(&registry, id, ctx, args.0)
        },
    )?;
    Ok(function.into_value())
}

/// Run native `id` and map its failure onto a script exception
fn dispatch<'js>(
    registry: &Registry,
    id: usize,
    ctx: Ctx<'js>,
    args: Vec<JsValue<'js>>,
) -> rquickjs::Result<JsValue<'js>> {
    let native = match registry.resolve(id) {
        Ok(native) => native,
        Err(e) => {
            error!("{}", e);
            return Err(Exception::throw_internal(&ctx, &e.to_string()));
        }
    };

    let mut argument = Argument::new(ctx.clone(), args);
    match native(&mut argument) {
        Ok(()) => Ok(argument.into_result()),
        // Already pending in the engine
        Err(Error::Engine(e)) => Err(e),
        Err(e @ (Error::Conversion { .. } | Error::ArgumentOutOfRange { .. } | Error::StringLength { .. })) => {
            Err(Exception::throw_type(&ctx, &e.to_string()))
        }
        Err(e @ Error::Overflow(_)) => Err(Exception::throw_range(&ctx, &e.to_string())),
        // Rethrow what the script threw when it came from a function argument
        Err(Error::Script(diagnostic)) => match argument.take_thrown() {
            Some(thrown) => Err(ctx.throw(thrown)),
            None => Err(Exception::throw_message(&ctx, &diagnostic.message)),
        },
        Err(e) => Err(Exception::throw_internal(&ctx, &e.to_string())),
    }
}
