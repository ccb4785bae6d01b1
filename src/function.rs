//! Script function handles
//!
//! A [`FunctionHandle`] lets host code call back into a function value a
//! script passed it. Calls use the global object as receiver.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use log::trace;
use rquickjs::function::{Rest, This};
use rquickjs::{Ctx, Function};

use crate::error::{Diagnostic, Error, Result};
use crate::value::{stringify, JsValue, Kind, Value};

/// Origin reported for exceptions thrown by host-initiated calls
const CALLBACK_ORIGIN: &str = "unnamed";

/// Where a native call keeps the value its callbacks threw
pub(crate) type ThrownSlot<'js> = Rc<Cell<Option<JsValue<'js>>>>;

/// Callable engine value
#[derive(Clone)]
pub struct FunctionHandle<'js> {
    ctx: Ctx<'js>,
    value: JsValue<'js>,
    function: Function<'js>,
    thrown: Option<ThrownSlot<'js>>,
}

impl<'js> FunctionHandle<'js> {
    pub fn from_engine(value: JsValue<'js>) -> Result<Self> {
        let Some(function) = value.as_function().cloned() else {
            return Err(Error::Conversion {
                expected: Kind::Function,
                found: value.type_name().to_string(),
            });
        };
        Ok(FunctionHandle {
            ctx: value.ctx().clone(),
            value,
            function,
            thrown: None,
        })
    }

    /// Record exceptions thrown by calls in `slot` as well
    pub(crate) fn with_thrown_slot(mut self, slot: ThrownSlot<'js>) -> Self {
        self.thrown = Some(slot);
        self
    }

    /// Call with the global object as `this`
    ///
    /// An exception thrown by the function is returned as
    /// [`Error::Script`].
    pub fn call(&self, args: &[Value<'js>]) -> Result<Value<'js>> {
        Value::from_engine(self.call_raw(args)?)
    }

    /// Call and convert the result with the engine's `ToString`
    pub fn call_string(&self, args: &[Value<'js>]) -> Result<String> {
        Ok(stringify(&self.call_raw(args)?))
    }

    pub fn to_engine(&self) -> JsValue<'js> {
        self.value.clone()
    }

    fn call_raw(&self, args: &[Value<'js>]) -> Result<JsValue<'js>> {
        let handles = args
            .iter()
            .map(|arg| arg.to_engine(&self.ctx))
            .collect::<Result<Vec<_>>>()?;
        trace!("calling script function with {} arguments", handles.len());

        let receiver = self.ctx.globals();
        match self.function.call::<_, JsValue<'js>>((This(receiver), Rest(handles))) {
            Ok(value) => Ok(value),
            Err(rquickjs::Error::Exception) => {
                let thrown = self.ctx.catch();
                let diagnostic = Diagnostic::from_thrown(&thrown, CALLBACK_ORIGIN, None);
                if let Some(slot) = &self.thrown {
                    slot.set(Some(thrown));
                }
                Err(diagnostic.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl fmt::Debug for FunctionHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Engine;

    #[test]
    fn test_call_with_arguments() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let add = scope.eval("(function (a, b) { return a + b; })")?.into_function()?;
                let sum = add.call(&[Value::Int32(2), Value::Double(0.5)])?;
                assert_eq!(sum, Value::Double(2.5));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_receiver_is_global() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                scope.eval("var marker = 'global';")?;
                let read = scope.eval("(function () { return this.marker; })")?.into_function()?;
                assert_eq!(read.call(&[])?, Value::String("global".to_string()));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_call_string() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let f = scope.eval("(function (a, b) { return a + b; })")?.into_function()?;
                let text = f.call_string(&[Value::Double(45.6), Value::Int32(789)])?;
                assert_eq!(text, "834.6");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_thrown_exception_is_script_error() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let f = scope.eval("(function () { throw new TypeError('boom'); })")?.into_function()?;
                match f.call(&[]) {
                    Err(Error::Script(diagnostic)) => {
                        assert!(diagnostic.message.contains("boom"));
                        assert!(diagnostic.message.starts_with("TypeError"));
                    }
                    other => panic!("expected script error, got {:?}", other),
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_non_function_rejected() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let handle = scope.to_engine(&scope.eval("({})")?)?;
                assert!(matches!(
                    FunctionHandle::from_engine(handle),
                    Err(Error::Conversion { expected: Kind::Function, .. })
                ));
                Ok(())
            })
            .unwrap();
    }
}
