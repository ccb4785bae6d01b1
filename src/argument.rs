//! Native call arguments
//!
//! Every native callback receives an [`Argument`]: the positional
//! arguments of the call and a slot for its return value.

use rquickjs::Ctx;

use crate::error::{Error, Result};
use crate::function::ThrownSlot;
use crate::value::{JsValue, Value};

/// Invocation record of one native call
pub struct Argument<'js> {
    ctx: Ctx<'js>,
    args: Vec<JsValue<'js>>,
    result: JsValue<'js>,
    thrown: ThrownSlot<'js>,
}

impl<'js> Argument<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, args: Vec<JsValue<'js>>) -> Self {
        let result = JsValue::new_undefined(ctx.clone());
        Argument {
            ctx,
            args,
            result,
            thrown: ThrownSlot::default(),
        }
    }

    /// Active engine scope, for building values
    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The `index`-th argument
    ///
    /// Missing arguments are an error rather than `undefined`, so a binding
    /// called with the wrong arity fails instead of computing on defaults.
    pub fn get(&self, index: usize) -> Result<Value<'js>> {
        match self.args.get(index) {
            Some(value) => match Value::from_engine(value.clone())? {
                Value::Function(function) => {
                    Ok(Value::Function(function.with_thrown_slot(self.thrown.clone())))
                }
                other => Ok(other),
            },
            None => Err(Error::ArgumentOutOfRange {
                index,
                len: self.args.len(),
            }),
        }
    }

    /// Set the call's return value
    pub fn set_result(&mut self, value: impl Into<Value<'js>>) -> Result<()> {
        self.result = value.into().to_engine(&self.ctx)?;
        Ok(())
    }

    /// Read back the return value as a 32-bit integer
    pub fn result(&self) -> Result<i32> {
        Value::from_engine(self.result.clone())?.as_i32()
    }

    pub(crate) fn into_result(self) -> JsValue<'js> {
        self.result
    }

    /// The last value thrown by a function argument called from this call
    pub(crate) fn take_thrown(&self) -> Option<JsValue<'js>> {
        self.thrown.take()
    }
}
