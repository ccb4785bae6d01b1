//! Default native bindings
//!
//! The functions the `jseasy` shell exposes to scripts. Each one shows a
//! different path through the bridge.

use std::io::{self, Write};

use log::debug;

use crate::argument::Argument;
use crate::array::{print_container, ArrayView};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::{stringify, JsValue, Value};

/// Register every default binding on `engine`
pub fn install(engine: &mut Engine) {
    engine.set("version", version);
    engine.set("print", print);
    engine.set("mul", mul);
    engine.set("add_long", add_long);
    engine.set("plus", plus);
    engine.set("not", not);
    engine.set("func", func);
    engine.set("print_r", print_r);
}

/// `version()`: engine version string
fn version(args: &mut Argument<'_>) -> Result<()> {
    args.set_result(Engine::version())
}

/// `print(text)`: write a line to stdout
fn print(args: &mut Argument<'_>) -> Result<()> {
    let text = args.get(0)?.into_string()?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", text)?;
    Ok(())
}

/// `mul(a, b)`: product of two doubles
fn mul(args: &mut Argument<'_>) -> Result<()> {
    let product = args.get(0)?.as_f64()? * args.get(1)?.as_f64()?;
    args.set_result(product)
}

/// `add_long(a, b)`: exact 64-bit sum, as a BigInt
fn add_long(args: &mut Argument<'_>) -> Result<()> {
    let a = args.get(0)?.as_i64()?;
    let b = args.get(1)?.as_i64()?;
    let sum = a.checked_add(b).ok_or(Error::Overflow("add_long"))?;
    args.set_result(sum)
}

/// `plus(a, b)`: 123 + 456 + a + b
///
/// The two constants make a round trip through the engine first.
fn plus(args: &mut Argument<'_>) -> Result<()> {
    let v1 = Value::from_engine(Value::Int32(123).to_engine(args.ctx())?)?;
    let v2 = Value::from_engine(Value::Int32(456).to_engine(args.ctx())?)?;
    let sum = [v1, v2, args.get(0)?, args.get(1)?]
        .iter()
        .try_fold(0_i32, |sum, value| {
            sum.checked_add(value.as_i32()?).ok_or(Error::Overflow("plus"))
        })?;
    args.set_result(sum)
}

/// `not(b)`: boolean negation
fn not(args: &mut Argument<'_>) -> Result<()> {
    let b = args.get(0)?.as_bool()?;
    args.set_result(!b)
}

/// `func(f)`: call `f(45.6, 789)` and return its string form
fn func(args: &mut Argument<'_>) -> Result<()> {
    let callback = args.get(0)?.into_function()?;
    let text = callback.call_string(&[Value::Double(45.6), Value::Int32(789)])?;
    args.set_result(text)
}

/// `print_r(x)`: print the tree of a container; scalars print nothing
///
/// `print_r(x, target)` with an array `target` copies the string form of
/// each element of `x` into `target` instead.
fn print_r(args: &mut Argument<'_>) -> Result<()> {
    if args.len() > 1 {
        if let Value::Array(target) = args.get(1)? {
            if target.is_array() {
                let source = args.get(0)?.into_array()?;
                return copy_as_strings(&source, &target);
            }
        }
    }

    let value = args.get(0)?.to_engine(args.ctx())?;
    print_tree(&mut io::stdout().lock(), &value)
}

fn print_tree<W: Write>(out: &mut W, value: &JsValue<'_>) -> Result<()> {
    if !print_container(out, value, 1)? {
        debug!("print_r: {} is not a container", value.type_name());
    }
    Ok(())
}

fn copy_as_strings(source: &ArrayView<'_>, target: &ArrayView<'_>) -> Result<()> {
    for key in source.keys()? {
        let index = key.as_index()?;
        let text = stringify(&source.get_raw(&key)?);
        target.set(index, text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::default_engine().unwrap();
        install(&mut engine);
        engine
    }

    #[test]
    fn test_install_all() {
        let engine = engine();
        let names: Vec<_> = engine.natives().names().collect();
        assert_eq!(
            names,
            vec!["version", "print", "mul", "add_long", "plus", "not", "func", "print_r"]
        );
    }

    #[test]
    fn test_version() {
        let mut engine = engine();
        assert_eq!(engine.run("version();", ""), Engine::version());
    }

    #[test]
    fn test_mul() {
        let mut engine = engine();
        assert_eq!(engine.run("mul(3.0, 4.0)", ""), "12");
        assert!(engine.run("mul('a', 2)", "").contains("TypeError"));
        assert!(engine.run("mul(2)", "").contains("argument 1 out of range"));
    }

    #[test]
    fn test_add_long() {
        let mut engine = engine();
        assert_eq!(engine.run("add_long(9007199254740993n, 2n)", ""), "9007199254740995");
        assert_eq!(engine.run("typeof add_long(1n, 2n)", ""), "bigint");
        assert_eq!(engine.run("add_long(9223372036854775806n, 1n)", ""), "9223372036854775807");
        assert!(engine.run("add_long(9223372036854775807n, 1n)", "").contains("RangeError"));
        let output = engine.run("add_long(18446744073709551617n, 0n)", "");
        assert!(output.contains("TypeError"), "{}", output);
        assert!(output.contains("bigint 18446744073709551617"), "{}", output);
    }

    #[test]
    fn test_plus() {
        let mut engine = engine();
        assert_eq!(engine.run("plus(1, 2)", ""), "582");
        assert_eq!(engine.run("plus(2147483000, 68)", ""), "2147483647");
    }

    #[test]
    fn test_plus_overflow_is_range_error() {
        let mut engine = engine();
        let output = engine.run("plus(2147483647, 1)", "");
        assert!(output.contains("RangeError"), "{}", output);
        assert!(output.contains("integer overflow in plus"), "{}", output);
        // The engine survives and keeps running scripts
        assert_eq!(engine.run("plus(0, 0)", ""), "579");
    }

    #[test]
    fn test_not() {
        let mut engine = engine();
        assert_eq!(engine.run("not(true)", ""), "false");
        assert_eq!(engine.run("not(false)", ""), "true");
        assert!(engine.run("not(0)", "").contains("TypeError"));
    }

    #[test]
    fn test_func() {
        let mut engine = engine();
        assert_eq!(engine.run("func(function (a, b) { return a + b; })", ""), "834.6");
        assert_eq!(engine.run("func(function (a, b) { return [a, b]; })", ""), "45.6,789");

        let output = engine.run("func(function () { throw new TypeError('deep'); })", "");
        assert!(output.ends_with(": TypeError: deep"), "{}", output);
    }

    #[test]
    fn test_print_r_copies_into_array() {
        let mut engine = engine();
        engine.run("var out = []; print_r([1, true, 'x'], out);", "");
        assert_eq!(engine.run("out.length", ""), "3");
        assert_eq!(engine.run("typeof out[0] + ':' + out.join('|')", ""), "string:1|true|x");
    }

    #[test]
    fn test_print_r_prints_objects() {
        let mut engine = engine();
        assert_eq!(engine.run("print_r({ a: [1] })", ""), "");
        assert_eq!(engine.run("print_r(5)", ""), "");
    }

    #[test]
    fn test_print_tree_output() {
        let mut engine = engine();
        let (tree, scalar) = engine
            .with(|scope| {
                let mut tree = Vec::new();
                print_tree(&mut tree, &scope.to_engine(&scope.eval("({ a: [1] })")?)?)?;
                let mut scalar = Vec::new();
                print_tree(&mut scalar, &scope.to_engine(&Value::Int32(5))?)?;
                Ok((String::from_utf8(tree).unwrap(), scalar))
            })
            .unwrap();
        assert_eq!(tree, "\tObject\n\t(\n\t\t[a] : Array\n\t\t(\n\t\t\t[0] : 1\n\t\t)\n\t)\n");
        assert!(scalar.is_empty());
    }
}
