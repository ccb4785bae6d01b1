//! Host value representation
//!
//! [`Value`] is the tagged union host code sees in place of raw engine
//! handles. Conversion in both directions goes through
//! [`Value::from_engine`] and [`Value::to_engine`]; each scalar kind maps
//! to exactly one engine representation so that a value survives the
//! round trip unchanged:
//!
//! | Kind     | Engine representation          |
//! |----------|--------------------------------|
//! | `Bool`   | boolean                        |
//! | `Int32`  | tagged small integer           |
//! | `Int64`  | BigInt                         |
//! | `Double` | float64 number                 |
//! | `String` | string (length-delimited UTF-8) |
//!
//! 64-bit integers always travel as BigInt; they never pass through a
//! double, which would lose precision above 2^53. A BigInt outside the
//! `i64` range is a conversion failure. Integral doubles may come back as
//! `Int32`, which compares equal to the original `Double`.

use std::fmt;

use log::trace;
use rquickjs::{BigInt, Coerced, Ctx, Type};

use crate::array::ArrayView;
use crate::error::{Error, Result};
use crate::function::FunctionHandle;

/// Raw engine value handle
pub type JsValue<'js> = rquickjs::Value<'js>;

/// Kind tag of a host value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Undefined,
    Null,
    Bool,
    Int32,
    Int64,
    Double,
    String,
    /// Array or plain object
    Array,
    Function,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Undefined => "undefined",
            Kind::Null => "null",
            Kind::Bool => "boolean",
            Kind::Int32 => "int32",
            Kind::Int64 => "int64",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Array => "array",
            Kind::Function => "function",
        };
        f.write_str(name)
    }
}

/// A host view of one engine value
///
/// Container and function variants borrow an engine handle and are bound
/// to the scope (`'js`) that produced them.
#[derive(Debug, Clone)]
pub enum Value<'js> {
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(String),
    Array(ArrayView<'js>),
    Function(FunctionHandle<'js>),
}

impl<'js> Value<'js> {
    /// Classify an engine handle
    ///
    /// Symbols and other engine-only kinds have no host counterpart and
    /// fail with [`Error::Conversion`].
    pub fn from_engine(value: JsValue<'js>) -> Result<Self> {
        if value.is_function() {
            return FunctionHandle::from_engine(value).map(Value::Function);
        }
        if value.is_object() {
            return ArrayView::from_engine(value).map(Value::Array);
        }

        let converted = match value.type_of() {
            Type::Undefined => Value::Undefined,
            Type::Null => Value::Null,
            Type::Bool => Value::Bool(value.as_bool().unwrap_or_default()),
            Type::Int => Value::Int32(value.as_int().unwrap_or_default()),
            Type::Float => Value::Double(value.as_float().unwrap_or_default()),
            Type::String => match value.as_string() {
                Some(string) => Value::String(string.to_string()?),
                None => return Err(mismatch(Kind::String, &value)),
            },
            Type::BigInt => match value.as_big_int() {
                Some(big) => Value::Int64(exact_i64(big, &value)?),
                None => return Err(mismatch(Kind::Int64, &value)),
            },
            _ => {
                return Err(Error::Conversion {
                    expected: Kind::Undefined,
                    found: value.type_name().to_string(),
                })
            }
        };
        trace!("from_engine: {:?}", converted.kind());
        Ok(converted)
    }

    /// Create the engine handle for this value
    pub fn to_engine(&self, ctx: &Ctx<'js>) -> Result<JsValue<'js>> {
        let value = match self {
            Value::Undefined => JsValue::new_undefined(ctx.clone()),
            Value::Null => JsValue::new_null(ctx.clone()),
            Value::Bool(b) => JsValue::new_bool(ctx.clone(), *b),
            Value::Int32(n) => JsValue::new_int(ctx.clone(), *n),
            Value::Int64(n) => BigInt::from_i64(ctx.clone(), *n)?.into_value(),
            Value::Double(n) => JsValue::new_float(ctx.clone(), *n),
            Value::String(s) => rquickjs::String::from_str(ctx.clone(), s)?.into_value(),
            Value::Array(view) => view.to_engine(),
            Value::Function(function) => function.to_engine(),
        };
        Ok(value)
    }

    /// Build a string value from a UTF-8 buffer
    ///
    /// With `len == None` the string stops at the first NUL byte. An
    /// explicit length keeps embedded NULs and must end on a character
    /// boundary within the buffer.
    pub fn from_utf8(bytes: &[u8], len: Option<usize>) -> Result<Self> {
        let end = match len {
            Some(len) if len <= bytes.len() => len,
            Some(len) => {
                return Err(Error::StringLength {
                    len,
                    available: bytes.len(),
                })
            }
            None => bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len()),
        };
        match std::str::from_utf8(&bytes[..end]) {
            Ok(text) => Ok(Value::String(text.to_string())),
            Err(_) => Err(Error::StringLength {
                len: end,
                available: bytes.len(),
            }),
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Value::Undefined => Kind::Undefined,
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int32(_) => Kind::Int32,
            Value::Int64(_) => Kind::Int64,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Function(_) => Kind::Function,
        }
    }

    /// True for arrays and plain objects
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    // Accessors

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.expected(Kind::Bool)),
        }
    }

    /// Read as a 32-bit integer
    ///
    /// Doubles are accepted when they hold an integral value in range.
    pub fn as_i32(&self) -> Result<i32> {
        match self {
            Value::Int32(n) => Ok(*n),
            Value::Double(n)
                if n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64 =>
            {
                Ok(*n as i32)
            }
            other => Err(other.expected(Kind::Int32)),
        }
    }

    /// Read as a 64-bit integer (BigInt, or a widened int32)
    pub fn as_i64(&self) -> Result<i64> {
        match self {
            Value::Int64(n) => Ok(*n),
            Value::Int32(n) => Ok(i64::from(*n)),
            other => Err(other.expected(Kind::Int64)),
        }
    }

    /// Read as a double-precision number
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            Value::Double(n) => Ok(*n),
            Value::Int32(n) => Ok(f64::from(*n)),
            other => Err(other.expected(Kind::Double)),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.expected(Kind::String)),
        }
    }

    pub fn into_string(self) -> Result<String> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.expected(Kind::String)),
        }
    }

    pub fn as_array(&self) -> Result<&ArrayView<'js>> {
        match self {
            Value::Array(view) => Ok(view),
            other => Err(other.expected(Kind::Array)),
        }
    }

    pub fn into_array(self) -> Result<ArrayView<'js>> {
        match self {
            Value::Array(view) => Ok(view),
            other => Err(other.expected(Kind::Array)),
        }
    }

    pub fn into_function(self) -> Result<FunctionHandle<'js>> {
        match self {
            Value::Function(function) => Ok(function),
            other => Err(other.expected(Kind::Function)),
        }
    }

    fn expected(&self, expected: Kind) -> Error {
        Error::Conversion {
            expected,
            found: self.kind().to_string(),
        }
    }
}

/// Scalars compare by value. Engine-backed variants have no host identity
/// and never compare equal.
///
/// `Int32` and `Double` compare as numbers: the engine stores integral
/// doubles as small integers, so `Double(2.0)` comes back as `Int32(2)`.
impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            // Bitwise, so that -0.0 and 0.0 stay distinct
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Int32(a), Value::Double(b)) | (Value::Double(b), Value::Int32(a)) => {
                f64::from(*a).to_bits() == b.to_bits()
            }
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value<'_> {
    fn from(n: i32) -> Self {
        Value::Int32(n)
    }
}

impl From<i64> for Value<'_> {
    fn from(n: i64) -> Self {
        Value::Int64(n)
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl<'js> From<ArrayView<'js>> for Value<'js> {
    fn from(view: ArrayView<'js>) -> Self {
        Value::Array(view)
    }
}

impl<'js> From<FunctionHandle<'js>> for Value<'js> {
    fn from(function: FunctionHandle<'js>) -> Self {
        Value::Function(function)
    }
}

/// Best-effort string form of an engine value
///
/// Uses the engine's own `ToString`; values that refuse it (symbols)
/// fall back to their type name.
pub fn stringify(value: &JsValue<'_>) -> String {
    match value.get::<Coerced<String>>() {
        Ok(Coerced(text)) => text,
        Err(_) => value.type_name().to_string(),
    }
}

/// The engine wraps out-of-range BigInts modulo 2^64; compare decimal
/// forms to reject those
fn exact_i64(big: &BigInt<'_>, value: &JsValue<'_>) -> Result<i64> {
    let n = big.clone().to_i64()?;
    let text = stringify(value);
    if n.to_string() != text {
        return Err(Error::Conversion {
            expected: Kind::Int64,
            found: format!("bigint {}", text),
        });
    }
    Ok(n)
}

fn mismatch(expected: Kind, value: &JsValue<'_>) -> Error {
    Error::Conversion {
        expected,
        found: value.type_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Engine, Scope};

    fn assert_round_trip<'js>(scope: &Scope<'js>, values: Vec<Value<'js>>) -> Result<()> {
        for value in values {
            let handle = scope.to_engine(&value)?;
            let back = Value::from_engine(handle)?;
            assert_eq!(back, value, "round trip of {:?}", value);
        }
        Ok(())
    }

    #[test]
    fn test_round_trip_scalars() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let values = vec![
                    Value::Bool(true),
                    Value::Bool(false),
                    Value::Int32(0),
                    Value::Int32(-1),
                    Value::Int32(i32::MAX),
                    Value::Int64(i64::MAX),
                    Value::Int64(i64::MIN),
                    Value::Int64(-1),
                    Value::Double(0.0),
                    Value::Double(-0.0),
                    Value::Double(-0.5),
                    Value::Double(1e300),
                    Value::String(String::new()),
                    Value::String("héllo wörld".to_string()),
                    Value::Undefined,
                    Value::Null,
                ];
                assert_round_trip(&scope, values)
            })
            .unwrap();
    }

    #[test]
    fn test_round_trip_integral_double() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                for n in [0.0, 12.0, -3.0] {
                    let back = Value::from_engine(scope.to_engine(&Value::Double(n))?)?;
                    assert_eq!(back, Value::Double(n));
                }
                let back = Value::from_engine(scope.to_engine(&Value::Double(-0.0))?)?;
                assert_ne!(back, Value::Double(0.0));
                assert_ne!(back, Value::Int32(0));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_numeric_equality() {
        assert_eq!(Value::Int32(0), Value::Double(0.0));
        assert_eq!(Value::Double(7.0), Value::Int32(7));
        assert_ne!(Value::Int32(0), Value::Double(-0.0));
        assert_ne!(Value::Int32(1), Value::Double(1.5));
        assert_ne!(Value::Int32(1), Value::Int64(1));
    }

    #[test]
    fn test_bigint_out_of_range() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                assert_eq!(scope.eval("-9223372036854775808n")?, Value::Int64(i64::MIN));
                assert!(matches!(
                    scope.eval("18446744073709551617n"),
                    Err(Error::Conversion { expected: Kind::Int64, .. })
                ));
                assert!(scope.eval("-9223372036854775809n").is_err());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_round_trip_embedded_nul() {
        let bytes = b"ab\0cd";
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let value = Value::from_utf8(bytes, Some(bytes.len()))?;
                assert_eq!(value.as_str()?, "ab\0cd");
                assert_round_trip(&scope, vec![value])
            })
            .unwrap();
    }

    #[test]
    fn test_from_utf8_stops_at_nul() {
        let value = Value::from_utf8(b"ab\0cd", None).unwrap();
        assert_eq!(value, Value::String("ab".to_string()));

        let value = Value::from_utf8(b"abcd", Some(2)).unwrap();
        assert_eq!(value, Value::String("ab".to_string()));
    }

    #[test]
    fn test_from_utf8_bad_length() {
        assert!(matches!(
            Value::from_utf8(b"abc", Some(4)),
            Err(Error::StringLength { len: 4, available: 3 })
        ));
        // Splits the two-byte 'é'
        assert!(Value::from_utf8("é".as_bytes(), Some(1)).is_err());
    }

    #[test]
    fn test_accessor_mismatch() {
        let value: Value<'_> = Value::String("x".to_string());
        assert!(matches!(
            value.as_f64(),
            Err(Error::Conversion { expected: Kind::Double, .. })
        ));
        assert!(value.clone().into_function().is_err());
        assert!(Value::Int32(1).as_bool().is_err());
        assert!(Value::Double(1.5).as_i32().is_err());
        assert!(Value::Double(1e12).as_i32().is_err());
    }

    #[test]
    fn test_numeric_widening() {
        assert_eq!(Value::Double(12.0).as_i32().unwrap(), 12);
        assert_eq!(Value::Int32(3).as_f64().unwrap(), 3.0);
        assert_eq!(Value::Int32(-7).as_i64().unwrap(), -7);
        assert!(Value::Double(3.0).as_i64().is_err());
    }

    #[test]
    fn test_large_integer_uses_bigint() {
        let mut engine = Engine::default_engine().unwrap();
        let is_bigint = engine
            .with(|scope| {
                let handle = scope.to_engine(&Value::Int64(9_223_372_036_854_775_807))?;
                Ok(handle.type_of() == Type::BigInt)
            })
            .unwrap();
        assert!(is_bigint);
    }

    #[test]
    fn test_from_engine_kinds() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                assert_eq!(scope.eval("[1, 2]")?.kind(), Kind::Array);
                assert_eq!(scope.eval("({ a: 1 })")?.kind(), Kind::Array);
                assert_eq!(scope.eval("(function () {})")?.kind(), Kind::Function);
                assert_eq!(scope.eval("2.5")?, Value::Double(2.5));
                assert_eq!(scope.eval("'abc'")?, Value::String("abc".to_string()));
                assert_eq!(scope.eval("12n")?, Value::Int64(12));
                assert!(scope.eval("Symbol('s')").is_err());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_stringify() {
        let mut engine = Engine::default_engine().unwrap();
        engine
            .with(|scope| {
                let handle = scope.to_engine(&Value::Double(12.0))?;
                assert_eq!(stringify(&handle), "12");
                let handle = scope.to_engine(&Value::Int64(5))?;
                assert_eq!(stringify(&handle), "5");
                Ok(())
            })
            .unwrap();
    }
}
