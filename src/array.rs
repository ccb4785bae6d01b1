//! Array and object access
//!
//! Host code cannot tell statically whether a script handed it an array or
//! a plain object, so both are presented through [`ArrayView`]. Keys come
//! back in the engine's own enumeration order (integer indices ascending,
//! then string keys in insertion order) and are never re-sorted.

use std::fmt;
use std::io::Write;

use log::trace;
use rquickjs::{Ctx, Object};

use crate::error::{Error, Result};
use crate::value::{stringify, JsValue, Kind, Value};

/// Nesting depth past which [`print_container`] stops descending
pub const MAX_PRINT_DEPTH: usize = 32;

/// Largest valid array index (2^32 - 2)
const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// Property key for container access
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(u32),
    Name(String),
}

impl Key {
    /// Classify an engine property name
    ///
    /// Canonical array indices ("0", "17", not "007") become `Index`.
    pub fn from_property(name: String) -> Key {
        let canonical = !name.is_empty() && (name == "0" || !name.starts_with('0'));
        match name.parse::<u32>() {
            Ok(index) if canonical && index <= MAX_ARRAY_INDEX => Key::Index(index),
            _ => Key::Name(name),
        }
    }

    pub fn as_index(&self) -> Result<u32> {
        match self {
            Key::Index(index) => Ok(*index),
            Key::Name(name) => Err(Error::Conversion {
                expected: Kind::Int32,
                found: format!("property name {:?}", name),
            }),
        }
    }

    pub fn as_name(&self) -> Result<&str> {
        match self {
            Key::Name(name) => Ok(name),
            Key::Index(index) => Err(Error::Conversion {
                expected: Kind::String,
                found: format!("index {}", index),
            }),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(index) => write!(f, "{}", index),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for Key {
    fn from(index: u32) -> Self {
        Key::Index(index)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// View over an engine array or plain object
#[derive(Clone)]
pub struct ArrayView<'js> {
    ctx: Ctx<'js>,
    value: JsValue<'js>,
    object: Object<'js>,
    is_array: bool,
}

impl<'js> ArrayView<'js> {
    /// Wrap an engine handle; fails unless it is an array or object
    pub fn from_engine(value: JsValue<'js>) -> Result<Self> {
        let is_array = value.is_array();
        let Some(object) = value.as_object().cloned() else {
            return Err(Error::Conversion {
                expected: Kind::Array,
                found: value.type_name().to_string(),
            });
        };
        Ok(ArrayView {
            ctx: value.ctx().clone(),
            value,
            object,
            is_array,
        })
    }

    /// Whether an engine handle can be viewed as a container
    pub fn is_container(value: &JsValue<'_>) -> bool {
        !value.is_function() && (value.is_array() || value.is_object())
    }

    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Element count for arrays, own enumerable key count for objects
    pub fn length(&self) -> Result<u32> {
        if self.is_array {
            Ok(self.object.get("length")?)
        } else {
            Ok(self.keys()?.len() as u32)
        }
    }

    /// Own enumerable keys in engine order
    pub fn keys(&self) -> Result<Vec<Key>> {
        let mut keys = Vec::new();
        for name in self.object.keys::<String>() {
            keys.push(Key::from_property(name?));
        }
        trace!("keys: {} entries", keys.len());
        Ok(keys)
    }

    pub fn get(&self, key: impl Into<Key>) -> Result<Value<'js>> {
        Value::from_engine(self.get_raw(&key.into())?)
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value<'js>>) -> Result<()> {
        let handle = value.into().to_engine(&self.ctx)?;
        match key.into() {
            Key::Index(index) => self.object.set(index, handle)?,
            Key::Name(name) => self.object.set(name.as_str(), handle)?,
        }
        Ok(())
    }

    /// Key/value pairs in engine order
    pub fn entries(&self) -> Result<Vec<(Key, Value<'js>)>> {
        self.keys()?
            .into_iter()
            .map(|key| {
                let value = Value::from_engine(self.get_raw(&key)?)?;
                Ok((key, value))
            })
            .collect()
    }

    pub fn to_engine(&self) -> JsValue<'js> {
        self.value.clone()
    }

    pub(crate) fn get_raw(&self, key: &Key) -> Result<JsValue<'js>> {
        let value = match key {
            Key::Index(index) => self.object.get(*index)?,
            Key::Name(name) => self.object.get(name.as_str())?,
        };
        Ok(value)
    }
}

impl fmt::Debug for ArrayView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("is_array", &self.is_array)
            .finish_non_exhaustive()
    }
}

/// Write the tree of a container, one key per line
///
/// ```text
/// Object
/// (
///     [name] : value
///     [list] : Array
///     (
///         [0] : 1
///     )
/// )
/// ```
///
/// Indentation uses one tab per level starting at `indent`. Returns
/// `false` without writing anything when `value` is not a container.
/// A container that is already being printed further up the tree prints
/// `*RECURSION*`, as does anything nested deeper than [`MAX_PRINT_DEPTH`].
pub fn print_container<W: Write>(out: &mut W, value: &JsValue<'_>, indent: usize) -> Result<bool> {
    if !ArrayView::is_container(value) {
        return Ok(false);
    }
    let view = ArrayView::from_engine(value.clone())?;
    write!(out, "{}", "\t".repeat(indent))?;
    let mut path = vec![value.clone()];
    print_view(out, &view, indent, &mut path)?;
    Ok(true)
}

/// `path` holds the containers from the root down to `view`
fn print_view<'js, W: Write>(
    out: &mut W,
    view: &ArrayView<'js>,
    indent: usize,
    path: &mut Vec<JsValue<'js>>,
) -> Result<()> {
    let tabs = "\t".repeat(indent);
    writeln!(out, "{}", if view.is_array() { "Array" } else { "Object" })?;
    writeln!(out, "{}(", tabs)?;
    for key in view.keys()? {
        write!(out, "{}\t[{}] : ", tabs, key)?;
        let child = view.get_raw(&key)?;
        if !ArrayView::is_container(&child) {
            writeln!(out, "{}", stringify(&child))?;
        } else if path.contains(&child) || path.len() >= MAX_PRINT_DEPTH {
            writeln!(out, "*RECURSION*")?;
        } else {
            path.push(child.clone());
            print_view(out, &ArrayView::from_engine(child)?, indent + 1, path)?;
            path.pop();
        }
    }
    writeln!(out, "{})", tabs)?;
    Ok(())
}
