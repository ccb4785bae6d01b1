//! Error types
//!
//! Host-side failures of the bridge. Script failures (syntax errors,
//! uncaught exceptions) are carried as a [`Diagnostic`], which renders in
//! the `<origin>:line(<n>):col(<start>-<end>): <message>` form shown to
//! REPL users.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::value::{stringify, Kind};

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error
#[derive(Debug, Error)]
pub enum Error {
    /// A value was read as a kind it does not hold
    #[error("cannot convert {found} to {expected}")]
    Conversion { expected: Kind, found: String },

    /// A native callback asked for an argument that was not passed
    #[error("argument {index} out of range ({len} passed)")]
    ArgumentOutOfRange { index: usize, len: usize },

    /// An explicit string length does not fit the buffer
    #[error("string length {len} does not fit {available} bytes of UTF-8")]
    StringLength { len: usize, available: usize },

    /// A script called a native slot with no registered function
    #[error("native function #{0} is not registered")]
    UnknownNative(usize),

    /// Integer arithmetic in a binding left the representable range
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// Rejected engine configuration
    #[error("invalid engine configuration: {0}")]
    Config(String),

    /// An exception raised by script code
    #[error(transparent)]
    Script(#[from] Diagnostic),

    /// Failure reported by the engine itself
    #[error("engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pipeline stage a diagnostic was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Execute,
}

/// A located script failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{origin}:line({line}):col({start_column}-{end_column}): {message}")]
pub struct Diagnostic {
    pub stage: Stage,
    /// File path, or `unnamed` for inline text
    pub origin: String,
    /// 1-based line, 0 when the engine gave no position
    pub line: u32,
    /// 0-based start column
    pub start_column: u32,
    /// 0-based exclusive end column
    pub end_column: u32,
    pub message: String,
}

/// First `file:line:col` frame of an engine backtrace
static FRAME_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*at\s.*?:(\d+)(?::(\d+))?\)?\s*$").expect("valid frame regex")
});

/// Top-level frame of the script being run
static EVAL_FRAME_POSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*at <eval> \(.*?:(\d+)(?::(\d+))?\)\s*$").expect("valid frame regex")
});

impl Diagnostic {
    /// Build a diagnostic from a value thrown by the engine
    ///
    /// `source` is the text that was running, used to size the column range.
    pub fn from_thrown(thrown: &rquickjs::Value<'_>, origin: &str, source: Option<&str>) -> Self {
        let mut stage = Stage::Execute;
        let (message, line, column) = match thrown.as_object() {
            Some(error) => {
                let name: Option<String> = error.get::<_, Option<String>>("name").ok().flatten();
                let text: Option<String> = error.get::<_, Option<String>>("message").ok().flatten();
                let stack: Option<String> = error.get::<_, Option<String>>("stack").ok().flatten();
                let mut line: Option<i32> = error.get::<_, Option<i32>>("lineNumber").ok().flatten();
                let mut column: Option<i32> = error.get::<_, Option<i32>>("columnNumber").ok().flatten();

                // Functions from earlier runs report their own lines; the
                // running unit's top-level frame locates the failure in it
                let eval_frame = stack.as_deref().and_then(eval_frame_position);
                if let Some((l, c)) = eval_frame {
                    line = Some(l);
                    column = c;
                } else if line.is_none() {
                    if let Some((l, c)) = stack.as_deref().and_then(frame_position) {
                        line = Some(l);
                        column = column.or(c);
                    }
                }
                if name.as_deref() == Some("SyntaxError") && !has_call_frames(stack.as_deref()) {
                    stage = Stage::Compile;
                }

                let message = match (name, text) {
                    (Some(name), Some(text)) if !text.is_empty() => format!("{}: {}", name, text),
                    (Some(name), _) => name,
                    (None, Some(text)) => text,
                    (None, None) => stringify(thrown),
                };
                (message, line, column)
            }
            None => (stringify(thrown), None, None),
        };

        let line = line.filter(|l| *l > 0).map_or(0, |l| l as u32);
        // Engine columns are 1-based
        let start_column = column.filter(|c| *c > 0).map_or(0, |c| c as u32 - 1);
        let end_column = match (line, source) {
            (0, _) => start_column,
            (_, Some(source)) => start_column + token_width(source, line, start_column),
            (_, None) => start_column + 1,
        };

        Diagnostic {
            stage,
            origin: origin.to_string(),
            line,
            start_column,
            end_column,
            message,
        }
    }

    /// Diagnostic for a byte the engine cannot accept in source text
    pub(crate) fn located(stage: Stage, origin: &str, line: u32, column: u32, message: String) -> Self {
        Diagnostic {
            stage,
            origin: origin.to_string(),
            line,
            start_column: column,
            end_column: column + 1,
            message,
        }
    }
}

fn frame_position(stack: &str) -> Option<(i32, Option<i32>)> {
    position_of(&FRAME_POSITION, stack)
}

fn eval_frame_position(stack: &str) -> Option<(i32, Option<i32>)> {
    position_of(&EVAL_FRAME_POSITION, stack)
}

fn position_of(frame: &Regex, stack: &str) -> Option<(i32, Option<i32>)> {
    let captures = frame.captures(stack)?;
    let line = captures.get(1)?.as_str().parse().ok()?;
    let column = captures.get(2).and_then(|c| c.as_str().parse().ok());
    Some((line, column))
}

/// A parse error has no frame naming a running function
fn has_call_frames(stack: Option<&str>) -> bool {
    stack.is_some_and(|stack| stack.lines().any(|frame| frame.contains('(')))
}

/// Width of the identifier or number starting at `column`, at least 1
fn token_width(source: &str, line: u32, column: u32) -> u32 {
    let Some(text) = source.lines().nth(line as usize - 1) else {
        return 1;
    };
    let width = text
        .chars()
        .skip(column as usize)
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .count();
    width.max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_format() {
        let diagnostic = Diagnostic {
            stage: Stage::Compile,
            origin: "unnamed".to_string(),
            line: 3,
            start_column: 4,
            end_column: 7,
            message: "SyntaxError: unexpected token".to_string(),
        };
        assert_eq!(
            diagnostic.to_string(),
            "unnamed:line(3):col(4-7): SyntaxError: unexpected token"
        );
    }

    #[test]
    fn test_frame_position() {
        let stack = "    at mul (native)\n    at <eval> (eval_script:2:5)\n";
        assert_eq!(frame_position(stack), Some((2, Some(5))));

        let stack = "    at eval_script:7\n";
        assert_eq!(frame_position(stack), Some((7, None)));

        assert_eq!(frame_position("    at f (native)\n"), None);
    }

    #[test]
    fn test_eval_frame_position() {
        let stack = "    at f (eval_script:3:5)\n    at <eval> (eval_script:2:1)\n";
        assert_eq!(eval_frame_position(stack), Some((2, Some(1))));
        assert_eq!(frame_position(stack), Some((3, Some(5))));
        assert_eq!(eval_frame_position("    at eval_script:1:3\n"), None);
    }

    #[test]
    fn test_call_frames() {
        assert!(!has_call_frames(Some("    at eval_script:1:3\n")));
        assert!(has_call_frames(Some("    at <eval> (eval_script:1:3)\n")));
        assert!(!has_call_frames(None));
    }

    #[test]
    fn test_token_width() {
        let source = "var a = 1;\nfoo bar;";
        assert_eq!(token_width(source, 2, 0), 3);
        assert_eq!(token_width(source, 2, 3), 1);
        assert_eq!(token_width(source, 9, 0), 1);
    }

    #[test]
    fn test_conversion_message() {
        let error = Error::Conversion {
            expected: Kind::Function,
            found: "object".to_string(),
        };
        assert_eq!(error.to_string(), "cannot convert object to function");
    }
}
