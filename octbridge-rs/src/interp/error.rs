//! Interpreter faults.

use std::fmt;

/// A syntax error, with the 1-based position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("parse error near line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        ParseError { message: message.into(), line, column }
    }

    /// Whether the source ended inside an unfinished construct, so that
    /// more input could complete it.
    pub fn is_incomplete(&self) -> bool {
        self.message.contains("end of input") || self.message.starts_with("syntax error: missing '")
    }
}

/// A runtime error raised while executing interpreter code.
///
/// Displays as `[in 'fn': ][(identifier: id) ]message`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeError {
    pub message: String,
    /// Octave message identifier, e.g. `Octave:undefined-function`.
    pub identifier: Option<String>,
    /// Innermost user function executing when the error was raised.
    pub function: Option<String>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        RuntimeError { message: message.into(), identifier: None, function: None }
    }

    pub fn with_id(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        RuntimeError {
            message: message.into(),
            identifier: Some(identifier.into()),
            function: None,
        }
    }

    /// Record the function the error escaped from, unless one is already set.
    pub fn in_function(mut self, name: &str) -> Self {
        if self.function.is_none() {
            self.function = Some(name.to_owned());
        }
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(func) = &self.function {
            write!(f, "in '{func}': ")?;
        }
        if let Some(id) = &self.identifier {
            write!(f, "(identifier: {id}) ")?;
        }
        f.write_str(self.message.trim_end_matches(['\r', '\n']))
    }
}

impl std::error::Error for RuntimeError {}

impl From<ParseError> for RuntimeError {
    fn from(e: ParseError) -> Self {
        RuntimeError::with_id("Octave:parse-error", e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Largest element count a single array may hold.
pub const MAX_NUMEL: usize = i32::MAX as usize;

/// The fault raised when an array would exceed [`MAX_NUMEL`].
pub fn too_large() -> RuntimeError {
    RuntimeError::with_id(
        "Octave:out-of-memory",
        "out of memory or dimension too large for Octave's index type",
    )
}

/// Element count of `shape`, or [`too_large`] when it overflows or
/// exceeds [`MAX_NUMEL`].
pub fn checked_numel(shape: &[usize]) -> Result<usize> {
    if shape.contains(&0) {
        return Ok(0);
    }
    shape
        .iter()
        .try_fold(1usize, |n, &d| n.checked_mul(d))
        .filter(|&n| n <= MAX_NUMEL)
        .ok_or_else(too_large)
}

/// `RuntimeError::new(format!(...))`
macro_rules! rt_err {
    ($($arg:tt)*) => {
        $crate::interp::error::RuntimeError::new(format!($($arg)*))
    };
}
pub(crate) use rt_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_format() {
        let e = RuntimeError::with_id("pkg:oops", "bad thing\n").in_function("f");
        assert_eq!(e.to_string(), "in 'f': (identifier: pkg:oops) bad thing");
        let e = e.in_function("outer");
        assert_eq!(e.function.as_deref(), Some("f"));
        assert_eq!(RuntimeError::new("plain").to_string(), "plain");
    }

    #[test]
    fn incomplete_input() {
        let open_block = crate::interp::parse("if true\n  x = 1;\n").unwrap_err();
        assert!(open_block.is_incomplete(), "{open_block}");
        let open_matrix = crate::interp::parse("x = [1, 2\n").unwrap_err();
        assert!(open_matrix.is_incomplete(), "{open_matrix}");
        let bad = crate::interp::parse("x = )").unwrap_err();
        assert!(!bad.is_incomplete(), "{bad}");
    }

    #[test]
    fn element_counts_are_bounded() {
        assert_eq!(checked_numel(&[3, 4, 2]), Ok(24));
        assert_eq!(checked_numel(&[usize::MAX, 0]), Ok(0));
        assert_eq!(checked_numel(&[1, MAX_NUMEL]), Ok(MAX_NUMEL));
        let e = checked_numel(&[MAX_NUMEL, 2]).unwrap_err();
        assert_eq!(e.identifier.as_deref(), Some("Octave:out-of-memory"));
        assert_eq!(checked_numel(&[usize::MAX, usize::MAX]), Err(too_large()));
    }

    #[test]
    fn parse_error_position() {
        let e = ParseError::new("unexpected 'end'", 3, 7);
        assert_eq!(e.to_string(), "parse error near line 3, column 7: unexpected 'end'");
    }
}
