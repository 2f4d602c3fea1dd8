//! Builtin function library.
//!
//! Builtins are grouped by concern.  Every group lists the names it serves
//! in `NAMES` and dispatches them in its `call`, which receives the already
//! evaluated arguments and the number of requested outputs.  A group
//! returns `Ok(None)` for a name it does not implement.

mod containers;
mod math;
mod strings;
mod system;
mod types;

use super::error::{Result, RuntimeError};
use super::ops::type_desc;
use super::Octave;
use crate::array::{Buffer, NdArray};
use crate::typetag::ElemType;
use crate::value::{CellArray, Value};

/// Result of a group dispatcher.
type Outcome = Result<Option<Vec<Value>>>;

type GroupFn = fn(&mut Octave, &str, Vec<Value>, usize) -> Outcome;

const GROUPS: &[(&[&str], GroupFn)] = &[
    (types::NAMES, types::call),
    (math::NAMES, math::call),
    (containers::NAMES, containers::call),
    (strings::NAMES, strings::call),
    (system::NAMES, system::call),
];

pub(crate) fn is_builtin(name: &str) -> bool {
    GROUPS.iter().any(|(names, _)| names.contains(&name))
}

/// Call builtin `name`; `None` if there is no such builtin.
pub(crate) fn call(oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Option<Result<Vec<Value>>> {
    let (_, group) = GROUPS.iter().find(|(names, _)| names.contains(&name))?;
    tracing::trace!(builtin = name, nargs = args.len(), nargout, "builtin call");
    group(oct, name, args, nargout).transpose()
}

// ── Argument helpers ──────────────────────────────────────────────────────────

/// `Invalid call to NAME`
pub(super) fn usage(name: &str) -> RuntimeError {
    RuntimeError::with_id("Octave:invalid-fun-call", format!("Invalid call to {name}"))
}

pub(super) fn check_nargs(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(usage(name));
    }
    Ok(())
}

pub(super) fn one(v: Value) -> Outcome {
    Ok(Some(vec![v]))
}

/// Description of a value in "wrong type argument" messages.
pub(super) fn arg_desc(v: &Value) -> String {
    match v {
        Value::Cell(_) => "cell array".into(),
        Value::Struct(_) => "struct".into(),
        other => type_desc(other),
    }
}

pub(super) fn wrong_type(name: &str, v: &Value) -> RuntimeError {
    RuntimeError::new(format!("{name}: wrong type argument '{}'", arg_desc(v)))
}

/// Numeric, logical or char data of `v`.
pub(super) fn array_of(v: &Value, name: &str) -> Result<NdArray> {
    v.to_array().ok_or_else(|| wrong_type(name, v))
}

/// Text of a char row vector.
pub(super) fn text_of(v: &Value, name: &str) -> Result<String> {
    v.as_text()
        .ok_or_else(|| RuntimeError::new(format!("{name}: argument must be a string")))
}

/// A real scalar.
pub(super) fn scalar_of(v: &Value, name: &str) -> Result<f64> {
    match v.scalar_f64() {
        Some(x) if !v.elem_type().is_some_and(ElemType::is_complex) => Ok(x),
        _ => Err(RuntimeError::new(format!("{name}: argument must be a real scalar"))),
    }
}

/// A non-negative integer count; negative values clamp to zero.
pub(super) fn count_of(v: &Value, name: &str) -> Result<usize> {
    let x = scalar_of(v, name)?;
    if x.is_nan() || x.fract() != 0.0 {
        return Err(RuntimeError::new(format!(
            "{name}: conversion of {x} to int value failed"
        )));
    }
    Ok(x.max(0.0) as usize)
}

/// A 1-based dimension argument, returned 0-based.
pub(super) fn dim_of(v: &Value, name: &str) -> Result<usize> {
    match v.scalar_f64() {
        Some(x) if x >= 1.0 && x.fract() == 0.0 => Ok(x as usize - 1),
        _ => Err(RuntimeError::new(format!("{name}: DIM must be a valid dimension"))),
    }
}

/// Elements of a cell array of strings.
pub(super) fn cellstr_of(v: &Value) -> Option<Vec<String>> {
    match v {
        Value::Cell(c) => c.elems().iter().map(Value::as_text).collect(),
        _ => None,
    }
}

/// A cell array of strings with `shape`.
pub(super) fn cellstr_value(shape: Vec<usize>, items: Vec<String>) -> Value {
    Value::Cell(CellArray::from_parts(shape, items.iter().map(|s| Value::str(s)).collect()))
}

pub(super) fn logical_array(shape: Vec<usize>, bits: Vec<bool>) -> Value {
    Value::numeric(NdArray::from_parts(shape, Buffer::Logical(bits)))
}

pub(super) fn double_array(shape: Vec<usize>, xs: Vec<f64>) -> Value {
    Value::numeric(NdArray::from_parts(shape, Buffer::Double(xs)))
}

/// First dimension of `shape` that is not 1 (0-based), or 0.
pub(super) fn first_nonsingleton(shape: &[usize]) -> usize {
    shape.iter().position(|&d| d != 1).unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::parse;

    #[test]
    fn every_listed_name_dispatches() {
        for (names, group) in GROUPS {
            for name in names.iter() {
                let mut oct = Octave::new();
                let outcome = group(&mut oct, name, vec![Value::empty(), Value::empty(), Value::empty(), Value::empty()], 1);
                assert!(!matches!(outcome, Ok(None)), "{name} is listed but not dispatched");
            }
        }
    }

    #[test]
    fn names_are_unique() {
        let mut all: Vec<&str> = GROUPS.iter().flat_map(|(names, _)| names.iter().copied()).collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn unknown_names_fall_through() {
        let mut oct = Octave::new();
        assert!(call(&mut oct, "no_such_builtin", Vec::new(), 1).is_none());
        assert!(!is_builtin("no_such_builtin"));
        assert!(is_builtin("zeros"));
    }

    #[test]
    fn invalid_call_message() {
        let mut oct = Octave::new();
        let program = parse("numel()").unwrap();
        let e = oct.run_program(&program, 1).unwrap_err();
        assert_eq!(e.message, "Invalid call to numel");
        assert_eq!(e.identifier.as_deref(), Some("Octave:invalid-fun-call"));
    }
}
