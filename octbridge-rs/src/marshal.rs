//! Value marshalling between the host and the interpreter.
//!
//! Both directions copy; nothing returned here aliases the input.  List
//! conversions are all-or-nothing: the first element that fails aborts the
//! whole list.

use crate::array::{Buffer, NdArray, Number};
use crate::error::BridgeError;
use crate::host::{HostDict, HostValue};
use crate::interp::is_identifier;
use crate::typetag::ElemType;
use crate::value::{CellArray, StructValue, Value};

// ── Host → interpreter ────────────────────────────────────────────────────────

/// Convert a host value into an interpreter value.
///
/// Fails with [`BridgeError::ObjectConvert`] for host values the interpreter
/// cannot represent.
pub fn to_interp(v: &HostValue) -> Result<Value, BridgeError> {
    Ok(match v {
        HostValue::Bool(b) => Value::logical(*b),
        HostValue::Int(n) => Value::double(*n as f64),
        HostValue::Float(x) => Value::double(*x),
        HostValue::Complex(c) => Value::Scalar(Number::ComplexDouble(*c)),
        HostValue::Number(n) => Value::Scalar(*n),
        HostValue::Text(s) => Value::str(s),
        HostValue::Array(a) => Value::numeric(a.clone()),
        HostValue::List(items) => list_to_interp(items)?,
        HostValue::Dict(d) => Value::Struct(dict_to_struct(d)?),
        HostValue::None | HostValue::Tuple(_) | HostValue::Opaque(_) => {
            return Err(unsupported_object(v));
        }
    })
}

/// Convert an argument list, in order.
pub fn to_interp_all(vs: &[HostValue]) -> Result<Vec<Value>, BridgeError> {
    vs.iter().map(to_interp).collect()
}

fn unsupported_object(v: &HostValue) -> BridgeError {
    BridgeError::ObjectConvert(format!(
        "{}: unsupported host object type, cannot convert to Octave value",
        v.type_name()
    ))
}

/// Element kind shared by every item of a list of plain scalars.
fn uniform_scalar_kind(items: &[HostValue]) -> Option<ElemType> {
    let kind_of = |v: &HostValue| match v {
        HostValue::Bool(_) => Some(ElemType::Logical),
        HostValue::Int(_) | HostValue::Float(_) => Some(ElemType::Double),
        HostValue::Complex(_) => Some(ElemType::ComplexDouble),
        HostValue::Number(n) => Some(n.elem_type()),
        _ => None,
    };
    let first = kind_of(items.first()?)?;
    items.iter().all(|v| kind_of(v) == Some(first)).then_some(first)
}

/// The elements of a list of plain scalars sharing one kind, packed into a
/// single buffer in list order.
pub(crate) fn uniform_scalars(items: &[HostValue]) -> Option<Buffer> {
    let kind = uniform_scalar_kind(items)?;
    let mut data = Buffer::zeros(kind, 0);
    for item in items {
        let one = match item {
            HostValue::Bool(b) => Buffer::Logical(vec![*b]),
            HostValue::Int(n) => Buffer::Double(vec![*n as f64]),
            HostValue::Float(x) => Buffer::Double(vec![*x]),
            HostValue::Complex(c) => Buffer::ComplexDouble(vec![*c]),
            HostValue::Number(n) => n.to_buffer(),
            _ => return None,
        };
        data.append(&one);
    }
    Some(data)
}

fn list_to_interp(items: &[HostValue]) -> Result<Value, BridgeError> {
    if let Some(data) = uniform_scalars(items) {
        return Ok(Value::numeric(NdArray::row(data)));
    }
    let elems = items.iter().map(to_interp).collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Cell(CellArray::row(elems)))
}

fn dict_to_struct(d: &HostDict) -> Result<StructValue, BridgeError> {
    let mut s = StructValue::new();
    for (k, v) in d.iter() {
        let HostValue::Text(key) = k else {
            return Err(BridgeError::ObjectConvert(format!(
                "cannot convert key of type '{}' to a structure field name; \
                 field names must be strings",
                k.type_name()
            )));
        };
        if !is_identifier(key) {
            return Err(BridgeError::ObjectConvert(format!(
                "cannot convert key '{key}' to a structure field name; \
                 field names must be valid Octave identifiers"
            )));
        }
        if let HostValue::Text(_) = v {
            return Err(BridgeError::ObjectConvert(format!(
                "cannot convert field '{key}' of type 'str'; struct field values \
                 must be numeric, logical, lists or mappings"
            )));
        }
        s.insert(key.clone(), to_interp(v)?);
    }
    Ok(s)
}

// ── Interpreter → host ────────────────────────────────────────────────────────

/// Convert an interpreter value into a host value.
///
/// Fails with [`BridgeError::ValueConvert`] for interpreter values the host
/// cannot represent.
pub fn to_host(v: &Value) -> Result<HostValue, BridgeError> {
    Ok(match v {
        Value::Scalar(n) => HostValue::Array(NdArray::scalar(*n)),
        Value::Matrix(a) => HostValue::Array(a.clone()),
        Value::Char(a) => match a.to_text() {
            // Only 0×0 among the empties reads as "", so 1×0 and 0×N keep their shape.
            Some(text) if a.ndims() == 2 && (!a.is_empty() || a.shape() == [0, 0]) => {
                HostValue::Text(text)
            }
            _ => HostValue::Array(a.clone()),
        },
        Value::Cell(c) => {
            if !c.is_empty() && !c.is_vector() {
                return Err(BridgeError::ValueConvert(format!(
                    "cannot convert {} cell array to a host list; only cell vectors are supported",
                    dims_str(c.shape())
                )));
            }
            HostValue::List(c.elems().iter().map(to_host).collect::<Result<_, _>>()?)
        }
        Value::Struct(s) => {
            let mut d = HostDict::new();
            for (name, field) in s.fields() {
                d.insert(name.as_str(), to_host(field)?);
            }
            HostValue::Dict(d)
        }
        Value::FunctionHandle(_) => {
            return Err(BridgeError::ValueConvert(format!(
                "cannot convert value of class '{}' to a host value",
                v.class_name()
            )));
        }
    })
}

/// Convert a result list, in order.
pub fn to_host_all(vs: &[Value]) -> Result<Vec<HostValue>, BridgeError> {
    vs.iter().map(to_host).collect()
}

fn dims_str(shape: &[usize]) -> String {
    shape.iter().map(usize::to_string).collect::<Vec<_>>().join("x")
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn obj_err(v: HostValue) {
        let err = to_interp(&v).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ObjectConvert, "{v}");
    }

    #[test]
    fn scalars() {
        assert_eq!(to_interp(&HostValue::Int(3)).unwrap(), Value::double(3.0));
        assert_eq!(to_interp(&HostValue::Bool(true)).unwrap(), Value::logical(true));
        assert_eq!(
            to_interp(&HostValue::Number(Number::Int64(-5))).unwrap(),
            Value::Scalar(Number::Int64(-5))
        );
        // Large host integers are not clamped.
        assert_eq!(
            to_interp(&HostValue::Int(i64::MAX)).unwrap(),
            Value::double(i64::MAX as f64)
        );
    }

    #[test]
    fn text() {
        assert_eq!(to_interp(&"abc".into()).unwrap(), Value::str("abc"));
        assert_eq!(to_interp(&"".into()).unwrap().shape(), vec![0, 0]);
        assert_eq!(to_host(&Value::str("")).unwrap(), HostValue::Text(String::new()));
        for shape in [[1, 0], [0, 3]] {
            let empty = NdArray::zeros(ElemType::Char, &shape);
            let back = to_host(&Value::Char(empty.clone())).unwrap();
            assert_eq!(back, HostValue::Array(empty));
            assert_eq!(to_interp(&back).unwrap().shape(), shape.to_vec());
        }
    }

    #[test]
    fn lists() {
        let v = to_interp(&HostValue::list([1i64, 2, 3])).unwrap();
        assert_eq!(v, Value::row(vec![1.0, 2.0, 3.0]));

        let mixed = HostValue::List(vec![1i64.into(), "x".into()]);
        let Value::Cell(c) = to_interp(&mixed).unwrap() else { panic!("expected cell") };
        assert_eq!(c.shape(), &[1, 2]);

        let Value::Cell(empty) = to_interp(&HostValue::List(vec![])).unwrap() else {
            panic!("expected cell")
        };
        assert_eq!(empty.shape(), &[1, 0]);
        assert_eq!(to_host(&Value::Cell(empty)).unwrap(), HostValue::List(vec![]));
    }

    #[test]
    fn unconvertible_objects() {
        obj_err(HostValue::None);
        obj_err(HostValue::Tuple(vec![HostValue::Int(1)]));
        obj_err(HostValue::Tuple(vec![]));
        obj_err(HostValue::Opaque("socket".into()));
        obj_err(HostValue::list([HostValue::Int(1), HostValue::None]));
    }

    #[test]
    fn dict_keys() {
        let bad_name: HostDict = [("this is not an Octave identifier", 1i64)].into_iter().collect();
        obj_err(HostValue::Dict(bad_name));
        let float_key: HostDict = [(1.22f64, 1i64)].into_iter().collect();
        obj_err(HostValue::Dict(float_key));
        let text_field: HostDict = [("asdf", "asdf")].into_iter().collect();
        obj_err(HostValue::Dict(text_field));

        let ok: HostDict = [("foo", 1i64), ("bar", 2i64)].into_iter().collect();
        let v = to_interp(&HostValue::Dict(ok)).unwrap();
        let back = to_host(&v).unwrap();
        let expected: HostDict = [
            ("foo", HostValue::Array(NdArray::scalar(Number::Double(1.0)))),
            ("bar", HostValue::Array(NdArray::scalar(Number::Double(2.0)))),
        ]
        .into_iter()
        .collect();
        assert_eq!(back, HostValue::Dict(expected));
    }

    #[test]
    fn arrays_keep_kind_and_shape() {
        let a = NdArray::from_rows(&[vec![1u16, 2], vec![3, 4], vec![5, 6]]).unwrap();
        let back = to_host(&to_interp(&HostValue::Array(a.clone())).unwrap()).unwrap();
        assert_eq!(back, HostValue::Array(a));

        let col = NdArray::new(&[0, 1], Vec::<f64>::new()).unwrap();
        let back = to_host(&to_interp(&HostValue::Array(col.clone())).unwrap()).unwrap();
        assert_eq!(back, HostValue::Array(col));
    }

    #[test]
    fn char_matrix_stays_array() {
        let v = Value::Char(NdArray::from_text_rows(&["ab", "cd"]));
        let HostValue::Array(a) = to_host(&v).unwrap() else { panic!("expected array") };
        assert_eq!(a.text_rows().unwrap(), vec!["ab", "cd"]);
    }

    #[test]
    fn unconvertible_values() {
        let h = Value::FunctionHandle(crate::value::FunctionHandle { name: "sin".into() });
        assert_eq!(to_host(&h).unwrap_err().kind(), ErrorKind::ValueConvert);
        let grid = Value::Cell(CellArray::filled(&[2, 2]));
        assert_eq!(to_host(&grid).unwrap_err().kind(), ErrorKind::ValueConvert);
        // A bad element anywhere fails the whole list.
        let nested = Value::Cell(CellArray::row(vec![Value::double(1.0), h]));
        assert_eq!(to_host(&nested).unwrap_err().kind(), ErrorKind::ValueConvert);
    }
}
