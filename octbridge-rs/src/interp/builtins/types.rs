//! Class queries, size queries, conversions and constructors.

use super::{
    array_of, check_nargs, count_of, dim_of, logical_array, one, text_of, usage,
    wrong_type, Outcome,
};
use crate::array::{Buffer, Complex64, NdArray, Number};
use crate::interp::error::{checked_numel, rt_err, Result};
use crate::interp::Octave;
use crate::typetag::ElemType;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &[
    "class", "isa", "isnumeric", "ischar", "iscell", "isstruct", "islogical", "isbool", "isreal",
    "iscomplex", "isfloat", "isinteger", "is_function_handle", "iscellstr", "isscalar", "isvector",
    "ismatrix", "isrow", "iscolumn", "issquare", "isempty", "size", "numel", "ndims", "length",
    "rows", "columns", "isequal", "double", "single", "int8", "int16", "int32", "int64", "uint8",
    "uint16", "uint32", "uint64", "logical", "char", "zeros", "ones", "eye", "true", "false", "pi",
    "e", "Inf", "inf", "NaN", "nan", "i", "j", "I", "J", "eps", "realmax", "realmin", "intmax",
    "intmin", "flintmax",
];

pub(super) fn call(_oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Outcome {
    if let Some(test) = predicate(name) {
        check_nargs(name, &args, 1, 1)?;
        return one(Value::logical(test(&args[0])));
    }
    match name {
        "class" => {
            check_nargs(name, &args, 1, 1)?;
            one(Value::str(args[0].class_name()))
        }
        "isa" => {
            check_nargs(name, &args, 2, 2)?;
            let cls = text_of(&args[1], name)?;
            one(Value::logical(is_a(&args[0], &cls)))
        }
        "size" => size(&args, nargout).map(Some),
        "numel" => {
            check_nargs(name, &args, 1, 1)?;
            one(Value::double(args[0].numel() as f64))
        }
        "ndims" => {
            check_nargs(name, &args, 1, 1)?;
            one(Value::double(args[0].shape().len() as f64))
        }
        "length" => {
            check_nargs(name, &args, 1, 1)?;
            let shape = args[0].shape();
            let n = if args[0].is_empty() { 0 } else { shape.iter().copied().max().unwrap_or(0) };
            one(Value::double(n as f64))
        }
        "rows" | "columns" => {
            check_nargs(name, &args, 1, 1)?;
            let shape = args[0].shape();
            let d = if name == "rows" { shape[0] } else { shape[1..].iter().product() };
            one(Value::double(d as f64))
        }
        "isequal" => {
            if args.len() < 2 {
                return Err(usage(name));
            }
            one(Value::logical(args.windows(2).all(|w| values_equal(&w[0], &w[1]))))
        }
        "double" | "single" | "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32"
        | "uint64" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            let mut target = ElemType::from_class_name(name).unwrap_or(ElemType::Double);
            if a.elem_type().is_complex() && target.is_float() {
                target = target.to_complex();
            }
            one(Value::numeric(a.cast(target)))
        }
        "logical" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            if (0..a.numel()).any(|i| a.data().get_f64(i).is_nan()) {
                return Err(rt_err!("logical: NaN can't be converted to logical value"));
            }
            one(Value::numeric(a.cast(ElemType::Logical)))
        }
        "char" => char_of(&args).map(|v| Some(vec![v])),
        "zeros" | "ones" => {
            let (shape, class) = shape_args(name, &args)?;
            let elem = class_elem(name, class.as_deref(), ElemType::Double)?;
            let fill = if name == "ones" { 1.0 } else { 0.0 };
            one(filled(elem, &shape, fill))
        }
        "eye" => {
            let (shape, class) = shape_args(name, &args)?;
            let elem = class_elem(name, class.as_deref(), ElemType::Double)?;
            if shape.len() > 2 {
                return Err(rt_err!("eye: dimensions must be a scalar or 2-element vector"));
            }
            let (r, c) = (shape[0], shape[1]);
            let xs = (0..r * c).map(|k| if k % r.max(1) == k / r.max(1) { 1.0 } else { 0.0 }).collect();
            one(Value::numeric(NdArray::from_parts(shape, Buffer::from_f64s(elem, xs))))
        }
        "true" | "false" => {
            let (shape, _) = shape_args(name, &args)?;
            let n = shape.iter().product();
            one(logical_array(shape, vec![name == "true"; n]))
        }
        "pi" | "e" | "Inf" | "inf" | "NaN" | "nan" => {
            let x = match name {
                "pi" => std::f64::consts::PI,
                "e" => std::f64::consts::E,
                "Inf" | "inf" => f64::INFINITY,
                _ => f64::NAN,
            };
            let (shape, class) = shape_args(name, &args)?;
            let elem = float_class(name, class.as_deref())?;
            one(filled(elem, &shape, x))
        }
        "i" | "j" | "I" | "J" => {
            check_nargs(name, &args, 0, 0)?;
            one(Value::Scalar(Number::ComplexDouble(Complex64::new(0.0, 1.0))))
        }
        "eps" => eps(&args).map(|v| Some(vec![v])),
        "realmax" | "realmin" | "flintmax" => {
            check_nargs(name, &args, 0, 1)?;
            let class = args.first().map(|a| text_of(a, name)).transpose()?;
            let single = float_class(name, class.as_deref())? == ElemType::Single;
            let v = match (name, single) {
                ("realmax", false) => Value::double(f64::MAX),
                ("realmax", true) => Value::Scalar(Number::Single(f32::MAX)),
                ("realmin", false) => Value::double(f64::MIN_POSITIVE),
                ("realmin", true) => Value::Scalar(Number::Single(f32::MIN_POSITIVE)),
                (_, false) => Value::double(9_007_199_254_740_992.0),
                (_, true) => Value::Scalar(Number::Single(16_777_216.0)),
            };
            one(v)
        }
        "intmax" | "intmin" => {
            check_nargs(name, &args, 0, 1)?;
            let elem = match args.first() {
                None => ElemType::Int32,
                Some(Value::Char(_)) => {
                    let cls = text_of(&args[0], name)?;
                    ElemType::from_class_name(&cls)
                        .filter(|t| t.is_integer())
                        .ok_or_else(|| rt_err!("{name}: invalid class name '{cls}'"))?
                }
                Some(v) => v
                    .elem_type()
                    .filter(|t| t.is_integer())
                    .ok_or_else(|| rt_err!("{name}: argument must be an integer class name or value"))?,
            };
            let (lo, hi) = elem.int_range().unwrap_or((0, 0));
            let bound = if name == "intmax" { hi } else { lo };
            one(Value::numeric(NdArray::from_parts(
                vec![1, 1],
                Buffer::from_i128s(elem, std::iter::once(bound)),
            )))
        }
        _ => Ok(None),
    }
}

// ── Predicates ────────────────────────────────────────────────────────────────

fn elem_is(v: &Value, test: fn(ElemType) -> bool) -> bool {
    matches!(v, Value::Scalar(_) | Value::Matrix(_)) && v.elem_type().is_some_and(test)
}

fn is_two_d(v: &Value) -> bool {
    v.shape().len() == 2
}

fn predicate(name: &str) -> Option<fn(&Value) -> bool> {
    let test: fn(&Value) -> bool = match name {
        "isnumeric" => |v| elem_is(v, ElemType::is_numeric),
        "ischar" => Value::is_char,
        "iscell" => Value::is_cell,
        "isstruct" => Value::is_struct,
        "islogical" | "isbool" => |v| elem_is(v, |t| t == ElemType::Logical),
        "isreal" => |v| v.elem_type().is_some_and(|t| !t.is_complex()),
        "iscomplex" => |v| v.elem_type().is_some_and(ElemType::is_complex),
        "isfloat" => |v| elem_is(v, ElemType::is_float),
        "isinteger" => |v| elem_is(v, ElemType::is_integer),
        "is_function_handle" => |v| matches!(v, Value::FunctionHandle(_)),
        "iscellstr" => |v| super::cellstr_of(v).is_some(),
        "isscalar" => |v| v.numel() == 1,
        "isvector" => |v| {
            let s = v.shape();
            is_two_d(v) && (s[0] == 1 || s[1] == 1) && v.numel() >= 1
        },
        "ismatrix" => is_two_d,
        "isrow" => |v| is_two_d(v) && v.shape()[0] == 1,
        "iscolumn" => |v| is_two_d(v) && v.shape()[1] == 1,
        "issquare" => |v| is_two_d(v) && v.shape()[0] == v.shape()[1],
        "isempty" => Value::is_empty,
        _ => return None,
    };
    Some(test)
}

fn is_a(v: &Value, cls: &str) -> bool {
    match cls {
        "numeric" => elem_is(v, ElemType::is_numeric),
        "float" => elem_is(v, ElemType::is_float),
        "integer" => elem_is(v, ElemType::is_integer),
        other => v.class_name() == other,
    }
}

/// Deep equality ignoring numeric class; `NaN` never equals itself.
pub(super) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Cell(x), Value::Cell(y)) => {
            x.shape() == y.shape() && x.elems().iter().zip(y.elems()).all(|(p, q)| values_equal(p, q))
        }
        (Value::Struct(x), Value::Struct(y)) => {
            x.len() == y.len()
                && x.fields().iter().all(|(k, v)| y.get(k).is_some_and(|w| values_equal(v, w)))
        }
        (Value::FunctionHandle(x), Value::FunctionHandle(y)) => x == y,
        _ => match (a.to_array(), b.to_array()) {
            (Some(x), Some(y)) => {
                x.shape() == y.shape()
                    && (0..x.numel()).all(|i| x.data().get_c64(i) == y.data().get_c64(i))
            }
            _ => false,
        },
    }
}

// ── Sizes ─────────────────────────────────────────────────────────────────────

fn size(args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    check_nargs("size", args, 1, 2)?;
    let shape = args[0].shape();
    if let Some(d) = args.get(1) {
        let d = dim_of(d, "size")?;
        return Ok(vec![Value::double(shape.get(d).copied().unwrap_or(1) as f64)]);
    }
    if nargout <= 1 {
        return Ok(vec![Value::row(shape.iter().map(|&d| d as f64).collect())]);
    }
    let mut out: Vec<Value> = (0..nargout - 1)
        .map(|d| Value::double(shape.get(d).copied().unwrap_or(1) as f64))
        .collect();
    let rest: usize = shape.iter().skip(nargout - 1).product();
    out.push(Value::double(rest as f64));
    Ok(out)
}

/// Dimensions and optional trailing class name of `zeros(...)`-style calls.
pub(super) fn shape_args(name: &str, args: &[Value]) -> Result<(Vec<usize>, Option<String>)> {
    let (dims, class) = match args.split_last() {
        Some((last @ Value::Char(_), rest)) => (rest, Some(text_of(last, name)?)),
        _ => (args, None),
    };
    let shape = match dims {
        [] => vec![1, 1],
        [v] => {
            let a = array_of(v, name)?;
            let xs = a.data().to_f64_vec();
            match xs.as_slice() {
                [n] => vec![clamp_dim(*n, name)?; 2],
                [] => return Err(rt_err!("{name}: dimensions must not be empty")),
                many => many.iter().map(|&x| clamp_dim(x, name)).collect::<Result<_>>()?,
            }
        }
        many => many.iter().map(|v| count_of(v, name)).collect::<Result<_>>()?,
    };
    checked_numel(&shape)?;
    Ok((crate::array::normalize_shape(&shape), class))
}

fn clamp_dim(x: f64, name: &str) -> Result<usize> {
    if x.is_nan() {
        return Err(rt_err!("{name}: NaN is invalid as size specification"));
    }
    Ok(x.max(0.0) as usize)
}

fn class_elem(name: &str, class: Option<&str>, default: ElemType) -> Result<ElemType> {
    match class {
        None => Ok(default),
        Some(cls) => ElemType::from_class_name(cls)
            .filter(|t| *t != ElemType::Char)
            .ok_or_else(|| rt_err!("{name}: invalid class name '{cls}'")),
    }
}

fn float_class(name: &str, class: Option<&str>) -> Result<ElemType> {
    match class_elem(name, class, ElemType::Double)? {
        t @ (ElemType::Double | ElemType::Single) => Ok(t),
        _ => Err(rt_err!("{name}: CLASS must be \"double\" or \"single\"")),
    }
}

fn filled(elem: ElemType, shape: &[usize], x: f64) -> Value {
    let n = shape.iter().product();
    Value::numeric(NdArray::from_parts(shape.to_vec(), Buffer::from_f64s(elem, vec![x; n])))
}

fn eps(args: &[Value]) -> Result<Value> {
    check_nargs("eps", args, 0, 1)?;
    let spacing = |x: f64, bits: i32, tiny: f64| {
        let x = x.abs();
        if !x.is_finite() {
            f64::NAN
        } else if x < tiny {
            tiny * 2f64.powi(-bits)
        } else {
            2f64.powi(x.log2().floor() as i32 - bits)
        }
    };
    match args.first() {
        None => Ok(Value::double(f64::EPSILON)),
        Some(v @ Value::Char(_)) => match text_of(v, "eps")?.as_str() {
            "double" => Ok(Value::double(f64::EPSILON)),
            "single" => Ok(Value::Scalar(Number::Single(f32::EPSILON))),
            other => Err(rt_err!("eps: invalid class name '{other}'")),
        },
        Some(v) => {
            let a = array_of(v, "eps")?;
            let single = a.elem_type().is_single();
            let xs = a
                .data()
                .to_f64_vec()
                .into_iter()
                .map(|x| {
                    if single {
                        spacing(x, 23, f32::MIN_POSITIVE as f64)
                    } else {
                        spacing(x, 52, f64::MIN_POSITIVE)
                    }
                })
                .collect();
            let elem = if single { ElemType::Single } else { ElemType::Double };
            Ok(Value::numeric(NdArray::from_parts(a.shape().to_vec(), Buffer::from_f64s(elem, xs))))
        }
    }
}

/// `char(x)`, `char(a, b, ...)`, `char({...})`: rows padded to equal width.
fn char_of(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(usage("char"));
    }
    if let [v] = args {
        if let Some(a) = v.to_array() {
            return Ok(Value::Char(a.cast(ElemType::Char)));
        }
    }
    let mut rows: Vec<String> = Vec::new();
    for v in args {
        match v {
            Value::Cell(c) => {
                for e in c.elems() {
                    rows.extend(text_rows(e)?);
                }
            }
            other => rows.extend(text_rows(other)?),
        }
    }
    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let padded: Vec<String> = rows.iter().map(|r| format!("{r:<width$}")).collect();
    Ok(Value::Char(NdArray::from_text_rows(&padded)))
}

fn text_rows(v: &Value) -> Result<Vec<String>> {
    let a = v.to_array().ok_or_else(|| wrong_type("char", v))?;
    let a = a.cast(ElemType::Char);
    if a.is_empty() {
        return Ok(vec![String::new()]);
    }
    a.text_rows().ok_or_else(|| rt_err!("char: wrong type argument 'N-d array'"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::interp::{parse, Octave};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn eval(code: &str) -> Value {
        let mut oct = Octave::new();
        let program = parse(code).unwrap();
        oct.run_program(&program, 1).unwrap().remove(0)
    }

    #[test]
    fn class_queries() {
        assert_eq!(eval("class(int8(3))"), Value::str("int8"));
        assert_eq!(eval("class({})"), Value::str("cell"));
        assert_eq!(eval("isa(single(1), 'float')"), Value::logical(true));
        assert_eq!(eval("isnumeric(true)"), Value::logical(false));
        assert_eq!(eval("iscellstr({'a', 'b'})"), Value::logical(true));
        assert_eq!(eval("isreal(1 + 2i)"), Value::logical(false));
    }

    #[test]
    fn sizes() {
        assert_eq!(eval("size(zeros(2, 3))"), Value::row(vec![2.0, 3.0]));
        assert_eq!(eval("size(zeros(2, 3), 3)"), Value::double(1.0));
        assert_eq!(eval("length(zeros(2, 5))"), Value::double(5.0));
        assert_eq!(eval("length([])"), Value::double(0.0));
        assert_eq!(eval("numel({1, 2, 3})"), Value::double(3.0));
        assert_eq!(eval("[r, c] = size(ones(2, 3, 4)); c"), Value::double(12.0));
    }

    #[test]
    fn conversions_saturate() {
        assert_eq!(eval("int8(300)"), eval("int8(127)"));
        assert_eq!(eval("uint8(-5)"), eval("uint8(0)"));
        assert_eq!(eval("int32(2.5)"), eval("int32(3)"));
        assert_eq!(eval("double('A')"), Value::double(65.0));
        assert_eq!(eval("char([72 105])"), Value::str("Hi"));
    }

    #[test]
    fn constructors() {
        assert_eq!(eval("zeros(2)").shape(), vec![2, 2]);
        assert_eq!(eval("class(ones(1, 2, 'uint16'))"), Value::str("uint16"));
        assert_eq!(eval("eye(2)"), eval("[1 0; 0 1]"));
        assert_eq!(eval("intmax('int8')"), eval("int8(127)"));
        assert_eq!(eval("intmin"), eval("int32(-2147483648)"));
        assert_eq!(eval("eps"), Value::double(f64::EPSILON));
        assert_eq!(eval("size(true(2, 3))"), Value::row(vec![2.0, 3.0]));
        assert_eq!(eval("zeros(0, 3)").shape(), vec![0, 3]);
    }

    #[test]
    fn char_pads_rows() {
        let v = eval("char('a', 'bcd')");
        assert_eq!(v.shape(), vec![2, 3]);
        assert_eq!(eval("size(char({'ab', 'c', ''}))"), Value::row(vec![3.0, 2.0]));
    }

    #[test]
    fn isequal_ignores_class() {
        assert_eq!(eval("isequal(1, true, int8(1))"), Value::logical(true));
        assert_eq!(eval("isequal([1 2], [1 2 3])"), Value::logical(false));
        assert_eq!(eval("isequal(struct('a', 1), struct('a', 1))"), Value::logical(true));
        assert_eq!(eval("isequal(NaN, NaN)"), Value::logical(false));
    }
}
