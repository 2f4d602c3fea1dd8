//! Elementwise math, named operators, reductions and searching.

use std::cmp::Ordering;

use super::{array_of, check_nargs, dim_of, first_nonsingleton, logical_array, one, usage, wrong_type, Outcome};
use crate::array::{Buffer, Complex64, NdArray};
use crate::interp::ast::{BinOp, UnOp};
use crate::interp::error::{checked_numel, rt_err, Result, RuntimeError};
use crate::interp::ops::{self, c, cdiv, cexp, cln, cmul, dims_str, narrow};
use crate::interp::Octave;
use crate::typetag::ElemType;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &[
    "abs", "sign", "floor", "ceil", "round", "fix", "sqrt", "exp", "log", "log2", "log10", "sin",
    "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "real", "imag", "conj", "angle",
    "arg", "isnan", "isinf", "isfinite", "mod", "rem", "atan2", "hypot", "plus", "minus", "times",
    "rdivide", "ldivide", "mtimes", "mrdivide", "mldivide", "power", "mpower", "eq", "ne", "lt",
    "le", "gt", "ge", "and", "or", "xor", "not", "uminus", "uplus", "transpose", "ctranspose",
    "sum", "prod", "cumsum", "cumprod", "mean", "any", "all", "nnz", "max", "min", "find", "sort",
    "unique", "linspace", "colon",
];

pub(super) fn call(_oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Outcome {
    if let Some(f) = transcendental(name) {
        check_nargs(name, &args, 1, 1)?;
        return one(apply_transcendental(name, &args[0], f)?);
    }
    if let Some(op) = named_binary(name) {
        return named_operator(name, op, &args).map(|v| Some(vec![v]));
    }
    match name {
        "abs" | "sign" | "floor" | "ceil" | "round" | "fix" | "real" | "imag" | "conj" | "angle"
        | "arg" => {
            check_nargs(name, &args, 1, 1)?;
            one(elementwise(name, &args[0])?)
        }
        "isnan" | "isinf" | "isfinite" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            let test = |z: Complex64| match name {
                "isnan" => z.re.is_nan() || z.im.is_nan(),
                "isinf" => z.re.is_infinite() || z.im.is_infinite(),
                _ => z.re.is_finite() && z.im.is_finite(),
            };
            let bits = a.data().to_c64_vec().into_iter().map(test).collect();
            one(logical_array(a.shape().to_vec(), bits))
        }
        "mod" | "rem" | "atan2" | "hypot" => {
            check_nargs(name, &args, 2, 2)?;
            let f: fn(f64, f64) -> f64 = match name {
                "mod" => |x, y| if y == 0.0 { x } else { x - (x / y).floor() * y },
                "rem" => |x, y| if y == 0.0 { x } else { x - (x / y).trunc() * y },
                "atan2" => f64::atan2,
                _ => f64::hypot,
            };
            one(binary_map(name, &args[0], &args[1], f)?)
        }
        "xor" => {
            check_nargs(name, &args, 2, 2)?;
            let a = ops::unary(UnOp::Not, &args[0])?;
            let b = ops::unary(UnOp::Not, &args[1])?;
            one(ops::binary(BinOp::Ne, &a, &b)?)
        }
        "not" | "uminus" | "uplus" | "transpose" | "ctranspose" => {
            check_nargs(name, &args, 1, 1)?;
            let op = match name {
                "not" => UnOp::Not,
                "uminus" => UnOp::Neg,
                "uplus" => UnOp::Plus,
                "transpose" => UnOp::Transpose,
                _ => UnOp::CTranspose,
            };
            one(ops::unary(op, &args[0])?)
        }
        "sum" | "prod" | "cumsum" | "cumprod" | "mean" => {
            check_nargs(name, &args, 1, 2)?;
            let a = array_of(&args[0], name)?;
            let dim = args.get(1).map(|d| dim_of(d, name)).transpose()?;
            one(accumulate(name, &a, dim))
        }
        "any" | "all" => {
            check_nargs(name, &args, 1, 2)?;
            let a = array_of(&args[0], name)?;
            let dim = args.get(1).map(|d| dim_of(d, name)).transpose()?;
            let (shape, lanes) = reduction_lanes(&a, dim, true);
            let data = a.data();
            let bits = lanes
                .iter()
                .map(|lane| match name {
                    "any" => lane.iter().any(|&i| data.is_nonzero(i)),
                    _ => lane.iter().all(|&i| data.is_nonzero(i)),
                })
                .collect();
            one(logical_array(shape, bits))
        }
        "nnz" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            let n = (0..a.numel()).filter(|&i| a.data().is_nonzero(i)).count();
            one(Value::double(n as f64))
        }
        "max" | "min" => extremum(name, &args, nargout).map(Some),
        "find" => find(&args, nargout).map(Some),
        "sort" => sort(&args, nargout).map(Some),
        "unique" => {
            check_nargs(name, &args, 1, 1)?;
            one(unique(&args[0])?)
        }
        "linspace" => {
            check_nargs(name, &args, 2, 3)?;
            let lo = super::scalar_of(&args[0], name)?;
            let hi = super::scalar_of(&args[1], name)?;
            let n = match args.get(2) {
                Some(v) => super::scalar_of(v, name)?.floor().max(1.0) as usize,
                None => 100,
            };
            let n = checked_numel(&[1, n])?;
            let xs = (0..n)
                .map(|k| if n == 1 { hi } else { lo + (hi - lo) * k as f64 / (n - 1) as f64 })
                .collect();
            one(Value::row(xs))
        }
        "colon" => {
            check_nargs(name, &args, 2, 3)?;
            let v = match args.as_slice() {
                [a, b] => ops::range(a, None, b)?,
                [a, s, b] => ops::range(a, Some(s), b)?,
                _ => return Err(usage(name)),
            };
            one(v)
        }
        _ => Ok(None),
    }
}

// ── Elementwise ───────────────────────────────────────────────────────────────

/// Class of a real-valued result computed from an input of class `t`.
fn real_result(t: ElemType) -> ElemType {
    match t {
        t if t.is_integer() => t,
        ElemType::Single | ElemType::ComplexSingle => ElemType::Single,
        _ => ElemType::Double,
    }
}

fn map_real(a: &NdArray, elem: ElemType, f: impl Fn(f64) -> f64) -> Value {
    let xs = a.data().to_f64_vec().into_iter().map(f).collect();
    Value::numeric(NdArray::from_parts(a.shape().to_vec(), Buffer::from_f64s(elem, xs)))
}

fn map_complex(a: &NdArray, f: impl Fn(Complex64) -> Complex64) -> Value {
    let elem = if a.elem_type().is_single() { ElemType::ComplexSingle } else { ElemType::ComplexDouble };
    let zs = a.data().to_c64_vec().into_iter().map(f).collect();
    Value::numeric(NdArray::from_parts(a.shape().to_vec(), narrow(Buffer::from_c64s(elem, zs))))
}

fn elementwise(name: &str, v: &Value) -> Result<Value> {
    let a = array_of(v, name)?;
    let t = a.elem_type();
    let out = real_result(t);
    if t.is_complex() {
        let parts = |f: fn(f64) -> f64| move |z: Complex64| c(f(z.re), f(z.im));
        return Ok(match name {
            "abs" => {
                let xs = a.data().to_c64_vec().iter().map(|z| z.re.hypot(z.im)).collect();
                Value::numeric(NdArray::from_parts(a.shape().to_vec(), Buffer::from_f64s(out, xs)))
            }
            "sign" => map_complex(&a, |z| {
                let r = z.re.hypot(z.im);
                if r == 0.0 { z } else { c(z.re / r, z.im / r) }
            }),
            "floor" => map_complex(&a, parts(f64::floor)),
            "ceil" => map_complex(&a, parts(f64::ceil)),
            "round" => map_complex(&a, parts(f64::round)),
            "fix" => map_complex(&a, parts(f64::trunc)),
            "real" | "imag" | "angle" | "arg" => {
                let zs = a.data().to_c64_vec();
                let xs = zs
                    .iter()
                    .map(|z| match name {
                        "real" => z.re,
                        "imag" => z.im,
                        _ => z.im.atan2(z.re),
                    })
                    .collect();
                Value::numeric(NdArray::from_parts(a.shape().to_vec(), Buffer::from_f64s(out, xs)))
            }
            _ => map_complex(&a, |z| c(z.re, -z.im)),
        });
    }
    Ok(match name {
        "abs" => map_real(&a, out, f64::abs),
        "sign" => map_real(&a, out, |x| if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { x }),
        "floor" => map_real(&a, out, f64::floor),
        "ceil" => map_real(&a, out, f64::ceil),
        "round" => map_real(&a, out, f64::round),
        "fix" => map_real(&a, out, f64::trunc),
        "imag" => map_real(&a, out, |_| 0.0),
        "angle" | "arg" => map_real(&a, out, |x| if x < 0.0 { std::f64::consts::PI } else { 0.0 }),
        // real, conj
        _ => map_real(&a, out, |x| x),
    })
}

#[derive(Clone, Copy)]
struct Transcendental {
    real: fn(f64) -> f64,
    complex: fn(Complex64) -> Complex64,
    /// Real inputs outside this set take the complex path.
    domain: fn(f64) -> bool,
}

fn anywhere(_: f64) -> bool {
    true
}

fn non_negative(x: f64) -> bool {
    x >= 0.0 || x.is_nan()
}

fn unit_interval(x: f64) -> bool {
    x.abs() <= 1.0 || x.is_nan()
}

fn transcendental(name: &str) -> Option<Transcendental> {
    let (real, complex, domain): (fn(f64) -> f64, fn(Complex64) -> Complex64, fn(f64) -> bool) = match name {
        "sqrt" => (f64::sqrt, csqrt, non_negative),
        "exp" => (f64::exp, cexp, anywhere),
        "log" => (f64::ln, cln, non_negative),
        "log2" => (f64::log2, |z| {
            let l = cln(z);
            c(l.re / std::f64::consts::LN_2, l.im / std::f64::consts::LN_2)
        }, non_negative),
        "log10" => (f64::log10, |z| {
            let l = cln(z);
            c(l.re / std::f64::consts::LN_10, l.im / std::f64::consts::LN_10)
        }, non_negative),
        "sin" => (f64::sin, csin, anywhere),
        "cos" => (f64::cos, ccos, anywhere),
        "tan" => (f64::tan, |z| cdiv(csin(z), ccos(z)), anywhere),
        "asin" => (f64::asin, casin, unit_interval),
        "acos" => (f64::acos, cacos, unit_interval),
        "atan" => (f64::atan, catan, anywhere),
        "sinh" => (f64::sinh, csinh, anywhere),
        "cosh" => (f64::cosh, ccosh, anywhere),
        "tanh" => (f64::tanh, |z| cdiv(csinh(z), ccosh(z)), anywhere),
        _ => return None,
    };
    Some(Transcendental { real, complex, domain })
}

fn apply_transcendental(name: &str, v: &Value, f: Transcendental) -> Result<Value> {
    let a = array_of(v, name)?;
    let t = a.elem_type();
    if t.is_integer() {
        return Err(wrong_type(name, v));
    }
    let in_domain = !t.is_complex() && a.data().to_f64_vec().into_iter().all(f.domain);
    if in_domain {
        Ok(map_real(&a, real_result(t), f.real))
    } else {
        Ok(map_complex(&a, f.complex))
    }
}

fn csqrt(z: Complex64) -> Complex64 {
    let r = z.re.hypot(z.im);
    if r == 0.0 {
        return c(0.0, 0.0);
    }
    let re = ((r + z.re) / 2.0).sqrt();
    let im = ((r - z.re) / 2.0).sqrt();
    c(re, if z.im < 0.0 { -im } else { im })
}

fn csin(z: Complex64) -> Complex64 {
    c(z.re.sin() * z.im.cosh(), z.re.cos() * z.im.sinh())
}

fn ccos(z: Complex64) -> Complex64 {
    c(z.re.cos() * z.im.cosh(), -z.re.sin() * z.im.sinh())
}

fn csinh(z: Complex64) -> Complex64 {
    c(z.re.sinh() * z.im.cos(), z.re.cosh() * z.im.sin())
}

fn ccosh(z: Complex64) -> Complex64 {
    c(z.re.cosh() * z.im.cos(), z.re.sinh() * z.im.sin())
}

const I: Complex64 = Complex64::new(0.0, 1.0);

/// `1 - z^2`
fn one_minus_sq(z: Complex64) -> Complex64 {
    let sq = cmul(z, z);
    c(1.0 - sq.re, -sq.im)
}

fn casin(z: Complex64) -> Complex64 {
    // -i * ln(iz + sqrt(1 - z^2))
    let w = cmul(I, z);
    let s = csqrt(one_minus_sq(z));
    cmul(c(0.0, -1.0), cln(c(w.re + s.re, w.im + s.im)))
}

fn cacos(z: Complex64) -> Complex64 {
    // -i * ln(z + i sqrt(1 - z^2))
    let s = cmul(I, csqrt(one_minus_sq(z)));
    cmul(c(0.0, -1.0), cln(c(z.re + s.re, z.im + s.im)))
}

fn catan(z: Complex64) -> Complex64 {
    // i/2 * ln((i + z) / (i - z))
    let q = cdiv(c(z.re, 1.0 + z.im), c(-z.re, 1.0 - z.im));
    cmul(c(0.0, 0.5), cln(q))
}

// ── Binary ────────────────────────────────────────────────────────────────────

fn binary_class(name: &str, a: &Value, ta: ElemType, b: &Value, tb: ElemType) -> Result<ElemType> {
    match (ta.is_integer(), tb.is_integer()) {
        (true, true) if ta != tb => Err(rt_err!(
            "{name}: binary operator not implemented for '{}' by '{}' operations",
            super::arg_desc(a),
            super::arg_desc(b)
        )),
        (true, _) => Ok(ta),
        (_, true) => Ok(tb),
        _ if ta.is_single() || tb.is_single() => Ok(ElemType::Single),
        _ => Ok(ElemType::Double),
    }
}

/// Apply `f` elementwise to two real operands, expanding scalars.
fn binary_map(name: &str, a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    let x = array_of(a, name)?;
    let y = array_of(b, name)?;
    let elem = binary_class(name, a, x.elem_type(), b, y.elem_type())?;
    let (xs, ys) = (x.data().to_f64_vec(), y.data().to_f64_vec());
    let (shape, out): (Vec<usize>, Vec<f64>) = if x.shape() == y.shape() {
        (x.shape().to_vec(), xs.iter().zip(&ys).map(|(&p, &q)| f(p, q)).collect())
    } else if y.numel() == 1 {
        (x.shape().to_vec(), xs.iter().map(|&p| f(p, ys[0])).collect())
    } else if x.numel() == 1 {
        (y.shape().to_vec(), ys.iter().map(|&q| f(xs[0], q)).collect())
    } else {
        return Err(RuntimeError::with_id(
            "Octave:nonconformant-args",
            format!(
                "{name}: nonconformant arguments (op1 is {}, op2 is {})",
                dims_str(x.shape()),
                dims_str(y.shape())
            ),
        ));
    };
    Ok(Value::numeric(NdArray::from_parts(shape, Buffer::from_f64s(elem, out))))
}

fn named_binary(name: &str) -> Option<BinOp> {
    Some(match name {
        "plus" => BinOp::Add,
        "minus" => BinOp::Sub,
        "times" => BinOp::Mul,
        "rdivide" => BinOp::Div,
        "ldivide" => BinOp::LeftDiv,
        "mtimes" => BinOp::MatMul,
        "mrdivide" => BinOp::MatDiv,
        "mldivide" => BinOp::MatLeftDiv,
        "power" => BinOp::Pow,
        "mpower" => BinOp::MatPow,
        "eq" => BinOp::Eq,
        "ne" => BinOp::Ne,
        "lt" => BinOp::Lt,
        "le" => BinOp::Le,
        "gt" => BinOp::Gt,
        "ge" => BinOp::Ge,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        _ => return None,
    })
}

/// `plus(a, b, ...)` and friends; the associative ones take more than two
/// operands.
fn named_operator(name: &str, op: BinOp, args: &[Value]) -> Result<Value> {
    let variadic = matches!(op, BinOp::Add | BinOp::Mul | BinOp::MatMul | BinOp::And | BinOp::Or);
    if args.len() < 2 || (args.len() > 2 && !variadic) {
        return Err(usage(name));
    }
    let mut acc = ops::binary(op, &args[0], &args[1])?;
    for v in &args[2..] {
        acc = ops::binary(op, &acc, v)?;
    }
    Ok(acc)
}

// ── Reductions ────────────────────────────────────────────────────────────────

/// Output shape and, per output element, the input positions along `dim`.
///
/// With `dim` unset the first non-singleton dimension is used; with
/// `empty_is_column` a `0×0` input reduces like a `0×1` one, so that
/// `sum([])` is `0`.
fn reduction_lanes(a: &NdArray, dim: Option<usize>, empty_is_column: bool) -> (Vec<usize>, Vec<Vec<usize>>) {
    let mut shape = a.shape().to_vec();
    if dim.is_none() && empty_is_column && shape == [0, 0] {
        shape = vec![0, 1];
    }
    let dim = dim.unwrap_or_else(|| first_nonsingleton(&shape));
    if dim >= shape.len() {
        shape.resize(dim + 1, 1);
    }
    let stride: usize = shape[..dim].iter().product();
    let n = shape[dim];
    let outer: usize = shape[dim + 1..].iter().product();
    let mut lanes = Vec::with_capacity(stride * outer);
    for o in 0..outer {
        for s in 0..stride {
            lanes.push((0..n).map(|k| o * stride * n + k * stride + s).collect());
        }
    }
    let mut out = shape;
    out[dim] = 1;
    (crate::array::normalize_shape(&out), lanes)
}

/// Class of `sum`/`prod`/`cumsum`/`cumprod` results.
fn accumulate_class(t: ElemType) -> ElemType {
    match t {
        ElemType::Logical | ElemType::Char => ElemType::Double,
        t => t,
    }
}

fn accumulate(name: &str, a: &NdArray, dim: Option<usize>) -> Value {
    let cumulative = name.starts_with("cum");
    let (out_shape, lanes) = reduction_lanes(a, dim, !cumulative);
    let shape = if cumulative { a.shape().to_vec() } else { out_shape };
    let product = name.ends_with("prod");
    let t = accumulate_class(a.elem_type());
    let zs = a.data().to_c64_vec();
    let fold = |acc: Complex64, z: Complex64| {
        if product {
            cmul(acc, z)
        } else {
            c(acc.re + z.re, acc.im + z.im)
        }
    };
    let start = if product { c(1.0, 0.0) } else { c(0.0, 0.0) };
    let mut out = vec![start; if cumulative { a.numel() } else { lanes.len() }];
    for (k, lane) in lanes.iter().enumerate() {
        let mut acc = start;
        for &i in lane {
            acc = fold(acc, zs[i]);
            if cumulative {
                out[i] = acc;
            }
        }
        if !cumulative {
            out[k] = if name == "mean" {
                let n = lane.len() as f64;
                c(acc.re / n, acc.im / n)
            } else {
                acc
            };
        }
    }
    let t = if name == "mean" && t.is_integer() { ElemType::Double } else { t };
    let buf = if t.is_complex() {
        narrow(Buffer::from_c64s(t, out))
    } else {
        Buffer::from_f64s(t, out.into_iter().map(|z| z.re).collect())
    };
    Value::numeric(NdArray::from_parts(shape, buf))
}

/// Ordering key for `max`/`min`/`sort`: magnitude for complex data.
fn sort_key(data: &Buffer, i: usize) -> f64 {
    if data.elem_type().is_complex() {
        let z = data.get_c64(i);
        z.re.hypot(z.im)
    } else {
        data.get_f64(i)
    }
}

fn extremum(name: &str, args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    let is_max = name == "max";
    let better = |x: f64, best: f64| if is_max { x > best } else { x < best };
    match args {
        [v] | [v, _, _] => {
            if let [_, mid, _] = args {
                if !crate::interp::index::is_null(mid) {
                    return Err(rt_err!("{name}: second argument is ignored"));
                }
            }
            let a = array_of(v, name)?;
            let dim = match args.get(2) {
                Some(d) => Some(dim_of(d, name)?),
                None => None,
            };
            let (mut shape, lanes) = reduction_lanes(&a, dim, false);
            let data = a.data();
            let mut picks = Vec::with_capacity(lanes.len());
            let mut positions = Vec::with_capacity(lanes.len());
            let mut empty = a.is_empty();
            for lane in &lanes {
                let Some(&first) = lane.first() else {
                    empty = true;
                    break;
                };
                let (mut best_i, mut best_k) = (first, 0);
                for (k, &i) in lane.iter().enumerate() {
                    let x = sort_key(data, i);
                    let best = sort_key(data, best_i);
                    if (best.is_nan() && !x.is_nan()) || better(x, best) {
                        best_i = i;
                        best_k = k;
                    }
                }
                picks.push(best_i);
                positions.push((best_k + 1) as f64);
            }
            if empty {
                let d = dim.unwrap_or_else(|| first_nonsingleton(a.shape()));
                shape = a.shape().to_vec();
                if d < shape.len() {
                    shape[d] = 0;
                }
                picks.clear();
                positions.clear();
            }
            let t = accumulate_class(a.elem_type());
            let vals = NdArray::from_parts(shape.clone(), data.gather(&picks).cast(t));
            let mut out = vec![Value::numeric(vals)];
            if nargout > 1 {
                out.push(super::double_array(shape, positions));
            }
            Ok(out)
        }
        [a, b] => {
            let pick = move |x: f64, y: f64| {
                if x.is_nan() {
                    y
                } else if y.is_nan() || !better(y, x) {
                    x
                } else {
                    y
                }
            };
            Ok(vec![binary_map(name, a, b, pick)?])
        }
        _ => Err(usage(name)),
    }
}

// ── Searching and ordering ────────────────────────────────────────────────────

fn find(args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    check_nargs("find", args, 1, 2)?;
    let a = array_of(&args[0], "find")?;
    let limit = match args.get(1) {
        Some(n) => super::count_of(n, "find")?,
        None => usize::MAX,
    };
    let data = a.data();
    let hits: Vec<usize> = (0..a.numel()).filter(|&i| data.is_nonzero(i)).take(limit).collect();
    let k = hits.len();
    let shape = if a.shape() == [0, 0] {
        vec![0, 0]
    } else if a.ndims() == 2 && a.rows() == 1 && a.cols() != 1 {
        vec![1, k]
    } else {
        vec![k, 1]
    };
    let column = |xs: Vec<f64>| super::double_array(shape.clone(), xs);
    if nargout <= 1 {
        return Ok(vec![column(hits.iter().map(|&i| (i + 1) as f64).collect())]);
    }
    let rows = a.rows().max(1);
    let mut out = vec![
        column(hits.iter().map(|&i| (i % rows + 1) as f64).collect()),
        column(hits.iter().map(|&i| (i / rows + 1) as f64).collect()),
    ];
    if nargout > 2 {
        let vals = NdArray::from_parts(shape.clone(), data.gather(&hits));
        out.push(Value::numeric(vals));
    }
    Ok(out)
}

/// Total order on reals with NaN after everything else.
fn nan_last(p: f64, q: f64) -> Ordering {
    match (p.is_nan(), q.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => p.partial_cmp(&q).unwrap_or(Ordering::Equal),
    }
}

fn sort(args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    check_nargs("sort", args, 1, 3)?;
    let mut dim = None;
    let mut descend = false;
    for v in &args[1..] {
        match v.as_text().map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("ascend") => descend = false,
            Some("descend") => descend = true,
            Some(other) => return Err(rt_err!("sort: MODE must be either \"ascend\" or \"descend\", not \"{other}\"")),
            None => dim = Some(dim_of(v, "sort")?),
        }
    }
    if let Some(items) = super::cellstr_of(&args[0]) {
        let mut order: Vec<usize> = (0..items.len()).collect();
        order.sort_by(|&x, &y| items[x].cmp(&items[y]));
        if descend {
            order.reverse();
        }
        let shape = args[0].shape();
        let sorted = order.iter().map(|&i| items[i].clone()).collect();
        let mut out = vec![super::cellstr_value(shape.clone(), sorted)];
        if nargout > 1 {
            out.push(super::double_array(shape, order.iter().map(|&i| (i + 1) as f64).collect()));
        }
        return Ok(out);
    }
    let a = array_of(&args[0], "sort")?;
    let (_, lanes) = reduction_lanes(&a, dim, false);
    let data = a.data();
    let mut perm = vec![0usize; a.numel()];
    let mut ranks = vec![0f64; a.numel()];
    for lane in &lanes {
        let mut order: Vec<usize> = (0..lane.len()).collect();
        order.sort_by(|&x, &y| {
            let cmp = nan_last(sort_key(data, lane[x]), sort_key(data, lane[y]));
            if descend {
                cmp.reverse()
            } else {
                cmp
            }
        });
        for (k, &o) in order.iter().enumerate() {
            perm[lane[k]] = lane[o];
            ranks[lane[k]] = (o + 1) as f64;
        }
    }
    let mut out = vec![Value::numeric(NdArray::from_parts(a.shape().to_vec(), data.gather(&perm)))];
    if nargout > 1 {
        out.push(super::double_array(a.shape().to_vec(), ranks));
    }
    Ok(out)
}

fn unique(v: &Value) -> Result<Value> {
    let row = v.shape().len() == 2 && v.shape()[0] == 1;
    if let Some(mut items) = super::cellstr_of(v) {
        items.sort();
        items.dedup();
        let n = items.len();
        let shape = if row { vec![1, n] } else { vec![n, 1] };
        return Ok(super::cellstr_value(shape, items));
    }
    if let Value::Cell(_) = v {
        return Err(rt_err!("unique: X must be an array or cell array of strings"));
    }
    let a = array_of(v, "unique")?;
    let data = a.data();
    let mut order: Vec<usize> = (0..a.numel()).collect();
    order.sort_by(|&x, &y| nan_last(sort_key(data, x), sort_key(data, y)));
    order.dedup_by(|x, y| data.get_c64(*x) == data.get_c64(*y));
    let n = order.len();
    let shape = if a.is_empty() && !row {
        a.shape().to_vec()
    } else if row {
        vec![1, n]
    } else {
        vec![n, 1]
    };
    Ok(Value::numeric(NdArray::from_parts(shape, data.gather(&order))))
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

    fn fails(code: &str) -> String {
        let mut oct = Octave::new();
        let program = parse(code).unwrap();
        oct.run_program(&program, 1).unwrap_err().message
    }

    #[test]
    fn rounding_keeps_integer_class() {
        assert_eq!(eval("floor(-2.5)"), Value::double(-3.0));
        assert_eq!(eval("round(2.5)"), Value::double(3.0));
        assert_eq!(eval("fix(-2.7)"), Value::double(-2.0));
        assert_eq!(eval("class(abs(int8(-5)))"), Value::str("int8"));
        assert_eq!(eval("abs(int8(-128))"), eval("int8(127)"));
    }

    #[test]
    fn domain_errors_go_complex() {
        assert_eq!(eval("sqrt(4)"), Value::double(2.0));
        assert_eq!(eval("sqrt(-4)"), eval("2i"));
        assert_eq!(eval("isreal(log(-1))"), Value::logical(false));
        assert_eq!(eval("abs(3 + 4i)"), Value::double(5.0));
        assert!(fails("sin(int8(1))").contains("wrong type argument"));
    }

    #[test]
    fn mod_and_rem() {
        assert_eq!(eval("mod(-7, 3)"), Value::double(2.0));
        assert_eq!(eval("rem(-7, 3)"), Value::double(-1.0));
        assert_eq!(eval("mod(5, 0)"), Value::double(5.0));
        assert_eq!(eval("mod([5 6 7], 3)"), Value::row(vec![2.0, 0.0, 1.0]));
        assert!(fails("mod([1 2], [1 2 3])").contains("nonconformant"));
    }

    #[test]
    fn named_operators() {
        assert_eq!(eval("plus(1, 2, 3)"), Value::double(6.0));
        assert_eq!(eval("mtimes([1 2], [3; 4])"), Value::double(11.0));
        assert_eq!(eval("xor(true, false)"), Value::logical(true));
        assert!(fails("minus(1, 2, 3)").contains("Invalid call to minus"));
    }

    #[test]
    fn reductions() {
        assert_eq!(eval("sum([1 2; 3 4])"), Value::row(vec![4.0, 6.0]));
        assert_eq!(eval("sum([1 2; 3 4], 2)"), eval("[3; 7]"));
        assert_eq!(eval("sum([])"), Value::double(0.0));
        assert_eq!(eval("prod([1 2 3 4])"), Value::double(24.0));
        assert_eq!(eval("cumsum([1 2 3])"), Value::row(vec![1.0, 3.0, 6.0]));
        assert_eq!(eval("mean([1 2 3 4])"), Value::double(2.5));
        assert_eq!(eval("class(sum(int8([100 100])))"), Value::str("int8"));
        assert_eq!(eval("sum(int8([100 100]))"), eval("int8(127)"));
        assert_eq!(eval("any([0 0 1])"), Value::logical(true));
        assert_eq!(eval("all([])"), Value::logical(true));
    }

    #[test]
    fn max_and_min() {
        assert_eq!(eval("max([3 9 2])"), Value::double(9.0));
        assert_eq!(eval("[m, i] = min([3 1 2]); i"), Value::double(2.0));
        assert_eq!(eval("max([1 NaN 3])"), Value::double(3.0));
        assert_eq!(eval("max([1 5], [4 2])"), Value::row(vec![4.0, 5.0]));
        assert_eq!(eval("max([1 2; 3 0])"), Value::row(vec![3.0, 2.0]));
        assert_eq!(eval("max([])"), Value::empty());
    }

    #[test]
    fn find_and_sort() {
        assert_eq!(eval("find([0 1 0 1])"), Value::row(vec![2.0, 4.0]));
        assert_eq!(eval("find([0; 1; 1], 1)"), Value::double(2.0));
        assert_eq!(eval("size(find([0 0]))"), Value::row(vec![1.0, 0.0]));
        assert_eq!(eval("sort([3 1 2])"), Value::row(vec![1.0, 2.0, 3.0]));
        assert_eq!(eval("sort([3 1 2], 'descend')"), Value::row(vec![3.0, 2.0, 1.0]));
        assert_eq!(eval("[s, k] = sort([3 1 2]); k"), Value::row(vec![2.0, 3.0, 1.0]));
        assert_eq!(eval("unique([3 1 3 2])"), Value::row(vec![1.0, 2.0, 3.0]));
        assert_eq!(eval("numel(unique({'b', 'a', 'b'}))"), Value::double(2.0));
    }

    #[test]
    fn ranges() {
        assert_eq!(eval("linspace(0, 1, 3)"), Value::row(vec![0.0, 0.5, 1.0]));
        assert_eq!(eval("colon(1, 3)"), Value::row(vec![1.0, 2.0, 3.0]));
    }
}
