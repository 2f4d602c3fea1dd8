//! Operators.
//!
//! Result classes follow Octave: an integer operand wins over double and
//! the result saturates, two different integer classes do not mix, single
//! wins over double, and complex results whose imaginary parts are all
//! zero narrow back to real.  Elementwise operators broadcast singleton
//! dimensions.

use super::ast::{BinOp, UnOp};
use super::error::{checked_numel, rt_err, Result, RuntimeError};
use crate::array::{Buffer, Complex32, Complex64, NdArray, Number};
use crate::typetag::ElemType;
use crate::value::{truth, CellArray, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `2x3` style dimension string.
pub(crate) fn dims_str(shape: &[usize]) -> String {
    shape.iter().map(usize::to_string).collect::<Vec<_>>().join("x")
}

/// Octave's internal type name, as used in operator error messages.
pub(crate) fn type_desc(v: &Value) -> String {
    let scalar = v.numel() == 1;
    let kind = if scalar { "scalar" } else { "matrix" };
    match v {
        Value::Cell(_) => "cell".into(),
        Value::Struct(_) => "scalar struct".into(),
        Value::FunctionHandle(_) => "function handle".into(),
        Value::Char(_) => "string".into(),
        _ => match v.elem_type() {
            Some(ElemType::Double) if scalar => "double".into(),
            Some(ElemType::Double) => "matrix".into(),
            Some(ElemType::ComplexDouble) => format!("complex {kind}"),
            Some(ElemType::Single) => format!("float {kind}"),
            Some(ElemType::ComplexSingle) => format!("float complex {kind}"),
            Some(ElemType::Logical) if scalar => "bool".into(),
            Some(ElemType::Logical) => "bool matrix".into(),
            Some(e) => format!("{} {kind}", e.class_name()),
            None => "value".into(),
        },
    }
}

fn binary_type_error(op: &str, a: &Value, b: &Value) -> RuntimeError {
    RuntimeError::with_id(
        "Octave:undefined-function",
        format!(
            "binary operator '{op}' not implemented for '{}' by '{}' operations",
            type_desc(a),
            type_desc(b)
        ),
    )
}

fn nonconformant(op: &str, a: &[usize], b: &[usize]) -> RuntimeError {
    RuntimeError::with_id(
        "Octave:nonconformant-args",
        format!(
            "operator {op}: nonconformant arguments (op1 is {}, op2 is {})",
            dims_str(a),
            dims_str(b)
        ),
    )
}

/// Truth of an `if`/`while` condition; empty is false.
pub(crate) fn is_true(v: &Value) -> Result<bool> {
    truth(v).ok_or_else(|| rt_err!("wrong type argument '{}'", container_desc(v)))
}

/// Truth of a `&&`/`||` operand; empty is an error.
pub(crate) fn logical_scalar(v: &Value, op: &str) -> Result<bool> {
    if v.is_empty() && !v.is_cell() {
        return Err(rt_err!("invalid conversion from empty value to real scalar"));
    }
    truth(v).ok_or_else(|| {
        rt_err!("binary operator '{op}' not implemented for '{}' operands", type_desc(v))
    })
}

fn container_desc(v: &Value) -> &'static str {
    match v {
        Value::Cell(_) => "cell array",
        Value::Struct(_) => "struct",
        Value::FunctionHandle(_) => "function handle",
        _ => "value",
    }
}

/// Class an arithmetic result is computed in, before complex promotion.
fn result_type(op: &str, a: &Value, b: &Value, ta: ElemType, tb: ElemType) -> Result<ElemType> {
    let real = |t: ElemType| match t {
        ElemType::Logical | ElemType::Char => ElemType::Double,
        t => t,
    };
    let (ta, tb) = (real(ta), real(tb));
    match (ta.is_integer(), tb.is_integer()) {
        (true, true) if ta != tb => Err(binary_type_error(op, a, b)),
        (true, _) if tb.is_complex() => Err(binary_type_error(op, a, b)),
        (_, true) if ta.is_complex() => Err(binary_type_error(op, a, b)),
        (true, _) => Ok(ta),
        (_, true) => Ok(tb),
        _ => {
            let complex = ta.is_complex() || tb.is_complex();
            let single = ta.is_single() || tb.is_single();
            Ok(match (single, complex) {
                (true, true) => ElemType::ComplexSingle,
                (true, false) => ElemType::Single,
                (false, true) => ElemType::ComplexDouble,
                (false, false) => ElemType::Double,
            })
        }
    }
}

/// Drop an all-zero imaginary part.
pub(crate) fn narrow(buf: Buffer) -> Buffer {
    let t = buf.elem_type();
    if t.is_complex() && (0..buf.len()).all(|i| buf.get_c64(i).im == 0.0) {
        return buf.cast(t.to_real());
    }
    buf
}

fn operands(op: &str, a: &Value, b: &Value) -> Result<(NdArray, NdArray)> {
    match (a.to_array(), b.to_array()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(binary_type_error(op, a, b)),
    }
}

// ── Complex arithmetic ────────────────────────────────────────────────────────

pub(crate) fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

pub(crate) fn cmul(x: Complex64, y: Complex64) -> Complex64 {
    c(x.re * y.re - x.im * y.im, x.re * y.im + x.im * y.re)
}

pub(crate) fn cdiv(x: Complex64, y: Complex64) -> Complex64 {
    if y.im == 0.0 {
        return c(x.re / y.re, x.im / y.re);
    }
    let d = y.re * y.re + y.im * y.im;
    c((x.re * y.re + x.im * y.im) / d, (x.im * y.re - x.re * y.im) / d)
}

pub(crate) fn cln(x: Complex64) -> Complex64 {
    c(x.re.hypot(x.im).ln(), x.im.atan2(x.re))
}

pub(crate) fn cexp(x: Complex64) -> Complex64 {
    let m = x.re.exp();
    c(m * x.im.cos(), m * x.im.sin())
}

fn cpow(x: Complex64, y: Complex64) -> Complex64 {
    if x.re == 0.0 && x.im == 0.0 {
        return if y.re == 0.0 && y.im == 0.0 { c(1.0, 0.0) } else { c(0.0, 0.0) };
    }
    if y.im == 0.0 && x.im == 0.0 && (x.re >= 0.0 || y.re.fract() == 0.0) {
        return c(x.re.powf(y.re), 0.0);
    }
    cexp(cmul(y, cln(x)))
}

fn arith_real(op: BinOp, x: f64, y: f64) -> f64 {
    match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul | BinOp::MatMul => x * y,
        BinOp::Div | BinOp::MatDiv => x / y,
        BinOp::LeftDiv | BinOp::MatLeftDiv => y / x,
        BinOp::Pow | BinOp::MatPow => x.powf(y),
        _ => f64::NAN,
    }
}

fn arith_complex(op: BinOp, x: Complex64, y: Complex64) -> Complex64 {
    match op {
        BinOp::Add => c(x.re + y.re, x.im + y.im),
        BinOp::Sub => c(x.re - y.re, x.im - y.im),
        BinOp::Mul | BinOp::MatMul => cmul(x, y),
        BinOp::Div | BinOp::MatDiv => cdiv(x, y),
        BinOp::LeftDiv | BinOp::MatLeftDiv => cdiv(y, x),
        BinOp::Pow | BinOp::MatPow => cpow(x, y),
        _ => c(f64::NAN, 0.0),
    }
}

fn arith_int(op: BinOp, x: i128, y: i128) -> Option<i128> {
    match op {
        BinOp::Add => x.checked_add(y),
        BinOp::Sub => x.checked_sub(y),
        BinOp::Mul => x.checked_mul(y),
        _ => None,
    }
}

// ── Broadcasting ──────────────────────────────────────────────────────────────

fn broadcast_shape(op: &str, a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    if a == b {
        return Ok(a.to_vec());
    }
    let n = a.len().max(b.len());
    let dim = |s: &[usize], d: usize| s.get(d).copied().unwrap_or(1);
    (0..n)
        .map(|d| match (dim(a, d), dim(b, d)) {
            (x, y) if x == y => Ok(x),
            (1, y) => Ok(y),
            (x, 1) => Ok(x),
            _ => Err(nonconformant(op, a, b)),
        })
        .collect()
}

/// Source positions in `a` and `b` for each element of the broadcast result.
fn broadcast_indices(a: &[usize], b: &[usize], out: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let n: usize = out.iter().product();
    let map = |src: &[usize]| -> Vec<usize> {
        let total: usize = src.iter().product();
        if src == out {
            return (0..n).collect();
        }
        if total == 1 {
            return vec![0; n];
        }
        let mut idx = Vec::with_capacity(n);
        let mut subs = vec![0usize; out.len()];
        for _ in 0..n {
            let mut lin = 0;
            let mut stride = 1;
            for (d, &s) in subs.iter().enumerate() {
                let extent = src.get(d).copied().unwrap_or(1);
                if extent != 1 {
                    lin += s * stride;
                }
                stride *= extent;
            }
            idx.push(lin);
            for (d, s) in subs.iter_mut().enumerate() {
                *s += 1;
                if *s < out[d] {
                    break;
                }
                *s = 0;
            }
        }
        idx
    };
    (map(a), map(b))
}

// ── Binary operators ──────────────────────────────────────────────────────────

pub(crate) fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value> {
    match op {
        BinOp::MatMul => mat_mul(a, b),
        BinOp::MatDiv => mat_div(a, b),
        BinOp::MatLeftDiv => mat_left_div(a, b),
        BinOp::MatPow => mat_pow(a, b),
        _ => elementwise(op, a, b),
    }
}

fn elementwise(op: BinOp, a: &Value, b: &Value) -> Result<Value> {
    let sym = op.symbol();
    let (x, y) = operands(sym, a, b)?;
    let shape = broadcast_shape(sym, x.shape(), y.shape())?;
    let (ix, iy) = broadcast_indices(x.shape(), y.shape(), &shape);
    let (dx, dy) = (x.data(), y.data());
    let (tx, ty) = (x.elem_type(), y.elem_type());
    let pairs = ix.iter().zip(&iy);

    if op.is_comparison() || matches!(op, BinOp::And | BinOp::Or) {
        if (tx.is_integer() && ty.is_complex()) || (ty.is_integer() && tx.is_complex()) {
            return Err(binary_type_error(sym, a, b));
        }
        let out: Vec<bool> = pairs.map(|(&i, &j)| compare(op, dx, i, dy, j)).collect();
        return Ok(Value::numeric(NdArray::from_parts(shape, Buffer::Logical(out))));
    }

    let rt = result_type(sym, a, b, tx, ty)?;
    let out = if rt.is_integer() {
        if tx == ty && matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul) {
            // Only u64 products can overflow i128, and those clamp to the maximum anyway.
            let ints = pairs.map(|(&i, &j)| match (dx.get_i128(i), dy.get_i128(j)) {
                (Some(p), Some(q)) => arith_int(op, p, q).unwrap_or(i128::MAX),
                _ => 0,
            });
            Buffer::from_i128s(rt, ints)
        } else {
            let xs = pairs.map(|(&i, &j)| arith_real(op, dx.get_f64(i), dy.get_f64(j))).collect();
            Buffer::from_f64s(rt, xs)
        }
    } else if rt.is_complex() || needs_complex(op, dx, &ix, dy, &iy) {
        let zs = pairs.map(|(&i, &j)| arith_complex(op, dx.get_c64(i), dy.get_c64(j))).collect();
        narrow(Buffer::from_c64s(rt.to_complex(), zs))
    } else {
        let xs = pairs.map(|(&i, &j)| arith_real(op, dx.get_f64(i), dy.get_f64(j))).collect();
        Buffer::from_f64s(rt, xs)
    };
    Ok(Value::numeric(NdArray::from_parts(shape, out)))
}

/// A real power with a negative base and a fractional exponent.
fn needs_complex(op: BinOp, dx: &Buffer, ix: &[usize], dy: &Buffer, iy: &[usize]) -> bool {
    let (base, exp, bi, ei) = match op {
        BinOp::Pow | BinOp::MatPow => (dx, dy, ix, iy),
        _ => return false,
    };
    bi.iter().zip(ei).any(|(&i, &j)| {
        let b = base.get_f64(i);
        let e = exp.get_f64(j);
        b < 0.0 && e.fract() != 0.0 && e.is_finite()
    })
}

fn compare(op: BinOp, dx: &Buffer, i: usize, dy: &Buffer, j: usize) -> bool {
    match op {
        BinOp::And => dx.is_nonzero(i) && dy.is_nonzero(j),
        BinOp::Or => dx.is_nonzero(i) || dy.is_nonzero(j),
        BinOp::Eq | BinOp::Ne => {
            let eq = match (dx.get_i128(i), dy.get_i128(j)) {
                (Some(p), Some(q)) => p == q,
                _ => dx.get_c64(i) == dy.get_c64(j),
            };
            eq == (op == BinOp::Eq)
        }
        _ => {
            let (p, q) = (dx.get_f64(i), dy.get_f64(j));
            match op {
                BinOp::Lt => p < q,
                BinOp::Le => p <= q,
                BinOp::Gt => p > q,
                BinOp::Ge => p >= q,
                _ => false,
            }
        }
    }
}

// ── Matrix operators ──────────────────────────────────────────────────────────

fn single_element(a: &NdArray) -> bool {
    a.numel() == 1
}

fn mat_mul(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = operands("*", a, b)?;
    if single_element(&x) || single_element(&y) {
        return elementwise(BinOp::Mul, a, b);
    }
    if x.ndims() > 2 || y.ndims() > 2 {
        return Err(rt_err!("operator *: not defined for N-D objects"));
    }
    let (m, k) = (x.shape()[0], x.shape()[1]);
    let (k2, n) = (y.shape()[0], y.shape()[1]);
    if k != k2 {
        return Err(nonconformant("*", x.shape(), y.shape()));
    }
    let rt = result_type("*", a, b, x.elem_type(), y.elem_type())?;
    if rt.is_integer() {
        return Err(binary_type_error("*", a, b));
    }
    let (dx, dy) = (x.data(), y.data());
    let out = if rt.is_complex() {
        let mut zs = vec![Complex64::default(); m * n];
        for j in 0..n {
            for i in 0..m {
                let mut acc = c(0.0, 0.0);
                for p in 0..k {
                    let t = cmul(dx.get_c64(i + p * m), dy.get_c64(p + j * k));
                    acc = c(acc.re + t.re, acc.im + t.im);
                }
                zs[i + j * m] = acc;
            }
        }
        narrow(Buffer::from_c64s(rt, zs))
    } else {
        let mut xs = vec![0.0; m * n];
        for j in 0..n {
            for i in 0..m {
                xs[i + j * m] = (0..k).map(|p| dx.get_f64(i + p * m) * dy.get_f64(p + j * k)).sum();
            }
        }
        Buffer::from_f64s(rt, xs)
    };
    Ok(Value::numeric(NdArray::from_parts(vec![m, n], out)))
}

/// Solve `A X = B` by Gaussian elimination with partial pivoting.  A
/// non-square `A` is solved in the least-squares sense via the normal
/// equations.  Matrices are column-major `f64` slices.
fn solve(a: &[f64], (m, n): (usize, usize), b: &[f64], nrhs: usize) -> Vec<f64> {
    if m != n {
        // AᵀA X = AᵀB
        let mut ata = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..n {
                ata[i + j * n] = (0..m).map(|p| a[p + i * m] * a[p + j * m]).sum();
            }
        }
        let mut atb = vec![0.0; n * nrhs];
        for i in 0..n {
            for j in 0..nrhs {
                atb[i + j * n] = (0..m).map(|p| a[p + i * m] * b[p + j * m]).sum();
            }
        }
        return solve(&ata, (n, n), &atb, nrhs);
    }
    let mut a = a.to_vec();
    let mut x = b.to_vec();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&p, &q| a[p + col * n].abs().total_cmp(&a[q + col * n].abs()))
            .unwrap_or(col);
        if pivot != col {
            for j in 0..n {
                a.swap(col + j * n, pivot + j * n);
            }
            for j in 0..nrhs {
                x.swap(col + j * n, pivot + j * n);
            }
        }
        let d = a[col + col * n];
        for row in col + 1..n {
            let f = a[row + col * n] / d;
            if f == 0.0 {
                continue;
            }
            for j in col..n {
                a[row + j * n] -= f * a[col + j * n];
            }
            for j in 0..nrhs {
                x[row + j * n] -= f * x[col + j * n];
            }
        }
    }
    for j in 0..nrhs {
        for row in (0..n).rev() {
            let s: f64 = (row + 1..n).map(|p| a[row + p * n] * x[p + j * n]).sum();
            x[row + j * n] = (x[row + j * n] - s) / a[row + row * n];
        }
    }
    x
}

fn real_matrix(op: &str, a: &Value, b: &Value, x: &NdArray) -> Result<Vec<f64>> {
    let t = x.elem_type();
    if t.is_complex() || t.is_integer() {
        return Err(binary_type_error(op, a, b));
    }
    if x.ndims() > 2 {
        return Err(rt_err!("operator {op}: not defined for N-D objects"));
    }
    Ok(x.data().to_f64_vec())
}

fn float_result(a: &NdArray, b: &NdArray, shape: Vec<usize>, xs: Vec<f64>) -> Value {
    let t = if a.elem_type().is_single() || b.elem_type().is_single() {
        ElemType::Single
    } else {
        ElemType::Double
    };
    Value::numeric(NdArray::from_parts(shape, Buffer::from_f64s(t, xs)))
}

fn mat_left_div(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = operands("\\", a, b)?;
    if single_element(&x) {
        return elementwise(BinOp::LeftDiv, a, b);
    }
    let ax = real_matrix("\\", a, b, &x)?;
    let by = real_matrix("\\", a, b, &y)?;
    if x.rows() != y.rows() {
        return Err(nonconformant("\\", x.shape(), y.shape()));
    }
    let (m, n) = (x.shape()[0], x.shape()[1]);
    let nrhs = y.shape()[1];
    let out = solve(&ax, (m, n), &by, nrhs);
    Ok(float_result(&x, &y, vec![n, nrhs], out))
}

fn mat_div(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = operands("/", a, b)?;
    if single_element(&y) {
        return elementwise(BinOp::Div, a, b);
    }
    // x / y = (yᵀ \ xᵀ)ᵀ
    let xt = x.transpose().ok_or_else(|| rt_err!("operator /: not defined for N-D objects"))?;
    let yt = y.transpose().ok_or_else(|| rt_err!("operator /: not defined for N-D objects"))?;
    if x.cols() != y.cols() {
        return Err(nonconformant("/", x.shape(), y.shape()));
    }
    let solved = mat_left_div(&Value::numeric(yt), &Value::numeric(xt))?;
    unary(UnOp::Transpose, &solved)
}

fn identity(n: usize) -> Value {
    let mut xs = vec![0.0; n * n];
    for i in 0..n {
        xs[i + i * n] = 1.0;
    }
    Value::numeric(NdArray::from_parts(vec![n, n], Buffer::Double(xs)))
}

fn mat_pow(a: &Value, b: &Value) -> Result<Value> {
    let (x, y) = operands("^", a, b)?;
    if single_element(&x) && single_element(&y) {
        return elementwise(BinOp::Pow, a, b);
    }
    let square = x.ndims() == 2 && x.rows() == x.cols();
    let p = y.data().get_f64(0);
    if !(single_element(&y) && square && p.fract() == 0.0 && !y.elem_type().is_complex()) {
        return Err(rt_err!(
            "for x^y, only square matrix arguments are permitted and one argument must be scalar.  Use .^ for elementwise power."
        ));
    }
    let n = x.rows();
    let mut base = if p < 0.0 { mat_left_div(a, &identity(n))? } else { a.clone() };
    let mut e = p.abs() as u64;
    let mut acc = identity(n);
    while e > 0 {
        if e & 1 == 1 {
            acc = mat_mul(&acc, &base)?;
        }
        e >>= 1;
        if e > 0 {
            base = mat_mul(&base, &base)?;
        }
    }
    Ok(acc)
}

// ── Unary operators ───────────────────────────────────────────────────────────

pub(crate) fn unary(op: UnOp, v: &Value) -> Result<Value> {
    match op {
        UnOp::Transpose | UnOp::CTranspose => return transpose(v, op == UnOp::CTranspose),
        _ => {}
    }
    let sym = match op {
        UnOp::Neg => "-",
        UnOp::Plus => "+",
        _ => "!",
    };
    let Some(a) = v.to_array() else {
        return Err(rt_err!("unary operator '{sym}' not implemented for '{}' operations", type_desc(v)));
    };
    let data = a.data();
    let t = a.elem_type();
    let out = match op {
        UnOp::Not => Buffer::Logical((0..data.len()).map(|i| !data.is_nonzero(i)).collect()),
        UnOp::Plus if matches!(t, ElemType::Logical | ElemType::Char) => data.cast(ElemType::Double),
        UnOp::Plus => data.clone(),
        _ if t.is_integer() => {
            Buffer::from_i128s(t, (0..data.len()).map(|i| -data.get_i128(i).unwrap_or(0)))
        }
        _ if t.is_complex() => Buffer::from_c64s(
            t,
            data.to_c64_vec().into_iter().map(|z| c(-z.re, -z.im)).collect(),
        ),
        _ => {
            let rt = if t.is_single() { ElemType::Single } else { ElemType::Double };
            Buffer::from_f64s(rt, data.to_f64_vec().into_iter().map(|x| -x).collect())
        }
    };
    Ok(Value::numeric(NdArray::from_parts(a.shape().to_vec(), out)))
}

fn transpose_order(r: usize, c: usize) -> Vec<usize> {
    (0..r * c).map(|k| (k % c) * r + k / c).collect()
}

fn transpose(v: &Value, conjugate: bool) -> Result<Value> {
    let nd = || rt_err!("transpose not defined for N-D objects");
    match v {
        Value::Scalar(Number::ComplexDouble(z)) if conjugate => {
            Ok(Value::Scalar(Number::ComplexDouble(c(z.re, -z.im))))
        }
        Value::Scalar(Number::ComplexSingle(z)) if conjugate => {
            Ok(Value::Scalar(Number::ComplexSingle(Complex32::new(z.re, -z.im))))
        }
        Value::Scalar(_) | Value::Struct(_) | Value::FunctionHandle(_) => Ok(v.clone()),
        Value::Matrix(a) | Value::Char(a) => {
            let mut t = a.transpose().ok_or_else(nd)?;
            if conjugate && t.elem_type().is_complex() {
                let zs = t.data().to_c64_vec().into_iter().map(|z| c(z.re, -z.im)).collect();
                t = NdArray::from_parts(t.shape().to_vec(), Buffer::from_c64s(t.elem_type(), zs));
            }
            Ok(Value::numeric(t))
        }
        Value::Cell(cell) => {
            let s = cell.shape();
            if s.len() != 2 {
                return Err(nd());
            }
            let order = transpose_order(s[0], s[1]);
            let elems = order.iter().map(|&i| cell.elems()[i].clone()).collect();
            Ok(Value::Cell(CellArray::from_parts(vec![s[1], s[0]], elems)))
        }
    }
}

// ── Ranges ────────────────────────────────────────────────────────────────────

/// `start:stop` or `start:step:stop`.
pub(crate) fn range(start: &Value, step: Option<&Value>, stop: &Value) -> Result<Value> {
    let operands: Vec<&Value> = [Some(start), step, Some(stop)].into_iter().flatten().collect();
    let mut arrays = Vec::with_capacity(3);
    for v in &operands {
        let a = v
            .to_array()
            .ok_or_else(|| rt_err!("invalid types found in range"))?;
        if a.elem_type().is_complex() {
            return Err(rt_err!("invalid use of complex value in range"));
        }
        if a.is_empty() {
            return Ok(Value::numeric(NdArray::zeros(ElemType::Double, &[1, 0])));
        }
        arrays.push(a);
    }
    let first = |a: &NdArray| a.data().get_f64(0);
    let lo = first(&arrays[0]);
    let hi = first(&arrays[arrays.len() - 1]);
    let inc = if arrays.len() == 3 { first(&arrays[1]) } else { 1.0 };

    let types: Vec<ElemType> = arrays.iter().map(NdArray::elem_type).collect();
    let rt = if let Some(&t) = types.iter().find(|t| t.is_integer()) {
        t
    } else if types[0] == ElemType::Char && types[types.len() - 1] == ElemType::Char {
        ElemType::Char
    } else if types.iter().any(|t| t.is_single()) {
        ElemType::Single
    } else {
        ElemType::Double
    };

    let n = range_count(lo, inc, hi);
    let n = checked_numel(&[1, n])?;
    let xs: Vec<f64> = (0..n)
        .map(|i| {
            let x = lo + i as f64 * inc;
            if (inc > 0.0 && x > hi) || (inc < 0.0 && x < hi) { hi } else { x }
        })
        .collect();
    Ok(Value::numeric(NdArray::from_parts(vec![1, n], Buffer::from_f64s(rt, xs))))
}

fn range_count(lo: f64, inc: f64, hi: f64) -> usize {
    if inc == 0.0 || lo.is_nan() || inc.is_nan() || hi.is_nan() {
        return 0;
    }
    let q = (hi - lo) / inc;
    if q < 0.0 {
        return 0;
    }
    if q.is_infinite() {
        return usize::MAX;
    }
    let tol = 3.0 * f64::EPSILON * lo.abs().max(hi.abs()) / inc.abs();
    (q + tol).floor() as usize + 1
}

// ── Concatenation ─────────────────────────────────────────────────────────────

/// `[a, b, ...]`
pub(crate) fn horzcat(items: Vec<Value>) -> Result<Value> {
    concat(1, items, "horizontal")
}

/// `[a; b; ...]`
pub(crate) fn vertcat(items: Vec<Value>) -> Result<Value> {
    concat(0, items, "vertical")
}

/// Element type of a numeric/char concatenation.
fn concat_type(types: &[ElemType]) -> ElemType {
    if let Some(&t) = types.iter().find(|t| t.is_integer()) {
        return t;
    }
    if types.contains(&ElemType::Char) {
        return ElemType::Char;
    }
    if !types.is_empty() && types.iter().all(|&t| t == ElemType::Logical) {
        return ElemType::Logical;
    }
    let complex = types.iter().any(|t| t.is_complex());
    let single = types.iter().any(|t| t.is_single());
    match (single, complex) {
        (true, true) => ElemType::ComplexSingle,
        (true, false) => ElemType::Single,
        (false, true) => ElemType::ComplexDouble,
        (false, false) => ElemType::Double,
    }
}

/// Chunks `(item, start, len)` in output order for joining along `dim`.
fn concat_plan(shapes: &[Vec<usize>], dim: usize, what: &str) -> Result<(Vec<usize>, Vec<(usize, usize, usize)>)> {
    let nd = shapes.iter().map(Vec::len).max().unwrap_or(2).max(dim + 1);
    let pad = |s: &Vec<usize>| -> Vec<usize> {
        let mut p = s.clone();
        p.resize(nd, 1);
        p
    };
    let mut out = pad(&shapes[0]);
    for s in &shapes[1..] {
        let p = pad(s);
        if (0..nd).any(|d| d != dim && p[d] != out[d]) {
            return Err(rt_err!(
                "{what} dimensions mismatch ({} vs {})",
                dims_str(&crate::array::normalize_shape(&out)),
                dims_str(&crate::array::normalize_shape(s))
            ));
        }
        out[dim] += p[dim];
    }
    let outer: usize = out[dim + 1..].iter().product();
    let mut chunks = Vec::new();
    for o in 0..outer {
        for (i, s) in shapes.iter().enumerate() {
            let len: usize = pad(s)[..=dim].iter().product();
            if len > 0 {
                chunks.push((i, o * len, len));
            }
        }
    }
    Ok((out, chunks))
}

/// Join values along dimension `dim` (0-based).
pub(crate) fn concat(dim: usize, items: Vec<Value>, what: &str) -> Result<Value> {
    if items.is_empty() {
        return Ok(Value::empty());
    }
    let any_cell = items.iter().any(Value::is_cell);
    let types: Vec<ElemType> = items.iter().filter_map(Value::elem_type).collect();
    let kept: Vec<Value> = items
        .iter()
        .filter(|v| !(v.is_empty() && (v.shape() == [0, 0] || items.len() > 1)))
        .cloned()
        .collect();

    if any_cell {
        let mut cells = Vec::new();
        for v in kept {
            match v {
                Value::Cell(c) => cells.push(c),
                other => {
                    return Err(rt_err!(
                        "concatenation operator not implemented for 'cell' by '{}' operations",
                        type_desc(&other)
                    ))
                }
            }
        }
        if cells.is_empty() {
            return Ok(Value::Cell(CellArray::default()));
        }
        let shapes: Vec<Vec<usize>> = cells.iter().map(|c| c.shape().to_vec()).collect();
        let (shape, chunks) = concat_plan(&shapes, dim, what)?;
        let elems = chunks
            .into_iter()
            .flat_map(|(i, start, len)| cells[i].elems()[start..start + len].iter().cloned().collect::<Vec<_>>())
            .collect();
        return Ok(Value::Cell(CellArray::from_parts(shape, elems)));
    }

    if let Some(v) = items.iter().find(|v| matches!(v, Value::Struct(_) | Value::FunctionHandle(_))) {
        if items.len() == 1 {
            return Ok(v.clone());
        }
        return Err(match v {
            Value::Struct(_) => rt_err!("struct arrays are not supported"),
            _ => rt_err!("concatenation of function handles is not allowed; use a cell array"),
        });
    }

    let rt = concat_type(&types);
    let arrays: Vec<NdArray> = kept.iter().filter_map(Value::to_array).collect();
    if arrays.is_empty() {
        let shape = if rt == ElemType::Char { vec![0, 0] } else { items[0].shape() };
        return Ok(Value::numeric(NdArray::zeros(rt, &shape)));
    }
    let shapes: Vec<Vec<usize>> = arrays.iter().map(|a| a.shape().to_vec()).collect();
    let (shape, chunks) = concat_plan(&shapes, dim, what)?;
    let mut out = Buffer::zeros(rt, 0);
    for (i, start, len) in chunks {
        let idx: Vec<usize> = (start..start + len).collect();
        out.append(&arrays[i].data().gather(&idx));
    }
    Ok(Value::numeric(NdArray::from_parts(shape, out)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn m(rows: &[Vec<f64>]) -> Value {
        Value::numeric(NdArray::from_rows(rows).unwrap())
    }

    #[test]
    fn int_plus_double_saturates() {
        let a = Value::Scalar(Number::Int8(100));
        let r = binary(BinOp::Add, &a, &Value::double(100.0)).unwrap();
        assert_eq!(r, Value::Scalar(Number::Int8(127)));
        let r = binary(BinOp::Sub, &Value::Scalar(Number::UInt8(3)), &Value::double(5.0)).unwrap();
        assert_eq!(r, Value::Scalar(Number::UInt8(0)));
    }

    #[test]
    fn mixed_integer_classes_fail() {
        let e = binary(BinOp::Add, &Value::Scalar(Number::Int8(1)), &Value::Scalar(Number::Int16(1)))
            .unwrap_err();
        assert_eq!(
            e.message,
            "binary operator '+' not implemented for 'int8 scalar' by 'int16 scalar' operations"
        );
    }

    #[test]
    fn broadcasting_and_errors() {
        let r = binary(BinOp::Add, &m(&[vec![1.0], vec![2.0]]), &Value::row(vec![10.0, 20.0])).unwrap();
        assert_eq!(r, m(&[vec![11.0, 21.0], vec![12.0, 22.0]]));
        let e = binary(BinOp::Add, &Value::row(vec![1.0, 2.0]), &Value::row(vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert_eq!(e.message, "operator +: nonconformant arguments (op1 is 1x2, op2 is 1x3)");
    }

    #[test]
    fn empty_comparison_is_empty() {
        let r = binary(BinOp::Eq, &Value::empty(), &Value::empty()).unwrap();
        assert_eq!(r.shape(), vec![0, 0]);
        assert_eq!(r.elem_type(), Some(ElemType::Logical));
    }

    #[test]
    fn matrix_product_and_solve() {
        let a = m(&[vec![1.0, 2.0], vec![3.0, 4.0]]);
        let r = binary(BinOp::MatMul, &a, &a).unwrap();
        assert_eq!(r, m(&[vec![7.0, 10.0], vec![15.0, 22.0]]));
        let x = binary(BinOp::MatLeftDiv, &a, &m(&[vec![5.0], vec![11.0]])).unwrap();
        let xs = x.to_array().unwrap().data().to_f64_vec();
        assert!((xs[0] - 1.0).abs() < 1e-12 && (xs[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn negative_base_fractional_power_is_complex() {
        let r = binary(BinOp::Pow, &Value::double(-4.0), &Value::double(0.5)).unwrap();
        match r {
            Value::Scalar(Number::ComplexDouble(z)) => assert!((z.im - 2.0).abs() < 1e-12),
            other => panic!("expected complex, got {other:?}"),
        }
    }

    #[test]
    fn ranges() {
        assert_eq!(range(&Value::double(1.0), None, &Value::double(3.0)).unwrap(), Value::row(vec![1.0, 2.0, 3.0]));
        let r = range(&Value::double(0.0), Some(&Value::double(0.1)), &Value::double(1.0)).unwrap();
        assert_eq!(r.numel(), 11);
        let r = range(&Value::double(3.0), None, &Value::double(1.0)).unwrap();
        assert_eq!(r.shape(), vec![1, 0]);
        let r = range(&Value::str("a"), None, &Value::str("c")).unwrap();
        assert_eq!(r, Value::str("abc"));
    }

    #[test]
    fn concatenation_rules() {
        let r = horzcat(vec![Value::str("ab"), Value::double(99.0)]).unwrap();
        assert_eq!(r, Value::str("abc"));
        let r = horzcat(vec![Value::empty(), Value::row(vec![1.0])]).unwrap();
        assert_eq!(r, Value::double(1.0));
        let e = vertcat(vec![Value::row(vec![1.0, 2.0]), Value::row(vec![1.0, 2.0, 3.0])]).unwrap_err();
        assert_eq!(e.message, "vertical dimensions mismatch (1x2 vs 1x3)");
        let r = vertcat(vec![Value::row(vec![1.0, 2.0]), Value::row(vec![3.0, 4.0])]).unwrap();
        assert_eq!(r, m(&[vec![1.0, 2.0], vec![3.0, 4.0]]));
        let r = horzcat(vec![Value::Scalar(Number::Int8(1)), Value::double(300.0)]).unwrap();
        assert_eq!(r.elem_type(), Some(ElemType::Int8));
    }

    #[test]
    fn transpose_cells_and_conjugate() {
        let c = Value::Cell(CellArray::row(vec![Value::double(1.0), Value::double(2.0)]));
        assert_eq!(unary(UnOp::Transpose, &c).unwrap().shape(), vec![2, 1]);
        let z = Value::Scalar(Number::ComplexDouble(Complex64::new(1.0, 2.0)));
        assert_eq!(
            unary(UnOp::CTranspose, &z).unwrap(),
            Value::Scalar(Number::ComplexDouble(Complex64::new(1.0, -2.0)))
        );
    }
}
