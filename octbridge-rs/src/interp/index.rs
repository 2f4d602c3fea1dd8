//! Indexing.
//!
//! Subscripts are resolved to zero-based positions against the indexed
//! value's shape, folded to the number of subscripts given (so `A(i)` on a
//! matrix is linear indexing and `A(i, j)` on a 3-D array folds the trailing
//! dimensions into the second).  The same machinery serves numeric arrays
//! and cell arrays through [`Elems`].

use super::error::{checked_numel, rt_err, Result, RuntimeError};
use super::ops::{dims_str, type_desc};
use crate::array::NdArray;
use crate::typetag::ElemType;
use crate::value::{CellArray, Value};

/// One evaluated subscript.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexArg {
    /// Magic `:`
    Colon,
    Value(Value),
}

/// A container addressed by column-major position.
pub(crate) trait Elems: Clone {
    fn dims(&self) -> &[usize];
    fn count(&self) -> usize;
    /// Elements at `idx`, laid out as `shape`.
    fn take(&self, idx: &[usize], shape: Vec<usize>) -> Self;
    /// A default-filled container of the same kind.
    fn blank(&self, shape: &[usize]) -> Self;
    /// `self[dst[k]] = src[src_idx[k]]`
    fn put(&mut self, dst: &[usize], src: &Self, src_idx: &[usize]);
}

impl Elems for NdArray {
    fn dims(&self) -> &[usize] {
        self.shape()
    }

    fn count(&self) -> usize {
        self.numel()
    }

    fn take(&self, idx: &[usize], shape: Vec<usize>) -> Self {
        NdArray::from_parts(shape, self.data().gather(idx))
    }

    fn blank(&self, shape: &[usize]) -> Self {
        NdArray::zeros(self.elem_type(), shape)
    }

    fn put(&mut self, dst: &[usize], src: &Self, src_idx: &[usize]) {
        self.data_mut().scatter(dst, src.data(), src_idx);
    }
}

impl Elems for CellArray {
    fn dims(&self) -> &[usize] {
        self.shape()
    }

    fn count(&self) -> usize {
        self.numel()
    }

    fn take(&self, idx: &[usize], shape: Vec<usize>) -> Self {
        let elems = idx.iter().map(|&i| self.elems()[i].clone()).collect();
        CellArray::from_parts(shape, elems)
    }

    fn blank(&self, shape: &[usize]) -> Self {
        CellArray::filled(shape)
    }

    fn put(&mut self, dst: &[usize], src: &Self, src_idx: &[usize]) {
        let elems = self.elems_mut();
        for (&d, &s) in dst.iter().zip(src_idx) {
            elems[d] = src.elems()[s].clone();
        }
    }
}

// ── Subscript resolution ──────────────────────────────────────────────────────

/// A subscript resolved to zero-based positions.
#[derive(Debug)]
struct Sub {
    pos: Vec<usize>,
    colon: bool,
    /// Shape of the subscript value, for result-shape rules.
    shape: Vec<usize>,
}

/// `index (_,3)` style label for subscript `k` of `n`.
fn label(k: usize, n: usize, value: &str) -> String {
    (0..n).map(|i| if i == k { value.to_owned() } else { "_".to_owned() }).collect::<Vec<_>>().join(",")
}

fn out_of_bound(k: usize, n: usize, p: usize, extent: usize) -> RuntimeError {
    RuntimeError::with_id(
        "Octave:index-out-of-bounds",
        format!("index ({}): out of bound; value {p} out of bound {extent}", label(k, n, &p.to_string())),
    )
}

fn bad_subscript() -> RuntimeError {
    RuntimeError::with_id(
        "Octave:index-out-of-bounds",
        "subscript indices must be either positive integers or logicals",
    )
}

fn invalid_resize() -> RuntimeError {
    RuntimeError::with_id(
        "Octave:invalid-resize",
        "Invalid resizing operation or ambiguous assignment to an out-of-bounds array element",
    )
}

fn resolve(arg: &IndexArg, extent: usize, k: usize, n: usize) -> Result<Sub> {
    let v = match arg {
        IndexArg::Colon => {
            return Ok(Sub { pos: (0..extent).collect(), colon: true, shape: vec![extent, 1] })
        }
        IndexArg::Value(v) => v,
    };
    let a = v.to_array().ok_or_else(bad_subscript)?;
    let data = a.data();
    if a.elem_type() == ElemType::Logical {
        let pos: Vec<usize> = (0..a.numel()).filter(|&i| data.is_nonzero(i)).collect();
        let shape = if a.rows() == 1 { vec![1, pos.len()] } else { vec![pos.len(), 1] };
        return Ok(Sub { pos, colon: false, shape });
    }
    let mut pos = Vec::with_capacity(a.numel());
    for i in 0..a.numel() {
        let x = data.get_f64(i);
        if x.fract() != 0.0 || x.is_nan() {
            return Err(RuntimeError::with_id(
                "Octave:index-out-of-bounds",
                format!(
                    "index ({}): subscripts must be either integers 1 to (2^63)-1 or logicals",
                    label(k, n, &x.to_string())
                ),
            ));
        }
        if x < 1.0 {
            return Err(RuntimeError::with_id(
                "Octave:index-out-of-bounds",
                format!(
                    "index ({}): out of bound; value {x} out of bound {extent}",
                    label(k, n, &x.to_string())
                ),
            ));
        }
        pos.push(x as usize - 1);
    }
    Ok(Sub { pos, colon: false, shape: a.shape().to_vec() })
}

fn check_bounds(sub: &Sub, extent: usize, k: usize, n: usize) -> Result<()> {
    match sub.pos.iter().find(|&&p| p >= extent) {
        Some(&p) => Err(out_of_bound(k, n, p + 1, extent)),
        None => Ok(()),
    }
}

/// `shape` folded or padded to `n` dimensions.
fn fold_shape(shape: &[usize], n: usize) -> Vec<usize> {
    let mut dims = shape.to_vec();
    if n == 1 {
        return vec![dims.iter().product()];
    }
    if dims.len() < n {
        dims.resize(n, 1);
    } else if dims.len() > n {
        let tail: usize = dims[n - 1..].iter().product();
        dims.truncate(n - 1);
        dims.push(tail);
    }
    dims
}

/// Column-major linear positions of every combination of subscripts.
fn linear_positions(subs: &[&[usize]], dims: &[usize]) -> Vec<usize> {
    let total: usize = subs.iter().map(|s| s.len()).product();
    if total == 0 {
        return Vec::new();
    }
    let mut strides = Vec::with_capacity(dims.len());
    let mut stride = 1;
    for &d in dims {
        strides.push(stride);
        stride *= d;
    }
    let mut out = Vec::with_capacity(total);
    let mut cur = vec![0usize; subs.len()];
    for _ in 0..total {
        out.push(cur.iter().enumerate().map(|(k, &c)| subs[k][c] * strides[k]).sum());
        for (k, c) in cur.iter_mut().enumerate() {
            *c += 1;
            if *c < subs[k].len() {
                break;
            }
            *c = 0;
        }
    }
    out
}

/// Result shape of `src(idx)` with a single subscript.
fn linear_shape(src: &[usize], sub: &Sub) -> Vec<usize> {
    let k = sub.pos.len();
    if sub.colon {
        return vec![k, 1];
    }
    let src_vector = src.len() == 2 && (src[0] == 1 || src[1] == 1) && src != [1, 1];
    let idx_vector = sub.shape.len() == 2 && (sub.shape[0] == 1 || sub.shape[1] == 1);
    if src_vector && idx_vector {
        return if src[0] == 1 { vec![1, k] } else { vec![k, 1] };
    }
    sub.shape.clone()
}

// ── Generic operations ────────────────────────────────────────────────────────

/// `src(args...)`
pub(crate) fn get<T: Elems>(src: &T, args: &[IndexArg]) -> Result<T> {
    let n = args.len();
    if n == 0 {
        return Ok(src.clone());
    }
    if n == 1 {
        let total = src.count();
        let sub = resolve(&args[0], total, 0, 1)?;
        check_bounds(&sub, total, 0, 1)?;
        let shape = linear_shape(src.dims(), &sub);
        return Ok(src.take(&sub.pos, shape));
    }
    let dims = fold_shape(src.dims(), n);
    let mut subs = Vec::with_capacity(n);
    for (k, arg) in args.iter().enumerate() {
        let sub = resolve(arg, dims[k], k, n)?;
        check_bounds(&sub, dims[k], k, n)?;
        subs.push(sub);
    }
    let shape = subs.iter().map(|s| s.pos.len()).collect();
    let lists: Vec<&[usize]> = subs.iter().map(|s| s.pos.as_slice()).collect();
    Ok(src.take(&linear_positions(&lists, &dims), shape))
}

fn rhs_mismatch(counts: &[usize], rhs: &[usize]) -> RuntimeError {
    RuntimeError::with_id(
        "Octave:nonconformant-args",
        format!("=: nonconformant arguments (op1 is {}, op2 is {})", dims_str(counts), dims_str(rhs)),
    )
}

/// Copy `src` into a larger blank container, keeping every element at the
/// same subscripts.
fn regrow<T: Elems>(src: &T, old: &[usize], new: &[usize]) -> T {
    let mut out = src.blank(new);
    let lists: Vec<Vec<usize>> = old.iter().map(|&d| (0..d).collect()).collect();
    let refs: Vec<&[usize]> = lists.iter().map(Vec::as_slice).collect();
    let dst = linear_positions(&refs, new);
    let src_idx: Vec<usize> = (0..src.count()).collect();
    out.put(&dst, src, &src_idx);
    out
}

/// `dst(args...) = rhs`, growing `dst` as needed.
pub(crate) fn set<T: Elems>(dst: T, args: &[IndexArg], rhs: &T) -> Result<T> {
    let n = args.len();
    let rhs_n = rhs.count();
    if n == 0 {
        return Err(rt_err!("invalid empty index expression"));
    }
    if n == 1 {
        let total = dst.count();
        let sub = resolve(&args[0], total, 0, 1)?;
        let m = sub.pos.len();
        if rhs_n != m && rhs_n != 1 {
            return Err(rhs_mismatch(&[1, m], rhs.dims()));
        }
        let need = sub.pos.iter().max().map_or(0, |p| p + 1);
        let mut dst = if need > total {
            let d = dst.dims();
            let shape = if d.len() == 2 && d[1] == 1 && d[0] != 1 {
                vec![need, 1]
            } else if d.len() == 2 && (d[0] <= 1 || total == 0) {
                vec![1, need]
            } else {
                return Err(invalid_resize());
            };
            checked_numel(&shape)?;
            let old = fold_shape(d, 2);
            regrow(&dst, &old, &shape)
        } else {
            dst
        };
        let src_idx: Vec<usize> = if rhs_n == 1 { vec![0; m] } else { (0..m).collect() };
        if rhs_n == 0 && m == 0 {
            return Ok(dst);
        }
        dst.put(&sub.pos, rhs, &src_idx);
        return Ok(dst);
    }

    let dims = fold_shape(dst.dims(), n);
    let empty = dst.count() == 0;
    let rhs_vector_len = if rhs.dims().iter().filter(|&&d| d != 1).count() <= 1 { Some(rhs_n) } else { None };
    let mut vector_used = false;
    let mut subs = Vec::with_capacity(n);
    for (k, arg) in args.iter().enumerate() {
        let extent = match arg {
            IndexArg::Colon if empty && dims[k] == 0 => {
                if rhs_n == 1 {
                    1
                } else if let (Some(len), false) = (rhs_vector_len, vector_used) {
                    vector_used = true;
                    len
                } else {
                    rhs.dims().get(k).copied().unwrap_or(1)
                }
            }
            _ => dims[k],
        };
        subs.push(resolve(arg, extent, k, n)?);
    }
    let counts: Vec<usize> = subs.iter().map(|s| s.pos.len()).collect();
    let m: usize = counts.iter().product();
    if rhs_n != m && rhs_n != 1 {
        return Err(rhs_mismatch(&counts, rhs.dims()));
    }
    let new_dims: Vec<usize> = subs
        .iter()
        .zip(&dims)
        .map(|(s, &d)| s.pos.iter().max().map_or(d, |&p| d.max(p + 1)))
        .collect();
    let mut dst = if new_dims != dims {
        if dst.dims().len() > n && new_dims[n - 1] != dims[n - 1] {
            return Err(invalid_resize());
        }
        checked_numel(&new_dims)?;
        regrow(&dst, &dims, &new_dims)
    } else {
        dst
    };
    if m == 0 {
        return Ok(dst);
    }
    let lists: Vec<&[usize]> = subs.iter().map(|s| s.pos.as_slice()).collect();
    let positions = linear_positions(&lists, &new_dims);
    let src_idx: Vec<usize> = if rhs_n == 1 { vec![0; m] } else { (0..m).collect() };
    dst.put(&positions, rhs, &src_idx);
    Ok(dst)
}

/// `dst(args...) = []`
pub(crate) fn delete<T: Elems>(dst: &T, args: &[IndexArg]) -> Result<T> {
    let n = args.len();
    if n == 1 {
        let total = dst.count();
        if args[0] == IndexArg::Colon {
            return Ok(dst.take(&[], vec![0, 0]));
        }
        let sub = resolve(&args[0], total, 0, 1)?;
        check_bounds(&sub, total, 0, 1)?;
        if sub.pos.is_empty() {
            return Ok(dst.clone());
        }
        let mut gone = vec![false; total];
        for &p in &sub.pos {
            gone[p] = true;
        }
        let kept: Vec<usize> = (0..total).filter(|&i| !gone[i]).collect();
        let d = dst.dims();
        let shape = if d.len() == 2 && d[1] == 1 && d[0] != 1 {
            vec![kept.len(), 1]
        } else {
            vec![1, kept.len()]
        };
        return Ok(dst.take(&kept, shape));
    }

    let dims = fold_shape(dst.dims(), n);
    let mut subs = Vec::with_capacity(n);
    for (k, arg) in args.iter().enumerate() {
        let sub = resolve(arg, dims[k], k, n)?;
        check_bounds(&sub, dims[k], k, n)?;
        subs.push(sub);
    }
    let covers = |s: &Sub, extent: usize| {
        s.colon || {
            let mut seen = vec![false; extent];
            s.pos.iter().for_each(|&p| seen[p] = true);
            seen.iter().all(|&b| b)
        }
    };
    let partial: Vec<usize> = (0..n).filter(|&k| !covers(&subs[k], dims[k])).collect();
    match partial.as_slice() {
        [] => {
            let mut shape = dims.clone();
            shape[0] = 0;
            Ok(dst.take(&[], shape))
        }
        &[k] => {
            if subs[k].pos.is_empty() {
                return Ok(dst.clone());
            }
            let mut gone = vec![false; dims[k]];
            for &p in &subs[k].pos {
                gone[p] = true;
            }
            let lists: Vec<Vec<usize>> = (0..n)
                .map(|j| {
                    if j == k {
                        (0..dims[j]).filter(|&i| !gone[i]).collect()
                    } else {
                        (0..dims[j]).collect()
                    }
                })
                .collect();
            let refs: Vec<&[usize]> = lists.iter().map(Vec::as_slice).collect();
            let shape = lists.iter().map(Vec::len).collect();
            Ok(dst.take(&linear_positions(&refs, &dims), shape))
        }
        _ => Err(rt_err!("a null assignment can only have one non-colon index")),
    }
}

// ── Value-level operations ────────────────────────────────────────────────────

/// `v(args...)` for arrays, cells and scalar structs.
pub(crate) fn index_value(v: &Value, args: &[IndexArg]) -> Result<Value> {
    if args.is_empty() {
        return Ok(v.clone());
    }
    match v {
        Value::Cell(c) => Ok(Value::Cell(get(c, args)?)),
        Value::Struct(_) | Value::FunctionHandle(_) => {
            let trial = get(&CellArray::filled(&[1, 1]), args)?;
            match trial.numel() {
                1 => Ok(v.clone()),
                _ => Err(rt_err!("struct arrays are not supported")),
            }
        }
        _ => {
            let a = v.to_array().ok_or_else(bad_subscript)?;
            Ok(Value::numeric(get(&a, args)?))
        }
    }
}

/// Elements selected by `c{args...}`, as a cs-list.
pub(crate) fn brace_values(c: &CellArray, args: &[IndexArg]) -> Result<Vec<Value>> {
    Ok(get(c, args)?.into_elems())
}

/// The single element `c{args...}` addresses, `None` past the end.
pub(crate) fn cell_element(c: &CellArray, args: &[IndexArg]) -> Result<Option<Value>> {
    let n = args.len().max(1);
    let dims = fold_shape(c.shape(), n);
    let mut subs = Vec::with_capacity(n);
    for (k, arg) in args.iter().enumerate() {
        subs.push(resolve(arg, dims[k], k, n)?);
    }
    if subs.iter().any(|s| s.pos.len() != 1) {
        return Err(rt_err!("some elements undefined in index list"));
    }
    if subs.iter().zip(&dims).any(|(s, &d)| s.pos[0] >= d) {
        return Ok(None);
    }
    let lists: Vec<&[usize]> = subs.iter().map(|s| s.pos.as_slice()).collect();
    Ok(linear_positions(&lists, &dims).first().map(|&i| c.elems()[i].clone()))
}

/// Element type of an indexed assignment result.
fn assign_type(dst: ElemType, rhs: ElemType) -> ElemType {
    if dst == rhs {
        return dst;
    }
    if dst.is_integer() {
        return dst;
    }
    if rhs.is_integer() {
        return rhs;
    }
    let real = |t: ElemType| matches!(t, ElemType::Logical | ElemType::Char);
    let complex = dst.is_complex() || rhs.is_complex();
    let single = (dst.is_single() || rhs.is_single()) && !(real(dst) && real(rhs));
    match (single, complex) {
        (true, true) => ElemType::ComplexSingle,
        (true, false) => ElemType::Single,
        (false, true) => ElemType::ComplexDouble,
        (false, false) => ElemType::Double,
    }
}

/// `[]`: the `0×0` double that deletes on indexed assignment.
pub(crate) fn is_null(v: &Value) -> bool {
    matches!(v, Value::Matrix(a) if a.elem_type() == ElemType::Double && a.shape() == [0, 0])
}

/// `dst(args...) = rhs`, where an `[]` right-hand side deletes.
pub(crate) fn assign_value(dst: Value, args: &[IndexArg], rhs: Value) -> Result<Value> {
    if is_null(&rhs) && !dst.is_struct() {
        return match &dst {
            Value::Cell(c) => Ok(Value::Cell(delete(c, args)?)),
            Value::FunctionHandle(_) => Err(rt_err!("invalid use of a function handle in indexed assignment")),
            _ => {
                let a = dst.to_array().ok_or_else(bad_subscript)?;
                Ok(Value::numeric(delete(&a, args)?))
            }
        };
    }
    match (dst, rhs) {
        (Value::Cell(c), Value::Cell(r)) => Ok(Value::Cell(set(c, args, &r)?)),
        (Value::Cell(c), r) => Ok(Value::Cell(set(c, args, &CellArray::row(vec![r]))?)),
        (d, Value::Cell(r)) if is_null(&d) => Ok(Value::Cell(set(CellArray::default(), args, &r)?)),
        (d, Value::Struct(s)) if d.is_struct() || is_null(&d) => {
            let trial = get(&CellArray::filled(&[1, 1]), args)?;
            if trial.numel() == 1 {
                Ok(Value::Struct(s))
            } else {
                Err(rt_err!("struct arrays are not supported"))
            }
        }
        (Value::FunctionHandle(_), _) => {
            Err(rt_err!("invalid use of a function handle in indexed assignment"))
        }
        (d, r) => {
            let (Some(a), Some(b)) = (d.to_array(), r.to_array()) else {
                return Err(rt_err!(
                    "operator = undefined for '{}' by '{}' operations",
                    type_desc(&d),
                    type_desc(&r)
                ));
            };
            let t = if is_null(&d) { b.elem_type() } else { assign_type(a.elem_type(), b.elem_type()) };
            let out = set(a.cast(t), args, &b.cast(t))?;
            Ok(Value::numeric(out))
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn idx(xs: &[f64]) -> IndexArg {
        IndexArg::Value(Value::row(xs.to_vec()))
    }

    fn magic3() -> NdArray {
        NdArray::from_rows(&[vec![8.0, 1.0, 6.0], vec![3.0, 5.0, 7.0], vec![4.0, 9.0, 2.0]]).unwrap()
    }

    #[test]
    fn linear_and_subscript_gather() {
        let m = magic3();
        let r = get(&m, &[idx(&[2.0])]).unwrap();
        assert_eq!(r.data().get_f64(0), 3.0);
        let r = get(&m, &[IndexArg::Colon, idx(&[2.0])]).unwrap();
        assert_eq!(r.shape(), &[3, 1]);
        assert_eq!(r.data().to_f64_vec(), vec![1.0, 5.0, 9.0]);
        let r = get(&m, &[IndexArg::Colon]).unwrap();
        assert_eq!(r.shape(), &[9, 1]);
    }

    #[test]
    fn vector_result_follows_source_orientation() {
        let col = NdArray::column(vec![1.0, 2.0, 3.0]);
        assert_eq!(get(&col, &[idx(&[1.0, 3.0])]).unwrap().shape(), &[2, 1]);
        let row = NdArray::row(vec![1.0, 2.0, 3.0]);
        assert_eq!(get(&row, &[idx(&[1.0, 3.0])]).unwrap().shape(), &[1, 2]);
    }

    #[test]
    fn logical_mask() {
        let row = NdArray::row(vec![1.0, 2.0, 3.0]);
        let mask = IndexArg::Value(Value::numeric(NdArray::row(vec![true, false, true])));
        assert_eq!(get(&row, &[mask]).unwrap().data().to_f64_vec(), vec![1.0, 3.0]);
    }

    #[test]
    fn out_of_bound_message() {
        let row = NdArray::row(vec![1.0, 2.0, 3.0]);
        let e = get(&row, &[idx(&[5.0])]).unwrap_err();
        assert_eq!(e.message, "index (5): out of bound; value 5 out of bound 3");
        let e = get(&row, &[idx(&[0.0])]).unwrap_err();
        assert_eq!(e.message, "index (0): out of bound; value 0 out of bound 3");
        let e = get(&magic3(), &[idx(&[1.0]), idx(&[4.0])]).unwrap_err();
        assert_eq!(e.message, "index (_,4): out of bound; value 4 out of bound 3");
    }

    #[test]
    fn assignment_grows() {
        let v = assign_value(Value::empty(), &[idx(&[3.0])], Value::double(7.0)).unwrap();
        assert_eq!(v, Value::row(vec![0.0, 0.0, 7.0]));
        let v = assign_value(Value::double(1.0), &[idx(&[2.0]), idx(&[2.0])], Value::double(4.0)).unwrap();
        assert_eq!(v.shape(), vec![2, 2]);
        assert_eq!(v.to_array().unwrap().data().to_f64_vec(), vec![1.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn assignment_class_rules() {
        let v = assign_value(Value::row(vec![1.0, 2.0]), &[idx(&[1.0])], Value::Scalar(crate::array::Number::Int8(5)))
            .unwrap();
        assert_eq!(v.elem_type(), Some(ElemType::Int8));
        let v = assign_value(Value::str("abc"), &[idx(&[2.0])], Value::str("X")).unwrap();
        assert_eq!(v, Value::str("aXc"));
        let v = assign_value(Value::empty(), &[IndexArg::Colon, idx(&[1.0])], Value::row(vec![1.0, 2.0]))
            .unwrap();
        assert_eq!(v.shape(), vec![2, 1]);
    }

    #[test]
    fn deletion() {
        let v = assign_value(Value::row(vec![1.0, 2.0, 3.0]), &[idx(&[2.0])], Value::empty()).unwrap();
        assert_eq!(v, Value::row(vec![1.0, 3.0]));
        let m = Value::numeric(magic3());
        let v = assign_value(m.clone(), &[IndexArg::Colon, idx(&[1.0])], Value::empty()).unwrap();
        assert_eq!(v.shape(), vec![3, 2]);
        let e = assign_value(m, &[idx(&[1.0]), idx(&[1.0])], Value::empty()).unwrap_err();
        assert_eq!(e.message, "a null assignment can only have one non-colon index");
    }

    #[test]
    fn cell_assignment_wraps_plain_values() {
        let c = Value::Cell(CellArray::row(vec![Value::double(1.0)]));
        let v = assign_value(c, &[idx(&[3.0])], Value::str("x")).unwrap();
        let Value::Cell(c) = v else { panic!("expected cell") };
        assert_eq!(c.shape(), &[1, 3]);
        assert_eq!(c.elems()[1], Value::empty());
        assert_eq!(c.elems()[2], Value::str("x"));
    }
}
