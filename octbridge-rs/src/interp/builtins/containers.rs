//! Shape manipulation, cell arrays and structs.

use super::{array_of, cellstr_of, cellstr_value, check_nargs, count_of, dim_of, logical_array, one, text_of, usage, Outcome};
use crate::array::{normalize_shape, Buffer, NdArray};
use crate::interp::error::{checked_numel, rt_err, too_large, Result};
use crate::interp::exec::error_struct;
use crate::interp::index::Elems;
use crate::interp::ops::{self, dims_str};
use crate::interp::Octave;
use crate::typetag::ElemType;
use crate::value::{truth, CellArray, StructValue, Value};

pub(super) const NAMES: &[&str] = &[
    "horzcat", "vertcat", "cat", "repmat", "reshape", "fliplr", "flipud", "cell", "num2cell",
    "cell2mat", "cellfun", "arrayfun", "deal", "cellstr", "struct", "fieldnames", "isfield",
    "rmfield", "setfield", "getfield", "numfields", "struct2cell",
];

pub(super) fn call(oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Outcome {
    match name {
        "horzcat" => one(ops::horzcat(args)?),
        "vertcat" => one(ops::vertcat(args)?),
        "cat" => {
            let Some((dim, items)) = args.split_first() else {
                return Err(usage(name));
            };
            let dim = dim_of(dim, name)?;
            one(ops::concat(dim, items.to_vec(), "cat:")?)
        }
        "repmat" => {
            if args.len() < 2 {
                return Err(usage(name));
            }
            let reps = repeat_counts(&args[1..])?;
            one(rearrange(name, &args[0], |dims| tile(dims, &reps))?)
        }
        "reshape" => {
            if args.len() < 2 {
                return Err(usage(name));
            }
            let n = args[0].numel();
            let from = args[0].shape();
            let shape = reshape_dims(n, &from, &args[1..])?;
            one(rearrange(name, &args[0], |_| Ok(((0..n).collect(), shape)))?)
        }
        "fliplr" | "flipud" => {
            check_nargs(name, &args, 1, 1)?;
            one(rearrange(name, &args[0], |dims| Ok(flip(dims, name == "fliplr")))?)
        }
        "cell" => {
            let (shape, class) = super::types::shape_args(name, &args)?;
            if class.is_some() {
                return Err(usage(name));
            }
            one(Value::Cell(CellArray::filled(&shape)))
        }
        "num2cell" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            let elems = (0..a.numel()).map(|k| Value::numeric(a.take(&[k], vec![1, 1]))).collect();
            one(Value::Cell(CellArray::from_parts(a.shape().to_vec(), elems)))
        }
        "cell2mat" => {
            check_nargs(name, &args, 1, 1)?;
            one(cell2mat(&args[0])?)
        }
        "cellfun" | "arrayfun" => map_elements(oct, name, &args, nargout).map(Some),
        "deal" => {
            let want = nargout.max(1);
            match args.len() {
                0 => Err(usage(name)),
                1 => Ok(Some(vec![args[0].clone(); want])),
                n if n == want => Ok(Some(args)),
                _ => Err(rt_err!("deal: nargin > 1 and nargin != nargout")),
            }
        }
        "cellstr" => {
            check_nargs(name, &args, 1, 1)?;
            one(cellstr(&args[0])?)
        }
        "struct" => one(Value::Struct(make_struct(&args)?)),
        "fieldnames" => {
            check_nargs(name, &args, 1, 1)?;
            let Value::Struct(s) = &args[0] else {
                return Err(rt_err!("fieldnames: Invalid input argument"));
            };
            let names: Vec<String> = s.field_names().map(str::to_string).collect();
            one(cellstr_value(vec![names.len(), 1], names))
        }
        "isfield" => {
            check_nargs(name, &args, 2, 2)?;
            let has = |f: &str| matches!(&args[0], Value::Struct(s) if s.contains(f));
            if let Some(names) = cellstr_of(&args[1]) {
                let bits = names.iter().map(|f| has(f)).collect();
                return one(logical_array(args[1].shape(), bits));
            }
            one(Value::logical(args[1].as_text().is_some_and(|f| has(&f))))
        }
        "rmfield" => {
            check_nargs(name, &args, 2, 2)?;
            let mut s = struct_arg(name, &args[0])?;
            let names = match cellstr_of(&args[1]) {
                Some(names) => names,
                None => vec![text_of(&args[1], name)?],
            };
            for f in &names {
                if s.remove(f).is_none() {
                    return Err(rt_err!("rmfield: structure does not contain remaining field {f}"));
                }
            }
            one(Value::Struct(s))
        }
        "setfield" => {
            check_nargs(name, &args, 3, 3)?;
            let mut s = match &args[0] {
                v if crate::interp::index::is_null(v) => StructValue::new(),
                v => struct_arg(name, v)?,
            };
            s.insert(text_of(&args[1], name)?, args[2].clone());
            one(Value::Struct(s))
        }
        "getfield" => {
            check_nargs(name, &args, 2, 2)?;
            let s = struct_arg(name, &args[0])?;
            let f = text_of(&args[1], name)?;
            let v = s.get(&f).cloned().ok_or_else(|| rt_err!("invalid use of undefined value"))?;
            one(v)
        }
        "numfields" => {
            check_nargs(name, &args, 1, 1)?;
            let n = match &args[0] {
                Value::Struct(s) => s.len(),
                _ => 0,
            };
            one(Value::double(n as f64))
        }
        "struct2cell" => {
            check_nargs(name, &args, 1, 1)?;
            let s = struct_arg(name, &args[0])?;
            one(Value::Cell(CellArray::column(s.into_fields().into_values().collect())))
        }
        _ => Ok(None),
    }
}

fn struct_arg(name: &str, v: &Value) -> Result<StructValue> {
    match v {
        Value::Struct(s) => Ok(s.clone()),
        other => Err(rt_err!("{name}: argument must be a struct, not {}", super::arg_desc(other))),
    }
}

// ── Rearranging ───────────────────────────────────────────────────────────────

/// Apply a gather plan (source positions and result shape, computed from
/// the source shape) to an array or cell array.
fn rearrange(
    name: &str,
    v: &Value,
    plan: impl FnOnce(&[usize]) -> Result<(Vec<usize>, Vec<usize>)>,
) -> Result<Value> {
    match v {
        Value::Cell(c) => {
            let (idx, shape) = plan(c.shape())?;
            Ok(Value::Cell(c.take(&idx, shape)))
        }
        other => {
            let a = array_of(other, name)?;
            let (idx, shape) = plan(a.shape())?;
            Ok(Value::numeric(a.take(&idx, shape)))
        }
    }
}

fn repeat_counts(args: &[Value]) -> Result<Vec<usize>> {
    match args {
        [v] => {
            let a = array_of(v, "repmat")?;
            let reps: Vec<usize> = a.data().to_f64_vec().into_iter().map(|x| x.max(0.0) as usize).collect();
            match reps.as_slice() {
                [n] => Ok(vec![*n, *n]),
                [] => Err(usage("repmat")),
                _ => Ok(reps),
            }
        }
        many => many.iter().map(|v| count_of(v, "repmat")).collect(),
    }
}

/// Positions and shape of `dims` repeated `reps` times along each dimension.
fn tile(dims: &[usize], reps: &[usize]) -> Result<(Vec<usize>, Vec<usize>)> {
    let nd = dims.len().max(reps.len());
    let mut src = dims.to_vec();
    src.resize(nd, 1);
    let mut reps = reps.to_vec();
    reps.resize(nd, 1);
    let out = src
        .iter()
        .zip(&reps)
        .map(|(d, r)| d.checked_mul(*r).ok_or_else(too_large))
        .collect::<Result<Vec<usize>>>()?;
    let total = checked_numel(&out)?;
    let idx = (0..total)
        .map(|k| {
            let (mut rest, mut pos, mut stride) = (k, 0, 1);
            for d in 0..nd {
                pos += (rest % out[d]) % src[d] * stride;
                rest /= out[d];
                stride *= src[d];
            }
            pos
        })
        .collect();
    Ok((idx, out))
}

/// `fliplr`/`flipud` on the 2-D view of `dims`.
fn flip(dims: &[usize], columns: bool) -> (Vec<usize>, Vec<usize>) {
    let r = dims[0];
    let c: usize = dims[1..].iter().product();
    let idx = (0..r * c)
        .map(|k| {
            let (i, j) = (k % r, k / r);
            if columns {
                i + (c - 1 - j) * r
            } else {
                (r - 1 - i) + j * r
            }
        })
        .collect();
    (idx, dims.to_vec())
}

/// Target shape of `reshape(A, ...)`; one dimension may be `[]`.
fn reshape_dims(numel: usize, from: &[usize], args: &[Value]) -> Result<Vec<usize>> {
    let mut dims: Vec<Option<usize>> = match args {
        [v] => {
            let a = array_of(v, "reshape")?;
            if a.numel() < 2 {
                return Err(rt_err!("reshape: SIZE must have 2 or more dimensions"));
            }
            a.data().to_f64_vec().into_iter().map(|x| Some(x.max(0.0) as usize)).collect()
        }
        many => many
            .iter()
            .map(|v| if crate::interp::index::is_null(v) { Ok(None) } else { count_of(v, "reshape").map(Some) })
            .collect::<Result<_>>()?,
    };
    let holes = dims.iter().filter(|d| d.is_none()).count();
    if holes > 1 {
        return Err(rt_err!("reshape: only a single dimension can be unknown"));
    }
    let known = dims
        .iter()
        .flatten()
        .try_fold(1usize, |n, &d| n.checked_mul(d))
        .ok_or_else(too_large)?;
    if holes == 1 {
        if known == 0 || numel % known != 0 {
            return Err(rt_err!(
                "reshape: SIZE is not divisible by the product of known dimensions (= {known})"
            ));
        }
        for d in dims.iter_mut().filter(|d| d.is_none()) {
            *d = Some(numel / known);
        }
    }
    let shape: Vec<usize> = dims.into_iter().flatten().collect();
    if checked_numel(&shape)? != numel {
        return Err(rt_err!(
            "reshape: can't reshape {} array to {} array",
            dims_str(from),
            dims_str(&shape)
        ));
    }
    Ok(normalize_shape(&shape))
}

// ── Cells ─────────────────────────────────────────────────────────────────────

fn cell2mat(v: &Value) -> Result<Value> {
    let Value::Cell(c) = v else {
        return Err(rt_err!("cell2mat: C must be a cell array"));
    };
    if c.is_empty() {
        return Ok(Value::empty());
    }
    if c.elems().iter().any(|e| matches!(e, Value::Cell(_) | Value::Struct(_) | Value::FunctionHandle(_))) {
        return Err(rt_err!("cell2mat: wrong type elements or mixed cells, structs, and matrices"));
    }
    if c.shape().len() > 2 {
        return Err(rt_err!("cell2mat: C must be a 2-D cell array"));
    }
    let (r, cols) = (c.shape()[0], c.shape()[1]);
    let rows = (0..r)
        .map(|i| ops::horzcat((0..cols).map(|j| c.elems()[i + j * r].clone()).collect()))
        .collect::<Result<Vec<_>>>()?;
    ops::vertcat(rows)
}

fn cellstr(v: &Value) -> Result<Value> {
    match v {
        Value::Cell(c) if cellstr_of(v).is_some() => Ok(Value::Cell(c.clone())),
        Value::Char(a) if a.ndims() == 2 => {
            let rows = a.text_rows().unwrap_or_default();
            let rows: Vec<String> = rows.iter().map(|s| s.trim_end().to_string()).collect();
            Ok(cellstr_value(vec![rows.len(), 1], rows))
        }
        _ => Err(rt_err!("cellstr: argument STRING must be a 2-D character array")),
    }
}

/// The `k`-th element of an `arrayfun`/`cellfun` input.
fn element(v: &Value, k: usize, unwrap_cells: bool) -> Value {
    match v {
        Value::Cell(c) if unwrap_cells => c.elems()[k].clone(),
        Value::Cell(c) => Value::Cell(c.take(&[k], vec![1, 1])),
        Value::Matrix(a) | Value::Char(a) => Value::numeric(a.take(&[k], vec![1, 1])),
        other => other.clone(),
    }
}

/// `cellfun` and `arrayfun`.
fn map_elements(oct: &mut Octave, name: &str, args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    let Some((func, rest)) = args.split_first() else {
        return Err(usage(name));
    };
    let mut inputs = rest.to_vec();
    let mut uniform = true;
    let mut handler = None;
    while inputs.len() >= 3 {
        let key = inputs[inputs.len() - 2].as_text().map(|k| k.to_ascii_lowercase());
        match key.as_deref() {
            Some("uniformoutput") => uniform = truth(&inputs[inputs.len() - 1]).unwrap_or(false),
            Some("errorhandler") => handler = Some(inputs[inputs.len() - 1].clone()),
            _ => break,
        }
        inputs.truncate(inputs.len() - 2);
    }
    let Some(first) = inputs.first() else {
        return Err(usage(name));
    };
    let cells = name == "cellfun";
    if cells && inputs.iter().any(|v| !v.is_cell()) {
        return Err(rt_err!("cellfun: C must be a cell array"));
    }
    let shape = first.shape();
    if inputs.iter().any(|v| v.shape() != shape) {
        return Err(rt_err!("{name}: all the input arguments must have the same size and shape"));
    }
    let n = first.numel();
    let nout = nargout.max(1);
    let mut outs: Vec<Vec<Value>> = vec![Vec::with_capacity(n); nout];
    for k in 0..n {
        let call_args: Vec<Value> = inputs.iter().map(|v| element(v, k, cells)).collect();
        let vals = match oct.call_callable(func, call_args.clone(), nout) {
            Ok(vals) => vals,
            Err(e) => match &handler {
                Some(h) => {
                    let mut info = error_struct(&e);
                    if let Value::Struct(s) = &mut info {
                        s.remove("stack");
                        s.insert("index", Value::double((k + 1) as f64));
                    }
                    let mut handler_args = vec![info];
                    handler_args.extend(call_args);
                    oct.call_callable(h, handler_args, nout)?
                }
                None => return Err(e),
            },
        };
        if vals.len() < nout {
            if nargout == 0 {
                continue;
            }
            return Err(rt_err!("{name}: function returned fewer than nargout values"));
        }
        for (out, v) in outs.iter_mut().zip(vals) {
            out.push(v);
        }
    }
    if nargout == 0 && outs[0].len() < n {
        return Ok(Vec::new());
    }
    outs.into_iter()
        .map(|vals| if uniform { uniform_array(name, &shape, vals) } else { Ok(Value::Cell(CellArray::from_parts(shape.clone(), vals))) })
        .collect()
}

/// Join per-element scalar results into one array of `shape`.
fn uniform_array(name: &str, shape: &[usize], vals: Vec<Value>) -> Result<Value> {
    let mut data: Option<Buffer> = None;
    for v in &vals {
        let a = match v.to_array() {
            Some(a) if a.numel() == 1 => a,
            _ => {
                return Err(rt_err!(
                    "{name}: all values must be scalars when UniformOutput = true; use the 'UniformOutput', false options"
                ))
            }
        };
        match &mut data {
            Some(buf) => buf.append(a.data()),
            None => data = Some(a.into_data()),
        }
    }
    let data = data.unwrap_or_else(|| Buffer::zeros(ElemType::Double, 0));
    Ok(Value::numeric(NdArray::from_parts(shape.to_vec(), data)))
}

// ── Structs ───────────────────────────────────────────────────────────────────

/// `struct('name', value, ...)`.  A cell value supplies its single element.
fn make_struct(args: &[Value]) -> Result<StructValue> {
    if args.len() % 2 != 0 {
        return Err(rt_err!("struct: additional arguments must occur as \"field\", VALUE pairs"));
    }
    let mut s = StructValue::new();
    for pair in args.chunks(2) {
        let field = pair[0]
            .as_text()
            .ok_or_else(|| rt_err!("struct: additional arguments must occur as \"field\", VALUE pairs"))?;
        let value = match &pair[1] {
            Value::Cell(c) if c.numel() == 1 => c.elems()[0].clone(),
            Value::Cell(_) => return Err(rt_err!("struct: struct arrays are not supported")),
            other => other.clone(),
        };
        s.insert(field, value);
    }
    Ok(s)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::interp::{parse, Octave};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn eval_in(oct: &mut Octave, code: &str) -> Result<Value, String> {
        let program = parse(code).map_err(|e| e.to_string())?;
        oct.run_program(&program, 1).map(|mut v| v.remove(0)).map_err(|e| e.message)
    }

    fn eval(code: &str) -> Value {
        eval_in(&mut Octave::new(), code).unwrap()
    }

    fn fails(code: &str) -> String {
        eval_in(&mut Octave::new(), code).unwrap_err()
    }

    #[test]
    fn tiling_and_reshaping() {
        assert_eq!(eval("repmat([1 2], 2, 2)"), eval("[1 2 1 2; 1 2 1 2]"));
        assert_eq!(eval("size(repmat(5, 0, 3))"), Value::row(vec![0.0, 3.0]));
        assert_eq!(eval("reshape(1:6, 3, 2)"), eval("[1 4; 2 5; 3 6]"));
        assert_eq!(eval("size(reshape(1:6, [], 3))"), Value::row(vec![2.0, 3.0]));
        assert_eq!(fails("reshape(1:6, 4, 2)"), "reshape: can't reshape 1x6 array to 4x2 array");
        assert_eq!(eval("fliplr([1 2 3])"), Value::row(vec![3.0, 2.0, 1.0]));
        assert_eq!(eval("flipud([1; 2])"), eval("[2; 1]"));
        assert_eq!(eval("cat(1, [1 2], [3 4])"), eval("[1 2; 3 4]"));
    }

    #[test]
    fn cell_construction() {
        assert_eq!(eval("size(cell(2, 3))"), Value::row(vec![2.0, 3.0]));
        assert_eq!(eval("class(num2cell([1 2]))"), Value::str("cell"));
        assert_eq!(eval("cell2mat({1 2; 3 4})"), eval("[1 2; 3 4]"));
        assert_eq!(eval("c = cellstr(['ab '; 'cde']); c{1}"), Value::str("ab"));
    }

    #[test]
    fn mapping_functions() {
        assert_eq!(eval("cellfun(@numel, {'ab', 'cde', ''})"), Value::row(vec![2.0, 3.0, 0.0]));
        assert_eq!(eval("cellfun('isempty', {[], 1})"), eval("[true false]"));
        assert_eq!(eval("arrayfun(@abs, [-1 2])"), Value::row(vec![1.0, 2.0]));
        let c = eval("cellfun(@upper, {'a', 'b'}, 'UniformOutput', false)");
        assert_eq!(c.class_name(), "cell");
        assert!(fails("cellfun(@upper, {'ab'})").contains("UniformOutput"));
        assert_eq!(eval("[a, b] = deal(7); b"), Value::double(7.0));
    }

    #[test]
    fn struct_functions() {
        let mut oct = Octave::new();
        eval_in(&mut oct, "s = struct('a', 1, 'b', {'x'});").unwrap();
        assert_eq!(eval_in(&mut oct, "s.b").unwrap(), Value::str("x"));
        assert_eq!(eval_in(&mut oct, "numel(fieldnames(s))").unwrap(), Value::double(2.0));
        assert_eq!(eval_in(&mut oct, "isfield(s, 'a')").unwrap(), Value::logical(true));
        assert_eq!(eval_in(&mut oct, "isfield(s, {'a', 'z'})").unwrap(), eval("[true false]"));
        assert_eq!(eval_in(&mut oct, "numfields(rmfield(s, 'a'))").unwrap(), Value::double(1.0));
        assert_eq!(eval_in(&mut oct, "getfield(setfield(s, 'c', 3), 'c')").unwrap(), Value::double(3.0));
        assert!(fails("struct('a', {1, 2})").contains("struct arrays are not supported"));
        assert!(fails("rmfield(struct('a', 1), 'q')").contains("does not contain"));
    }
}
