//! Expression evaluation, function calls and indexed assignment.

use std::sync::Arc;

use super::ast::{Access, Expr, FunctionDef, LValue};
use super::error::{rt_err, Result, RuntimeError};
use super::frame::{Frame, Subfunctions};
use super::index::{self, IndexArg};
use super::loader::Loaded;
use super::{builtins, ops, EndContext, HostFn, Octave, MAX_RECURSION_DEPTH};
use crate::array::{Complex64, Number};
use crate::marshal;
use crate::value::{CellArray, FunctionHandle, StructValue, Value};

/// How a value is described in "cannot be indexed" errors.
fn indexed_kind(v: &Value) -> &'static str {
    match v {
        Value::Scalar(_) => "scalar",
        Value::Matrix(_) | Value::Char(_) => "matrix",
        Value::Cell(_) => "cell array",
        Value::Struct(_) => "scalar struct",
        Value::FunctionHandle(_) => "function handle",
    }
}

fn recursion_error() -> RuntimeError {
    RuntimeError::with_id(
        "Octave:recursion-depth",
        format!("max_recursion_depth exceeded (limit {MAX_RECURSION_DEPTH})"),
    )
}

impl Octave {
    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate an expression that must produce exactly one value.
    pub(crate) fn eval_expr(&mut self, e: &Expr) -> Result<Value> {
        match e {
            Expr::Num(x) => Ok(Value::double(*x)),
            Expr::Imag(x) => Ok(Value::Scalar(Number::ComplexDouble(Complex64::new(0.0, *x)))),
            Expr::Str { text, .. } => Ok(Value::str(text)),
            Expr::Colon => Ok(Value::str(":")),
            Expr::End => self.end_value(),
            Expr::Unary(op, x) => {
                let v = self.eval_expr(x)?;
                ops::unary(*op, &v)
            }
            Expr::Binary(op, a, b) => {
                let a = self.eval_expr(a)?;
                let b = self.eval_expr(b)?;
                ops::binary(*op, &a, &b)
            }
            Expr::AndAnd(a, b) => {
                let a = self.eval_expr(a)?;
                if !ops::logical_scalar(&a, "&&")? {
                    return Ok(Value::logical(false));
                }
                let b = self.eval_expr(b)?;
                Ok(Value::logical(ops::logical_scalar(&b, "&&")?))
            }
            Expr::OrOr(a, b) => {
                let a = self.eval_expr(a)?;
                if ops::logical_scalar(&a, "||")? {
                    return Ok(Value::logical(true));
                }
                let b = self.eval_expr(b)?;
                Ok(Value::logical(ops::logical_scalar(&b, "||")?))
            }
            Expr::Range { start, step, stop } => {
                let start = self.eval_expr(start)?;
                let step = step.as_ref().map(|s| self.eval_expr(s)).transpose()?;
                let stop = self.eval_expr(stop)?;
                ops::range(&start, step.as_ref(), &stop)
            }
            Expr::Matrix(rows) => {
                let mut built = Vec::with_capacity(rows.len());
                for row in rows {
                    let items = self.eval_args(row)?;
                    built.push(ops::horzcat(items)?);
                }
                match built.len() {
                    0 => Ok(Value::empty()),
                    1 => Ok(built.remove(0)),
                    _ => ops::vertcat(built),
                }
            }
            Expr::CellLit(rows) => {
                let mut built = Vec::with_capacity(rows.len());
                for row in rows.iter().filter(|r| !r.is_empty()) {
                    let items = self.eval_args(row)?;
                    built.push(Value::Cell(CellArray::row(items)));
                }
                match built.len() {
                    0 => Ok(Value::Cell(CellArray::default())),
                    1 => Ok(built.remove(0)),
                    _ => ops::vertcat(built),
                }
            }
            Expr::FuncHandle(name) => Ok(Value::FunctionHandle(FunctionHandle { name: name.clone() })),
            Expr::Ident(_) | Expr::Index { .. } => self
                .eval_multi(e, 1)?
                .into_iter()
                .next()
                .ok_or_else(|| rt_err!("value on right hand side of assignment is undefined")),
        }
    }

    /// Evaluate an expression that may produce several values: a function
    /// call with `nargout` outputs, or a cs-list such as `c{:}`.
    pub(crate) fn eval_multi(&mut self, e: &Expr, nargout: usize) -> Result<Vec<Value>> {
        match e {
            Expr::Ident(name) => {
                if let Some(v) = self.lookup(name) {
                    return Ok(vec![v.clone()]);
                }
                self.call_function(name, Vec::new(), nargout)
            }
            Expr::Index { base, chain } => self.eval_index(base, chain, nargout),
            _ => Ok(vec![self.eval_expr(e)?]),
        }
    }

    /// Evaluate argument expressions, splicing cs-lists.
    pub(crate) fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::Index { .. } | Expr::Ident(_) => out.extend(self.eval_multi(arg, 1)?),
                _ => out.push(self.eval_expr(arg)?),
            }
        }
        Ok(out)
    }

    fn end_value(&self) -> Result<Value> {
        let ctx = self
            .end_stack
            .last()
            .ok_or_else(|| rt_err!("'end': nonconformant arguments"))?;
        let n = if ctx.count == 1 {
            ctx.shape.iter().product()
        } else if ctx.position + 1 == ctx.count {
            ctx.shape.iter().skip(ctx.position).product()
        } else {
            ctx.shape.get(ctx.position).copied().unwrap_or(1)
        };
        Ok(Value::double(n as f64))
    }

    /// Evaluate index arguments against a value of `shape`, with `end`
    /// bound to that shape.
    pub(crate) fn eval_index_args(&mut self, shape: &[usize], args: &[Expr]) -> Result<Vec<IndexArg>> {
        let count = args.len();
        let mut out = Vec::with_capacity(count);
        for (position, arg) in args.iter().enumerate() {
            if matches!(arg, Expr::Colon) {
                out.push(IndexArg::Colon);
                continue;
            }
            self.end_stack.push(EndContext { shape: shape.to_vec(), position, count });
            let v = self.eval_expr(arg);
            self.end_stack.pop();
            let v = v?;
            if v.as_text().as_deref() == Some(":") {
                out.push(IndexArg::Colon);
            } else {
                out.push(IndexArg::Value(v));
            }
        }
        Ok(out)
    }

    fn field_name(&mut self, e: &Expr) -> Result<String> {
        self.eval_expr(e)?
            .as_text()
            .ok_or_else(|| rt_err!("dynamic structure field names must be strings"))
    }

    fn eval_index(&mut self, base: &Expr, chain: &[Access], nargout: usize) -> Result<Vec<Value>> {
        if let Expr::Ident(name) = base {
            if let Some(v) = self.lookup(name) {
                let v = v.clone();
                return self.apply_chain(v, chain, nargout);
            }
            let (args, rest) = match chain.split_first() {
                Some((Access::Paren(args), rest)) => (self.eval_args(args)?, rest),
                _ => (Vec::new(), chain),
            };
            let want = if rest.is_empty() { nargout } else { 1 };
            let vals = self.call_function(name, args, want)?;
            if rest.is_empty() {
                return Ok(vals);
            }
            let first = vals
                .into_iter()
                .next()
                .ok_or_else(|| rt_err!("indexing undefined value"))?;
            return self.apply_chain(first, rest, nargout);
        }
        let v = self.eval_expr(base)?;
        self.apply_chain(v, chain, nargout)
    }

    fn apply_chain(&mut self, v: Value, chain: &[Access], nargout: usize) -> Result<Vec<Value>> {
        let mut cur = vec![v];
        for (i, access) in chain.iter().enumerate() {
            let last = i + 1 == chain.len();
            if cur.len() != 1 {
                return Err(rt_err!("a cs-list cannot be further indexed"));
            }
            let Some(val) = cur.pop() else {
                return Err(rt_err!("indexing produces no results"));
            };
            cur = match access {
                Access::Paren(args) => match val {
                    Value::FunctionHandle(fh) => {
                        let args = self.eval_args(args)?;
                        self.call_function(&fh.name, args, if last { nargout } else { 1 })?
                    }
                    val => {
                        let idx = self.eval_index_args(&val.shape(), args)?;
                        vec![index::index_value(&val, &idx)?]
                    }
                },
                Access::Brace(args) => match val {
                    Value::Cell(c) => {
                        let idx = self.eval_index_args(c.shape(), args)?;
                        index::brace_values(&c, &idx)?
                    }
                    other => {
                        return Err(rt_err!("{} cannot be indexed with {{", indexed_kind(&other)))
                    }
                },
                Access::Field(name) => vec![field_of(val, name)?],
                Access::DynField(e) => {
                    let name = self.field_name(e)?;
                    vec![field_of(val, &name)?]
                }
            };
        }
        Ok(cur)
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    pub(crate) fn assign_lvalue(&mut self, lv: &LValue, rhs: Value) -> Result<()> {
        match lv {
            LValue::Ignore => Ok(()),
            LValue::Var { name, chain } if chain.is_empty() => {
                self.assign(name, rhs);
                Ok(())
            }
            LValue::Var { name, chain } => {
                let current = self.lookup(name).cloned();
                let updated = self.assign_into(current, chain, rhs)?;
                self.assign(name, updated);
                Ok(())
            }
        }
    }

    /// The value of `base` after `base<chain> = rhs`.
    fn assign_into(&mut self, base: Option<Value>, chain: &[Access], rhs: Value) -> Result<Value> {
        let Some((first, rest)) = chain.split_first() else {
            return Ok(rhs);
        };
        match first {
            Access::Field(name) => self.assign_field(base, name.clone(), rest, rhs),
            Access::DynField(e) => {
                let name = self.field_name(e)?;
                self.assign_field(base, name, rest, rhs)
            }
            Access::Paren(args) => {
                let base = base.unwrap_or_default();
                let idx = self.eval_index_args(&base.shape(), args)?;
                if rest.is_empty() {
                    return index::assign_value(base, &idx, rhs);
                }
                // `s(1).f = v`: only the single element of a scalar struct.
                let single = idx.iter().all(|a| match a {
                    IndexArg::Colon => true,
                    IndexArg::Value(v) => v.scalar_f64() == Some(1.0),
                });
                match base {
                    _ if !single => Err(rt_err!("struct arrays are not supported")),
                    Value::Struct(_) => self.assign_into(Some(base), rest, rhs),
                    v if index::is_null(&v) => self.assign_into(None, rest, rhs),
                    v => Err(rt_err!("{} cannot be indexed with {}", indexed_kind(&v), access_symbol(&rest[0]))),
                }
            }
            Access::Brace(args) => {
                let cell = match base {
                    None => CellArray::default(),
                    Some(Value::Cell(c)) => c,
                    Some(v) if index::is_null(&v) => CellArray::default(),
                    Some(v) => {
                        return Err(rt_err!("{} cannot be indexed with {{", indexed_kind(&v)))
                    }
                };
                let idx = self.eval_index_args(cell.shape(), args)?;
                let elem = if rest.is_empty() {
                    rhs
                } else {
                    let current = index::cell_element(&cell, &idx)?;
                    self.assign_into(current, rest, rhs)?
                };
                index::assign_value(Value::Cell(cell), &idx, Value::Cell(CellArray::row(vec![elem])))
            }
        }
    }

    fn assign_field(&mut self, base: Option<Value>, name: String, rest: &[Access], rhs: Value) -> Result<Value> {
        let mut s = match base {
            None => StructValue::new(),
            Some(Value::Struct(s)) => s,
            Some(v) if index::is_null(&v) => StructValue::new(),
            Some(v) => return Err(rt_err!("{} cannot be indexed with .", indexed_kind(&v))),
        };
        let updated = if rest.is_empty() {
            rhs
        } else {
            let current = s.get_mut(&name).map(std::mem::take);
            self.assign_into(current, rest, rhs)?
        };
        s.insert(name, updated);
        Ok(Value::Struct(s))
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn subfunction(&self, name: &str) -> Option<(Arc<FunctionDef>, Subfunctions)> {
        let subs = self.frame().subfunctions.as_ref()?;
        subs.get(name).map(|def| (Arc::clone(def), Arc::clone(subs)))
    }

    /// Call a function by name.
    pub(crate) fn call_function(&mut self, name: &str, args: Vec<Value>, nargout: usize) -> Result<Vec<Value>> {
        if let Some((def, subs)) = self.subfunction(name) {
            return self.call_user(&def, args, nargout, Some(subs));
        }
        if let Some(def) = self.functions.get(name).cloned() {
            return self.call_user(&def, args, nargout, None);
        }
        if let Some(f) = self.host_fns.get(name).cloned() {
            return self.call_host(name, &f, &args, nargout);
        }
        match self.loader.lookup(name)? {
            Some(Loaded::Function { main, subs }) => return self.call_user(&main, args, nargout, Some(subs)),
            Some(Loaded::Script(program)) => {
                self.run_script(&program)?;
                return Ok(Vec::new());
            }
            None => {}
        }
        if let Some(result) = builtins::call(self, name, args, nargout) {
            let mut vals = result?;
            vals.truncate(nargout.max(1));
            return Ok(vals);
        }
        Err(RuntimeError::with_id("Octave:undefined-function", format!("'{name}' undefined")))
    }

    /// Call a function handle or a function named by a string.
    pub(crate) fn call_callable(&mut self, f: &Value, args: Vec<Value>, nargout: usize) -> Result<Vec<Value>> {
        let name = match f {
            Value::FunctionHandle(fh) => fh.name.clone(),
            other => other
                .as_text()
                .ok_or_else(|| rt_err!("feval: FUNC must be a string or function handle"))?,
        };
        self.call_function(&name, args, nargout)
    }

    pub(crate) fn call_user(
        &mut self,
        def: &Arc<FunctionDef>,
        args: Vec<Value>,
        nargout: usize,
        subs: Option<Subfunctions>,
    ) -> Result<Vec<Value>> {
        let name = def.name.as_str();
        let fixed = def.params.len() - usize::from(def.takes_varargin());
        if args.len() > fixed && !def.takes_varargin() {
            return Err(RuntimeError::with_id(
                "Octave:invalid-fun-call",
                format!("{name}: function called with too many inputs"),
            ));
        }
        let max_out = if def.gives_varargout() { usize::MAX } else { def.outputs.len() };
        if nargout > max_out.max(1) {
            return Err(RuntimeError::with_id(
                "Octave:invalid-fun-call",
                format!("{name}: function called with too many outputs"),
            ));
        }
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(recursion_error());
        }

        let nargin = args.len();
        let mut frame = Frame::for_call(name, nargin, nargout);
        frame.subfunctions = subs;
        let mut args = args.into_iter();
        for param in &def.params[..fixed] {
            let Some(v) = args.next() else { break };
            if param != "~" {
                frame.vars.insert(param.clone(), v);
            }
        }
        if def.takes_varargin() {
            frame.vars.insert("varargin".into(), Value::Cell(CellArray::row(args.collect())));
        }

        tracing::trace!(function = name, nargin, nargout, "call");
        let base = self.frames.len();
        self.push_frame(frame);
        self.depth += 1;
        let result = self
            .exec_block(&def.body)
            .and_then(|_| self.collect_outputs(def, nargout));
        self.depth -= 1;
        self.truncate_frames(base);
        result.map_err(|e| e.in_function(name))
    }

    fn collect_outputs(&self, def: &FunctionDef, nargout: usize) -> Result<Vec<Value>> {
        let want = nargout.max(1);
        let mut out = Vec::new();
        for (i, name) in def.outputs.iter().enumerate() {
            if out.len() >= want {
                break;
            }
            if def.gives_varargout() && i + 1 == def.outputs.len() {
                if let Some(Value::Cell(c)) = self.lookup("varargout") {
                    out.extend(c.elems().iter().cloned());
                }
                break;
            }
            match self.lookup(name) {
                Some(v) => out.push(v.clone()),
                None if i < nargout => {
                    return Err(RuntimeError::with_id(
                        "Octave:undefined-function",
                        format!("value of '{name}' is undefined on return from '{}'", def.name),
                    ))
                }
                None => break,
            }
        }
        out.truncate(want);
        Ok(out)
    }

    pub(crate) fn call_host(&mut self, name: &str, f: &HostFn, args: &[Value], nargout: usize) -> Result<Vec<Value>> {
        if self.depth >= MAX_RECURSION_DEPTH {
            return Err(recursion_error());
        }
        let host_args = marshal::to_host_all(args)?;
        let _span = tracing::debug_span!("host_callback", function = name).entered();
        tracing::debug!(nargs = host_args.len(), nargout, "calling host function");
        self.depth += 1;
        let result = f(self, &host_args);
        self.depth -= 1;
        let mut vals = marshal::to_interp_all(&result?)?;
        vals.truncate(nargout.max(1));
        Ok(vals)
    }
}

fn access_symbol(a: &Access) -> &'static str {
    match a {
        Access::Paren(_) => "(",
        Access::Brace(_) => "{",
        Access::Field(_) | Access::DynField(_) => ".",
    }
}

fn field_of(v: Value, name: &str) -> Result<Value> {
    match v {
        Value::Struct(s) => s
            .get(name)
            .cloned()
            .ok_or_else(|| rt_err!("invalid use of undefined value")),
        other => Err(rt_err!("{} cannot be indexed with .", indexed_kind(&other))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
