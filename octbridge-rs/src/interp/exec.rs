//! Statement execution.

use super::ast::{Block, Expr, LValue, Program, Stmt, StmtKind};
use super::error::{rt_err, Result, RuntimeError};
use super::index::Elems;
use super::{format, ops, Octave};
use crate::value::{truth, StructValue, Value};

/// How a block finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

/// The `err` struct bound by `catch err`.
pub(crate) fn error_struct(e: &RuntimeError) -> Value {
    let mut stack = StructValue::new();
    stack.insert("file", Value::str(""));
    stack.insert("name", Value::str(e.function.as_deref().unwrap_or("")));
    stack.insert("line", Value::double(0.0));
    stack.insert("column", Value::double(0.0));
    let mut s = StructValue::new();
    s.insert("message", Value::str(&e.message));
    s.insert("identifier", Value::str(e.identifier.as_deref().unwrap_or("")));
    s.insert("stack", Value::Struct(stack));
    Value::Struct(s)
}

/// Loop items of `for x = v`: the columns of `v`.
fn for_items(v: Value) -> Vec<Value> {
    fn columns<T: Elems>(a: &T) -> Vec<T> {
        let dims = a.dims();
        let rows = dims[0];
        let cols: usize = if a.count() == 0 { 0 } else { dims[1..].iter().product() };
        (0..cols)
            .map(|j| {
                let idx: Vec<usize> = (j * rows..(j + 1) * rows).collect();
                a.take(&idx, vec![rows, 1])
            })
            .collect()
    }
    match v {
        Value::Matrix(a) | Value::Char(a) => columns(&a).into_iter().map(Value::numeric).collect(),
        Value::Cell(c) => columns(&c).into_iter().map(Value::Cell).collect(),
        other => vec![other],
    }
}

/// Whether a `case` label matches the `switch` value.
fn case_matches(subject: &Value, label: &Value) -> bool {
    match label {
        Value::Cell(c) => c.elems().iter().any(|l| case_matches(subject, l)),
        Value::Char(_) => subject.is_char() && subject.as_text() == label.as_text(),
        _ if subject.is_char() || subject.is_empty() => false,
        _ => ops::binary(super::ast::BinOp::Eq, subject, label)
            .ok()
            .and_then(|r| truth(&r))
            .unwrap_or(false),
    }
}

impl Octave {
    pub(crate) fn exec_block(&mut self, block: &[Stmt]) -> Result<Flow> {
        for stmt in block {
            match self.exec_stmt(stmt)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow> {
        match &stmt.kind {
            StmtKind::Expr { expr, print } => {
                self.exec_expr_stmt(expr, *print, 0)?;
            }
            StmtKind::Assign { lhs, rhs, print } => {
                self.exec_assign(lhs, rhs, *print)?;
            }
            StmtKind::If { clauses, else_block } => {
                for (cond, body) in clauses {
                    let v = self.eval_expr(cond)?;
                    if ops::is_true(&v)? {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = else_block {
                    return self.exec_block(body);
                }
            }
            StmtKind::While { cond, body } => loop {
                let v = self.eval_expr(cond)?;
                if !ops::is_true(&v)? {
                    break;
                }
                match self.exec_block(body)? {
                    Flow::Break => break,
                    Flow::Return => return Ok(Flow::Return),
                    Flow::Normal | Flow::Continue => {}
                }
            },
            StmtKind::For { var, iter, body } => {
                let v = self.eval_expr(iter)?;
                for item in for_items(v) {
                    self.assign_lvalue(var, item)?;
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Return => return Ok(Flow::Return),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
            }
            StmtKind::Switch { subject, cases, default } => {
                let v = self.eval_expr(subject)?;
                for (label, body) in cases {
                    let l = self.eval_expr(label)?;
                    if case_matches(&v, &l) {
                        return self.exec_block(body);
                    }
                }
                if let Some(body) = default {
                    return self.exec_block(body);
                }
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Return => return Ok(Flow::Return),
            StmtKind::Global(decls) => {
                for (name, init) in decls {
                    let fresh = !self.globals.contains_key(name);
                    self.declare_global(name);
                    if let (Some(e), true) = (init, fresh) {
                        let v = self.eval_expr(e)?;
                        self.globals.insert(name.clone(), v);
                    }
                }
            }
            StmtKind::TryCatch { body, ident, handler } => return self.exec_try(body, ident.as_deref(), handler),
            StmtKind::UnwindProtect { body, cleanup } => {
                let result = self.exec_block(body);
                let after = self.exec_block(cleanup)?;
                let flow = result?;
                return Ok(if after == Flow::Normal { flow } else { after });
            }
            StmtKind::Command { name, args, .. } => {
                let args = args.iter().map(|a| Value::str(a)).collect();
                self.call_function(name, args, 0)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(&mut self, body: &Block, ident: Option<&str>, handler: &Block) -> Result<Flow> {
        let frames = self.frames.len();
        let ends = self.end_stack.len();
        match self.exec_block(body) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                self.truncate_frames(frames);
                self.end_stack.truncate(ends);
                tracing::debug!(error = %e, "error caught");
                if let Some(name) = ident {
                    self.assign(name, error_struct(&e));
                }
                self.last_error = Some(e);
                self.exec_block(handler)
            }
        }
    }

    /// Run an expression statement, returning the values it produced.
    fn exec_expr_stmt(&mut self, expr: &Expr, print: bool, nargout: usize) -> Result<Vec<Value>> {
        if let Expr::Ident(name) = expr {
            if let Some(v) = self.lookup(name).cloned() {
                if print {
                    self.display(name, &v);
                }
                return Ok(vec![v]);
            }
        }
        let vals = self.eval_multi(expr, nargout)?;
        if let Some(v) = vals.first() {
            self.assign("ans", v.clone());
            if print {
                self.display("ans", v);
            }
        }
        Ok(vals)
    }

    /// Run an assignment, returning the assigned values.
    fn exec_assign(&mut self, lhs: &[LValue], rhs: &Expr, print: bool) -> Result<Vec<Value>> {
        let vals = if lhs.len() == 1 {
            vec![self.eval_expr(rhs)?]
        } else {
            self.eval_multi(rhs, lhs.len())?
        };
        for (k, lv) in lhs.iter().enumerate() {
            match (vals.get(k), lv) {
                (_, LValue::Ignore) => {}
                (Some(v), _) => self.assign_lvalue(lv, v.clone())?,
                (None, _) => {
                    return Err(rt_err!("element number {} undefined in return list", k + 1));
                }
            }
        }
        if print {
            for lv in lhs {
                if let LValue::Var { name, .. } = lv {
                    if let Some(v) = self.lookup(name).cloned() {
                        self.display(name, &v);
                    }
                }
            }
        }
        Ok(vals)
    }

    fn display(&mut self, name: &str, v: &Value) {
        let text = format::display(name, v);
        self.print(&text);
    }

    /// Run a parsed program in the active frame.
    ///
    /// With `nargout > 0` the final statement supplies the result: the
    /// values of an expression (called with `nargout` outputs) or the
    /// values an assignment stored.
    pub(crate) fn run_program(&mut self, program: &Program, nargout: usize) -> Result<Vec<Value>> {
        self.define_functions(program);
        let Some((last, init)) = program.body.split_last() else {
            return Ok(Vec::new());
        };
        for stmt in init {
            if self.exec_stmt(stmt)? == Flow::Return {
                return Ok(Vec::new());
            }
        }
        match &last.kind {
            StmtKind::Expr { expr, print } if nargout > 0 => self.exec_expr_stmt(expr, *print, nargout),
            StmtKind::Assign { lhs, rhs, print } if nargout > 0 => self.exec_assign(lhs, rhs, *print),
            _ => {
                self.exec_stmt(last)?;
                Ok(Vec::new())
            }
        }
    }

    /// Run a script file's statements in the active frame.
    pub(crate) fn run_script(&mut self, program: &Program) -> Result<()> {
        self.define_functions(program);
        self.exec_block(&program.body)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::parse;
    use pretty_assertions::assert_eq;

    fn run(oct: &mut Octave, code: &str) -> Result<Vec<Value>> {
        let program = parse(code).map_err(RuntimeError::from)?;
        oct.run_program(&program, 1)
    }

    #[test]
    fn loops_and_flow() {
        let mut oct = Octave::new();
        let v = run(&mut oct, "s = 0; for k = 1:10\n if k == 3, continue; end\n if k > 5, break; end\n s = s + k;\nend\ns").unwrap();
        assert_eq!(v, vec![Value::double(12.0)]);
        let v = run(&mut oct, "n = 0; while n < 4\n n = n + 1;\nend\nn").unwrap();
        assert_eq!(v, vec![Value::double(4.0)]);
    }

    #[test]
    fn for_iterates_columns() {
        let mut oct = Octave::new();
        let v = run(&mut oct, "n = 0; for c = [1 2; 3 4]\n n = n + 1; last = c;\nend\nlast").unwrap();
        assert_eq!(oct.lookup("n"), Some(&Value::double(2.0)));
        assert_eq!(v[0].shape(), vec![2, 1]);
        let v = run(&mut oct, "k = 0; for x = zeros(0, 3)\n k = k + 1;\nend\nk").unwrap();
        assert_eq!(v, vec![Value::double(0.0)]);
    }

    #[test]
    fn switch_matches_strings_and_cells() {
        let mut oct = Octave::new();
        let code = "function r = kind(x)\n switch x\n case {'a', 'b'}\n r = 1;\n case 'c'\n r = 2;\n case 3\n r = 3;\n otherwise\n r = 0;\n end\nend\n";
        run(&mut oct, code).unwrap();
        assert_eq!(run(&mut oct, "kind('b')").unwrap(), vec![Value::double(1.0)]);
        assert_eq!(run(&mut oct, "kind('c')").unwrap(), vec![Value::double(2.0)]);
        assert_eq!(run(&mut oct, "kind(3)").unwrap(), vec![Value::double(3.0)]);
        assert_eq!(run(&mut oct, "kind('zz')").unwrap(), vec![Value::double(0.0)]);
    }

    #[test]
    fn try_catch_binds_error() {
        let mut oct = Octave::new();
        let v = run(&mut oct, "try\n error('my:id', 'bad %d', 3);\ncatch err\n m = err.message;\nend\nm").unwrap();
        assert_eq!(v, vec![Value::str("bad 3")]);
        let v = run(&mut oct, "err.identifier").unwrap();
        assert_eq!(v, vec![Value::str("my:id")]);
    }

    #[test]
    fn unwind_protect_runs_cleanup_on_error() {
        let mut oct = Octave::new();
        let e = run(&mut oct, "unwind_protect\n error('boom');\nunwind_protect_cleanup\n cleaned = 1;\nend_unwind_protect").unwrap_err();
        assert_eq!(e.message, "boom");
        assert_eq!(oct.lookup("cleaned"), Some(&Value::double(1.0)));
    }

    #[test]
    fn multi_assignment_checks_count() {
        let mut oct = Octave::new();
        let v = run(&mut oct, "[r, c] = size(zeros(2, 3))").unwrap();
        assert_eq!(v, vec![Value::double(2.0), Value::double(3.0)]);
        run(&mut oct, "function a = one()\n a = 1;\nend\n").unwrap();
        let e = run(&mut oct, "[p, q] = one()").unwrap_err();
        assert!(e.message.contains("called with too many outputs"), "{}", e.message);
    }

    #[test]
    fn display_sets_ans() {
        let mut oct = Octave::new();
        run(&mut oct, "1 + 1").unwrap();
        assert_eq!(oct.output, "ans = 2\n");
        assert_eq!(oct.lookup("ans"), Some(&Value::double(2.0)));
    }

    #[test]
    fn globals_are_shared_between_frames() {
        let mut oct = Octave::new();
        run(&mut oct, "function bump()\n global counter\n counter = counter + 1;\nend\nglobal counter = 10\nbump(); bump();").unwrap();
        assert_eq!(oct.globals.get("counter"), Some(&Value::double(12.0)));
    }
}
