//! Host-facing calls into the interpreter.
//!
//! [`Octave::eval`] runs source text and [`Octave::feval`] calls a function
//! by name.  Both take the number of results wanted up front, convert at
//! the boundary, and either return exactly that many host values or fail
//! with a single [`BridgeError`].  Interpreter state is left consistent on
//! failure: the frame stack is cut back to where the call started.
//!
//! The other direction goes through [`Octave::register_function`]: the
//! registered callback becomes a function that interpreter code can call by
//! name (or through `hostcall`).

use std::path::Path;
use std::sync::Arc;

use crate::error::BridgeError;
use crate::host::HostValue;
use crate::interp::{is_identifier, parse, Octave, RuntimeError};
use crate::marshal;
use crate::value::Value;

impl Octave {
    /// Evaluate `code` in the active frame.
    ///
    /// With `nargout > 0` the last statement must yield at least that many
    /// values: an expression is called with `nargout` outputs, an
    /// assignment yields what it stored.
    pub fn eval(&mut self, nargout: usize, code: &str) -> Result<Vec<HostValue>, BridgeError> {
        let _span = tracing::debug_span!("eval", nargout).entered();
        tracing::trace!(code, "evaluating");
        let program = parse(code).map_err(|e| {
            tracing::debug!(error = %e, "parse failed");
            BridgeError::Parse(e)
        })?;
        let vals = self.guarded(|oct| oct.run_program(&program, nargout))?;
        self.results(vals, nargout)
    }

    /// Call the function `name` with converted arguments.
    pub fn feval(&mut self, nargout: usize, name: &str, args: &[HostValue]) -> Result<Vec<HostValue>, BridgeError> {
        let _span = tracing::debug_span!("feval", function = name, nargout).entered();
        let args = marshal::to_interp_all(args)?;
        tracing::trace!(nargin = args.len(), "calling");
        let vals = self.guarded(|oct| oct.call_function(name, args, nargout))?;
        self.results(vals, nargout)
    }

    /// Run a script file's statements in the active frame.
    pub fn source(&mut self, path: &Path) -> Result<(), BridgeError> {
        let _span = tracing::debug_span!("source", file = %path.display()).entered();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RuntimeError::with_id("Octave:file-not-found", format!("{}: {e}", path.display()))
        })?;
        let program = parse(&text)?;
        self.guarded(|oct| oct.run_script(&program))?;
        Ok(())
    }

    /// Make `f` callable from interpreter code as `name`.
    ///
    /// The callback receives this interpreter, so it may evaluate code or
    /// open a local scope while it runs.  A fault it returns is raised as an
    /// interpreter error at the call site.
    pub fn register_function<F>(&mut self, name: &str, f: F) -> Result<(), BridgeError>
    where
        F: Fn(&mut Octave, &[HostValue]) -> Result<Vec<HostValue>, BridgeError> + Send + Sync + 'static,
    {
        if !is_identifier(name) {
            return Err(BridgeError::VarName(name.to_owned()));
        }
        tracing::debug!(function = name, "host function registered");
        self.host_fns.insert(name.to_owned(), Arc::new(f));
        Ok(())
    }

    /// Remove a host callback.  Returns whether it was registered.
    pub fn unregister_function(&mut self, name: &str) -> bool {
        self.host_fns.remove(name).is_some()
    }

    /// Drain the text printed by the interpreter so far.
    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// The last error raised by interpreter code, as `lasterr` reports it.
    pub fn last_error(&self) -> Option<&RuntimeError> {
        self.last_error.as_ref()
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    /// Run `f`, restoring the frame stack if it fails.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Octave) -> Result<T, RuntimeError>) -> Result<T, BridgeError> {
        let frames = self.frame_depth();
        let ends = self.end_stack.len();
        f(self).map_err(|e| {
            self.truncate_frames(frames);
            self.end_stack.truncate(ends);
            tracing::debug!(error = %e, "interpreter error");
            self.last_error = Some(e.clone());
            BridgeError::Octave(e)
        })
    }

    /// Check the result count and convert.
    fn results(&mut self, mut vals: Vec<Value>, nargout: usize) -> Result<Vec<HostValue>, BridgeError> {
        if vals.len() < nargout {
            let e = RuntimeError::with_id(
                "Octave:undefined-function",
                format!("element number {} undefined in return list", vals.len() + 1),
            );
            self.last_error = Some(e.clone());
            return Err(BridgeError::Octave(e));
        }
        vals.truncate(nargout);
        marshal::to_host_all(&vals)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn num(v: &HostValue) -> f64 {
        v.as_f64().unwrap()
    }

    #[test]
    fn eval_returns_requested_count() {
        let mut oct = Octave::new();
        assert!(oct.eval(0, "x = 3;").unwrap().is_empty());
        let out = oct.eval(1, "x + 1").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(num(&out[0]), 4.0);
        let out = oct.eval(2, "size(zeros(2, 5))").unwrap();
        assert_eq!((num(&out[0]), num(&out[1])), (2.0, 5.0));
    }

    #[test]
    fn eval_too_few_values() {
        let mut oct = Octave::new();
        let e = oct.eval(2, "x = 1").unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Octave);
        assert!(e.to_string().contains("element number 2 undefined in return list"), "{e}");
    }

    #[test]
    fn parse_fault_carries_position() {
        let mut oct = Octave::new();
        match oct.eval(0, "x = (1 + ;").unwrap_err() {
            BridgeError::Parse(p) => assert_eq!(p.line, 1),
            other => panic!("expected a parse fault, got {other:?}"),
        }
    }

    #[test]
    fn runtime_fault_keeps_identifier() {
        let mut oct = Octave::new();
        let e = oct.eval(0, "error('pkg:oops', 'went %s', 'wrong')").unwrap_err();
        assert_eq!(e.identifier(), Some("pkg:oops"));
        assert_eq!(e.to_string(), "(identifier: pkg:oops) went wrong");
        assert_eq!(oct.last_error().map(|e| e.message.as_str()), Some("went wrong"));
    }

    #[test]
    fn feval_user_function() {
        let mut oct = Octave::new();
        oct.eval(
            0,
            "function r = fact(n)\n  if n <= 1\n    r = 1;\n  else\n    r = n * fact(n - 1);\n  end\nend\n",
        )
        .unwrap();
        let out = oct.feval(1, "fact", &[HostValue::Int(5)]).unwrap();
        assert_eq!(num(&out[0]), 120.0);
    }

    #[test]
    fn feval_faults() {
        let mut oct = Octave::new();
        let e = oct.feval(1, "no_such_function", &[]).unwrap_err();
        assert_eq!(e.to_string(), "(identifier: Octave:undefined-function) 'no_such_function' undefined");
        let e = oct.feval(1, "disp", &[HostValue::None]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ObjectConvert);
        let e = oct.feval(1, "str2func", &[HostValue::from("sin")]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::ValueConvert);
    }

    #[test]
    fn failed_call_restores_frames() {
        let mut oct = Octave::new();
        oct.eval(0, "function f()\n  error('inner');\nend\n").unwrap();
        let e = oct.feval(0, "f", &[]).unwrap_err();
        assert_eq!(e.to_string(), "in 'f': inner");
        assert_eq!(oct.frame_depth(), 1);
    }

    #[test]
    fn host_callbacks() {
        let mut oct = Octave::new();
        oct.register_function("twice", |_, args| {
            let x = args.first().and_then(HostValue::as_f64).unwrap_or(0.0);
            Ok(vec![HostValue::Float(2.0 * x)])
        })
        .unwrap();
        assert_eq!(num(&oct.eval(1, "twice(21)").unwrap()[0]), 42.0);
        assert_eq!(num(&oct.eval(1, "hostcall('twice', 4)").unwrap()[0]), 8.0);
        assert_eq!(oct.register_function("9lives", |_, _| Ok(vec![])).unwrap_err().kind(), ErrorKind::VarName);
        assert!(oct.unregister_function("twice"));
    }

    #[test]
    fn callback_faults_are_catchable() {
        let mut oct = Octave::new();
        oct.register_function("lookup_key", |_, _| Err(BridgeError::KeyNotFound("k".into())))
            .unwrap();
        let out = oct
            .eval(1, "try\n  lookup_key();\n  m = 'none';\ncatch err\n  m = err.message;\nend\nm")
            .unwrap();
        assert_eq!(out[0], HostValue::Text("key not found: 'k'".into()));
        let e = oct.eval(0, "lookup_key()").unwrap_err();
        assert_eq!(e.identifier(), Some("octbridge:host-error"));
    }

    #[test]
    fn output_is_drained() {
        let mut oct = Octave::new();
        oct.eval(0, "disp(5); x = 2").unwrap();
        assert_eq!(oct.take_output(), "5\nx = 2\n");
        assert_eq!(oct.take_output(), "");
    }

    #[test]
    fn sourced_scripts_share_the_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("setup.m");
        std::fs::write(&path, "alpha = 1;\nbeta = alpha + 1;\n").unwrap();
        let mut oct = Octave::new();
        oct.source(&path).unwrap();
        assert_eq!(oct.locals().get_value("beta").unwrap(), Value::double(2.0));
        let e = oct.source(&dir.path().join("missing.m")).unwrap_err();
        assert_eq!(e.identifier(), Some("Octave:file-not-found"));
    }
}
