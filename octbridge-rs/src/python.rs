//! Optional Python binding via the `pyo3` crate.
//!
//! Enabled with the `python` Cargo feature:
//! ```text
//! cargo build --features python
//! cargo test  --features python
//! ```
//!
//! # Python `octbridge` module
//!
//! All calls go to the process-wide interpreter of [`crate::runtime`],
//! which is started when the module is created.
//!
//! | Python                                | Effect                                   |
//! |---------------------------------------|------------------------------------------|
//! | `octbridge.eval(nargout, code)`       | evaluate code, return a `nargout`-tuple  |
//! | `octbridge.feval(nargout, name, *a)`  | call a function, return a `nargout`-tuple|
//! | `octbridge.locals`, `octbridge.globals` | variable tables as mappings            |
//! | `@octbridge.local_scope`              | run each call in a fresh frame           |
//!
//! Arrays come back as nested lists, one nesting level per dimension, so a
//! scalar is `[[x]]`.  Char matrices come back as lists of row strings.
//! Going the other way, a rectangular nested list of same-kind numbers is
//! read as an array of that shape, so a value read from `locals` can be
//! written back unchanged.
//!
//! Faults map to `ParseError`, `OctaveError`, `ValueConvertError`,
//! `ObjectConvertError` and `VarNameError`; a missing variable raises
//! `KeyError` and a non-`str` variable name raises `TypeError`.

use std::sync::OnceLock;
use std::thread::ThreadId;

use pyo3::create_exception;
use pyo3::exceptions::{PyException, PyKeyError, PyRuntimeError, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyComplex, PyDict, PyFloat, PyList, PyLong, PyString, PyTuple};

use crate::array::{Buffer, Complex64, NdArray, Number};
use crate::error::BridgeError;
use crate::host::HostValue;
use crate::interp::Frame;
use crate::runtime;
use crate::workspace::{Scope, Workspace};

create_exception!(octbridge, OctaveError, PyException);
create_exception!(octbridge, ParseError, PyException);
create_exception!(octbridge, ValueConvertError, PyException);
create_exception!(octbridge, ObjectConvertError, PyException);
create_exception!(octbridge, VarNameError, PyException);

static PYTHON_INIT: OnceLock<()> = OnceLock::new();

fn to_py_err(e: BridgeError) -> PyErr {
    let msg = e.to_string();
    match e {
        BridgeError::Parse(_) => ParseError::new_err(msg),
        BridgeError::Octave(_) => OctaveError::new_err(msg),
        BridgeError::ValueConvert(_) => ValueConvertError::new_err(msg),
        BridgeError::ObjectConvert(_) => ObjectConvertError::new_err(msg),
        BridgeError::VarName(_) => VarNameError::new_err(msg),
        BridgeError::KeyNotFound(name) => PyKeyError::new_err(name),
        BridgeError::Type(_) => PyTypeError::new_err(msg),
        BridgeError::NotInitialized | BridgeError::Busy => PyRuntimeError::new_err(msg),
    }
}

/// Run `f` on the shared interpreter, flattening both fault layers.
fn with_octave<T>(f: impl FnOnce(&mut crate::Octave) -> Result<T, BridgeError>) -> PyResult<T> {
    runtime::with_octave(f).and_then(|r| r).map_err(to_py_err)
}

// ── Python → host ─────────────────────────────────────────────────────────

fn py_to_host(obj: &Bound<'_, PyAny>) -> HostValue {
    if obj.is_none() {
        return HostValue::None;
    }
    if let Ok(b) = obj.downcast::<PyBool>() {
        return HostValue::Bool(b.is_true());
    }
    if obj.is_instance_of::<PyLong>() {
        return obj.extract::<i64>().map_or_else(|_| opaque(obj), HostValue::Int);
    }
    if let Ok(x) = obj.downcast::<PyFloat>() {
        return HostValue::Float(x.value());
    }
    if let Ok(z) = obj.downcast::<PyComplex>() {
        return HostValue::Complex(Complex64::new(z.real(), z.imag()));
    }
    if let Ok(s) = obj.downcast::<PyString>() {
        return s.to_cow().map_or_else(|_| opaque(obj), |s| HostValue::Text(s.into_owned()));
    }
    if let Ok(items) = obj.downcast::<PyList>() {
        let items: Vec<HostValue> = items.iter().map(|i| py_to_host(&i)).collect();
        return match nested_array(&items) {
            Some(a) => HostValue::Array(a),
            None => HostValue::List(items),
        };
    }
    if let Ok(items) = obj.downcast::<PyTuple>() {
        return HostValue::Tuple(items.iter().map(|i| py_to_host(&i)).collect());
    }
    if let Ok(d) = obj.downcast::<PyDict>() {
        return HostValue::Dict(d.iter().map(|(k, v)| (py_to_host(&k), py_to_host(&v))).collect());
    }
    opaque(obj)
}

/// A rectangular list of lists of same-kind scalars, read back as the array
/// `nest` would have produced. Flat lists are left to the marshaller.
fn nested_array(items: &[HostValue]) -> Option<NdArray> {
    let shape = nested_shape(items)?;
    if shape.len() < 2 {
        return None;
    }
    let mut leaves = Vec::new();
    flatten_into(items, &mut leaves);
    let data = crate::marshal::uniform_scalars(&leaves)?;
    NdArray::from_row_major(&shape, data).ok()
}

fn nested_shape(items: &[HostValue]) -> Option<Vec<usize>> {
    let inner = |v: &HostValue| match v {
        HostValue::List(xs) => nested_shape(xs),
        _ => Some(Vec::new()),
    };
    let first = inner(items.first()?)?;
    for item in &items[1..] {
        if inner(item)? != first {
            return None;
        }
    }
    let mut shape = vec![items.len()];
    shape.extend(first);
    Some(shape)
}

fn flatten_into(items: &[HostValue], out: &mut Vec<HostValue>) {
    for item in items {
        match item {
            HostValue::List(xs) => flatten_into(xs, out),
            leaf => out.push(leaf.clone()),
        }
    }
}

fn opaque(obj: &Bound<'_, PyAny>) -> HostValue {
    let name = obj
        .get_type()
        .name()
        .map(|n| n.to_string())
        .unwrap_or_else(|_| "object".to_owned());
    HostValue::Opaque(name)
}

fn args_to_host(args: &Bound<'_, PyTuple>) -> Vec<HostValue> {
    args.iter().map(|a| py_to_host(&a)).collect()
}

// ── host → Python ─────────────────────────────────────────────────────────

fn host_to_py(py: Python<'_>, v: &HostValue) -> PyResult<PyObject> {
    Ok(match v {
        HostValue::None => py.None(),
        HostValue::Bool(b) => (*b).into_py(py),
        HostValue::Int(n) => (*n).into_py(py),
        HostValue::Float(x) => (*x).into_py(py),
        HostValue::Complex(z) => PyComplex::from_doubles_bound(py, z.re, z.im).into_any().unbind(),
        HostValue::Number(n) => number_to_py(py, n),
        HostValue::Text(s) => s.as_str().into_py(py),
        HostValue::Array(a) => array_to_py(py, a)?,
        HostValue::List(items) => PyList::new_bound(py, seq_to_py(py, items)?).into_any().unbind(),
        HostValue::Tuple(items) => PyTuple::new_bound(py, seq_to_py(py, items)?).into_any().unbind(),
        HostValue::Dict(d) => {
            let dict = PyDict::new_bound(py);
            for (k, v) in d.iter() {
                dict.set_item(host_to_py(py, k)?, host_to_py(py, v)?)?;
            }
            dict.into_any().unbind()
        }
        HostValue::Opaque(name) => {
            return Err(ValueConvertError::new_err(format!("no Python value for '{name}'")))
        }
    })
}

fn seq_to_py(py: Python<'_>, items: &[HostValue]) -> PyResult<Vec<PyObject>> {
    items.iter().map(|v| host_to_py(py, v)).collect()
}

fn number_to_py(py: Python<'_>, n: &Number) -> PyObject {
    match *n {
        Number::Double(x) => x.into_py(py),
        Number::Single(x) => f64::from(x).into_py(py),
        Number::Int8(x) => i64::from(x).into_py(py),
        Number::Int16(x) => i64::from(x).into_py(py),
        Number::Int32(x) => i64::from(x).into_py(py),
        Number::Int64(x) => x.into_py(py),
        Number::UInt8(x) => u64::from(x).into_py(py),
        Number::UInt16(x) => u64::from(x).into_py(py),
        Number::UInt32(x) => u64::from(x).into_py(py),
        Number::UInt64(x) => x.into_py(py),
        Number::ComplexDouble(z) => PyComplex::from_doubles_bound(py, z.re, z.im).into_any().unbind(),
        Number::ComplexSingle(z) => {
            PyComplex::from_doubles_bound(py, f64::from(z.re), f64::from(z.im)).into_any().unbind()
        }
        Number::Logical(b) => b.into_py(py),
    }
}

/// Nested lists in row-major order, one level per dimension.
fn array_to_py(py: Python<'_>, a: &NdArray) -> PyResult<PyObject> {
    if let Some(rows) = a.text_rows() {
        return Ok(PyList::new_bound(py, rows).into_any().unbind());
    }
    nest(py, &a.to_row_major(), a.shape(), 0)
}

fn nest(py: Python<'_>, data: &Buffer, shape: &[usize], offset: usize) -> PyResult<PyObject> {
    let Some((&n, rest)) = shape.split_first() else {
        return Ok(match (data, Number::from_buffer(data, offset)) {
            (_, Some(num)) => number_to_py(py, &num),
            (Buffer::Char(cs), None) => cs[offset].to_string().into_py(py),
            (_, None) => py.None(),
        });
    };
    let stride: usize = rest.iter().product();
    let items = (0..n)
        .map(|k| nest(py, data, rest, offset + k * stride))
        .collect::<PyResult<Vec<_>>>()?;
    Ok(PyList::new_bound(py, items).into_any().unbind())
}

fn results(py: Python<'_>, vals: &[HostValue]) -> PyResult<PyObject> {
    Ok(PyTuple::new_bound(py, seq_to_py(py, vals)?).into_any().unbind())
}

// ── octbridge.* functions ─────────────────────────────────────────────────

/// `octbridge.eval(nargout, code)` → tuple
#[pyfunction]
#[pyo3(name = "eval")]
fn py_eval(py: Python<'_>, nargout: usize, code: &str) -> PyResult<PyObject> {
    let out = with_octave(|oct| oct.eval(nargout, code))?;
    results(py, &out)
}

/// `octbridge.feval(nargout, name, *args)` → tuple
#[pyfunction]
#[pyo3(name = "feval", signature = (nargout, name, *args))]
fn py_feval(py: Python<'_>, nargout: usize, name: &str, args: &Bound<'_, PyTuple>) -> PyResult<PyObject> {
    let args = args_to_host(args);
    let out = with_octave(|oct| oct.feval(nargout, name, &args))?;
    results(py, &out)
}

/// `@octbridge.local_scope`
#[pyfunction]
#[pyo3(name = "local_scope")]
fn py_local_scope(func: PyObject) -> LocalScoped {
    LocalScoped { func }
}

// ── Workspace mapping ─────────────────────────────────────────────────────

/// `octbridge.locals` / `octbridge.globals`
#[pyclass(name = "Workspace", module = "octbridge", frozen)]
struct PyWorkspace {
    scope: Scope,
}

#[pymethods]
impl PyWorkspace {
    fn __getitem__(&self, py: Python<'_>, key: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let key = py_to_host(key);
        let v = with_octave(|oct| Workspace::new(oct, self.scope).get_item(&key))?;
        host_to_py(py, &v)
    }

    fn __setitem__(&self, key: &Bound<'_, PyAny>, value: &Bound<'_, PyAny>) -> PyResult<()> {
        let (key, value) = (py_to_host(key), py_to_host(value));
        with_octave(|oct| Workspace::new(oct, self.scope).set_item(&key, value))
    }

    fn __delitem__(&self, key: &Bound<'_, PyAny>) -> PyResult<()> {
        let key = py_to_host(key);
        with_octave(|oct| Workspace::new(oct, self.scope).del_item(&key))
    }

    fn __contains__(&self, key: &Bound<'_, PyAny>) -> PyResult<bool> {
        let key = py_to_host(key);
        with_octave(|oct| Workspace::new(oct, self.scope).contains_item(&key))
    }

    fn __len__(&self) -> PyResult<usize> {
        with_octave(|oct| Ok(Workspace::new(oct, self.scope).len()))
    }

    fn keys(&self) -> PyResult<Vec<String>> {
        with_octave(|oct| Ok(Workspace::new(oct, self.scope).names()))
    }

    fn __iter__(&self, py: Python<'_>) -> PyResult<PyObject> {
        let names = self.keys()?;
        Ok(PyList::new_bound(py, names).into_any().iter()?.into_any().unbind())
    }

    fn __repr__(&self) -> &'static str {
        match self.scope {
            Scope::Local => "<octbridge locals>",
            Scope::Global => "<octbridge globals>",
        }
    }
}

// ── local_scope decorator ─────────────────────────────────────────────────

/// A Python callable wrapped by `@octbridge.local_scope`.
///
/// The shared interpreter is not held while the wrapped function runs, so
/// the function may call back into `octbridge`.  Frames are popped by
/// depth, so decorated functions belong to one thread at a time: while one
/// is running, a call from any other thread raises `RuntimeError`.
#[pyclass(module = "octbridge", frozen)]
struct LocalScoped {
    func: PyObject,
}

/// Thread running decorated functions, and how many are active on it.
static SCOPE_OWNER: parking_lot::Mutex<Option<(ThreadId, usize)>> =
    parking_lot::const_mutex(None);

fn claim_scope_owner() -> PyResult<()> {
    let me = std::thread::current().id();
    let mut owner = SCOPE_OWNER.lock();
    match &mut *owner {
        Some((tid, active)) if *tid == me => *active += 1,
        Some(_) => {
            return Err(PyRuntimeError::new_err(
                "local_scope: a decorated function is already running on another thread",
            ))
        }
        None => *owner = Some((me, 1)),
    }
    Ok(())
}

fn release_scope_owner() {
    let mut owner = SCOPE_OWNER.lock();
    if let Some((_, active)) = &mut *owner {
        *active -= 1;
        if *active == 0 {
            *owner = None;
        }
    }
}

/// Cuts the frame stack back and releases the owning thread when dropped.
struct FramePop(usize);

impl Drop for FramePop {
    fn drop(&mut self) {
        let depth = self.0;
        if let Err(e) = runtime::with_octave(|oct| oct.truncate_frames(depth)) {
            tracing::warn!(error = %e, "local scope could not be closed");
        }
        release_scope_owner();
    }
}

#[pymethods]
impl LocalScoped {
    #[pyo3(signature = (*args, **kwargs))]
    fn __call__(
        &self,
        py: Python<'_>,
        args: &Bound<'_, PyTuple>,
        kwargs: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<PyObject> {
        claim_scope_owner()?;
        let pushed = with_octave(|oct| {
            let depth = oct.frame_depth();
            oct.push_frame(Frame::default());
            Ok(depth)
        });
        let depth = match pushed {
            Ok(depth) => depth,
            Err(e) => {
                release_scope_owner();
                return Err(e);
            }
        };
        let _pop = FramePop(depth);
        self.func.bind(py).call(args.clone(), kwargs).map(Bound::unbind)
    }
}

// ── Module registration ───────────────────────────────────────────────────

/// Module initialiser, also used when built as an extension module.
#[pymodule]
#[pyo3(name = "octbridge")]
pub fn octbridge_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    let py = m.py();
    runtime::init().map_err(to_py_err)?;
    m.add_function(wrap_pyfunction!(py_eval, m)?)?;
    m.add_function(wrap_pyfunction!(py_feval, m)?)?;
    m.add_function(wrap_pyfunction!(py_local_scope, m)?)?;
    m.add_class::<PyWorkspace>()?;
    m.add_class::<LocalScoped>()?;
    m.add("locals", Py::new(py, PyWorkspace { scope: Scope::Local })?)?;
    m.add("globals", Py::new(py, PyWorkspace { scope: Scope::Global })?)?;
    m.add("OctaveError", py.get_type_bound::<OctaveError>())?;
    m.add("ParseError", py.get_type_bound::<ParseError>())?;
    m.add("ValueConvertError", py.get_type_bound::<ValueConvertError>())?;
    m.add("ObjectConvertError", py.get_type_bound::<ObjectConvertError>())?;
    m.add("VarNameError", py.get_type_bound::<VarNameError>())?;
    Ok(())
}

fn register_module(py: Python<'_>) -> PyResult<()> {
    let m = PyModule::new_bound(py, "octbridge")?;
    octbridge_module(&m)?;
    // Register as sys.modules["octbridge"] so `import octbridge` works.
    let sys = py.import_bound("sys")?;
    sys.getattr("modules")?.set_item("octbridge", &m)?;
    Ok(())
}

// ── PythonHost ────────────────────────────────────────────────────────────

/// An embedded Python session with `octbridge` importable.
pub struct PythonHost;

impl PythonHost {
    /// Start (or re-attach to) the Python interpreter and the shared
    /// Octave interpreter.
    ///
    /// CPython is initialised at most once per process.
    pub fn new() -> PyResult<Self> {
        PYTHON_INIT.get_or_init(pyo3::prepare_freethreaded_python);
        Python::with_gil(|py| {
            register_module(py)?;
            py.run_bound("import octbridge", None, None)
        })?;
        Ok(Self)
    }

    /// Execute Python statements in the `__main__` namespace.
    pub fn exec(&self, code: &str) -> PyResult<()> {
        Python::with_gil(|py| py.run_bound(code, None, None))
    }

    /// Evaluate a Python expression and return the result.
    pub fn eval_expr(&self, expr: &str) -> PyResult<PyObject> {
        Python::with_gil(|py| py.eval_bound(expr, None, None).map(Bound::unbind))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tests::TEST_MX;

    fn host() -> PythonHost {
        PythonHost::new().unwrap()
    }

    fn check(host: &PythonHost, expr: &str) -> bool {
        Python::with_gil(|py| host.eval_expr(expr).unwrap().extract::<bool>(py).unwrap())
    }

    fn raises(host: &PythonHost, stmt: &str, exc: &str) -> bool {
        let code = format!("try:\n    {stmt}\n    _raised = None\nexcept Exception as e:\n    _raised = e\n");
        host.exec(&code).unwrap();
        check(host, &format!("isinstance(_raised, {exc})"))
    }

    #[test]
    fn eval_returns_tuples() {
        let _g = TEST_MX.lock();
        let h = host();
        assert!(check(&h, "octbridge.eval(1, '2 + 2') == ([[4.0]],)"));
        assert!(check(&h, "octbridge.eval(0, 'x = 1;') == ()"));
        assert!(check(&h, "octbridge.eval(1, \"struct('foo', 2)\") == ({'foo': [[2.0]]},)"));
        assert!(check(&h, "octbridge.eval(1, '{2}') == ([[[2.0]]],)"));
        assert!(raises(&h, "octbridge.eval(1, 'endfunction')", "octbridge.ParseError"));
        assert!(raises(&h, "octbridge.eval(0, \"error('boom')\")", "octbridge.OctaveError"));
    }

    #[test]
    fn feval_shapes() {
        let _g = TEST_MX.lock();
        let h = host();
        assert!(check(&h, "octbridge.feval(1, 'eval', '[1, 1, 1]') == ([[1.0, 1.0, 1.0]],)"));
        assert!(check(&h, "octbridge.feval(1, 'eval', '[1; 2; 3]') == ([[1.0], [2.0], [3.0]],)"));
        assert!(check(&h, "octbridge.feval(1, 'int8', 200) == ([[127]],)"));
        assert!(raises(&h, "octbridge.feval(1, 'disp', None)", "octbridge.ObjectConvertError"));
        assert!(raises(&h, "octbridge.feval(1, 'disp', {1.22: 1})", "octbridge.ObjectConvertError"));
        assert!(raises(&h, "octbridge.feval(1, 'str2func', 'sin')", "octbridge.ValueConvertError"));
    }

    #[test]
    fn workspace_mapping() {
        let _g = TEST_MX.lock();
        let h = host();
        h.exec("octbridge.locals['localvariable'] = 1").unwrap();
        assert!(check(&h, "'localvariable' in octbridge.locals"));
        assert!(check(&h, "'localvariable' not in octbridge.globals"));
        h.exec("del octbridge.locals['localvariable']").unwrap();
        assert!(raises(&h, "octbridge.locals['localvariable']", "KeyError"));
        assert!(raises(&h, "del octbridge.globals['globalvariable']", "KeyError"));
        assert!(raises(&h, "octbridge.locals['not an identifier'] = 1", "octbridge.VarNameError"));
        for key in ["0.1", "1", "[]"] {
            assert!(raises(&h, &format!("octbridge.locals[{key}] = 1"), "TypeError"), "{key}");
            assert!(raises(&h, &format!("octbridge.locals[{key}]"), "TypeError"), "{key}");
        }
        h.exec("octbridge.globals['g'] = 'text'").unwrap();
        assert!(check(&h, "octbridge.globals['g'] == 'text' and 'g' in list(octbridge.globals)"));
    }

    #[test]
    fn values_read_back_compare_equal() {
        let _g = TEST_MX.lock();
        let h = host();
        h.exec(
            "\
def setget(value):
    octbridge.locals['v'] = value
    back = octbridge.locals['v']
    octbridge.locals['w'] = back
    same, = octbridge.feval(1, 'isequal', value, back)
    cls, = octbridge.eval(1, 'class(w)')
    return same == [[True]] and octbridge.locals['w'] == back and cls
",
        )
        .unwrap();
        for (value, class) in [
            ("[1.0, 2.0, 3.0]", "double"),
            ("2.5", "double"),
            ("[[1.0, 2.0], [3.0, 4.0]]", "double"),
            ("[True, False]", "logical"),
            ("[1j, 2.0 + 0j]", "double"),
            ("{'a': [1.0, 2.0], 'b': 3.0}", "struct"),
            ("[1.0, 'two']", "cell"),
        ] {
            assert!(check(&h, &format!("setget({value}) == '{class}'")), "{value}");
        }
        h.exec("octbridge.locals['i8'] = octbridge.feval(1, 'int8', [[1, -2], [3, 4]])[0]").unwrap();
        assert!(check(&h, "octbridge.eval(1, 'class(i8)') == ('double',)"));
        assert!(check(&h, "octbridge.eval(1, 'size(i8)')[0] == [[2.0, 2.0]]"));
    }

    #[test]
    fn local_scope_belongs_to_one_thread() {
        let _g = TEST_MX.lock();
        let h = host();
        h.exec(
            "\
import threading

@octbridge.local_scope
def inner():
    return 1

@octbridge.local_scope
def outer():
    seen = []
    def run():
        try:
            inner()
            seen.append('ran')
        except RuntimeError:
            seen.append('refused')
    t = threading.Thread(target=run)
    t.start()
    t.join()
    return seen[0]
",
        )
        .unwrap();
        assert!(check(&h, "outer() == 'refused'"));
        assert!(check(&h, "inner() == 1"));
        assert_eq!(runtime::with_octave(|oct| oct.frame_depth()).unwrap(), 1);
    }

    #[test]
    fn local_scope_decorator() {
        let _g = TEST_MX.lock();
        let h = host();
        h.exec(
            "\
@octbridge.local_scope
def sloppy_factorial(x):
    octbridge.locals['x'] = x
    xm1, = octbridge.eval(1, 'x - 1')
    xm1 = xm1[0][0]
    fxm1 = sloppy_factorial(xm1) if xm1 > 0 else 1
    octbridge.locals['fxm1'] = fxm1
    fx, = octbridge.eval(1, 'x * fxm1')
    return fx[0][0]
",
        )
        .unwrap();
        assert!(check(&h, "sloppy_factorial(5) == 120.0"));
        assert!(check(&h, "'fxm1' not in octbridge.locals"));
        assert_eq!(runtime::with_octave(|oct| oct.frame_depth()).unwrap(), 1);
    }
}
