//! Embedded interpreter for a subset of the Octave language.
//!
//! Source text goes through [`lexer`] and [`parser`] into an [`ast::Program`],
//! which [`Octave`] executes by walking the tree.  Values live in a stack of
//! [`Frame`]s: frame 0 is the top-level workspace, and every user-function
//! call (and every bridge-level local scope) pushes another.
//!
//! Functions are resolved in this order: subfunctions of the running file,
//! functions defined at the prompt or via `eval`, host callbacks registered
//! by the embedding program, `.m` files on the load path, builtins.

pub mod ast;
mod builtins;
pub mod error;
mod eval;
mod exec;
mod format;
pub mod frame;
mod index;
pub mod lexer;
mod loader;
mod ops;
pub mod parser;
mod strfmt;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::BridgeError;
use crate::host::HostValue;
use crate::value::Value;

pub use ast::{FunctionDef, Program};
pub use error::{ParseError, RuntimeError};
pub use frame::Frame;
pub use lexer::is_identifier;
pub use parser::parse;

use loader::Loader;

/// A host callback callable from interpreter code.
///
/// It receives the interpreter itself, so it may evaluate code, call
/// functions or open a local scope while it runs.
pub type HostFn =
    Arc<dyn Fn(&mut Octave, &[HostValue]) -> Result<Vec<HostValue>, BridgeError> + Send + Sync>;

/// Maximum nesting of function calls.
pub const MAX_RECURSION_DEPTH: usize = 256;

/// Context for evaluating `end` inside an index expression.
#[derive(Debug, Clone)]
pub(crate) struct EndContext {
    pub shape: Vec<usize>,
    pub position: usize,
    pub count: usize,
}

/// An interpreter instance.
pub struct Octave {
    pub(crate) frames: Vec<Frame>,
    pub(crate) globals: IndexMap<String, Value>,
    pub(crate) functions: HashMap<String, Arc<FunctionDef>>,
    pub(crate) host_fns: HashMap<String, HostFn>,
    pub(crate) loader: Loader,
    pub(crate) output: String,
    pub(crate) last_error: Option<RuntimeError>,
    pub(crate) end_stack: Vec<EndContext>,
    pub(crate) depth: usize,
}

impl fmt::Debug for Octave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut host: Vec<&String> = self.host_fns.keys().collect();
        host.sort();
        f.debug_struct("Octave")
            .field("frames", &self.frames.len())
            .field("globals", &self.globals.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("host_fns", &host)
            .field("load_path", &self.loader.path())
            .finish()
    }
}

impl Default for Octave {
    fn default() -> Self {
        Self::new()
    }
}

impl Octave {
    pub fn new() -> Self {
        Octave {
            frames: vec![Frame::default()],
            globals: IndexMap::new(),
            functions: HashMap::new(),
            host_fns: HashMap::new(),
            loader: Loader::default(),
            output: String::new(),
            last_error: None,
            end_stack: Vec::new(),
            depth: 0,
        }
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    pub(crate) fn frame(&self) -> &Frame {
        // The base frame is never popped.
        &self.frames[self.frames.len() - 1]
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    /// Number of frames on the stack, including the top-level workspace.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
        tracing::trace!(depth = self.frames.len(), "frame pushed");
    }

    /// Drop frames above `depth`; the top-level workspace always survives.
    pub(crate) fn truncate_frames(&mut self, depth: usize) {
        self.frames.truncate(depth.max(1));
        tracing::trace!(depth = self.frames.len(), "frames truncated");
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    /// Look up a variable visible from the active frame.
    pub(crate) fn lookup(&self, name: &str) -> Option<&Value> {
        let frame = self.frame();
        if frame.is_global(name) {
            self.globals.get(name)
        } else {
            frame.vars.get(name)
        }
    }

    pub(crate) fn is_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Bind a variable in the active frame (or its global, if linked).
    pub(crate) fn assign(&mut self, name: &str, value: Value) {
        if self.frame().is_global(name) {
            self.globals.insert(name.to_owned(), value);
        } else {
            self.frame_mut().vars.insert(name.to_owned(), value);
        }
    }

    /// Unbind a variable from the active frame.  A global link is removed,
    /// the global value itself survives.
    pub(crate) fn clear_variable(&mut self, name: &str) -> bool {
        let frame = self.frame_mut();
        if frame.global_names.remove(name) {
            return true;
        }
        frame.vars.shift_remove(name).is_some()
    }

    /// Link `name` in the active frame to the global table.
    pub(crate) fn declare_global(&mut self, name: &str) {
        let frame = self.frame_mut();
        frame.vars.shift_remove(name);
        frame.global_names.insert(name.to_owned());
        self.globals.entry(name.to_owned()).or_insert_with(Value::empty);
    }

    /// Names visible in the active frame, in definition order.
    pub(crate) fn visible_names(&self) -> Vec<String> {
        let frame = self.frame();
        let mut names: Vec<String> = frame.vars.keys().cloned().collect();
        names.extend(
            self.globals.keys().filter(|g| frame.is_global(g)).cloned(),
        );
        names
    }

    // ── Functions ─────────────────────────────────────────────────────────────

    /// Install the functions defined by a parsed program.
    pub(crate) fn define_functions(&mut self, program: &Program) {
        for def in &program.functions {
            tracing::debug!(function = %def.name, "function defined");
            self.functions.insert(def.name.clone(), Arc::clone(def));
        }
    }

    /// Whether `name` resolves to something callable.
    pub fn function_exists(&mut self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.host_fns.contains_key(name)
            || matches!(self.loader.lookup(name), Ok(Some(_)))
            || builtins::is_builtin(name)
    }

    // ── Load path ─────────────────────────────────────────────────────────────

    /// Prepend a directory to the function search path.
    pub fn add_path(&mut self, dir: impl Into<PathBuf>) {
        self.loader.add_dir(dir.into());
    }

    pub fn load_path(&self) -> &[PathBuf] {
        self.loader.path()
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub(crate) fn print(&mut self, text: &str) {
        self.output.push_str(text);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
