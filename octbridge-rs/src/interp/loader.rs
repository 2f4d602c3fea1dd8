//! `.m` files on the load path.
//!
//! A file whose first statement is `function` is a function file: its first
//! function is the entry point, the rest are subfunctions private to it.
//! Anything else is a script.  Parsed files are cached and re-read when
//! their modification time changes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use indexmap::IndexMap;

use super::ast::{FunctionDef, Program};
use super::error::RuntimeError;
use super::frame::Subfunctions;
use super::lexer::is_identifier;
use super::parser::parse;

/// What a name on the load path resolved to.
#[derive(Debug, Clone)]
pub(crate) enum Loaded {
    Function { main: Arc<FunctionDef>, subs: Subfunctions },
    Script(Arc<Program>),
}

#[derive(Debug)]
struct Cached {
    modified: Option<SystemTime>,
    len: u64,
    loaded: Loaded,
}

#[derive(Debug, Default)]
pub(crate) struct Loader {
    dirs: Vec<PathBuf>,
    cache: HashMap<PathBuf, Cached>,
}

impl Loader {
    /// Put `dir` at the front of the search path.
    pub fn add_dir(&mut self, dir: PathBuf) {
        self.dirs.retain(|d| d != &dir);
        tracing::debug!(dir = %dir.display(), "load path entry added");
        self.dirs.insert(0, dir);
    }

    /// Drop `dir` from the search path.  Returns whether it was present.
    pub fn remove_dir(&mut self, dir: &Path) -> bool {
        let before = self.dirs.len();
        self.dirs.retain(|d| d != dir);
        self.cache.retain(|file, _| file.parent() != Some(dir));
        self.dirs.len() != before
    }

    pub fn path(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Find `name.m` on the search path.
    pub fn lookup(&mut self, name: &str) -> Result<Option<Loaded>, RuntimeError> {
        if !is_identifier(name) {
            return Ok(None);
        }
        let file = format!("{name}.m");
        let Some(path) = self.dirs.iter().map(|d| d.join(&file)).find(|p| p.is_file()) else {
            return Ok(None);
        };
        let meta = fs::metadata(&path).ok();
        let modified = meta.as_ref().and_then(|m| m.modified().ok());
        let len = meta.map_or(0, |m| m.len());
        if let Some(hit) = self.cache.get(&path) {
            if modified.is_some() && hit.modified == modified && hit.len == len {
                return Ok(Some(hit.loaded.clone()));
            }
        }
        let loaded = load_file(&path)?;
        tracing::debug!(file = %path.display(), "source file loaded");
        self.cache.insert(path, Cached { modified, len, loaded: loaded.clone() });
        Ok(Some(loaded))
    }
}

fn load_file(path: &Path) -> Result<Loaded, RuntimeError> {
    let source = fs::read_to_string(path).map_err(|e| {
        RuntimeError::with_id("Octave:file-not-found", format!("{}: {e}", path.display()))
    })?;
    let mut program = parse(&source).map_err(|e| {
        RuntimeError::with_id("Octave:parse-error", format!("parse error in {}: {e}", path.display()))
    })?;
    if program.body.is_empty() {
        let mut functions = std::mem::take(&mut program.functions).into_iter();
        if let Some(main) = functions.next() {
            let subs: IndexMap<String, Arc<FunctionDef>> =
                functions.map(|f| (f.name.clone(), f)).collect();
            return Ok(Loaded::Function { main, subs: Arc::new(subs) });
        }
    }
    Ok(Loaded::Script(Arc::new(program)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, text: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn function_file_with_subfunctions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "outer.m", "function y = outer(x)\n y = helper(x);\nend\nfunction z = helper(x)\n z = x + 1;\nend\n");
        let mut loader = Loader::default();
        loader.add_dir(dir.path().to_path_buf());
        match loader.lookup("outer").unwrap() {
            Some(Loaded::Function { main, subs }) => {
                assert_eq!(main.name, "outer");
                assert!(subs.contains_key("helper"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(loader.lookup("helper").unwrap().is_none());
    }

    #[test]
    fn scripts_and_missing_names() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "setup.m", "a = 1;\nb = 2;\n");
        let mut loader = Loader::default();
        loader.add_dir(dir.path().to_path_buf());
        assert!(matches!(loader.lookup("setup").unwrap(), Some(Loaded::Script(_))));
        assert!(loader.lookup("absent").unwrap().is_none());
        assert!(loader.lookup("../setup").unwrap().is_none());
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.m", "function y = broken(\n");
        let mut loader = Loader::default();
        loader.add_dir(dir.path().to_path_buf());
        let e = loader.lookup("broken").unwrap_err();
        assert!(e.message.contains("broken.m"), "{}", e.message);
    }

    #[test]
    fn path_order_and_removal() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let mut loader = Loader::default();
        loader.add_dir(a.path().to_path_buf());
        loader.add_dir(b.path().to_path_buf());
        loader.add_dir(a.path().to_path_buf());
        assert_eq!(loader.path(), &[a.path().to_path_buf(), b.path().to_path_buf()]);
        assert!(loader.remove_dir(a.path()));
        assert!(!loader.remove_dir(a.path()));
    }
}
