//! Startup configuration for an interpreter.
//!
//! A [`Config`] says which directories go on the function load path and
//! which init file (an ordinary script, run in the top-level workspace
//! before anything else) to source.  [`Config::start`] turns it into a
//! ready [`Octave`].
//!
//! | Source | Effect |
//! |--------|--------|
//! | `OCTB_PATH` | load-path directories, lowest priority |
//! | [`Config::load_path`] | load-path directories, first entry searched first |
//! | `~/.octbrc`, `<config dir>/octbridge/octbrc`, `./.octbrc` | init file, first one found |
//!
//! A failing init file does not stop startup; its fault is reported back
//! as a [`ConfigError`].

use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};

use crate::interp::Octave;

/// Environment variable holding extra load-path directories.
pub const PATH_ENV: &str = "OCTB_PATH";

/// Init file name inside the home directory or working directory.
const INIT_FILE: &str = ".octbrc";

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while starting up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}: {message}", .path.display())]
pub struct ConfigError {
    pub path: PathBuf,
    pub message: String,
}

/// How to choose the init file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InitFile {
    /// Use the first of the standard locations that exists (default).
    #[default]
    Search,
    /// Run no init file.
    Skip,
    /// Run this file; it is an error if it cannot be read.
    Explicit(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Suppress the banner and informational messages.
    pub silent: bool,
    pub init_file: InitFile,
    /// Load-path directories, highest priority first.
    pub load_path: Vec<PathBuf>,
    /// Print interpreter output as it is produced.
    pub echo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config { silent: false, init_file: InitFile::Search, load_path: Vec::new(), echo: true }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an interpreter from this configuration.
    ///
    /// Output printed by the init file stays in the interpreter's buffer.
    pub fn start(&self) -> (Octave, Vec<ConfigError>) {
        let mut oct = Octave::new();
        let mut errors = Vec::new();

        for dir in env_load_path().into_iter().chain(self.load_path.iter().rev().cloned()) {
            oct.add_path(dir);
        }

        let init = match &self.init_file {
            InitFile::Skip => None,
            InitFile::Explicit(path) => Some(path.clone()),
            InitFile::Search => find_init_file(),
        };
        if let Some(path) = init {
            tracing::debug!(file = %path.display(), "running init file");
            if let Err(e) = oct.source(&path) {
                errors.push(ConfigError { path, message: e.to_string() });
            }
        }

        (oct, errors)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Directories listed in [`PATH_ENV`], in the platform's path-list syntax.
pub fn env_load_path() -> Vec<PathBuf> {
    std::env::var_os(PATH_ENV)
        .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
        .unwrap_or_default()
}

/// Search for the init file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_init_file() -> Option<PathBuf> {
    init_file_candidates().into_iter().find(|p| p.is_file())
}

fn init_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(base) = BaseDirs::new() {
        candidates.push(base.home_dir().join(INIT_FILE));
    }
    if let Some(project) = ProjectDirs::from("", "", "octbridge") {
        candidates.push(project.config_dir().join("octbrc"));
    }
    candidates.push(Path::new(".").join(INIT_FILE));
    candidates
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn skip_init() -> Config {
        Config { init_file: InitFile::Skip, ..Config::new() }
    }

    #[test]
    fn defaults() {
        let c = Config::default();
        assert!(!c.silent);
        assert!(c.echo);
        assert_eq!(c.init_file, InitFile::Search);
    }

    #[test]
    fn explicit_init_file_runs_in_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("startup.m");
        std::fs::write(&rc, "greeting = 'hello';\ndisp(greeting)\n").unwrap();
        let config = Config { init_file: InitFile::Explicit(rc), ..Config::new() };
        let (mut oct, errors) = config.start();
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(oct.locals().get_value("greeting").unwrap(), Value::str("hello"));
        assert_eq!(oct.take_output(), "hello\n");
    }

    #[test]
    fn broken_init_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let rc = dir.path().join("bad.m");
        std::fs::write(&rc, "x = 1;\nerror('stop here');\ny = 2;\n").unwrap();
        let config = Config { init_file: InitFile::Explicit(rc.clone()), ..Config::new() };
        let (mut oct, errors) = config.start();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, rc);
        assert_eq!(errors[0].message, "stop here");
        assert!(oct.locals().contains("x"));
        assert!(!oct.locals().contains("y"));
    }

    #[test]
    fn missing_explicit_init_file_is_reported() {
        let config = Config {
            init_file: InitFile::Explicit(PathBuf::from("/nonexistent/octbrc")),
            ..Config::new()
        };
        let (_, errors) = config.start();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().starts_with("/nonexistent/octbrc: "));
    }

    #[test]
    fn config_errors_are_std_errors() {
        let e: Box<dyn std::error::Error> =
            Box::new(ConfigError { path: PathBuf::from("rc/octbrc"), message: "boom".into() });
        assert_eq!(e.to_string(), "rc/octbrc: boom");
    }

    #[test]
    fn load_path_keeps_priority_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(first.path().join("which_dir.m"), "function r = which_dir()\n  r = 1;\nend\n").unwrap();
        std::fs::write(second.path().join("which_dir.m"), "function r = which_dir()\n  r = 2;\nend\n").unwrap();
        let config = Config {
            load_path: vec![first.path().to_path_buf(), second.path().to_path_buf()],
            ..skip_init()
        };
        let (mut oct, _) = config.start();
        assert_eq!(oct.load_path()[0], first.path());
        let out = oct.eval(1, "which_dir()").unwrap();
        assert_eq!(out[0].as_f64(), Some(1.0));
    }

    #[test]
    fn candidates_end_in_working_dir() {
        let candidates = init_file_candidates();
        assert_eq!(candidates.last(), Some(&Path::new(".").join(".octbrc")));
    }
}
