//! Command-line argument parsing.
//!
//! Usage:
//!   octb [-qvn] [-p<dir>]... [-f<file>] [-e<code>] [<script>...]
//!
//! Flags may be combined (`-qv`); an option taking a value accepts it
//! attached (`-pfuncs`) or as the next argument (`-p funcs`).

use std::path::PathBuf;

use crate::config::{Config, InitFile};

pub const USAGE: &str = "Usage: octb [-qvn] [-p<dir>]... [-f<file>] [-e<code>] [<script>...]";

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    /// No banner (`-q`).
    pub quiet: bool,
    /// Log verbosity, one step per `-v`.
    pub verbose: u8,
    /// Load-path directories (`-p<dir>`), in command-line order.
    pub load_path: Vec<PathBuf>,
    /// Init-file choice (`-f<file>`, `-n`).
    pub init_file: InitFile,
    /// Code to evaluate after startup (`-e<code>`).
    pub code: Option<String>,
    /// Script files to run, in order.
    pub scripts: Vec<PathBuf>,
    /// `-h` / `--help`.
    pub help: bool,
    /// `--version`.
    pub version: bool,
}

impl CliArgs {
    /// The interpreter configuration these arguments describe.
    pub fn config(&self) -> Config {
        Config {
            silent: self.quiet,
            init_file: self.init_file.clone(),
            load_path: self.load_path.clone(),
            echo: true,
        }
    }

    /// Whether stdin should be read as an interactive session.
    pub fn interactive(&self) -> bool {
        self.code.is_none() && self.scripts.is_empty()
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            args.scripts.extend(argv[i + 1..].iter().map(PathBuf::from));
            break;
        }

        match arg {
            "--help" => args.help = true,
            "--version" => args.version = true,
            _ if arg.starts_with("--") => return Err(format!("unknown option: {arg}")),

            // Non-flag argument.
            _ if !arg.starts_with('-') || arg == "-" => args.scripts.push(PathBuf::from(arg)),

            // Flag argument: iterate over characters after the leading `-`.
            _ => {
                let chars: Vec<char> = arg[1..].chars().collect();
                let mut j = 0;
                while j < chars.len() {
                    match chars[j] {
                        'q' => args.quiet = true,
                        'v' => args.verbose = args.verbose.saturating_add(1),
                        'n' => args.init_file = InitFile::Skip,
                        'h' => args.help = true,
                        c @ ('p' | 'f' | 'e') => {
                            let value = if j + 1 < chars.len() {
                                let s: String = chars[j + 1..].iter().collect();
                                j = chars.len();
                                s
                            } else if i + 1 < argv.len() {
                                i += 1;
                                argv[i].clone()
                            } else {
                                return Err(format!("-{c} requires {}", value_name(c)));
                            };
                            match c {
                                'p' => args.load_path.push(PathBuf::from(value)),
                                'f' => args.init_file = InitFile::Explicit(PathBuf::from(value)),
                                _ => args.code = Some(value),
                            }
                        }
                        c => return Err(format!("unknown option: -{c}")),
                    }
                    j += 1;
                }
            }
        }
        i += 1;
    }

    Ok(args)
}

fn value_name(flag: char) -> &'static str {
    match flag {
        'p' => "a directory argument",
        'f' => "a file argument",
        _ => "a code argument",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a, CliArgs::default());
        assert!(a.interactive());
        assert_eq!(a.init_file, InitFile::Search);
    }

    #[test]
    fn scripts_positional() {
        let a = parse_argv(&argv(&["one.m", "two.m"])).unwrap();
        assert_eq!(a.scripts, vec![PathBuf::from("one.m"), PathBuf::from("two.m")]);
        assert!(!a.interactive());
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-qvvn"])).unwrap();
        assert!(a.quiet);
        assert_eq!(a.verbose, 2);
        assert_eq!(a.init_file, InitFile::Skip);
    }

    #[test]
    fn path_embedded_and_separate() {
        let a = parse_argv(&argv(&["-p/one", "-p", "/two"])).unwrap();
        assert_eq!(a.load_path, vec![PathBuf::from("/one"), PathBuf::from("/two")]);
        assert_eq!(a.config().load_path, a.load_path);
    }

    #[test]
    fn init_file_explicit() {
        let a = parse_argv(&argv(&["-frc.m"])).unwrap();
        assert_eq!(a.init_file, InitFile::Explicit(PathBuf::from("rc.m")));
        let a = parse_argv(&argv(&["-q", "-f", "rc.m"])).unwrap();
        assert_eq!(a.config().init_file, InitFile::Explicit(PathBuf::from("rc.m")));
        assert!(a.config().silent);
    }

    #[test]
    fn code_takes_rest_of_flag() {
        let a = parse_argv(&argv(&["-qedisp(1)"])).unwrap();
        assert!(a.quiet);
        assert_eq!(a.code.as_deref(), Some("disp(1)"));
        let a = parse_argv(&argv(&["-e", "-x"])).unwrap();
        assert_eq!(a.code.as_deref(), Some("-x"));
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["-q", "--", "-odd.m"])).unwrap();
        assert_eq!(a.scripts, vec![PathBuf::from("-odd.m")]);
    }

    #[test]
    fn help_and_version() {
        assert!(parse_argv(&argv(&["-h"])).unwrap().help);
        assert!(parse_argv(&argv(&["--help"])).unwrap().help);
        assert!(parse_argv(&argv(&["--version"])).unwrap().version);
    }

    #[test]
    fn missing_values() {
        assert_eq!(parse_argv(&argv(&["-p"])).unwrap_err(), "-p requires a directory argument");
        assert_eq!(parse_argv(&argv(&["-e"])).unwrap_err(), "-e requires a code argument");
    }

    #[test]
    fn unknown_flags() {
        assert_eq!(parse_argv(&argv(&["-z"])).unwrap_err(), "unknown option: -z");
        assert!(parse_argv(&argv(&["--nope"])).is_err());
    }
}
