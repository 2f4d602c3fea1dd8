/// Command-line tests: run snippets through the `octb` binary and compare
/// stdout and stderr with the expected text.
///
/// Sessions are piped to the binary via stdin with `-n` so no init file is
/// read; batch cases use `-e` and script arguments.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use pretty_assertions::assert_eq;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Path to the `octb` binary built by this Cargo workspace.
fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_octb"))
}

fn command(args: &[&str]) -> Command {
    let mut cmd = Command::new(binary());
    cmd.arg("-n")
        .args(args)
        .env_remove("OCTB_PATH")
        .env_remove("OCTB_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// Run a session through stdin.
fn session(input: &str) -> Output {
    let mut child = command(&[]).spawn().expect("failed to spawn octb");
    {
        let stdin = child.stdin.as_mut().expect("stdin not open");
        stdin.write_all(input.as_bytes()).expect("write to stdin");
    }
    child.wait_with_output().expect("wait failed")
}

fn batch(args: &[&str]) -> Output {
    command(args).stdin(Stdio::null()).output().expect("failed to run octb")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// ── Batch mode ────────────────────────────────────────────────────────────────

#[test]
fn eval_flag_prints_results() {
    let out = batch(&["-e", "x = 1 + 1\ndisp(x * 3)"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "x = 2\n6\n");
}

#[test]
fn eval_flag_failure_sets_status() {
    let out = batch(&["-e", "error('cli:oops', 'went wrong')"]);
    assert!(!out.status.success());
    assert_eq!(stderr(&out), "error: (identifier: cli:oops) went wrong\n");
}

#[test]
fn scripts_run_before_code() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("setup.m");
    std::fs::write(&script, "base = 40;\n").unwrap();
    let out = batch(&["-e", "disp(base + 2)", script.to_str().unwrap()]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "42\n");
}

#[test]
fn load_path_flag() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("twice.m"), "function y = twice(x)\n  y = 2 * x;\nend\n").unwrap();
    let out = batch(&["-p", dir.path().to_str().unwrap(), "-e", "disp(twice(21))"]);
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "42\n");
}

#[test]
fn bad_flag_prints_usage() {
    let out = batch(&["-z"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(stderr(&out).contains("unknown option: -z"));
    assert!(stderr(&out).contains("Usage: octb"));
}

// ── Sessions ──────────────────────────────────────────────────────────────────

#[test]
fn session_echoes_unsuppressed_statements() {
    let out = session("x = 3\ny = x * 2;\ndisp(y)\n");
    assert_eq!(stdout(&out), "x = 3\n6\n");
}

#[test]
fn session_joins_multiline_blocks() {
    let out = session("function r = sq(v)\n  r = v * v;\nend\nfor k = 1:2\n  disp(sq(k))\nend\n");
    assert_eq!(stdout(&out), "1\n4\n");
}

#[test]
fn session_continues_after_errors() {
    let out = session("undefined_thing\ndisp(7)\nexit\ndisp(8)\n");
    assert!(out.status.success());
    assert_eq!(stdout(&out), "7\n");
    assert!(stderr(&out).starts_with("error: "), "{}", stderr(&out));
}
