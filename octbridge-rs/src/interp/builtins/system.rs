//! Output, errors, evaluation, names and the workspace.

use std::io::Write;
use std::path::Path;

use regex::Regex;

use super::{cellstr_value, check_nargs, one, text_of, usage, Outcome};
use crate::interp::error::{rt_err, Result, RuntimeError};
use crate::interp::loader::Loaded;
use crate::interp::strfmt::{escape, sprintf};
use crate::interp::{format, is_identifier, parse, Octave};
use crate::value::{FunctionHandle, Value};

pub(super) const NAMES: &[&str] = &[
    "disp", "printf", "fprintf", "puts", "fputs", "fdisp", "error", "warning", "lasterr",
    "rethrow", "print_usage", "eval", "feval", "exist", "isvarname", "func2str", "str2func",
    "nargin", "nargout", "addpath", "rmpath", "path", "hostcall", "clear", "who", "isglobal",
];

pub(super) fn call(oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Outcome {
    match name {
        "disp" => {
            check_nargs(name, &args, 1, 1)?;
            let text = format::disp(&args[0]);
            if nargout > 0 {
                return one(Value::str(text.trim_end_matches('\n')));
            }
            oct.print(&text);
            Ok(Some(Vec::new()))
        }
        "printf" => {
            let Some((fmt, rest)) = args.split_first() else {
                return Err(usage(name));
            };
            let text = sprintf(&escape(&text_of(fmt, name)?), rest)?;
            oct.print(&text);
            Ok(Some(Vec::new()))
        }
        "fprintf" => {
            let (fid, rest) = stream_arg(name, &args)?;
            let Some((fmt, rest)) = rest.split_first() else {
                return Err(usage(name));
            };
            let text = sprintf(&escape(&text_of(fmt, name)?), rest)?;
            write_stream(oct, fid, &text);
            if nargout > 0 {
                return one(Value::double(text.len() as f64));
            }
            Ok(Some(Vec::new()))
        }
        "puts" | "fputs" | "fdisp" => {
            let (fid, rest) = if name == "puts" { (1, args.as_slice()) } else { stream_arg(name, &args)? };
            let [v] = rest else {
                return Err(usage(name));
            };
            let text = if name == "fdisp" { format::disp(v) } else { text_of(v, name)? };
            write_stream(oct, fid, &text);
            Ok(Some(Vec::new()))
        }
        "error" => match raise(&args)? {
            Some(e) => Err(e),
            None => Ok(Some(Vec::new())),
        },
        "warning" => {
            warning(oct, &args)?;
            Ok(Some(Vec::new()))
        }
        "lasterr" => {
            check_nargs(name, &args, 0, 0)?;
            let msg = oct.last_error.as_ref().map_or(String::new(), |e| e.message.clone());
            one(Value::str(&msg))
        }
        "rethrow" => {
            check_nargs(name, &args, 1, 1)?;
            let Value::Struct(s) = &args[0] else {
                return Err(rt_err!("rethrow: ERR must be a struct"));
            };
            let message = s
                .get("message")
                .and_then(Value::as_text)
                .ok_or_else(|| rt_err!("rethrow: ERR must contain the fields 'message' and 'identifier'"))?;
            let id = s.get("identifier").and_then(Value::as_text).filter(|id| !id.is_empty());
            Err(match id {
                Some(id) => RuntimeError::with_id(id, message),
                None => RuntimeError::new(message),
            })
        }
        "print_usage" => {
            let caller = oct.frame().call.as_ref().map(|c| c.function.clone());
            match caller {
                Some(f) => Err(RuntimeError::with_id("Octave:invalid-fun-call", format!("Invalid call to {f}"))),
                None => Err(rt_err!("print_usage: only valid inside functions")),
            }
        }
        "eval" => {
            check_nargs(name, &args, 1, 2)?;
            let code = text_of(&args[0], name)?;
            let catch = args.get(1).map(|c| text_of(c, name)).transpose()?;
            eval_string(oct, &code, catch.as_deref(), nargout).map(Some)
        }
        "feval" => {
            let Some((f, rest)) = args.split_first() else {
                return Err(usage(name));
            };
            oct.call_callable(f, rest.to_vec(), nargout).map(Some)
        }
        "exist" => {
            check_nargs(name, &args, 1, 2)?;
            let target = text_of(&args[0], name)?;
            let kind = args.get(1).map(|k| text_of(k, name)).transpose()?;
            one(Value::double(exist(oct, &target, kind.as_deref())?))
        }
        "isvarname" => {
            check_nargs(name, &args, 1, 1)?;
            one(Value::logical(args[0].as_text().is_some_and(|s| is_identifier(&s))))
        }
        "func2str" => {
            check_nargs(name, &args, 1, 1)?;
            match &args[0] {
                Value::FunctionHandle(fh) => one(Value::str(&fh.name)),
                _ => Err(rt_err!("func2str: FCN_HANDLE argument must be a valid function handle")),
            }
        }
        "str2func" => {
            check_nargs(name, &args, 1, 2)?;
            let text = text_of(&args[0], name)?;
            if text.trim_start().starts_with('@') {
                return Err(rt_err!("str2func: anonymous functions are not supported"));
            }
            if !is_identifier(&text) {
                return Err(rt_err!("str2func: invalid function name '{text}'"));
            }
            one(Value::FunctionHandle(FunctionHandle { name: text }))
        }
        "nargin" | "nargout" => {
            check_nargs(name, &args, 0, 1)?;
            match args.first() {
                Some(f) => one(Value::double(declared_count(oct, name, f)?)),
                None => {
                    let info = oct.frame().call.as_ref().ok_or_else(|| rt_err!("{name}: invalid use at top level"))?;
                    let n = if name == "nargin" { info.nargin } else { info.nargout };
                    one(Value::double(n as f64))
                }
            }
        }
        "addpath" => {
            if args.is_empty() {
                return Err(usage(name));
            }
            let mut dirs = Vec::new();
            for v in &args {
                let text = text_of(v, name)?;
                dirs.extend(std::env::split_paths(&text).filter(|p| !p.as_os_str().is_empty()));
            }
            // Added in reverse so the first argument ends up first.
            for dir in dirs.into_iter().rev() {
                if dir.is_dir() {
                    oct.add_path(dir);
                } else {
                    emit_warning(oct, &format!("addpath: {}: No such file or directory", dir.display()));
                }
            }
            Ok(Some(Vec::new()))
        }
        "rmpath" => {
            for v in &args {
                let text = text_of(v, name)?;
                for dir in std::env::split_paths(&text) {
                    if !oct.loader.remove_dir(&dir) {
                        emit_warning(oct, &format!("rmpath: {}: not found", dir.display()));
                    }
                }
            }
            Ok(Some(Vec::new()))
        }
        "path" => {
            check_nargs(name, &args, 0, 0)?;
            let joined = std::env::join_paths(oct.load_path()).map_err(|e| rt_err!("path: {e}"))?;
            let joined = joined.to_string_lossy().into_owned();
            if nargout > 0 {
                return one(Value::str(&joined));
            }
            let mut text = String::from("\nOctave's search path contains the following directories:\n\n");
            for dir in oct.load_path() {
                text.push_str(&format!("{}\n", dir.display()));
            }
            text.push('\n');
            oct.print(&text);
            Ok(Some(Vec::new()))
        }
        "hostcall" => {
            let Some((target, rest)) = args.split_first() else {
                return Err(usage(name));
            };
            let target = text_of(target, name)?;
            let f = oct
                .host_fns
                .get(&target)
                .cloned()
                .ok_or_else(|| rt_err!("hostcall: no host function named '{target}'"))?;
            oct.call_host(&target, &f, rest, nargout).map(Some)
        }
        "clear" => {
            let words = args.iter().map(|v| text_of(v, name)).collect::<Result<Vec<_>>>()?;
            clear(oct, &words)?;
            Ok(Some(Vec::new()))
        }
        "who" => {
            let mut names = oct.visible_names();
            names.sort();
            if nargout > 0 {
                return one(cellstr_value(vec![names.len(), 1], names));
            }
            if !names.is_empty() {
                let text = format!("Variables visible from the current scope:\n\n{}\n\n", names.join("  "));
                oct.print(&text);
            }
            Ok(Some(Vec::new()))
        }
        "isglobal" => {
            check_nargs(name, &args, 1, 1)?;
            let var = text_of(&args[0], name)?;
            one(Value::logical(oct.frame().is_global(&var)))
        }
        _ => Ok(None),
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Optional leading stream number of `fprintf`-style calls.
fn stream_arg<'a>(name: &str, args: &'a [Value]) -> Result<(u32, &'a [Value])> {
    match args.split_first() {
        Some((first, rest)) if !first.is_char() => match first.scalar_f64() {
            Some(fid) if fid == 1.0 || fid == 2.0 => Ok((fid as u32, rest)),
            Some(fid) => Err(rt_err!("{name}: invalid stream number = {fid}")),
            None => Err(usage(name)),
        },
        _ => Ok((1, args)),
    }
}

fn write_stream(oct: &mut Octave, fid: u32, text: &str) {
    if fid == 2 {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(text.as_bytes());
    } else {
        oct.print(text);
    }
}

// ── Errors and warnings ───────────────────────────────────────────────────────

/// `pkg:name` style message identifier.
fn looks_like_id(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() > 1
        && parts.iter().all(|p| {
            !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

/// Message and identifier from `error`/`warning` arguments.
fn message_of(name: &str, args: &[Value]) -> Result<(Option<String>, String)> {
    match args {
        [] => Err(usage(name)),
        [only] => Ok((None, text_of(only, name)?)),
        [first, rest @ ..] => {
            let first = text_of(first, name)?;
            if looks_like_id(&first) {
                let (fmt, rest) = rest.split_first().ok_or_else(|| usage(name))?;
                let fmt = text_of(fmt, name)?;
                Ok((Some(first), sprintf(&escape(&fmt), rest)?))
            } else {
                Ok((None, sprintf(&escape(&first), rest)?))
            }
        }
    }
}

/// The error `error(...)` raises; `None` when the message is empty.
fn raise(args: &[Value]) -> Result<Option<RuntimeError>> {
    if let [Value::Struct(s)] = args {
        let message = s.get("message").and_then(Value::as_text).unwrap_or_default();
        let id = s.get("identifier").and_then(Value::as_text).filter(|id| !id.is_empty());
        return Ok((!message.is_empty()).then(|| match id {
            Some(id) => RuntimeError::with_id(id, message),
            None => RuntimeError::new(message),
        }));
    }
    let (id, message) = message_of("error", args)?;
    if message.is_empty() {
        return Ok(None);
    }
    Ok(Some(match id {
        Some(id) => RuntimeError::with_id(id, message),
        None => RuntimeError::new(message),
    }))
}

fn emit_warning(oct: &mut Octave, message: &str) {
    tracing::warn!(text = message, "interpreter warning");
    oct.print(&format!("warning: {message}\n"));
}

fn warning(oct: &mut Octave, args: &[Value]) -> Result<()> {
    if let Some(first) = args.first().and_then(Value::as_text) {
        if matches!(first.as_str(), "on" | "off" | "query" | "error") {
            return Ok(());
        }
    }
    let (_, message) = message_of("warning", args)?;
    if !message.is_empty() {
        emit_warning(oct, &message);
    }
    Ok(())
}

// ── Evaluation ────────────────────────────────────────────────────────────────

/// `eval(try_code, catch_code)`
fn eval_string(oct: &mut Octave, code: &str, catch: Option<&str>, nargout: usize) -> Result<Vec<Value>> {
    let frames = oct.frames.len();
    let ends = oct.end_stack.len();
    let attempt = parse(code)
        .map_err(RuntimeError::from)
        .and_then(|program| oct.run_program(&program, nargout));
    match (attempt, catch) {
        (Ok(vals), _) => Ok(vals),
        (Err(e), None) => Err(e),
        (Err(e), Some(handler)) => {
            oct.truncate_frames(frames);
            oct.end_stack.truncate(ends);
            tracing::debug!(error = %e, "eval error caught");
            oct.last_error = Some(e);
            let program = parse(handler)?;
            oct.run_program(&program, nargout)
        }
    }
}

// ── Names ─────────────────────────────────────────────────────────────────────

fn exist(oct: &mut Octave, name: &str, kind: Option<&str>) -> Result<f64> {
    let want = |k: &str| kind.map_or(true, |w| w == k);
    if want("var") && oct.is_variable(name) {
        return Ok(1.0);
    }
    if want("file") && matches!(oct.loader.lookup(name), Ok(Some(_))) {
        return Ok(2.0);
    }
    if kind.is_none() && (oct.functions.contains_key(name) || oct.host_fns.contains_key(name)) {
        return Ok(103.0);
    }
    if want("builtin") && super::is_builtin(name) {
        return Ok(5.0);
    }
    let path = Path::new(name);
    if want("dir") && path.is_dir() {
        return Ok(7.0);
    }
    if want("file") && path.is_file() {
        return Ok(2.0);
    }
    match kind {
        None | Some("var" | "file" | "builtin" | "dir") => Ok(0.0),
        Some(other) => Err(rt_err!("exist: unrecognized type argument \"{other}\"")),
    }
}

/// `nargin("f")`/`nargout("f")`: declared counts, negative with varargs.
fn declared_count(oct: &mut Octave, which: &str, f: &Value) -> Result<f64> {
    let fname = match f {
        Value::FunctionHandle(fh) => fh.name.clone(),
        other => text_of(other, which)?,
    };
    let def = match oct.functions.get(&fname) {
        Some(def) => def.clone(),
        None => match oct.loader.lookup(&fname)? {
            Some(Loaded::Function { main, .. }) => main,
            _ => return Err(rt_err!("{which}: invalid function name: {fname}")),
        },
    };
    let (count, varargs) = if which == "nargin" {
        (def.params.len(), def.takes_varargin())
    } else {
        (def.outputs.len(), def.gives_varargout())
    };
    Ok(if varargs { -(count as f64) } else { count as f64 })
}

// ── Workspace ─────────────────────────────────────────────────────────────────

/// Regex for a `clear` pattern with `*` and `?` wildcards.
fn wildcard(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| rt_err!("clear: invalid pattern '{pattern}': {e}"))
}

fn clear(oct: &mut Octave, words: &[String]) -> Result<()> {
    let (flag, names) = match words.split_first() {
        Some((f, rest)) if f.starts_with('-') || matches!(f.as_str(), "all" | "global" | "functions" | "variables") => {
            (Some(f.trim_start_matches('-')), rest)
        }
        _ => (None, words),
    };
    let patterns = names.iter().map(|n| wildcard(n)).collect::<Result<Vec<_>>>()?;
    let selected = |name: &str| patterns.is_empty() || patterns.iter().any(|p| p.is_match(name));
    match flag {
        Some("all" | "a") => {
            clear_variables(oct, &selected);
            oct.globals.clear();
            for frame in &mut oct.frames {
                frame.global_names.clear();
            }
            oct.functions.clear();
        }
        Some("global" | "g") => {
            let doomed: Vec<String> = oct.globals.keys().filter(|g| selected(g.as_str())).cloned().collect();
            for g in &doomed {
                oct.globals.shift_remove(g);
                for frame in &mut oct.frames {
                    frame.global_names.remove(g);
                }
            }
        }
        Some("functions" | "f") => oct.functions.retain(|name, _| !selected(name.as_str())),
        Some("variables" | "v") | None => clear_variables(oct, &selected),
        Some(other) => return Err(rt_err!("clear: unrecognized option '-{other}'")),
    }
    Ok(())
}

fn clear_variables(oct: &mut Octave, selected: &dyn Fn(&str) -> bool) {
    let doomed: Vec<String> = oct.visible_names().into_iter().filter(|n| selected(n.as_str())).collect();
    for name in &doomed {
        oct.clear_variable(name);
    }
    tracing::trace!(count = doomed.len(), "variables cleared");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::interp::{parse, Octave};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn run(oct: &mut Octave, code: &str) -> Result<Vec<Value>, String> {
        let program = parse(code).map_err(|e| e.to_string())?;
        oct.run_program(&program, 1).map_err(|e| e.message)
    }

    fn value(oct: &mut Octave, code: &str) -> Value {
        run(oct, code).unwrap().remove(0)
    }

    #[test]
    fn printing_collects_output() {
        let mut oct = Octave::new();
        run(&mut oct, "printf('%d,', [1 2 3]); disp('hi'); fprintf(1, 'x=%g\\n', 1.5);").unwrap();
        assert_eq!(oct.output, "1,2,3,hi\nx=1.5\n");
    }

    #[test]
    fn error_forms() {
        let mut oct = Octave::new();
        assert_eq!(run(&mut oct, "error('plain message')").unwrap_err(), "plain message");
        assert_eq!(run(&mut oct, "error('n=%d', 4)").unwrap_err(), "n=4");
        let program = parse("error('pkg:sub', 'with %s', 'id')").unwrap();
        let e = oct.run_program(&program, 0).unwrap_err();
        assert_eq!(e.identifier.as_deref(), Some("pkg:sub"));
        assert_eq!(e.message, "with id");
        assert!(run(&mut oct, "error('')").is_ok());
        let e = run(&mut oct, "error(struct('message', 'from struct', 'identifier', 'a:b'))").unwrap_err();
        assert_eq!(e, "from struct");
    }

    #[test]
    fn lasterr_and_rethrow() {
        let mut oct = Octave::new();
        run(&mut oct, "try\n error('first');\ncatch\nend").unwrap();
        assert_eq!(value(&mut oct, "lasterr()"), Value::str("first"));
        let e = run(&mut oct, "try\n error('x:y', 'again');\ncatch err\n rethrow(err);\nend").unwrap_err();
        assert_eq!(e, "again");
    }

    #[test]
    fn warnings_print_and_continue() {
        let mut oct = Octave::new();
        run(&mut oct, "warning('careful %d', 2); x = 1;").unwrap();
        assert_eq!(oct.output, "warning: careful 2\n");
        run(&mut oct, "warning('off', 'all');").unwrap();
    }

    #[test]
    fn eval_with_catch_string() {
        let mut oct = Octave::new();
        assert_eq!(value(&mut oct, "eval('1 + 2')"), Value::double(3.0));
        run(&mut oct, "eval('error(''bad'')', 'caught = lasterr();');").unwrap();
        assert_eq!(value(&mut oct, "caught"), Value::str("bad"));
        run(&mut oct, "eval('y = [1 2', 'y = 0;');").unwrap();
        assert_eq!(value(&mut oct, "y"), Value::double(0.0));
    }

    #[test]
    fn names_and_handles() {
        let mut oct = Octave::new();
        run(&mut oct, "v = 1; function r = f(a, varargin)\n r = nargin;\nend\n").unwrap();
        assert_eq!(value(&mut oct, "exist('v')"), Value::double(1.0));
        assert_eq!(value(&mut oct, "exist('zeros')"), Value::double(5.0));
        assert_eq!(value(&mut oct, "exist('f')"), Value::double(103.0));
        assert_eq!(value(&mut oct, "exist('nothing_here')"), Value::double(0.0));
        assert_eq!(value(&mut oct, "f(1, 2, 3)"), Value::double(3.0));
        assert_eq!(value(&mut oct, "nargin('f')"), Value::double(-2.0));
        assert_eq!(value(&mut oct, "func2str(str2func('max'))"), Value::str("max"));
        assert_eq!(value(&mut oct, "feval('max', [4 9 2])"), Value::double(9.0));
        assert_eq!(value(&mut oct, "isvarname('a1')"), Value::logical(true));
        assert!(run(&mut oct, "nargin").unwrap_err().contains("invalid use at top level"));
        assert!(run(&mut oct, "str2func('@(x) x')").unwrap_err().contains("not supported"));
    }

    #[test]
    fn clear_and_who() {
        let mut oct = Octave::new();
        run(&mut oct, "alpha = 1; beta = 2; abc = 3; global g; g = 4;").unwrap();
        run(&mut oct, "clear('a*')").unwrap();
        assert_eq!(value(&mut oct, "who()"), run(&mut oct, "{'beta'; 'g'}").unwrap().remove(0));
        assert_eq!(value(&mut oct, "isglobal('g')"), Value::logical(true));
        run(&mut oct, "clear('-global')").unwrap();
        assert!(!oct.globals.contains_key("g"));
        run(&mut oct, "clear").unwrap();
        assert!(oct.visible_names().is_empty());
    }

    #[test]
    fn hostcall_without_callback() {
        let mut oct = Octave::new();
        assert_eq!(run(&mut oct, "hostcall('nope')").unwrap_err(), "hostcall: no host function named 'nope'");
    }
}
