//! Text conversion, comparison, editing and regular expressions.

use regex::{Captures, Regex, RegexBuilder};

use super::{array_of, cellstr_of, cellstr_value, check_nargs, count_of, logical_array, one, text_of, usage, Outcome};
use crate::array::{Buffer, NdArray};
use crate::interp::error::{checked_numel, rt_err, Result};
use crate::interp::frame::Frame;
use crate::interp::strfmt::{self, escape};
use crate::interp::{parse, Octave};
use crate::value::{CellArray, StructValue, Value};

pub(super) const NAMES: &[&str] = &[
    "num2str", "int2str", "mat2str", "str2num", "str2double", "sprintf", "strcmp", "strcmpi",
    "strncmp", "strncmpi", "upper", "lower", "toupper", "tolower", "strcat", "strtrim", "strsplit",
    "strjoin", "strrep", "strfind", "blanks", "regexprep", "regexp", "regexpi", "isspace",
    "isdigit", "isalpha", "isletter", "isupper", "islower", "ismember",
];

pub(super) fn call(oct: &mut Octave, name: &str, args: Vec<Value>, nargout: usize) -> Outcome {
    match name {
        "num2str" => {
            check_nargs(name, &args, 1, 2)?;
            one(strfmt::num2str(&args[0], args.get(1))?)
        }
        "int2str" => {
            check_nargs(name, &args, 1, 1)?;
            let a = array_of(&args[0], name)?;
            let xs = a.data().to_f64_vec().into_iter().map(f64::round).collect();
            let a = NdArray::from_parts(a.shape().to_vec(), Buffer::Double(xs));
            one(strfmt::num2str(&Value::numeric(a), None)?)
        }
        "mat2str" => {
            check_nargs(name, &args, 1, 2)?;
            let prec = match args.get(1) {
                Some(p) => count_of(p, name)?,
                None => 15,
            };
            one(Value::str(&strfmt::mat2str(&args[0], prec)?))
        }
        "str2num" => {
            check_nargs(name, &args, 1, 1)?;
            let text = text_rows_joined(&args[0], name)?;
            let (value, ok) = match str2num(oct, &text) {
                Some(v) => (v, true),
                None => (Value::empty(), false),
            };
            Ok(Some(vec![value, Value::logical(ok)]))
        }
        "str2double" => {
            check_nargs(name, &args, 1, 1)?;
            one(str2double(&args[0]))
        }
        "sprintf" => {
            let Some((fmt, rest)) = args.split_first() else {
                return Err(usage(name));
            };
            let fmt = text_of(fmt, name).map_err(|_| rt_err!("sprintf: format TEMPLATE must be a string"))?;
            one(Value::str(&strfmt::sprintf(&escape(&fmt), rest)?))
        }
        "strcmp" | "strcmpi" => {
            check_nargs(name, &args, 2, 2)?;
            let fold = name == "strcmpi";
            one(compare(&args[0], &args[1], |x, y| {
                if fold {
                    x.to_lowercase() == y.to_lowercase()
                } else {
                    x == y
                }
            }))
        }
        "strncmp" | "strncmpi" => {
            check_nargs(name, &args, 3, 3)?;
            let n = count_of(&args[2], name)?;
            let fold = name == "strncmpi";
            one(compare(&args[0], &args[1], |x, y| {
                let (x, y) = if fold { (x.to_lowercase(), y.to_lowercase()) } else { (x.to_string(), y.to_string()) };
                n > 0 && x.chars().count() >= n && y.chars().count() >= n && x.chars().take(n).eq(y.chars().take(n))
            }))
        }
        "upper" | "toupper" => {
            check_nargs(name, &args, 1, 1)?;
            one(map_chars(&args[0], &|c| c.to_uppercase().next().unwrap_or(c)))
        }
        "lower" | "tolower" => {
            check_nargs(name, &args, 1, 1)?;
            one(map_chars(&args[0], &|c| c.to_lowercase().next().unwrap_or(c)))
        }
        "strcat" => one(strcat(&args)?),
        "strtrim" => {
            check_nargs(name, &args, 1, 1)?;
            let trim = |s: &str| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').to_string();
            one(map_strings(&args[0], trim).ok_or_else(|| rt_err!("strtrim: S argument must be a string or cellstring"))?)
        }
        "strsplit" => one(strsplit(&args)?),
        "strjoin" => {
            check_nargs(name, &args, 1, 2)?;
            let items = cellstr_of(&args[0]).ok_or_else(|| rt_err!("strjoin: CSTR must be a cell array of strings"))?;
            let delim = match args.get(1) {
                Some(d) => escape(&text_of(d, name)?),
                None => " ".into(),
            };
            one(Value::str(&items.join(&delim)))
        }
        "strrep" => {
            check_nargs(name, &args, 3, 3)?;
            let from = text_of(&args[1], name)?;
            let to = text_of(&args[2], name)?;
            let replace = |s: &str| if from.is_empty() { s.to_string() } else { s.replace(&from, &to) };
            one(map_strings(&args[0], replace).ok_or_else(|| rt_err!("strrep: STR, PTN, and REP arguments must be strings or cell arrays of strings"))?)
        }
        "strfind" => {
            check_nargs(name, &args, 2, 2)?;
            let pat = text_of(&args[1], name)?;
            match &args[0] {
                Value::Cell(c) => {
                    let hits = c
                        .elems()
                        .iter()
                        .map(|v| v.as_text().map(|s| positions(&s, &pat)).ok_or_else(|| rt_err!("strfind: STR must be a string or cell array of strings")))
                        .collect::<Result<Vec<_>>>()?;
                    one(Value::Cell(CellArray::from_parts(c.shape().to_vec(), hits)))
                }
                v => {
                    let s = text_of(v, name).map_err(|_| rt_err!("strfind: STR must be a string or cell array of strings"))?;
                    one(positions(&s, &pat))
                }
            }
        }
        "blanks" => {
            check_nargs(name, &args, 1, 1)?;
            let n = checked_numel(&[1, count_of(&args[0], name)?])?;
            one(Value::str(&" ".repeat(n)))
        }
        "regexprep" => one(regexprep(&args)?),
        "regexp" | "regexpi" => regexp(name, &args, nargout).map(Some),
        "isspace" | "isdigit" | "isalpha" | "isletter" | "isupper" | "islower" => {
            check_nargs(name, &args, 1, 1)?;
            let test: fn(&char) -> bool = match name {
                "isspace" => |c| c.is_whitespace(),
                "isdigit" => char::is_ascii_digit,
                "isupper" => |c| c.is_uppercase(),
                "islower" => |c| c.is_lowercase(),
                _ => |c| c.is_alphabetic(),
            };
            let shape = args[0].shape();
            let bits = match &args[0] {
                Value::Char(a) => match a.data() {
                    Buffer::Char(cs) => cs.iter().map(test).collect(),
                    _ => vec![false; a.numel()],
                },
                other => vec![false; other.numel()],
            };
            one(logical_array(shape, bits))
        }
        "ismember" => ismember(&args, nargout).map(Some),
        _ => Ok(None),
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

/// Rows of a char array joined with `;`, for evaluating as a matrix.
fn text_rows_joined(v: &Value, name: &str) -> Result<String> {
    match v {
        Value::Char(a) => Ok(a.text_rows().unwrap_or_default().join(";")),
        _ => Err(rt_err!("{name}: S must be a string or string array")),
    }
}

/// Evaluate `[text]` in a scratch frame.
fn str2num(oct: &mut Octave, text: &str) -> Option<Value> {
    let program = parse(&format!("octb_str2num_result = [{text}];")).ok()?;
    let base = oct.frame_depth();
    oct.push_frame(Frame::default());
    let result = oct.run_program(&program, 0).map(|_| oct.lookup("octb_str2num_result").cloned());
    oct.truncate_frames(base);
    result.ok().flatten()
}

fn parse_double(s: &str) -> f64 {
    let t = s.trim();
    let (sign, body) = match t.as_bytes().first() {
        Some(b'-') => (-1.0, &t[1..]),
        Some(b'+') => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    match body.to_ascii_lowercase().as_str() {
        "inf" | "infinity" => sign * f64::INFINITY,
        "nan" | "na" => f64::NAN,
        "" => f64::NAN,
        lower if lower.starts_with(|c: char| c.is_ascii_digit() || c == '.') => {
            lower.replace(',', "").parse::<f64>().map_or(f64::NAN, |x| sign * x)
        }
        _ => f64::NAN,
    }
}

fn str2double(v: &Value) -> Value {
    match v {
        Value::Cell(c) => {
            let xs = c.elems().iter().map(|e| e.as_text().map_or(f64::NAN, |s| parse_double(&s))).collect();
            super::double_array(c.shape().to_vec(), xs)
        }
        Value::Char(a) => match a.text_rows() {
            Some(rows) if rows.len() == 1 => Value::double(parse_double(&rows[0])),
            Some(rows) => super::double_array(vec![rows.len(), 1], rows.iter().map(|r| parse_double(r)).collect()),
            None => Value::double(f64::NAN),
        },
        _ => Value::double(f64::NAN),
    }
}

// ── Comparison ────────────────────────────────────────────────────────────────

enum Strings {
    Text(String),
    Cell(Vec<usize>, Vec<Option<String>>),
    Other,
}

fn strings_of(v: &Value) -> Strings {
    match v {
        Value::Cell(c) => Strings::Cell(c.shape().to_vec(), c.elems().iter().map(Value::as_text).collect()),
        other => other.as_text().map_or(Strings::Other, Strings::Text),
    }
}

/// `strcmp`-family comparison: text against text gives one answer, text
/// against a cell compares every element.
fn compare(a: &Value, b: &Value, eq: impl Fn(&str, &str) -> bool) -> Value {
    let matches = |x: &str, y: &Option<String>| y.as_deref().is_some_and(|y| eq(x, y));
    match (strings_of(a), strings_of(b)) {
        (Strings::Text(x), Strings::Text(y)) => Value::logical(eq(&x, &y)),
        (Strings::Text(x), Strings::Cell(shape, ys)) | (Strings::Cell(shape, ys), Strings::Text(x)) => {
            logical_array(shape, ys.iter().map(|y| matches(&x, y)).collect())
        }
        (Strings::Cell(sa, xs), Strings::Cell(sb, ys)) => {
            let pair = |x: &Option<String>, y: &Option<String>| x.as_deref().is_some_and(|x| matches(x, y));
            if xs.len() == 1 {
                logical_array(sb, ys.iter().map(|y| pair(&xs[0], y)).collect())
            } else if ys.len() == 1 {
                logical_array(sa, xs.iter().map(|x| pair(x, &ys[0])).collect())
            } else if sa == sb {
                logical_array(sa, xs.iter().zip(&ys).map(|(x, y)| pair(x, y)).collect())
            } else {
                Value::logical(false)
            }
        }
        _ => match (a, b) {
            (Value::Char(x), Value::Char(y)) if x.shape() == y.shape() => {
                let (xr, yr) = (x.text_rows().unwrap_or_default(), y.text_rows().unwrap_or_default());
                Value::logical(xr.len() == yr.len() && xr.iter().zip(&yr).all(|(p, q)| eq(p, q)))
            }
            _ => Value::logical(false),
        },
    }
}

// ── Editing ───────────────────────────────────────────────────────────────────

fn map_chars(v: &Value, f: &dyn Fn(char) -> char) -> Value {
    match v {
        Value::Char(a) => match a.data() {
            Buffer::Char(cs) => Value::Char(NdArray::from_parts(a.shape().to_vec(), Buffer::Char(cs.iter().map(|&c| f(c)).collect()))),
            _ => v.clone(),
        },
        Value::Cell(c) => {
            let elems = c.elems().iter().map(|e| map_chars(e, f)).collect();
            Value::Cell(CellArray::from_parts(c.shape().to_vec(), elems))
        }
        other => other.clone(),
    }
}

/// Apply `f` to a string or to every string of a cellstr.
fn map_strings(v: &Value, f: impl Fn(&str) -> String) -> Option<Value> {
    if let Some(items) = cellstr_of(v) {
        let out = items.iter().map(|s| f(s)).collect();
        return Some(cellstr_value(v.shape(), out));
    }
    v.as_text().map(|s| Value::str(&f(&s)))
}

fn strcat(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(usage("strcat"));
    }
    let cell_shape = args.iter().find_map(|v| match v {
        Value::Cell(c) if c.numel() != 1 => Some(c.shape().to_vec()),
        _ => None,
    });
    if args.iter().any(Value::is_cell) {
        let shape = cell_shape.unwrap_or_else(|| vec![1, 1]);
        let n: usize = shape.iter().product();
        let mut out = vec![String::new(); n];
        for v in args {
            let pieces: Vec<String> = match v {
                Value::Cell(c) => cellstr_of(v)
                    .filter(|items| items.len() == n || items.len() == 1)
                    .ok_or_else(|| rt_err!("strcat: nonconformant arguments"))
                    .map(|items| if c.numel() == 1 { vec![items[0].clone(); n] } else { items })?,
                other => vec![text_of(other, "strcat")?; n],
            };
            for (acc, p) in out.iter_mut().zip(pieces) {
                acc.push_str(&p);
            }
        }
        return Ok(cellstr_value(shape, out));
    }
    let mut out = String::new();
    for v in args {
        let s = text_of(v, "strcat")?;
        out.push_str(s.trim_end_matches(|c: char| c.is_whitespace()));
    }
    Ok(Value::str(&out))
}

fn strsplit(args: &[Value]) -> Result<Value> {
    if args.is_empty() {
        return Err(usage("strsplit"));
    }
    let s = text_of(&args[0], "strsplit")?;
    let mut rest = &args[1..];
    let mut delims: Vec<String> = [" ", "\x0c", "\n", "\r", "\t", "\x0b"].iter().map(|d| d.to_string()).collect();
    if let Some(d) = rest.first() {
        let is_option = d.as_text().is_some_and(|t| t.eq_ignore_ascii_case("collapsedelimiters"));
        if !is_option {
            delims = match cellstr_of(d) {
                Some(items) => items.iter().map(|t| escape(t)).collect(),
                None => vec![escape(&text_of(d, "strsplit")?)],
            };
            rest = &rest[1..];
        }
    }
    let mut collapse = true;
    for pair in rest.chunks(2) {
        match pair {
            [k, v] if k.as_text().is_some_and(|t| t.eq_ignore_ascii_case("collapsedelimiters")) => {
                collapse = crate::value::truth(v).unwrap_or(true);
            }
            _ => return Err(rt_err!("strsplit: invalid parameter")),
        }
    }
    delims.retain(|d| !d.is_empty());
    delims.sort_by_key(|d| std::cmp::Reverse(d.len()));
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    let mut after_delim = false;
    while i < s.len() {
        if let Some(d) = delims.iter().find(|d| s[i..].starts_with(d.as_str())) {
            if !(collapse && after_delim) {
                parts.push(std::mem::take(&mut current));
            }
            after_delim = true;
            i += d.len();
            continue;
        }
        let Some(c) = s[i..].chars().next() else { break };
        current.push(c);
        after_delim = false;
        i += c.len_utf8();
    }
    parts.push(current);
    Ok(cellstr_value(vec![1, parts.len()], parts))
}

/// 1-based character positions where `pat` occurs in `s`, overlaps included.
fn positions(s: &str, pat: &str) -> Value {
    let hay: Vec<char> = s.chars().collect();
    let needle: Vec<char> = pat.chars().collect();
    let hits: Vec<f64> = if needle.is_empty() || needle.len() > hay.len() {
        Vec::new()
    } else {
        (0..=hay.len() - needle.len())
            .filter(|&i| hay[i..i + needle.len()] == needle[..])
            .map(|i| (i + 1) as f64)
            .collect()
    };
    if hits.is_empty() {
        return super::double_array(vec![1, 0], hits);
    }
    Value::row(hits)
}

// ── Regular expressions ───────────────────────────────────────────────────────

fn compile(name: &str, pattern: &str, ignore_case: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| rt_err!("{name}: {}", e.to_string().lines().last().unwrap_or("invalid pattern").trim()))
}

/// `$1` back-references become `${1}` so adjacent text is not read as part
/// of the group name.
fn replacement(rep: &str) -> String {
    let mut out = String::with_capacity(rep.len());
    let mut chars = rep.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(char::is_ascii_digit) {
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            out.push_str(&format!("${{{digits}}}"));
        } else if c == '$' {
            out.push_str("$$");
        } else {
            out.push(c);
        }
    }
    out
}

fn regexprep(args: &[Value]) -> Result<Value> {
    if args.len() < 3 {
        return Err(usage("regexprep"));
    }
    let pattern = text_of(&args[1], "regexprep")?;
    let rep = replacement(&escape(&text_of(&args[2], "regexprep")?));
    let mut once = false;
    let mut ignore_case = false;
    for opt in &args[3..] {
        match text_of(opt, "regexprep")?.as_str() {
            "once" => once = true,
            "ignorecase" => ignore_case = true,
            "matchcase" => ignore_case = false,
            other => return Err(rt_err!("regexprep: unknown option \"{other}\"")),
        }
    }
    let re = compile("regexprep", &pattern, ignore_case)?;
    let apply = |s: &str| {
        if once {
            re.replacen(s, 1, rep.as_str()).into_owned()
        } else {
            re.replace_all(s, rep.as_str()).into_owned()
        }
    };
    map_strings(&args[0], apply)
        .ok_or_else(|| rt_err!("regexprep: STRING must be a string or cell array of strings"))
}

/// Character (not byte) position of byte offset `at` in `s`.
fn char_pos(s: &str, at: usize) -> usize {
    s[..at].chars().count()
}

const REGEXP_OUTPUTS: [&str; 7] = ["start", "end", "tokenextents", "match", "tokens", "names", "split"];

fn regexp(name: &str, args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    if args.len() < 2 {
        return Err(usage(name));
    }
    let s = text_of(&args[0], name)?;
    let pattern = text_of(&args[1], name)?;
    let mut once = false;
    let mut ignore_case = name == "regexpi";
    let mut order: Vec<&str> = Vec::new();
    for opt in &args[2..] {
        let opt = text_of(opt, name)?.to_ascii_lowercase();
        match opt.as_str() {
            "once" => once = true,
            "ignorecase" => ignore_case = true,
            "matchcase" => ignore_case = false,
            sel => match REGEXP_OUTPUTS.iter().find(|o| **o == sel) {
                Some(o) => order.push(*o),
                None => return Err(rt_err!("{name}: unknown option \"{sel}\"")),
            },
        }
    }
    if order.is_empty() {
        order = REGEXP_OUTPUTS.to_vec();
    }
    let re = compile(name, &pattern, ignore_case)?;
    let caps: Vec<Captures> = if once { re.captures(&s).into_iter().collect() } else { re.captures_iter(&s).collect() };

    let groups = re.captures_len() - 1;
    let token_strings = |c: &Captures| -> Vec<String> {
        if groups == 0 {
            vec![c[0].to_string()]
        } else {
            (1..=groups).map(|g| c.get(g).map_or(String::new(), |m| m.as_str().to_string())).collect()
        }
    };
    let pick = |all: Vec<Value>, none: Value| -> Value {
        if once {
            all.into_iter().next().unwrap_or(none)
        } else {
            Value::Cell(CellArray::row(all))
        }
    };

    let output = |which: &str| -> Value {
        match which {
            "start" | "end" => {
                let xs: Vec<f64> = caps
                    .iter()
                    .filter_map(|c| c.get(0))
                    .map(|m| {
                        let pos = if which == "start" { char_pos(&s, m.start()) + 1 } else { char_pos(&s, m.end()) };
                        pos as f64
                    })
                    .collect();
                if xs.is_empty() {
                    super::double_array(vec![1, 0], xs)
                } else if once {
                    Value::double(xs[0])
                } else {
                    Value::row(xs)
                }
            }
            "tokenextents" => {
                let all = caps
                    .iter()
                    .map(|c| {
                        let spans: Vec<(f64, f64)> = if groups == 0 {
                            c.get(0).map(|m| (char_pos(&s, m.start()) as f64 + 1.0, char_pos(&s, m.end()) as f64)).into_iter().collect()
                        } else {
                            (1..=groups)
                                .map(|g| c.get(g).map_or((0.0, -1.0), |m| (char_pos(&s, m.start()) as f64 + 1.0, char_pos(&s, m.end()) as f64)))
                                .collect()
                        };
                        let n = spans.len();
                        let mut data: Vec<f64> = spans.iter().map(|p| p.0).collect();
                        data.extend(spans.iter().map(|p| p.1));
                        super::double_array(vec![n, 2], data)
                    })
                    .collect();
                pick(all, super::double_array(vec![1, 0], Vec::new()))
            }
            "match" => {
                let all = caps.iter().map(|c| Value::str(&c[0])).collect();
                pick(all, Value::str(""))
            }
            "tokens" => {
                let all = caps
                    .iter()
                    .map(|c| {
                        let toks = token_strings(c);
                        cellstr_value(vec![1, toks.len()], toks)
                    })
                    .collect();
                pick(all, Value::Cell(CellArray::filled(&[1, 0])))
            }
            "names" => {
                let first = caps.first();
                let fields: StructValue = re
                    .capture_names()
                    .flatten()
                    .map(|n| {
                        let text = first.and_then(|c| c.name(n)).map_or("", |m| m.as_str());
                        (n, Value::str(text))
                    })
                    .collect();
                Value::Struct(fields)
            }
            _ => {
                let mut pieces = Vec::new();
                let mut at = 0;
                for m in caps.iter().filter_map(|c| c.get(0)) {
                    pieces.push(s[at..m.start()].to_string());
                    at = m.end();
                }
                pieces.push(s[at..].to_string());
                cellstr_value(vec![1, pieces.len()], pieces)
            }
        }
    };
    Ok(order.iter().take(nargout.max(1)).map(|w| output(*w)).collect())
}

// ── Membership ────────────────────────────────────────────────────────────────

fn ismember(args: &[Value], nargout: usize) -> Result<Vec<Value>> {
    check_nargs("ismember", args, 2, 2)?;
    let (x, set) = (&args[0], &args[1]);
    let (shape, locs): (Vec<usize>, Vec<usize>) = if let Some(items) = cellstr_of(set) {
        let find = |s: &str| items.iter().position(|t| t == s).map_or(0, |p| p + 1);
        match (x.as_text(), cellstr_of(x)) {
            (Some(s), _) => (vec![1, 1], vec![find(&s)]),
            (None, Some(xs)) => (x.shape(), xs.iter().map(|s| find(s)).collect()),
            _ => return Err(rt_err!("ismember: A and S must be arrays or cell arrays of strings")),
        }
    } else {
        let a = array_of(x, "ismember")?;
        let s = array_of(set, "ismember")?;
        let pool = s.data().to_c64_vec();
        let locs = a.data().to_c64_vec().iter().map(|z| pool.iter().position(|p| p == z).map_or(0, |p| p + 1)).collect();
        (a.shape().to_vec(), locs)
    };
    let mut out = vec![logical_array(shape.clone(), locs.iter().map(|&l| l > 0).collect())];
    if nargout > 1 {
        out.push(super::double_array(shape, locs.iter().map(|&l| l as f64).collect()));
    }
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use crate::interp::{parse, Octave};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn eval(code: &str) -> Value {
        let mut oct = Octave::new();
        let program = parse(code).unwrap();
        oct.run_program(&program, 1).unwrap().remove(0)
    }

    fn cellstr(items: &[&str]) -> Value {
        let elems = items.iter().map(|s| Value::str(s)).collect();
        Value::Cell(crate::value::CellArray::row(elems))
    }

    #[test]
    fn number_conversions() {
        assert_eq!(eval("num2str(42)"), Value::str("42"));
        assert_eq!(eval("int2str(2.7)"), Value::str("3"));
        assert_eq!(eval("mat2str([1 2; 3 4])"), Value::str("[1 2;3 4]"));
        assert_eq!(eval("str2num('[1 2 3]')"), Value::row(vec![1.0, 2.0, 3.0]));
        assert_eq!(eval("str2double('2.5')"), Value::double(2.5));
        assert_eq!(eval("str2double('-Inf')"), Value::double(f64::NEG_INFINITY));
        assert_eq!(eval("isnan(str2double('abc'))"), Value::logical(true));
        assert_eq!(eval("sprintf('%d-%s', 4, 'x')"), Value::str("4-x"));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("strcmp('abc', 'abc')"), Value::logical(true));
        assert_eq!(eval("strcmp('abc', 1)"), Value::logical(false));
        assert_eq!(eval("strcmpi('ABC', 'abc')"), Value::logical(true));
        assert_eq!(eval("strncmp('abcdef', 'abcxyz', 3)"), Value::logical(true));
        assert_eq!(eval("strcmp({'a', 'b'}, 'b')"), eval("[false true]"));
    }

    #[test]
    fn editing() {
        assert_eq!(eval("upper('abc')"), Value::str("ABC"));
        assert_eq!(eval("strtrim(sprintf('  hi \\t'))"), Value::str("hi"));
        assert_eq!(eval("strcat('a ', 'b')"), Value::str("ab"));
        assert_eq!(eval("strsplit('a,b,,c', ',')"), cellstr(&["a", "b", "c"]));
        assert_eq!(
            eval("strsplit('a,b,,c', ',', 'CollapseDelimiters', false)"),
            cellstr(&["a", "b", "", "c"])
        );
        assert_eq!(eval("strjoin({'a', 'b'}, '-')"), Value::str("a-b"));
        assert_eq!(eval("strrep('aaa', 'a', 'bb')"), Value::str("bbbbbb"));
        assert_eq!(eval("strfind('abab', 'ab')"), Value::row(vec![1.0, 3.0]));
        assert_eq!(eval("size(strfind('abc', 'z'))"), Value::row(vec![1.0, 0.0]));
        assert_eq!(eval("blanks(3)"), Value::str("   "));
    }

    #[test]
    fn regular_expressions() {
        assert_eq!(eval("regexprep('hello world', '(\\w+) (\\w+)', '$2 $1')"), Value::str("world hello"));
        assert_eq!(eval("regexp('ab12cd345', '\\d+', 'match')"), cellstr(&["12", "345"]));
        assert_eq!(eval("regexp('ab12', '\\d+', 'match', 'once')"), Value::str("12"));
        assert_eq!(eval("regexp('ab12cd', '\\d')"), Value::row(vec![3.0, 4.0]));
        assert_eq!(eval("t = regexp('k=v', '(\\w)=(\\w)', 'tokens'); t{1}{2}"), Value::str("v"));
        assert_eq!(eval("n = regexp('k=v', '(?<key>\\w)=', 'names'); n.key"), Value::str("k"));
        assert_eq!(eval("regexp('a1b', '\\d', 'split')"), cellstr(&["a", "b"]));
    }

    #[test]
    fn character_classes_and_membership() {
        assert_eq!(eval("isdigit('a1')"), eval("[false true]"));
        assert_eq!(eval("isspace('a b')"), eval("[false true false]"));
        assert_eq!(eval("ismember(2, [1 2 3])"), Value::logical(true));
        assert_eq!(eval("ismember('b', {'a', 'b'})"), Value::logical(true));
        assert_eq!(eval("[tf, loc] = ismember([3 5], [5 3]); loc"), Value::row(vec![2.0, 1.0]));
    }
}
