//! `printf`-style formatting and number-to-text conversion.
//!
//! Octave's `sprintf` flattens every argument into one element queue and
//! recycles the template until the queue is drained.  Char arrays travel
//! as whole strings for `%s` and expand to their character codes for
//! numeric conversions.

use std::collections::VecDeque;
use std::iter::Peekable;
use std::str::Chars;

use super::error::{rt_err, Result};
use super::format::exp_text;
use crate::array::{Buffer, NdArray};
use crate::value::Value;

// ── Escapes ───────────────────────────────────────────────────────────────────

/// Expand backslash escapes (`\n`, `\t`, octal and hex codes, ...).
pub(crate) fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('a') => out.push('\x07'),
            Some('b') => out.push('\x08'),
            Some('f') => out.push('\x0c'),
            Some('v') => out.push('\x0b'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('x') => {
                let mut code = 0u32;
                let mut seen = 0;
                while let Some(d) = chars.peek().and_then(|d| d.to_digit(16)) {
                    if seen == 2 {
                        break;
                    }
                    code = code * 16 + d;
                    seen += 1;
                    chars.next();
                }
                if seen == 0 {
                    out.push_str("\\x");
                } else {
                    out.extend(char::from_u32(code));
                }
            }
            Some(d @ '0'..='7') => {
                let mut code = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.extend(char::from_u32(code));
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ── Template ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
struct Flags {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Count {
    Fixed(usize),
    /// `*`, taken from the argument queue.
    Star,
}

#[derive(Debug, Clone, PartialEq)]
struct Spec {
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    conv: char,
}

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Lit(String),
    Conv(Spec),
}

fn read_count(chars: &mut Peekable<Chars<'_>>) -> Option<Count> {
    if chars.peek() == Some(&'*') {
        chars.next();
        return Some(Count::Star);
    }
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|d| d.to_digit(10)) {
        n = Some(n.unwrap_or(0) * 10 + d as usize);
        chars.next();
    }
    n.map(Count::Fixed)
}

fn parse_template(fmt: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut lit = String::new();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            lit.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            lit.push('%');
            continue;
        }
        let mut flags = Flags::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => flags.left = true,
                '0' => flags.zero = true,
                '+' => flags.plus = true,
                ' ' => flags.space = true,
                '#' => flags.alt = true,
                _ => break,
            }
            chars.next();
        }
        let width = read_count(&mut chars);
        let precision = if chars.peek() == Some(&'.') {
            chars.next();
            Some(read_count(&mut chars).unwrap_or(Count::Fixed(0)))
        } else {
            None
        };
        // Length modifiers carry no meaning here.
        while matches!(chars.peek(), Some('l' | 'h')) {
            chars.next();
        }
        match chars.next() {
            Some(conv @ ('d' | 'i' | 'u' | 'c' | 's' | 'f' | 'F' | 'e' | 'E' | 'g' | 'G' | 'x' | 'X' | 'o')) => {
                if !lit.is_empty() {
                    pieces.push(Piece::Lit(std::mem::take(&mut lit)));
                }
                pieces.push(Piece::Conv(Spec { flags, width, precision, conv }));
            }
            Some(other) => {
                lit.push('%');
                lit.push(other);
            }
            None => lit.push('%'),
        }
    }
    if !lit.is_empty() {
        pieces.push(Piece::Lit(lit));
    }
    pieces
}

// ── Arguments ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Num(f64),
    Text(String),
}

fn flatten(args: &[Value]) -> Result<VecDeque<Arg>> {
    let mut queue = VecDeque::new();
    for v in args {
        match v {
            Value::Char(a) => {
                let text: String = match a.data() {
                    Buffer::Char(cs) => cs.iter().collect(),
                    _ => String::new(),
                };
                queue.push_back(Arg::Text(text));
            }
            Value::Scalar(_) | Value::Matrix(_) => {
                if let Some(a) = v.to_array() {
                    queue.extend(a.data().to_f64_vec().into_iter().map(Arg::Num));
                }
            }
            Value::Cell(_) => return Err(rt_err!("printf: wrong type argument 'cell array'")),
            Value::Struct(_) => return Err(rt_err!("printf: wrong type argument 'struct'")),
            Value::FunctionHandle(_) => {
                return Err(rt_err!("printf: wrong type argument 'function handle'"))
            }
        }
    }
    Ok(queue)
}

fn is_numeric_conv(conv: char) -> bool {
    !matches!(conv, 's' | 'c')
}

/// Next argument for `spec`, expanding text for numeric conversions.
fn next_arg(queue: &mut VecDeque<Arg>, conv: char) -> Option<Arg> {
    let arg = queue.pop_front()?;
    match arg {
        Arg::Text(t) if is_numeric_conv(conv) => {
            let mut codes = t.chars().map(|c| Arg::Num(c as u32 as f64));
            let first = codes.next();
            for (k, code) in codes.enumerate() {
                queue.insert(k, code);
            }
            first.or_else(|| next_arg(queue, conv))
        }
        other => Some(other),
    }
}

fn take_count(count: &Option<Count>, queue: &mut VecDeque<Arg>) -> Option<usize> {
    match count {
        Some(Count::Fixed(n)) => Some(*n),
        Some(Count::Star) => match queue.pop_front() {
            Some(Arg::Num(x)) if x >= 0.0 => Some(x as usize),
            _ => None,
        },
        None => None,
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

fn pad(body: String, width: Option<usize>, flags: &Flags, numeric: bool) -> String {
    let Some(width) = width else { return body };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let fill = width - len;
    if flags.left {
        format!("{body}{}", " ".repeat(fill))
    } else if flags.zero && numeric && !body.contains(['N', 'I']) {
        let (sign, digits) = match body.strip_prefix(['-', '+', ' ']) {
            Some(rest) => (&body[..1], rest),
            None => ("", body.as_str()),
        };
        format!("{sign}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{body}", " ".repeat(fill))
    }
}

fn signed(body: String, x: f64, flags: &Flags) -> String {
    if x.is_sign_negative() || x.is_nan() {
        body
    } else if flags.plus {
        format!("+{body}")
    } else if flags.space {
        format!(" {body}")
    } else {
        body
    }
}

fn special(x: f64) -> Option<String> {
    if x.is_nan() {
        Some("NaN".into())
    } else if x.is_infinite() {
        Some(if x > 0.0 { "Inf".into() } else { "-Inf".into() })
    } else {
        None
    }
}

/// C's `%g` with `prec` significant digits.
pub(crate) fn format_g(x: f64, prec: usize, alt: bool) -> String {
    if let Some(s) = special(x) {
        return s;
    }
    let p = prec.max(1);
    if x == 0.0 {
        return if x.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    let sci = format!("{:.*e}", p - 1, x);
    let exp: i32 = sci.split_once('e').and_then(|(_, e)| e.parse().ok()).unwrap_or(0);
    if exp < -4 || exp >= p as i32 {
        let e = exp_text(x, p - 1);
        if alt {
            e
        } else {
            let (m, rest) = e.split_once('e').unwrap_or((e.as_str(), ""));
            format!("{}e{rest}", strip_zeros(m))
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        let f = format!("{x:.decimals$}");
        if alt {
            f
        } else {
            strip_zeros(&f).to_owned()
        }
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn convert(spec: &Spec, arg: Option<Arg>, width: Option<usize>, precision: Option<usize>) -> String {
    let flags = &spec.flags;
    let Some(arg) = arg else {
        return pad(String::new(), width, flags, false);
    };
    match (spec.conv, arg) {
        ('s', Arg::Text(t)) => {
            let t = match precision {
                Some(p) => t.chars().take(p).collect(),
                None => t,
            };
            pad(t, width, flags, false)
        }
        ('s', Arg::Num(x)) => {
            let body = match char::from_u32(x as u32) {
                Some(c) if x.fract() == 0.0 && x >= 0.0 => String::from(c),
                _ => format_g(x, 6, false),
            };
            pad(body, width, flags, false)
        }
        ('c', Arg::Text(t)) => pad(t, width, flags, false),
        ('c', Arg::Num(x)) => {
            pad(char::from_u32(x as u32).map(String::from).unwrap_or_default(), width, flags, false)
        }
        (_, Arg::Text(t)) => pad(t, width, flags, false),
        (conv, Arg::Num(x)) => {
            if let Some(s) = special(x) {
                return pad(signed(s, x, flags), width, flags, false);
            }
            let body = match conv {
                'd' | 'i' | 'u' | 'x' | 'X' | 'o' if x.fract() != 0.0 || (x < 0.0 && conv != 'd' && conv != 'i') => {
                    let as_g = Spec { conv: 'g', ..spec.clone() };
                    return convert(&as_g, Some(Arg::Num(x)), width, precision);
                }
                'd' | 'i' | 'u' => format!("{x:.0}"),
                'f' | 'F' => format!("{x:.*}", precision.unwrap_or(6)),
                'e' => exp_text(x, precision.unwrap_or(6)),
                'E' => exp_text(x, precision.unwrap_or(6)).to_uppercase(),
                'g' => format_g(x, precision.unwrap_or(6), flags.alt),
                'G' => format_g(x, precision.unwrap_or(6), flags.alt).to_uppercase(),
                'x' => format!("{:x}", x as u64),
                'X' => format!("{:X}", x as u64),
                'o' => format!("{:o}", x as u64),
                _ => format!("{x}"),
            };
            pad(signed(body, x, flags), width, flags, true)
        }
    }
}

/// Format `args` through the `printf` template `fmt`.
///
/// `fmt` is used as given; callers expand escapes first where Octave does.
pub(crate) fn sprintf(fmt: &str, args: &[Value]) -> Result<String> {
    let pieces = parse_template(fmt);
    let mut queue = flatten(args)?;
    let has_conv = pieces.iter().any(|p| matches!(p, Piece::Conv(_)));
    let mut out = String::new();
    let mut first = true;
    while first || (has_conv && !queue.is_empty()) {
        let mut consumed = false;
        for piece in &pieces {
            match piece {
                Piece::Lit(s) => out.push_str(s),
                Piece::Conv(spec) => {
                    let width = take_count(&spec.width, &mut queue);
                    let precision = take_count(&spec.precision, &mut queue);
                    if !first && queue.is_empty() && !consumed {
                        break;
                    }
                    let arg = next_arg(&mut queue, spec.conv);
                    consumed |= arg.is_some();
                    out.push_str(&convert(spec, arg, width, precision));
                }
            }
        }
        first = false;
    }
    Ok(out)
}

// ── num2str / mat2str ─────────────────────────────────────────────────────────

/// Common leading blanks removed from every row.
fn trim_rows(rows: Vec<String>) -> Vec<String> {
    let lead = rows
        .iter()
        .map(|r| r.len() - r.trim_start().len())
        .min()
        .unwrap_or(0);
    rows.into_iter().map(|r| r[lead..].trim_end().to_owned()).collect()
}

fn rows_value(rows: Vec<String>) -> Value {
    let rows = trim_rows(rows);
    let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
    let padded: Vec<String> = rows.iter().map(|r| format!("{r:<width$}")).collect();
    if padded.len() == 1 {
        Value::str(&padded[0])
    } else {
        Value::Char(NdArray::from_text_rows(&padded))
    }
}

/// `num2str(x)` and `num2str(x, prec_or_format)`.
pub(crate) fn num2str(v: &Value, arg: Option<&Value>) -> Result<Value> {
    if v.is_char() {
        return Ok(v.clone());
    }
    let a = v
        .to_array()
        .ok_or_else(|| rt_err!("num2str: X must be a numeric, logical, or character array"))?;
    if a.ndims() > 2 {
        return Err(rt_err!("num2str: X must be two dimensional"));
    }
    let (rows, cols) = (a.rows(), a.cols());
    let data = a.data();
    let format_one: Box<dyn Fn(usize) -> Result<String> + '_> = match arg {
        Some(f @ Value::Char(_)) => {
            let fmt = escape(&f.as_text().unwrap_or_default());
            Box::new(move |i| sprintf(&fmt, &[Value::double(data.get_f64(i))]))
        }
        Some(p) => {
            let prec = p.scalar_f64().ok_or_else(|| rt_err!("num2str: PREC must be a scalar integer >= 0"))?;
            let prec = prec.max(0.0) as usize;
            Box::new(move |i| Ok(format_g(data.get_f64(i), prec, false)))
        }
        None if a.elem_type().is_complex() => Box::new(move |i| {
            let z = data.get_c64(i);
            let sign = if z.im < 0.0 { '-' } else { '+' };
            Ok(format!("{}{sign}{}i", format_g(z.re, 5, false), format_g(z.im.abs(), 5, false)))
        }),
        None => {
            let xs = data.to_f64_vec();
            let max_abs = xs.iter().filter(|x| x.is_finite()).fold(0.0f64, |m, x| m.max(x.abs()));
            let all_int = xs.iter().all(|x| !x.is_finite() || x.fract() == 0.0);
            if all_int {
                Box::new(move |i| Ok(format_g(data.get_f64(i), 17, false)))
            } else {
                let dgt = if max_abs > 0.0 { max_abs.log10().floor() as i32 } else { 0 };
                let sig = (dgt + 5).clamp(5, 16) as usize;
                Box::new(move |i| Ok(format_g(data.get_f64(i), sig, false)))
            }
        }
    };
    let mut texts = Vec::with_capacity(rows * cols);
    for i in 0..rows * cols {
        texts.push(format_one(i)?);
    }
    if rows * cols == 1 {
        return Ok(Value::str(texts[0].trim()));
    }
    let width = texts.iter().map(String::len).max().unwrap_or(0);
    let lines: Vec<String> = (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| format!("{:>width$}", texts[j * rows + i]))
                .collect::<Vec<_>>()
                .join("  ")
        })
        .collect();
    Ok(rows_value(lines))
}

/// `mat2str(x, n)`: an expression that evaluates back to `x`.
pub(crate) fn mat2str(v: &Value, prec: usize) -> Result<String> {
    let text = |x: f64| format_g(x, prec, false);
    match v {
        Value::Char(a) => {
            let rows = a.text_rows().unwrap_or_default();
            let quoted: Vec<String> = rows.iter().map(|r| format!("\"{r}\"")).collect();
            Ok(if quoted.len() == 1 { quoted[0].clone() } else { format!("[{}]", quoted.join(";")) })
        }
        Value::Scalar(_) | Value::Matrix(_) => {
            let a = v.to_array().ok_or_else(|| rt_err!("mat2str: X must be two dimensional"))?;
            if a.ndims() > 2 {
                return Err(rt_err!("mat2str: X must be two dimensional"));
            }
            let data = a.data();
            let logical = a.elem_type() == crate::typetag::ElemType::Logical;
            let complex = a.elem_type().is_complex();
            let elem = |i: usize| {
                if logical {
                    return if data.is_nonzero(i) { "true".to_owned() } else { "false".to_owned() };
                }
                if complex {
                    let z = data.get_c64(i);
                    let sign = if z.im < 0.0 { '-' } else { '+' };
                    return format!("{}{sign}{}i", text(z.re), text(z.im.abs()));
                }
                text(data.get_f64(i))
            };
            let (r, c) = (a.rows(), a.cols());
            if r * c == 1 {
                return Ok(elem(0));
            }
            let rows: Vec<String> = (0..r)
                .map(|i| (0..c).map(|j| elem(j * r + i)).collect::<Vec<_>>().join(" "))
                .collect();
            Ok(format!("[{}]", rows.join(";")))
        }
        _ => Err(rt_err!("mat2str: X must be two dimensional")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fmt(f: &str, args: &[Value]) -> String {
        sprintf(&escape(f), args).unwrap()
    }

    #[test]
    fn escapes() {
        assert_eq!(escape(r"a\tb\n"), "a\tb\n");
        assert_eq!(escape(r"\101\x42"), "AB");
        assert_eq!(escape(r"\q"), "\\q");
    }

    #[test]
    fn basic_conversions() {
        assert_eq!(fmt("%d", &[Value::double(42.0)]), "42");
        assert_eq!(fmt("%5.2f|", &[Value::double(3.14159)]), " 3.14|");
        assert_eq!(fmt("%-4d|", &[Value::double(7.0)]), "7   |");
        assert_eq!(fmt("%05d", &[Value::double(-42.0)]), "-0042");
        assert_eq!(fmt("%s=%g", &[Value::str("x"), Value::double(0.5)]), "x=0.5");
        assert_eq!(fmt("%e", &[Value::double(12345.678)]), "1.234568e+04");
        assert_eq!(fmt("%x", &[Value::double(255.0)]), "ff");
        assert_eq!(fmt("%d%%", &[Value::double(5.0)]), "5%");
    }

    #[test]
    fn non_integer_for_d_switches_format() {
        assert_eq!(fmt("%d", &[Value::double(1.5)]), "1.5");
        assert_eq!(fmt("%d", &[Value::double(f64::INFINITY)]), "Inf");
    }

    #[test]
    fn template_recycles() {
        assert_eq!(fmt("%d,", &[Value::row(vec![1.0, 2.0, 3.0])]), "1,2,3,");
        assert_eq!(fmt("%d %d\n", &[Value::row(vec![1.0, 2.0, 3.0])]), "1 2\n3 \n");
        assert_eq!(fmt("hello\n", &[]), "hello\n");
        assert_eq!(fmt("[%d]", &[]), "[]");
    }

    #[test]
    fn text_and_numbers_mix() {
        assert_eq!(fmt("%d", &[Value::str("ab")]), "9798");
        assert_eq!(fmt("%s", &[Value::double(65.0)]), "A");
        assert_eq!(fmt("%s-%s", &[Value::str("ab"), Value::str("cd")]), "ab-cd");
    }

    #[test]
    fn g_format() {
        assert_eq!(format_g(0.0001, 6, false), "0.0001");
        assert_eq!(format_g(0.00001, 6, false), "1e-05");
        assert_eq!(format_g(123456789.0, 6, false), "1.23457e+08");
        assert_eq!(format_g(100.0, 6, false), "100");
    }

    #[test]
    fn num2str_rules() {
        assert_eq!(num2str(&Value::double(5.0), None).unwrap(), Value::str("5"));
        assert_eq!(num2str(&Value::double(std::f64::consts::PI), None).unwrap(), Value::str("3.1416"));
        assert_eq!(num2str(&Value::double(123.456), None).unwrap(), Value::str("123.456"));
        assert_eq!(num2str(&Value::row(vec![1.0, 2.0, 3.0]), None).unwrap(), Value::str("1  2  3"));
        assert_eq!(
            num2str(&Value::double(std::f64::consts::PI), Some(&Value::double(8.0))).unwrap(),
            Value::str("3.1415927")
        );
        assert_eq!(num2str(&Value::str("x"), None).unwrap(), Value::str("x"));
    }

    #[test]
    fn mat2str_rules() {
        let m = Value::numeric(NdArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.5]]).unwrap());
        assert_eq!(mat2str(&m, 15).unwrap(), "[1 2;3 4.5]");
        assert_eq!(mat2str(&Value::double(-0.25), 15).unwrap(), "-0.25");
        assert_eq!(mat2str(&Value::logical(true), 15).unwrap(), "true");
        assert_eq!(mat2str(&Value::str("hi"), 15).unwrap(), "\"hi\"");
    }
}
