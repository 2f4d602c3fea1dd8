//! Value display in Octave's `format short` layout.
//!
//! [`display`] renders `name = value` the way the prompt echoes an
//! unterminated statement; [`disp`] renders the value alone.

use std::fmt::Write as _;

use super::ops::dims_str;
use crate::array::{Buffer, Complex64, NdArray};
use crate::value::{CellArray, StructValue, Value};

/// Significant digits of `format short`.
const PREC: i32 = 5;

// ── Number formats ────────────────────────────────────────────────────────────

/// Layout shared by every element of a real matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
enum RealFmt {
    Int { fw: usize },
    Fixed { fw: usize, rd: usize },
    Exp { fw: usize, rd: usize },
}

/// Digits before the decimal point (`0` for values below one).
fn num_digits(x: f64) -> i32 {
    if x == 0.0 {
        0
    } else {
        x.abs().log10().floor() as i32 + 1
    }
}

/// Leading and trailing digits needed to show `digits` significant places.
fn ld_rd(digits: i32) -> (i32, i32) {
    if digits > 0 {
        (digits, if PREC > digits { PREC - digits } else { PREC })
    } else if digits < 0 {
        (1, if PREC > digits { PREC - digits } else { PREC })
    } else {
        (1, if PREC > 1 { PREC - 1 } else { PREC })
    }
}

fn real_format(xs: &[f64]) -> RealFmt {
    let finite: Vec<f64> = xs.iter().copied().filter(|x| x.is_finite()).collect();
    let special = finite.len() < xs.len();
    let all_int = finite.iter().all(|x| x.fract() == 0.0);
    let max_abs = finite.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    let min_abs = finite.iter().fold(f64::INFINITY, |m, x| m.min(x.abs()));
    let min_abs = if min_abs.is_finite() { min_abs } else { 0.0 };

    if all_int {
        let digits = num_digits(max_abs);
        if digits > 15 {
            return RealFmt::Exp { fw: 11, rd: (PREC - 1) as usize };
        }
        let mut fw = if digits <= 0 { 2 } else { digits as usize + 1 };
        if special {
            fw = fw.max(4);
        }
        return RealFmt::Int { fw };
    }
    let (ld_max, rd_max) = ld_rd(num_digits(max_abs));
    let (ld_min, rd_min) = ld_rd(num_digits(min_abs));
    let (ld, rd) = (ld_max.max(ld_min), rd_max.max(rd_min));
    let fw = (1 + ld + 1 + rd) as usize;
    if fw >= 10 {
        RealFmt::Exp { fw: 11, rd: (PREC - 1) as usize }
    } else {
        RealFmt::Fixed { fw: fw.max(if special { 4 } else { 0 }), rd: rd as usize }
    }
}

impl RealFmt {
    fn width(self) -> usize {
        match self {
            RealFmt::Int { fw } | RealFmt::Fixed { fw, .. } | RealFmt::Exp { fw, .. } => fw,
        }
    }

    fn text(self, x: f64) -> String {
        if x.is_nan() {
            return "NaN".into();
        }
        if x.is_infinite() {
            return if x > 0.0 { "Inf".into() } else { "-Inf".into() };
        }
        match self {
            RealFmt::Int { .. } if x == 0.0 => "0".into(),
            RealFmt::Int { .. } => format!("{x:.0}"),
            RealFmt::Fixed { rd, .. } => format!("{x:.rd$}"),
            RealFmt::Exp { rd, .. } => exp_text(x, rd),
        }
    }
}

/// `%.{rd}e` with a signed, two-digit exponent.
pub(crate) fn exp_text(x: f64, rd: usize) -> String {
    let raw = format!("{x:.rd$e}");
    let Some((mantissa, exp)) = raw.split_once('e') else { return raw };
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exp.abs())
}

fn complex_text(z: Complex64, re: RealFmt, im: RealFmt) -> String {
    let sign = if z.im < 0.0 || (z.im == 0.0 && z.im.is_sign_negative()) { '-' } else { '+' };
    format!("{} {sign} {}i", re.text(z.re), im.text(z.im.abs()))
}

// ── Element text ──────────────────────────────────────────────────────────────

/// Text of every element of a numeric array plus the column width.
///
/// Integer and logical classes use a two-space separator, floating point
/// three (the sign column of the float layout supplies the third).
fn element_texts(a: &NdArray) -> (Vec<String>, usize) {
    let data = a.data();
    match data {
        Buffer::ComplexDouble(_) | Buffer::ComplexSingle(_) => {
            let zs = data.to_c64_vec();
            let re = real_format(&zs.iter().map(|z| z.re).collect::<Vec<_>>());
            let im = real_format(&zs.iter().map(|z| z.im.abs()).collect::<Vec<_>>());
            let texts: Vec<String> = zs.iter().map(|z| complex_text(*z, re, im)).collect();
            let fw = texts.iter().map(String::len).max().unwrap_or(0) + 1;
            (texts, fw)
        }
        Buffer::Double(_) | Buffer::Single(_) => {
            let xs = data.to_f64_vec();
            let fmt = real_format(&xs);
            let texts: Vec<String> = xs.iter().map(|x| fmt.text(*x)).collect();
            let fw = texts.iter().map(String::len).max().unwrap_or(0).max(fmt.width());
            (texts, fw)
        }
        _ => {
            let texts: Vec<String> = (0..data.len())
                .map(|i| data.get_i128(i).map_or_else(|| data.get_f64(i).to_string(), |n| n.to_string()))
                .collect();
            let fw = texts.iter().map(String::len).max().unwrap_or(0);
            (texts, fw)
        }
    }
}

fn scalar_text(a: &NdArray) -> String {
    let (texts, _) = element_texts(a);
    texts.into_iter().next().unwrap_or_default()
}

/// Rows of a 2-D page, `offset` elements into the data.
fn page_lines(texts: &[String], fw: usize, rows: usize, cols: usize, offset: usize) -> Vec<String> {
    (0..rows)
        .map(|i| {
            let mut line = String::new();
            for j in 0..cols {
                let _ = write!(line, "  {:>fw$}", texts[offset + j * rows + i]);
            }
            line
        })
        .collect()
}

/// Body lines of a non-scalar numeric array.
fn matrix_lines(a: &NdArray) -> Vec<String> {
    let (texts, fw) = element_texts(a);
    let shape = a.shape();
    let (rows, cols) = (shape[0], shape[1]);
    if shape.len() == 2 {
        return page_lines(&texts, fw, rows, cols, 0);
    }
    let page = rows * cols;
    let pages = a.numel() / page.max(1);
    let mut lines = Vec::new();
    for p in 0..pages {
        let mut subs = Vec::new();
        let mut rem = p;
        for &d in &shape[2..] {
            subs.push((rem % d + 1).to_string());
            rem /= d;
        }
        lines.push(format!("ans(:,:,{}) =", subs.join(",")));
        lines.push(String::new());
        lines.extend(page_lines(&texts, fw, rows, cols, p * page));
        if p + 1 < pages {
            lines.push(String::new());
        }
    }
    lines
}

// ── Layout ────────────────────────────────────────────────────────────────────

enum Body {
    Inline(String),
    Block(Vec<String>),
}

fn array_body(v: &Value) -> Option<Body> {
    Some(match v {
        Value::Scalar(n) => Body::Inline(scalar_text(&NdArray::scalar(*n))),
        Value::Char(a) => match a.text_rows() {
            _ if a.is_empty() => Body::Inline(String::new()),
            Some(rows) if rows.len() == 1 => Body::Inline(rows.into_iter().next().unwrap_or_default()),
            Some(rows) => Body::Block(rows),
            None => Body::Block(matrix_lines(&a.cast(crate::typetag::ElemType::Double))),
        },
        Value::Matrix(a) if a.is_empty() => Body::Inline(format!("[]({})", dims_str(a.shape()))),
        Value::Matrix(a) => Body::Block(matrix_lines(a)),
        _ => return None,
    })
}

/// Subscript label of the `k`-th cell element.
fn cell_label(k: usize, shape: &[usize]) -> String {
    let mut rem = k;
    let subs: Vec<String> = shape
        .iter()
        .map(|&d| {
            let s = rem % d.max(1) + 1;
            rem /= d.max(1);
            s.to_string()
        })
        .collect();
    format!("[{}]", subs.join(","))
}

fn show_cell(out: &mut String, c: &CellArray, indent: usize) {
    let pad = " ".repeat(indent);
    let _ = writeln!(out, "{pad}{{");
    for (k, e) in c.elems().iter().enumerate() {
        show(out, &cell_label(k, c.shape()), e, indent + 2);
    }
    let _ = writeln!(out, "{pad}}}");
}

fn show_fields(out: &mut String, s: &StructValue, indent: usize) {
    for (name, v) in s.fields() {
        show(out, name, v, indent);
    }
}

fn show(out: &mut String, name: &str, v: &Value, indent: usize) {
    let pad = " ".repeat(indent);
    match v {
        Value::Cell(c) if c.is_empty() => {
            let _ = writeln!(out, "{pad}{name} = {{}}({})", dims_str(c.shape()));
        }
        Value::Cell(c) => {
            let _ = writeln!(out, "{pad}{name} =");
            show_cell(out, c, indent);
            if indent == 0 {
                out.push('\n');
            }
        }
        Value::Struct(s) => {
            let _ = writeln!(out, "{pad}{name} =\n");
            let _ = writeln!(out, "{pad}  scalar structure containing the fields:\n");
            show_fields(out, s, indent + 4);
            out.push('\n');
        }
        Value::FunctionHandle(h) => {
            let _ = writeln!(out, "{pad}{name} = @{}", h.name);
        }
        _ => match array_body(v) {
            Some(Body::Inline(text)) => {
                let _ = writeln!(out, "{pad}{name} = {text}");
            }
            Some(Body::Block(lines)) => {
                let _ = writeln!(out, "{pad}{name} =\n");
                for line in lines {
                    let _ = writeln!(out, "{pad}{line}");
                }
                out.push('\n');
            }
            None => {}
        },
    }
}

/// `name = value`, as echoed for a statement without a semicolon.
pub(crate) fn display(name: &str, v: &Value) -> String {
    let mut out = String::new();
    show(&mut out, name, v, 0);
    out
}

/// The value alone, as printed by `disp`.
pub(crate) fn disp(v: &Value) -> String {
    let mut out = String::new();
    match v {
        Value::Cell(c) if c.is_empty() => {
            let _ = writeln!(out, "{{}}({})", dims_str(c.shape()));
        }
        Value::Cell(c) => show_cell(&mut out, c, 0),
        Value::Struct(s) => show_fields(&mut out, s, 4),
        Value::FunctionHandle(h) => {
            let _ = writeln!(out, "@{}", h.name);
        }
        Value::Matrix(a) if a.is_empty() => {}
        _ => match array_body(v) {
            Some(Body::Inline(text)) => {
                let _ = writeln!(out, "{text}");
            }
            Some(Body::Block(lines)) => {
                for line in lines {
                    let _ = writeln!(out, "{line}");
                }
            }
            None => {}
        },
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Number;
    use pretty_assertions::assert_eq;

    #[test]
    fn scalars() {
        assert_eq!(display("x", &Value::double(5.0)), "x = 5\n");
        assert_eq!(display("x", &Value::double(-5.0)), "x = -5\n");
        assert_eq!(display("x", &Value::double(3.14159265)), "x = 3.1416\n");
        assert_eq!(display("x", &Value::double(0.5)), "x = 0.5000\n");
        assert_eq!(display("x", &Value::double(0.01)), "x = 0.010000\n");
        assert_eq!(display("x", &Value::double(0.001)), "x = 1.0000e-03\n");
        assert_eq!(display("x", &Value::double(12345.6)), "x = 1.2346e+04\n");
        assert_eq!(display("x", &Value::double(f64::NAN)), "x = NaN\n");
        assert_eq!(display("x", &Value::Scalar(Number::Int8(-7))), "x = -7\n");
        assert_eq!(display("b", &Value::logical(true)), "b = 1\n");
    }

    #[test]
    fn complex_scalar() {
        let z = Value::Scalar(Number::ComplexDouble(Complex64::new(1.0, -2.0)));
        assert_eq!(display("z", &z), "z = 1 - 2i\n");
    }

    #[test]
    fn matrices() {
        let m = Value::numeric(NdArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap());
        assert_eq!(display("m", &m), "m =\n\n   1   2\n   3   4\n\n");
        assert_eq!(display("v", &Value::row(vec![1.5, 2.25])), "v =\n\n   1.5000   2.2500\n\n");
        let ints = Value::numeric(NdArray::row(vec![1i32, -20]));
        assert_eq!(display("k", &ints), "k =\n\n    1  -20\n\n");
        assert_eq!(display("e", &Value::empty()), "e = [](0x0)\n");
    }

    #[test]
    fn text() {
        assert_eq!(display("s", &Value::str("abc")), "s = abc\n");
        assert_eq!(display("s", &Value::str("")), "s = \n");
        let rows = Value::Char(NdArray::from_text_rows(&["ab", "cd"]));
        assert_eq!(display("s", &rows), "s =\n\nab\ncd\n\n");
        assert_eq!(disp(&Value::str("hi")), "hi\n");
    }

    #[test]
    fn containers() {
        let c = Value::Cell(CellArray::row(vec![Value::double(1.0), Value::str("abc")]));
        assert_eq!(display("c", &c), "c =\n{\n  [1,1] = 1\n  [1,2] = abc\n}\n\n");
        let mut s = StructValue::new();
        s.insert("a", Value::double(1.0));
        assert_eq!(
            display("s", &Value::Struct(s)),
            "s =\n\n  scalar structure containing the fields:\n\n    a = 1\n\n"
        );
        assert_eq!(display("c", &Value::Cell(CellArray::default())), "c = {}(0x0)\n");
    }
}
