//! Host-side value model.
//!
//! [`HostValue`] is what a host program hands to the bridge and gets back
//! from it.  Its variants follow a dynamically typed scripting host: plain
//! numbers, text, sequences, mappings with arbitrary keys, plus a few kinds
//! the interpreter cannot represent (`None`, tuples, opaque objects) so that
//! conversion faults can be expressed.

use std::fmt;

use crate::array::{Complex64, NdArray, Number};

/// A host value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    /// The host's "no value" marker.
    #[default]
    None,
    Bool(bool),
    /// An integer without an explicit width.
    Int(i64),
    Float(f64),
    Complex(Complex64),
    /// A scalar carrying an explicit numeric kind.
    Number(Number),
    Text(String),
    /// Typed N-d array (column-major).
    Array(NdArray),
    List(Vec<HostValue>),
    Tuple(Vec<HostValue>),
    Dict(HostDict),
    /// A host object of the named type with no interpreter counterpart.
    Opaque(String),
}

impl HostValue {
    /// Host type name, used in conversion fault messages.
    pub fn type_name(&self) -> String {
        match self {
            HostValue::None => "NoneType".into(),
            HostValue::Bool(_) => "bool".into(),
            HostValue::Int(_) => "int".into(),
            HostValue::Float(_) => "float".into(),
            HostValue::Complex(_) => "complex".into(),
            HostValue::Number(n) => n.elem_type().dtype().into(),
            HostValue::Text(_) => "str".into(),
            HostValue::Array(_) => "ndarray".into(),
            HostValue::List(_) => "list".into(),
            HostValue::Tuple(_) => "tuple".into(),
            HostValue::Dict(_) => "dict".into(),
            HostValue::Opaque(name) => name.clone(),
        }
    }

    pub fn list<T: Into<HostValue>>(items: impl IntoIterator<Item = T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            HostValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&HostDict> {
        match self {
            HostValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Numeric value of a real scalar, or of a one-element array.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Bool(b) => Some(f64::from(u8::from(*b))),
            HostValue::Int(n) => Some(*n as f64),
            HostValue::Float(x) => Some(*x),
            HostValue::Number(n) if !n.elem_type().is_complex() => Some(n.to_f64()),
            HostValue::Array(a) if a.numel() == 1 && !a.elem_type().is_complex() => {
                Some(a.data().get_f64(0))
            }
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => f.write_str("None"),
            HostValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            HostValue::Int(n) => write!(f, "{n}"),
            HostValue::Float(x) => write!(f, "{x}"),
            HostValue::Complex(c) => write!(f, "({}{:+}j)", c.re, c.im),
            HostValue::Number(n) => write!(f, "{}({})", n.elem_type().dtype(), n.to_f64()),
            HostValue::Text(s) => write!(f, "{s:?}"),
            HostValue::Array(a) => write!(f, "array(shape={:?}, dtype={})", a.shape(), a.elem_type().dtype()),
            HostValue::List(v) => write_seq(f, "[", v, "]"),
            HostValue::Tuple(v) => write_seq(f, "(", v, if v.len() == 1 { ",)" } else { ")" }),
            HostValue::Dict(d) => {
                f.write_str("{")?;
                for (i, (k, v)) in d.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            HostValue::Opaque(name) => write!(f, "<{name} object>"),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[HostValue], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, v) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{v}")?;
    }
    f.write_str(close)
}

macro_rules! host_from {
    ($($t:ty => |$x:ident| $e:expr),* $(,)?) => {
        $(
            impl From<$t> for HostValue {
                fn from($x: $t) -> Self {
                    $e
                }
            }
        )*
    };
}

host_from! {
    bool => |b| HostValue::Bool(b),
    i32 => |n| HostValue::Int(n.into()),
    i64 => |n| HostValue::Int(n),
    f64 => |x| HostValue::Float(x),
    Complex64 => |c| HostValue::Complex(c),
    Number => |n| HostValue::Number(n),
    &str => |s| HostValue::Text(s.to_owned()),
    String => |s| HostValue::Text(s),
    NdArray => |a| HostValue::Array(a),
    Vec<HostValue> => |v| HostValue::List(v),
    HostDict => |d| HostValue::Dict(d),
}

// ── HostDict ──────────────────────────────────────────────────────────────────

/// Insertion-ordered mapping with arbitrary host keys.
///
/// Equality ignores order, like a host dictionary.
#[derive(Debug, Clone, Default)]
pub struct HostDict {
    entries: Vec<(HostValue, HostValue)>,
}

impl HostDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `key`.
    pub fn insert(&mut self, key: impl Into<HostValue>, value: impl Into<HostValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &HostValue) -> Option<&HostValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Lookup by text key.
    pub fn get_str(&self, key: &str) -> Option<&HostValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HostValue, &HostValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for HostDict {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<HostValue>, V: Into<HostValue>> FromIterator<(K, V)> for HostDict {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut d = HostDict::new();
        for (k, v) in iter {
            d.insert(k, v);
        }
        d
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dict_equality_ignores_order() {
        let a: HostDict = [("x", 1i64), ("y", 2)].into_iter().collect();
        let b: HostDict = [("y", 2i64), ("x", 1)].into_iter().collect();
        assert_eq!(a, b);
        let c: HostDict = [("x", 1i64)].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn dict_insert_replaces() {
        let mut d = HostDict::new();
        d.insert("k", 1i64);
        d.insert("k", "v");
        assert_eq!(d.len(), 1);
        assert_eq!(d.get_str("k"), Some(&HostValue::Text("v".into())));
    }

    #[test]
    fn type_names() {
        assert_eq!(HostValue::None.type_name(), "NoneType");
        assert_eq!(HostValue::Float(1.22).type_name(), "float");
        assert_eq!(HostValue::Number(Number::Int64(3)).type_name(), "int64");
        assert_eq!(HostValue::Opaque("socket".into()).type_name(), "socket");
    }

    #[test]
    fn display_tuple() {
        let t = HostValue::Tuple(vec![HostValue::Int(1)]);
        assert_eq!(t.to_string(), "(1,)");
        assert_eq!(HostValue::list([1i64, 2]).to_string(), "[1, 2]");
    }
}
