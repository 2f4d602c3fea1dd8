//! Interpreter-side value model.
//!
//! Every value the embedded interpreter can hold is one variant of
//! [`Value`].  Numeric `1×1` arrays are always stored as [`Value::Scalar`];
//! use [`Value::numeric`] to build a numeric value from an array so the
//! normalisation is applied.

use indexmap::IndexMap;

use crate::array::{normalize_shape, Buffer, NdArray, Number, ShapeError};
use crate::typetag::{ElemType, TypeTag};

/// An interpreter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Number),
    /// Numeric or logical array that is not `1×1`.
    Matrix(NdArray),
    Char(NdArray),
    Cell(CellArray),
    Struct(StructValue),
    FunctionHandle(FunctionHandle),
}

impl Default for Value {
    /// The `0×0` double matrix, Octave's `[]`.
    fn default() -> Self {
        Value::empty()
    }
}

impl Value {
    /// `[]`
    pub fn empty() -> Self {
        Value::Matrix(NdArray::zeros(ElemType::Double, &[0, 0]))
    }

    pub fn double(x: f64) -> Self {
        Value::Scalar(Number::Double(x))
    }

    pub fn logical(b: bool) -> Self {
        Value::Scalar(Number::Logical(b))
    }

    /// Char row vector (`''` for the empty string).
    pub fn str(s: &str) -> Self {
        Value::Char(NdArray::from_text(s))
    }

    /// Wrap an array: char arrays stay char, `1×1` numeric arrays collapse
    /// to a scalar.
    pub fn numeric(a: NdArray) -> Self {
        if a.elem_type() == ElemType::Char {
            return Value::Char(a);
        }
        if a.is_scalar() {
            if let Some(n) = Number::from_buffer(a.data(), 0) {
                return Value::Scalar(n);
            }
        }
        Value::Matrix(a)
    }

    /// Row vector of doubles.
    pub fn row(xs: Vec<f64>) -> Self {
        Value::numeric(NdArray::row(xs))
    }

    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Scalar(n) => TypeTag::Array(n.elem_type()),
            Value::Matrix(a) | Value::Char(a) => TypeTag::Array(a.elem_type()),
            Value::Cell(_) => TypeTag::Cell,
            Value::Struct(_) => TypeTag::Struct,
            Value::FunctionHandle(_) => TypeTag::FunctionHandle,
        }
    }

    /// Octave's `class()`.
    pub fn class_name(&self) -> &'static str {
        self.type_tag().class_name()
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Value::Matrix(a) | Value::Char(a) => a.shape().to_vec(),
            Value::Cell(c) => c.shape().to_vec(),
            Value::Scalar(_) | Value::Struct(_) | Value::FunctionHandle(_) => vec![1, 1],
        }
    }

    pub fn numel(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Element type for numeric, logical and char values.
    pub fn elem_type(&self) -> Option<ElemType> {
        match self.type_tag() {
            TypeTag::Array(e) => Some(e),
            _ => None,
        }
    }

    /// Numeric, logical or char data as an array (scalars expand to `1×1`).
    pub fn to_array(&self) -> Option<NdArray> {
        match self {
            Value::Scalar(n) => Some(NdArray::scalar(*n)),
            Value::Matrix(a) | Value::Char(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// Text of a char row vector or empty char array.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Char(a) => a.to_text(),
            _ => None,
        }
    }

    /// First element as a double, for single-element numeric/char values.
    pub fn scalar_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(n) => Some(n.to_f64()),
            Value::Matrix(a) | Value::Char(a) if a.numel() == 1 => Some(a.data().get_f64(0)),
            _ => None,
        }
    }

    pub fn is_char(&self) -> bool {
        matches!(self, Value::Char(_))
    }

    pub fn is_cell(&self) -> bool {
        matches!(self, Value::Cell(_))
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::double(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::logical(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Scalar(n)
    }
}

impl From<NdArray> for Value {
    fn from(a: NdArray) -> Self {
        Value::numeric(a)
    }
}

impl From<CellArray> for Value {
    fn from(c: CellArray) -> Self {
        Value::Cell(c)
    }
}

impl From<StructValue> for Value {
    fn from(s: StructValue) -> Self {
        Value::Struct(s)
    }
}

// ── CellArray ─────────────────────────────────────────────────────────────────

/// A heterogeneous N-d container, column-major like [`NdArray`].
#[derive(Debug, Clone, PartialEq)]
pub struct CellArray {
    shape: Vec<usize>,
    elems: Vec<Value>,
}

impl Default for CellArray {
    fn default() -> Self {
        CellArray { shape: vec![0, 0], elems: Vec::new() }
    }
}

impl CellArray {
    pub fn new(shape: &[usize], elems: Vec<Value>) -> Result<Self, ShapeError> {
        let shape = normalize_shape(shape);
        let expected: usize = shape.iter().product();
        if expected != elems.len() {
            return Err(ShapeError { shape, expected, actual: elems.len() });
        }
        Ok(CellArray { shape, elems })
    }

    /// `1×n` cell.
    pub fn row(elems: Vec<Value>) -> Self {
        CellArray { shape: vec![1, elems.len()], elems }
    }

    /// `n×1` cell.
    pub fn column(elems: Vec<Value>) -> Self {
        CellArray { shape: vec![elems.len(), 1], elems }
    }

    /// A cell of the given shape filled with `[]`.
    pub fn filled(shape: &[usize]) -> Self {
        let shape = normalize_shape(shape);
        let n = shape.iter().product();
        CellArray { shape, elems: vec![Value::empty(); n] }
    }

    pub(crate) fn from_parts(shape: Vec<usize>, elems: Vec<Value>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), elems.len());
        CellArray { shape: normalize_shape(&shape), elems }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    pub(crate) fn elems_mut(&mut self) -> &mut Vec<Value> {
        &mut self.elems
    }

    pub fn into_elems(self) -> Vec<Value> {
        self.elems
    }

    pub fn numel(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// At most one non-singleton dimension.
    pub fn is_vector(&self) -> bool {
        self.shape.iter().filter(|&&d| d != 1).count() <= 1
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, ShapeError> {
        Self::new(shape, self.elems.clone())
    }
}

// ── StructValue ───────────────────────────────────────────────────────────────

/// A scalar struct: ordered field name → value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    fields: IndexMap<String, Value>,
}

impl StructValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    /// Set a field, keeping its position if it already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Remove a field, preserving the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> IndexMap<String, Value> {
        self.fields
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        StructValue { fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

// ── FunctionHandle ────────────────────────────────────────────────────────────

/// `@name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionHandle {
    pub name: String,
}

// ── Truth ─────────────────────────────────────────────────────────────────────

/// Octave's condition rule: non-empty and every element non-zero.
///
/// `None` for values that have no truth value (cells, structs, handles).
pub fn truth(v: &Value) -> Option<bool> {
    match v {
        Value::Scalar(n) => Some(n.to_buffer().is_nonzero(0)),
        Value::Matrix(a) | Value::Char(a) => {
            let data: &Buffer = a.data();
            Some(!a.is_empty() && (0..a.numel()).all(|i| data.is_nonzero(i)))
        }
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_by_one_collapses_to_scalar() {
        let v = Value::numeric(NdArray::row(vec![5i32]));
        assert_eq!(v, Value::Scalar(Number::Int32(5)));
        let c = Value::numeric(NdArray::row(vec!['x']));
        assert!(c.is_char());
    }

    #[test]
    fn shapes_and_classes() {
        assert_eq!(Value::empty().shape(), vec![0, 0]);
        assert_eq!(Value::str("").shape(), vec![0, 0]);
        assert_eq!(Value::str("abc").shape(), vec![1, 3]);
        assert_eq!(Value::double(1.0).class_name(), "double");
        assert_eq!(Value::Cell(CellArray::default()).class_name(), "cell");
        assert_eq!(
            Value::FunctionHandle(FunctionHandle { name: "sin".into() }).class_name(),
            "function_handle"
        );
    }

    #[test]
    fn truth_rules() {
        assert_eq!(truth(&Value::double(0.0)), Some(false));
        assert_eq!(truth(&Value::row(vec![1.0, 2.0])), Some(true));
        assert_eq!(truth(&Value::row(vec![1.0, 0.0])), Some(false));
        assert_eq!(truth(&Value::empty()), Some(false));
        assert_eq!(truth(&Value::Struct(StructValue::new())), None);
    }

    #[test]
    fn struct_field_order() {
        let mut s: StructValue =
            [("b", Value::double(1.0)), ("a", Value::double(2.0))].into_iter().collect();
        s.insert("c", Value::double(3.0));
        s.remove("b");
        assert_eq!(s.field_names().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn cell_shape_checked() {
        assert!(CellArray::new(&[2, 2], vec![Value::empty()]).is_err());
        assert!(CellArray::row(vec![Value::empty(); 3]).is_vector());
        assert!(!CellArray::filled(&[2, 2]).is_vector());
    }
}
