//! Owned N-d array storage shared by both value models.
//!
//! Buffers are column-major (Octave order).  An [`NdArray`] always carries
//! at least two dimensions; trailing singleton dimensions beyond the second
//! are dropped, so `[2, 3, 1]` and `[2, 3]` are the same shape.

use crate::typetag::ElemType;

// ── Complex ───────────────────────────────────────────────────────────────────

/// A complex number stored as real and imaginary parts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub const fn new(re: T, im: T) -> Self {
        Complex { re, im }
    }
}

pub type Complex64 = Complex<f64>;
pub type Complex32 = Complex<f32>;

impl Complex64 {
    fn to_single(self) -> Complex32 {
        Complex::new(self.re as f32, self.im as f32)
    }
}

impl Complex32 {
    fn to_double(self) -> Complex64 {
        Complex::new(self.re as f64, self.im as f64)
    }
}

// ── Buffer ────────────────────────────────────────────────────────────────────

/// A typed, owned element buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Buffer {
    Double(Vec<f64>),
    Single(Vec<f32>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    ComplexDouble(Vec<Complex64>),
    ComplexSingle(Vec<Complex32>),
    Logical(Vec<bool>),
    Char(Vec<char>),
}

/// Apply `$body` to the inner `Vec` of any buffer variant.
macro_rules! each_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            Buffer::Double($v) => $body,
            Buffer::Single($v) => $body,
            Buffer::Int8($v) => $body,
            Buffer::Int16($v) => $body,
            Buffer::Int32($v) => $body,
            Buffer::Int64($v) => $body,
            Buffer::UInt8($v) => $body,
            Buffer::UInt16($v) => $body,
            Buffer::UInt32($v) => $body,
            Buffer::UInt64($v) => $body,
            Buffer::ComplexDouble($v) => $body,
            Buffer::ComplexSingle($v) => $body,
            Buffer::Logical($v) => $body,
            Buffer::Char($v) => $body,
        }
    };
}

/// Like [`each_buffer`], rewrapping the result in the same variant.
macro_rules! map_buffer {
    ($buf:expr, $v:ident => $body:expr) => {
        match $buf {
            Buffer::Double($v) => Buffer::Double($body),
            Buffer::Single($v) => Buffer::Single($body),
            Buffer::Int8($v) => Buffer::Int8($body),
            Buffer::Int16($v) => Buffer::Int16($body),
            Buffer::Int32($v) => Buffer::Int32($body),
            Buffer::Int64($v) => Buffer::Int64($body),
            Buffer::UInt8($v) => Buffer::UInt8($body),
            Buffer::UInt16($v) => Buffer::UInt16($body),
            Buffer::UInt32($v) => Buffer::UInt32($body),
            Buffer::UInt64($v) => Buffer::UInt64($body),
            Buffer::ComplexDouble($v) => Buffer::ComplexDouble($body),
            Buffer::ComplexSingle($v) => Buffer::ComplexSingle($body),
            Buffer::Logical($v) => Buffer::Logical($body),
            Buffer::Char($v) => Buffer::Char($body),
        }
    };
}

/// Round half away from zero and clamp into an integer range; NaN maps to 0.
pub(crate) fn saturate(x: f64, (min, max): (i128, i128)) -> i128 {
    if x.is_nan() {
        return 0;
    }
    // `as` saturates at the i128 bounds, far outside every integer class.
    (x.round() as i128).clamp(min, max)
}

impl Buffer {
    pub fn elem_type(&self) -> ElemType {
        match self {
            Buffer::Double(_) => ElemType::Double,
            Buffer::Single(_) => ElemType::Single,
            Buffer::Int8(_) => ElemType::Int8,
            Buffer::Int16(_) => ElemType::Int16,
            Buffer::Int32(_) => ElemType::Int32,
            Buffer::Int64(_) => ElemType::Int64,
            Buffer::UInt8(_) => ElemType::UInt8,
            Buffer::UInt16(_) => ElemType::UInt16,
            Buffer::UInt32(_) => ElemType::UInt32,
            Buffer::UInt64(_) => ElemType::UInt64,
            Buffer::ComplexDouble(_) => ElemType::ComplexDouble,
            Buffer::ComplexSingle(_) => ElemType::ComplexSingle,
            Buffer::Logical(_) => ElemType::Logical,
            Buffer::Char(_) => ElemType::Char,
        }
    }

    pub fn len(&self) -> usize {
        each_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A buffer of `n` zero elements (`'\0'` for char, `false` for logical).
    pub fn zeros(elem: ElemType, n: usize) -> Buffer {
        match elem {
            ElemType::Double => Buffer::Double(vec![0.0; n]),
            ElemType::Single => Buffer::Single(vec![0.0; n]),
            ElemType::Int8 => Buffer::Int8(vec![0; n]),
            ElemType::Int16 => Buffer::Int16(vec![0; n]),
            ElemType::Int32 => Buffer::Int32(vec![0; n]),
            ElemType::Int64 => Buffer::Int64(vec![0; n]),
            ElemType::UInt8 => Buffer::UInt8(vec![0; n]),
            ElemType::UInt16 => Buffer::UInt16(vec![0; n]),
            ElemType::UInt32 => Buffer::UInt32(vec![0; n]),
            ElemType::UInt64 => Buffer::UInt64(vec![0; n]),
            ElemType::ComplexDouble => Buffer::ComplexDouble(vec![Complex64::default(); n]),
            ElemType::ComplexSingle => Buffer::ComplexSingle(vec![Complex32::default(); n]),
            ElemType::Logical => Buffer::Logical(vec![false; n]),
            ElemType::Char => Buffer::Char(vec!['\0'; n]),
        }
    }

    /// Element `i` as a real double (real part for complex, code point for char).
    pub fn get_f64(&self, i: usize) -> f64 {
        match self {
            Buffer::Double(v) => v[i],
            Buffer::Single(v) => v[i] as f64,
            Buffer::Int8(v) => v[i] as f64,
            Buffer::Int16(v) => v[i] as f64,
            Buffer::Int32(v) => v[i] as f64,
            Buffer::Int64(v) => v[i] as f64,
            Buffer::UInt8(v) => v[i] as f64,
            Buffer::UInt16(v) => v[i] as f64,
            Buffer::UInt32(v) => v[i] as f64,
            Buffer::UInt64(v) => v[i] as f64,
            Buffer::ComplexDouble(v) => v[i].re,
            Buffer::ComplexSingle(v) => v[i].re as f64,
            Buffer::Logical(v) => f64::from(u8::from(v[i])),
            Buffer::Char(v) => v[i] as u32 as f64,
        }
    }

    /// Element `i` as a complex double.
    pub fn get_c64(&self, i: usize) -> Complex64 {
        match self {
            Buffer::ComplexDouble(v) => v[i],
            Buffer::ComplexSingle(v) => v[i].to_double(),
            _ => Complex::new(self.get_f64(i), 0.0),
        }
    }

    /// Element `i` of an integer, logical or char buffer as an exact integer.
    pub(crate) fn get_i128(&self, i: usize) -> Option<i128> {
        Some(match self {
            Buffer::Int8(v) => v[i] as i128,
            Buffer::Int16(v) => v[i] as i128,
            Buffer::Int32(v) => v[i] as i128,
            Buffer::Int64(v) => v[i] as i128,
            Buffer::UInt8(v) => v[i] as i128,
            Buffer::UInt16(v) => v[i] as i128,
            Buffer::UInt32(v) => v[i] as i128,
            Buffer::UInt64(v) => v[i] as i128,
            Buffer::Logical(v) => i128::from(v[i]),
            Buffer::Char(v) => v[i] as u32 as i128,
            _ => return None,
        })
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.get_f64(i)).collect()
    }

    pub fn to_c64_vec(&self) -> Vec<Complex64> {
        (0..self.len()).map(|i| self.get_c64(i)).collect()
    }

    /// Element `i` is non-zero.
    pub fn is_nonzero(&self, i: usize) -> bool {
        match self {
            Buffer::ComplexDouble(_) | Buffer::ComplexSingle(_) => {
                let c = self.get_c64(i);
                c.re != 0.0 || c.im != 0.0
            }
            Buffer::Logical(v) => v[i],
            _ => self.get_f64(i) != 0.0,
        }
    }

    /// Build a buffer of `elem` from doubles, with Octave's conversion rules
    /// (round-and-saturate for integers, non-zero test for logical).
    pub fn from_f64s(elem: ElemType, xs: Vec<f64>) -> Buffer {
        if let Some(range) = elem.int_range() {
            let ints = xs.iter().map(|&x| saturate(x, range));
            return Self::from_i128s(elem, ints);
        }
        match elem {
            ElemType::Double => Buffer::Double(xs),
            ElemType::Single => Buffer::Single(xs.into_iter().map(|x| x as f32).collect()),
            ElemType::ComplexDouble => {
                Buffer::ComplexDouble(xs.into_iter().map(|x| Complex::new(x, 0.0)).collect())
            }
            ElemType::ComplexSingle => Buffer::ComplexSingle(
                xs.into_iter().map(|x| Complex::new(x as f32, 0.0)).collect(),
            ),
            ElemType::Logical => Buffer::Logical(xs.into_iter().map(|x| x != 0.0).collect()),
            ElemType::Char => Buffer::Char(
                xs.into_iter()
                    .map(|x| char::from_u32(x.max(0.0) as u32).unwrap_or('\0'))
                    .collect(),
            ),
            // Integer types returned above.
            _ => Buffer::zeros(elem, 0),
        }
    }

    /// Build a buffer of `elem` from complex doubles.  Real targets keep the
    /// real part.
    pub fn from_c64s(elem: ElemType, xs: Vec<Complex64>) -> Buffer {
        match elem {
            ElemType::ComplexDouble => Buffer::ComplexDouble(xs),
            ElemType::ComplexSingle => {
                Buffer::ComplexSingle(xs.into_iter().map(Complex64::to_single).collect())
            }
            ElemType::Logical => {
                Buffer::Logical(xs.into_iter().map(|c| c.re != 0.0 || c.im != 0.0).collect())
            }
            other => Self::from_f64s(other, xs.into_iter().map(|c| c.re).collect()),
        }
    }

    /// Build an integer buffer, clamping each value into the type's range.
    pub(crate) fn from_i128s(elem: ElemType, xs: impl Iterator<Item = i128>) -> Buffer {
        let (min, max) = elem.int_range().unwrap_or((i128::MIN, i128::MAX));
        let xs = xs.map(|x| x.clamp(min, max));
        match elem {
            ElemType::Int8 => Buffer::Int8(xs.map(|x| x as i8).collect()),
            ElemType::Int16 => Buffer::Int16(xs.map(|x| x as i16).collect()),
            ElemType::Int32 => Buffer::Int32(xs.map(|x| x as i32).collect()),
            ElemType::Int64 => Buffer::Int64(xs.map(|x| x as i64).collect()),
            ElemType::UInt8 => Buffer::UInt8(xs.map(|x| x as u8).collect()),
            ElemType::UInt16 => Buffer::UInt16(xs.map(|x| x as u16).collect()),
            ElemType::UInt32 => Buffer::UInt32(xs.map(|x| x as u32).collect()),
            ElemType::UInt64 => Buffer::UInt64(xs.map(|x| x as u64).collect()),
            other => Self::from_f64s(other, xs.map(|x| x as f64).collect()),
        }
    }

    /// Convert to another element type using Octave's conversion rules.
    pub fn cast(&self, to: ElemType) -> Buffer {
        let from = self.elem_type();
        if from == to {
            return self.clone();
        }
        if to.is_integer() && (from.is_integer() || matches!(from, ElemType::Logical | ElemType::Char)) {
            let ints = (0..self.len()).filter_map(|i| self.get_i128(i));
            return Self::from_i128s(to, ints);
        }
        if from.is_complex() {
            return Self::from_c64s(to, self.to_c64_vec());
        }
        if to == ElemType::Logical {
            return Buffer::Logical((0..self.len()).map(|i| self.is_nonzero(i)).collect());
        }
        Self::from_f64s(to, self.to_f64_vec())
    }

    /// Elements at `indices`, in order.  Every index must be in bounds.
    pub fn gather(&self, indices: &[usize]) -> Buffer {
        map_buffer!(self, v => indices.iter().map(|&i| v[i]).collect())
    }

    /// Append `other`, converting it to this buffer's type first.
    pub fn append(&mut self, other: &Buffer) {
        match (self, other) {
            (Buffer::Double(a), Buffer::Double(b)) => a.extend_from_slice(b),
            (Buffer::Single(a), Buffer::Single(b)) => a.extend_from_slice(b),
            (Buffer::Int8(a), Buffer::Int8(b)) => a.extend_from_slice(b),
            (Buffer::Int16(a), Buffer::Int16(b)) => a.extend_from_slice(b),
            (Buffer::Int32(a), Buffer::Int32(b)) => a.extend_from_slice(b),
            (Buffer::Int64(a), Buffer::Int64(b)) => a.extend_from_slice(b),
            (Buffer::UInt8(a), Buffer::UInt8(b)) => a.extend_from_slice(b),
            (Buffer::UInt16(a), Buffer::UInt16(b)) => a.extend_from_slice(b),
            (Buffer::UInt32(a), Buffer::UInt32(b)) => a.extend_from_slice(b),
            (Buffer::UInt64(a), Buffer::UInt64(b)) => a.extend_from_slice(b),
            (Buffer::ComplexDouble(a), Buffer::ComplexDouble(b)) => a.extend_from_slice(b),
            (Buffer::ComplexSingle(a), Buffer::ComplexSingle(b)) => a.extend_from_slice(b),
            (Buffer::Logical(a), Buffer::Logical(b)) => a.extend_from_slice(b),
            (Buffer::Char(a), Buffer::Char(b)) => a.extend_from_slice(b),
            (dst, src) => {
                let src = src.cast(dst.elem_type());
                dst.append(&src);
            }
        }
    }

    /// `self[dst[k]] = src[src_idx[k]]` for every `k`, converting `src` to
    /// this buffer's type first.
    pub fn scatter(&mut self, dst: &[usize], src: &Buffer, src_idx: &[usize]) {
        macro_rules! put {
            ($a:expr, $b:expr) => {
                for (&d, &s) in dst.iter().zip(src_idx) {
                    $a[d] = $b[s];
                }
            };
        }
        match (self, src) {
            (Buffer::Double(a), Buffer::Double(b)) => put!(a, b),
            (Buffer::Single(a), Buffer::Single(b)) => put!(a, b),
            (Buffer::Int8(a), Buffer::Int8(b)) => put!(a, b),
            (Buffer::Int16(a), Buffer::Int16(b)) => put!(a, b),
            (Buffer::Int32(a), Buffer::Int32(b)) => put!(a, b),
            (Buffer::Int64(a), Buffer::Int64(b)) => put!(a, b),
            (Buffer::UInt8(a), Buffer::UInt8(b)) => put!(a, b),
            (Buffer::UInt16(a), Buffer::UInt16(b)) => put!(a, b),
            (Buffer::UInt32(a), Buffer::UInt32(b)) => put!(a, b),
            (Buffer::UInt64(a), Buffer::UInt64(b)) => put!(a, b),
            (Buffer::ComplexDouble(a), Buffer::ComplexDouble(b)) => put!(a, b),
            (Buffer::ComplexSingle(a), Buffer::ComplexSingle(b)) => put!(a, b),
            (Buffer::Logical(a), Buffer::Logical(b)) => put!(a, b),
            (Buffer::Char(a), Buffer::Char(b)) => put!(a, b),
            (a, b) => {
                let b = b.cast(a.elem_type());
                a.scatter(dst, &b, src_idx);
            }
        }
    }

    /// Grow (zero-filled) or shrink to `n` elements.
    pub fn resize(&mut self, n: usize) {
        each_buffer!(self, v => v.resize(n, Default::default()))
    }
}

macro_rules! buffer_from_vec {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$t>> for Buffer {
                fn from(v: Vec<$t>) -> Self {
                    Buffer::$variant(v)
                }
            }
        )*
    };
}

buffer_from_vec! {
    f64 => Double,
    f32 => Single,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    Complex64 => ComplexDouble,
    Complex32 => ComplexSingle,
    bool => Logical,
    char => Char,
}

// ── Number ────────────────────────────────────────────────────────────────────

/// A single numeric or logical value with its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Double(f64),
    Single(f32),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    ComplexDouble(Complex64),
    ComplexSingle(Complex32),
    Logical(bool),
}

impl Number {
    pub fn elem_type(&self) -> ElemType {
        self.to_buffer().elem_type()
    }

    /// A one-element buffer holding this number.
    pub fn to_buffer(&self) -> Buffer {
        match *self {
            Number::Double(x) => Buffer::Double(vec![x]),
            Number::Single(x) => Buffer::Single(vec![x]),
            Number::Int8(x) => Buffer::Int8(vec![x]),
            Number::Int16(x) => Buffer::Int16(vec![x]),
            Number::Int32(x) => Buffer::Int32(vec![x]),
            Number::Int64(x) => Buffer::Int64(vec![x]),
            Number::UInt8(x) => Buffer::UInt8(vec![x]),
            Number::UInt16(x) => Buffer::UInt16(vec![x]),
            Number::UInt32(x) => Buffer::UInt32(vec![x]),
            Number::UInt64(x) => Buffer::UInt64(vec![x]),
            Number::ComplexDouble(x) => Buffer::ComplexDouble(vec![x]),
            Number::ComplexSingle(x) => Buffer::ComplexSingle(vec![x]),
            Number::Logical(x) => Buffer::Logical(vec![x]),
        }
    }

    /// Element `i` of a numeric or logical buffer.  `None` for char buffers.
    pub fn from_buffer(buf: &Buffer, i: usize) -> Option<Number> {
        Some(match buf {
            Buffer::Double(v) => Number::Double(v[i]),
            Buffer::Single(v) => Number::Single(v[i]),
            Buffer::Int8(v) => Number::Int8(v[i]),
            Buffer::Int16(v) => Number::Int16(v[i]),
            Buffer::Int32(v) => Number::Int32(v[i]),
            Buffer::Int64(v) => Number::Int64(v[i]),
            Buffer::UInt8(v) => Number::UInt8(v[i]),
            Buffer::UInt16(v) => Number::UInt16(v[i]),
            Buffer::UInt32(v) => Number::UInt32(v[i]),
            Buffer::UInt64(v) => Number::UInt64(v[i]),
            Buffer::ComplexDouble(v) => Number::ComplexDouble(v[i]),
            Buffer::ComplexSingle(v) => Number::ComplexSingle(v[i]),
            Buffer::Logical(v) => Number::Logical(v[i]),
            Buffer::Char(_) => return None,
        })
    }

    pub fn to_f64(&self) -> f64 {
        self.to_buffer().get_f64(0)
    }
}

// ── NdArray ───────────────────────────────────────────────────────────────────

/// Shape and buffer length disagree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dimensions {shape:?} hold {expected} elements, but {actual} were supplied")]
pub struct ShapeError {
    pub shape: Vec<usize>,
    pub expected: usize,
    pub actual: usize,
}

/// Canonical form of a shape: at least two dimensions, no trailing
/// singletons past the second.  A 0-d shape is `1×1`, a 1-d shape `1×n`.
pub fn normalize_shape(shape: &[usize]) -> Vec<usize> {
    let mut dims = match shape.len() {
        0 => vec![1, 1],
        1 => vec![1, shape[0]],
        _ => shape.to_vec(),
    };
    while dims.len() > 2 && dims.last() == Some(&1) {
        dims.pop();
    }
    dims
}

/// An owned N-d array in column-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: Buffer,
}

impl NdArray {
    /// Create an array, checking that `shape` matches the buffer length.
    pub fn new(shape: &[usize], data: impl Into<Buffer>) -> Result<Self, ShapeError> {
        let data = data.into();
        let shape = normalize_shape(shape);
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(ShapeError { shape, expected, actual: data.len() });
        }
        Ok(NdArray { shape, data })
    }

    /// Create from a row-major (C order) buffer.
    pub fn from_row_major(shape: &[usize], data: impl Into<Buffer>) -> Result<Self, ShapeError> {
        let rm = Self::new(shape, data)?;
        let order = permutation(&rm.shape, Order::RowMajorSource);
        Ok(NdArray { data: rm.data.gather(&order), shape: rm.shape })
    }

    /// Build from equal-length rows of a 2-D matrix.
    pub fn from_rows<T: Copy>(rows: &[Vec<T>]) -> Result<Self, ShapeError>
    where
        Vec<T>: Into<Buffer>,
    {
        let ncols = rows.first().map_or(0, Vec::len);
        let flat: Vec<T> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self::from_row_major(&[rows.len(), ncols], flat)
    }

    /// `1×n` row vector.
    pub fn row(data: impl Into<Buffer>) -> Self {
        let data = data.into();
        NdArray { shape: vec![1, data.len()], data }
    }

    /// `n×1` column vector.
    pub fn column(data: impl Into<Buffer>) -> Self {
        let data = data.into();
        NdArray { shape: vec![data.len(), 1], data }
    }

    /// `1×1` array.
    pub fn scalar(n: Number) -> Self {
        NdArray { shape: vec![1, 1], data: n.to_buffer() }
    }

    /// Zero-filled array of the given shape.
    pub fn zeros(elem: ElemType, shape: &[usize]) -> Self {
        let shape = normalize_shape(shape);
        let n = shape.iter().product();
        NdArray { shape, data: Buffer::zeros(elem, n) }
    }

    /// Character row vector; the empty string is `0×0`.
    pub fn from_text(s: &str) -> Self {
        let chars: Vec<char> = s.chars().collect();
        if chars.is_empty() {
            return NdArray { shape: vec![0, 0], data: Buffer::Char(chars) };
        }
        NdArray::row(chars)
    }

    /// Character matrix with one row per string, right-padded with blanks.
    pub fn from_text_rows<S: AsRef<str>>(rows: &[S]) -> Self {
        let width = rows.iter().map(|r| r.as_ref().chars().count()).max().unwrap_or(0);
        let padded: Vec<Vec<char>> = rows
            .iter()
            .map(|r| {
                let mut cs: Vec<char> = r.as_ref().chars().collect();
                cs.resize(width, ' ');
                cs
            })
            .collect();
        let flat: Vec<char> = padded.into_iter().flatten().collect();
        let rm = NdArray { shape: normalize_shape(&[rows.len(), width]), data: Buffer::Char(flat) };
        let order = permutation(&rm.shape, Order::RowMajorSource);
        NdArray { data: rm.data.gather(&order), shape: rm.shape }
    }

    pub(crate) fn from_parts(shape: Vec<usize>, data: Buffer) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        NdArray { shape: normalize_shape(&shape), data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &Buffer {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut Buffer {
        &mut self.data
    }

    pub fn into_data(self) -> Buffer {
        self.data
    }

    pub fn elem_type(&self) -> ElemType {
        self.data.elem_type()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn ndims(&self) -> usize {
        self.shape.len()
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    /// Product of every dimension after the first.
    pub fn cols(&self) -> usize {
        self.shape[1..].iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn is_scalar(&self) -> bool {
        self.shape == [1, 1]
    }

    /// Two-dimensional with at most one non-singleton dimension.
    pub fn is_vector(&self) -> bool {
        self.ndims() == 2 && (self.shape[0] == 1 || self.shape[1] == 1)
    }

    /// The same data under a new shape with the same element count.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, ShapeError> {
        Self::new(shape, self.data.clone())
    }

    pub fn cast(&self, elem: ElemType) -> Self {
        NdArray { shape: self.shape.clone(), data: self.data.cast(elem) }
    }

    /// 2-D transpose; `None` for N-d arrays.
    pub fn transpose(&self) -> Option<Self> {
        if self.ndims() != 2 {
            return None;
        }
        let (r, c) = (self.shape[0], self.shape[1]);
        let order: Vec<usize> = (0..r * c).map(|k| (k % c) * r + k / c).collect();
        Some(NdArray { shape: vec![c, r], data: self.data.gather(&order) })
    }

    /// Data in row-major (C) order.
    pub fn to_row_major(&self) -> Buffer {
        self.data.gather(&permutation(&self.shape, Order::RowMajorTarget))
    }

    /// The text of a char row vector (or empty char array).
    pub fn to_text(&self) -> Option<String> {
        match &self.data {
            Buffer::Char(cs) if self.is_empty() || self.rows() == 1 => Some(cs.iter().collect()),
            _ => None,
        }
    }

    /// Rows of a 2-D char array as strings.
    pub fn text_rows(&self) -> Option<Vec<String>> {
        let Buffer::Char(cs) = &self.data else { return None };
        if self.ndims() != 2 {
            return None;
        }
        let (r, c) = (self.shape[0], self.shape[1]);
        Some((0..r).map(|i| (0..c).map(|j| cs[j * r + i]).collect()).collect())
    }
}

enum Order {
    /// Source is row-major; produce the column-major gather order.
    RowMajorSource,
    /// Source is column-major; produce the row-major gather order.
    RowMajorTarget,
}

/// Gather indices converting between column-major and row-major layouts.
fn permutation(shape: &[usize], order: Order) -> Vec<usize> {
    let n: usize = shape.iter().product();
    let nd = shape.len();
    let mut out = Vec::with_capacity(n);
    let mut subs = vec![0usize; nd];
    for k in 0..n {
        // Subscripts of position k in the *target* layout.
        let mut rem = k;
        match order {
            Order::RowMajorSource => {
                for d in 0..nd {
                    subs[d] = rem % shape[d];
                    rem /= shape[d];
                }
            }
            Order::RowMajorTarget => {
                for d in (0..nd).rev() {
                    subs[d] = rem % shape[d];
                    rem /= shape[d];
                }
            }
        }
        // Linear index of those subscripts in the *source* layout.
        let mut idx = 0;
        match order {
            Order::RowMajorSource => {
                for d in 0..nd {
                    idx = idx * shape[d] + subs[d];
                }
            }
            Order::RowMajorTarget => {
                for d in (0..nd).rev() {
                    idx = idx * shape[d] + subs[d];
                }
            }
        }
        out.push(idx);
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
