//! Type-tag registry.
//!
//! A static table pairing every element type the interpreter can store in an
//! array with its Octave class name and the host-side dtype name used by
//! [`HostValue::Array`](crate::host::HostValue::Array).  Container classes
//! (`cell`, `struct`, `function_handle`) have no element type and live in
//! [`TypeTag`].

use std::fmt;

/// Element type of an N-d array buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemType {
    Double,
    Single,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    ComplexDouble,
    ComplexSingle,
    Logical,
    Char,
}

/// One row of the registry.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub elem: ElemType,
    /// Name reported by Octave's `class()`.
    pub class_name: &'static str,
    /// Host dtype name.
    pub dtype: &'static str,
    /// Storage width of one element in bits.
    pub bits: u32,
}

/// The registry.  Order matches the [`ElemType`] declaration.
pub static ELEM_TYPES: &[TypeInfo] = &[
    TypeInfo { elem: ElemType::Double,        class_name: "double",  dtype: "float64",    bits: 64 },
    TypeInfo { elem: ElemType::Single,        class_name: "single",  dtype: "float32",    bits: 32 },
    TypeInfo { elem: ElemType::Int8,          class_name: "int8",    dtype: "int8",       bits: 8 },
    TypeInfo { elem: ElemType::Int16,         class_name: "int16",   dtype: "int16",      bits: 16 },
    TypeInfo { elem: ElemType::Int32,         class_name: "int32",   dtype: "int32",      bits: 32 },
    TypeInfo { elem: ElemType::Int64,         class_name: "int64",   dtype: "int64",      bits: 64 },
    TypeInfo { elem: ElemType::UInt8,         class_name: "uint8",   dtype: "uint8",      bits: 8 },
    TypeInfo { elem: ElemType::UInt16,        class_name: "uint16",  dtype: "uint16",     bits: 16 },
    TypeInfo { elem: ElemType::UInt32,        class_name: "uint32",  dtype: "uint32",     bits: 32 },
    TypeInfo { elem: ElemType::UInt64,        class_name: "uint64",  dtype: "uint64",     bits: 64 },
    TypeInfo { elem: ElemType::ComplexDouble, class_name: "double",  dtype: "complex128", bits: 128 },
    TypeInfo { elem: ElemType::ComplexSingle, class_name: "single",  dtype: "complex64",  bits: 64 },
    TypeInfo { elem: ElemType::Logical,       class_name: "logical", dtype: "bool",       bits: 8 },
    TypeInfo { elem: ElemType::Char,          class_name: "char",    dtype: "char",       bits: 32 },
];

impl ElemType {
    /// Every element type, in registry order.
    pub const ALL: [ElemType; 14] = [
        ElemType::Double,
        ElemType::Single,
        ElemType::Int8,
        ElemType::Int16,
        ElemType::Int32,
        ElemType::Int64,
        ElemType::UInt8,
        ElemType::UInt16,
        ElemType::UInt32,
        ElemType::UInt64,
        ElemType::ComplexDouble,
        ElemType::ComplexSingle,
        ElemType::Logical,
        ElemType::Char,
    ];

    pub fn info(self) -> &'static TypeInfo {
        &ELEM_TYPES[self as usize]
    }

    pub fn class_name(self) -> &'static str {
        self.info().class_name
    }

    pub fn dtype(self) -> &'static str {
        self.info().dtype
    }

    /// Look up an element type by host dtype name.
    pub fn from_dtype(dtype: &str) -> Option<ElemType> {
        ELEM_TYPES.iter().find(|t| t.dtype == dtype).map(|t| t.elem)
    }

    /// Look up a real element type by Octave class name.
    ///
    /// `double` and `single` resolve to the real variants; complexity is a
    /// property of the data, not of the class.
    pub fn from_class_name(name: &str) -> Option<ElemType> {
        ELEM_TYPES
            .iter()
            .find(|t| t.class_name == name && !t.elem.is_complex())
            .map(|t| t.elem)
    }

    pub fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    pub fn is_complex(self) -> bool {
        matches!(self, ElemType::ComplexDouble | ElemType::ComplexSingle)
    }

    /// `double`, `single` and their complex forms.
    pub fn is_float(self) -> bool {
        matches!(
            self,
            ElemType::Double | ElemType::Single | ElemType::ComplexDouble | ElemType::ComplexSingle
        )
    }

    /// Single precision, real or complex.
    pub fn is_single(self) -> bool {
        matches!(self, ElemType::Single | ElemType::ComplexSingle)
    }

    /// Numeric in the sense of Octave's `isnumeric` (logical and char excluded).
    pub fn is_numeric(self) -> bool {
        !matches!(self, ElemType::Logical | ElemType::Char)
    }

    /// Inclusive value range of an integer type.
    pub fn int_range(self) -> Option<(i128, i128)> {
        Some(match self {
            ElemType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            ElemType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            ElemType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            ElemType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            ElemType::UInt8 => (0, u8::MAX as i128),
            ElemType::UInt16 => (0, u16::MAX as i128),
            ElemType::UInt32 => (0, u32::MAX as i128),
            ElemType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        })
    }

    /// The complex counterpart of a floating type.
    pub fn to_complex(self) -> ElemType {
        if self.is_single() {
            ElemType::ComplexSingle
        } else {
            ElemType::ComplexDouble
        }
    }

    /// The real counterpart of a complex type (identity otherwise).
    pub fn to_real(self) -> ElemType {
        match self {
            ElemType::ComplexDouble => ElemType::Double,
            ElemType::ComplexSingle => ElemType::Single,
            other => other,
        }
    }
}

impl fmt::Display for ElemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

/// Class of an interpreter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Array(ElemType),
    Cell,
    Struct,
    FunctionHandle,
}

impl TypeTag {
    pub fn class_name(self) -> &'static str {
        match self {
            TypeTag::Array(e) => e.class_name(),
            TypeTag::Cell => "cell",
            TypeTag::Struct => "struct",
            TypeTag::FunctionHandle => "function_handle",
        }
    }

    pub fn from_class_name(name: &str) -> Option<TypeTag> {
        match name {
            "cell" => Some(TypeTag::Cell),
            "struct" => Some(TypeTag::Struct),
            "function_handle" => Some(TypeTag::FunctionHandle),
            other => ElemType::from_class_name(other).map(TypeTag::Array),
        }
    }

    /// Host dtype for array classes; containers have none.
    pub fn dtype(self) -> Option<&'static str> {
        match self {
            TypeTag::Array(e) => Some(e.dtype()),
            _ => None,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_order_matches_enum() {
        for (i, e) in ElemType::ALL.iter().enumerate() {
            assert_eq!(ELEM_TYPES[i].elem, *e);
        }
    }

    #[test]
    fn dtype_round_trip() {
        for e in ElemType::ALL {
            assert_eq!(ElemType::from_dtype(e.dtype()), Some(e));
        }
        assert_eq!(ElemType::from_dtype("float16"), None);
    }

    #[test]
    fn class_names() {
        assert_eq!(ElemType::ComplexDouble.class_name(), "double");
        assert_eq!(ElemType::from_class_name("double"), Some(ElemType::Double));
        assert_eq!(ElemType::from_class_name("uint16"), Some(ElemType::UInt16));
        assert_eq!(TypeTag::from_class_name("cell"), Some(TypeTag::Cell));
        assert_eq!(TypeTag::from_class_name("logical"), Some(TypeTag::Array(ElemType::Logical)));
        assert_eq!(TypeTag::Struct.dtype(), None);
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(ElemType::Int8.int_range(), Some((-128, 127)));
        assert_eq!(ElemType::UInt64.int_range(), Some((0, u64::MAX as i128)));
        assert!(ElemType::Double.int_range().is_none());
        assert!(!ElemType::Logical.is_numeric());
        assert!(ElemType::ComplexSingle.is_single());
    }
}
