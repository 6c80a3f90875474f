use std::fmt;

use crate::error::{Result, TensorError};

/// Element types a tensor can hold.
///
/// Every numeric variant has a dedicated, unboxed kernel path (see
/// [`crate::element`]). `String` is opaque: it never reaches tiled storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 32-bit float; also the compute type of FLOAT16 and BFLOAT16.
    F32,
    /// 64-bit float.
    F64,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Boolean, one byte per element.
    Bool,
    /// Opaque byte string.
    String,
}

/// Element type codes used on the wire (ONNX `TensorProto.DataType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum WireType {
    Undefined = 0,
    Float = 1,
    Uint8 = 2,
    Int8 = 3,
    Uint16 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    String = 8,
    Bool = 9,
    Float16 = 10,
    Double = 11,
    Uint32 = 12,
    Uint64 = 13,
    Complex64 = 14,
    Complex128 = 15,
    BFloat16 = 16,
}

impl WireType {
    /// Maps a raw code to a known wire type.
    pub fn from_code(code: i32) -> Option<WireType> {
        let wire = match code {
            0 => WireType::Undefined,
            1 => WireType::Float,
            2 => WireType::Uint8,
            3 => WireType::Int8,
            4 => WireType::Uint16,
            5 => WireType::Int16,
            6 => WireType::Int32,
            7 => WireType::Int64,
            8 => WireType::String,
            9 => WireType::Bool,
            10 => WireType::Float16,
            11 => WireType::Double,
            12 => WireType::Uint32,
            13 => WireType::Uint64,
            14 => WireType::Complex64,
            15 => WireType::Complex128,
            16 => WireType::BFloat16,
            _ => return None,
        };
        Some(wire)
    }

    /// Numeric wire code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Bytes per element in a little-endian `raw_data` payload, or `None`
    /// for types without a fixed-width encoding.
    pub fn storage_width(self) -> Option<usize> {
        match self {
            WireType::Uint8 | WireType::Int8 | WireType::Bool => Some(1),
            WireType::Uint16 | WireType::Int16 | WireType::Float16 | WireType::BFloat16 => Some(2),
            WireType::Float | WireType::Int32 | WireType::Uint32 => Some(4),
            WireType::Double | WireType::Int64 | WireType::Uint64 | WireType::Complex64 => Some(8),
            WireType::Complex128 => Some(16),
            WireType::Undefined | WireType::String => None,
        }
    }
}

impl DType {
    /// Every dtype backed by tiled numeric storage.
    pub const NUMERIC: [DType; 11] = [
        DType::F32,
        DType::F64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::Bool,
    ];

    /// Size in bytes of one element at compute width. Strings have no
    /// fixed width and report 0.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::I8 | DType::U8 | DType::Bool => 1,
            DType::I16 | DType::U16 => 2,
            DType::F32 | DType::I32 | DType::U32 => 4,
            DType::F64 | DType::I64 | DType::U64 => 8,
            DType::String => 0,
        }
    }

    /// True for `F32` and `F64`.
    pub fn is_float(&self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Resolves a wire type to the dtype used for computation.
    ///
    /// Half-precision wire types (FLOAT16, BFLOAT16) compute as `F32`.
    pub fn from_wire(wire: WireType) -> Result<DType> {
        match wire {
            WireType::Float | WireType::Float16 | WireType::BFloat16 => Ok(DType::F32),
            WireType::Double => Ok(DType::F64),
            WireType::Int8 => Ok(DType::I8),
            WireType::Int16 => Ok(DType::I16),
            WireType::Int32 => Ok(DType::I32),
            WireType::Int64 => Ok(DType::I64),
            WireType::Uint8 => Ok(DType::U8),
            WireType::Uint16 => Ok(DType::U16),
            WireType::Uint32 => Ok(DType::U32),
            WireType::Uint64 => Ok(DType::U64),
            WireType::Bool => Ok(DType::Bool),
            WireType::String => Ok(DType::String),
            WireType::Undefined | WireType::Complex64 | WireType::Complex128 => Err(
                TensorError::UnsupportedType(format!("wire type {:?}", wire)),
            ),
        }
    }

    /// Resolves a raw wire code; unknown codes are unsupported.
    pub fn from_wire_code(code: i32) -> Result<DType> {
        let wire = WireType::from_code(code)
            .ok_or_else(|| TensorError::UnsupportedType(format!("wire code {}", code)))?;
        DType::from_wire(wire)
    }

    /// The wire type this dtype is written as.
    pub fn to_wire(&self) -> WireType {
        match self {
            DType::F32 => WireType::Float,
            DType::F64 => WireType::Double,
            DType::I8 => WireType::Int8,
            DType::I16 => WireType::Int16,
            DType::I32 => WireType::Int32,
            DType::I64 => WireType::Int64,
            DType::U8 => WireType::Uint8,
            DType::U16 => WireType::Uint16,
            DType::U32 => WireType::Uint32,
            DType::U64 => WireType::Uint64,
            DType::Bool => WireType::Bool,
            DType::String => WireType::String,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I8 => "i8",
            DType::I16 => "i16",
            DType::I32 => "i32",
            DType::I64 => "i64",
            DType::U8 => "u8",
            DType::U16 => "u16",
            DType::U32 => "u32",
            DType::U64 => "u64",
            DType::Bool => "bool",
            DType::String => "string",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::I16.size_in_bytes(), 2);
        assert_eq!(DType::Bool.size_in_bytes(), 1);
        assert_eq!(DType::String.size_in_bytes(), 0);
    }

    #[test]
    fn test_wire_roundtrip() {
        for dtype in DType::NUMERIC.iter().chain([DType::String].iter()) {
            let code = dtype.to_wire().code();
            let back = DType::from_wire_code(code).unwrap();
            assert_eq!(*dtype, back);
        }
    }

    #[test]
    fn test_half_precision_computes_as_f32() {
        assert_eq!(DType::from_wire(WireType::Float16).unwrap(), DType::F32);
        assert_eq!(DType::from_wire(WireType::BFloat16).unwrap(), DType::F32);
        assert_eq!(WireType::Float16.storage_width(), Some(2));
    }

    #[test]
    fn test_unsupported_wire_types() {
        assert!(matches!(
            DType::from_wire(WireType::Complex64),
            Err(TensorError::UnsupportedType(_))
        ));
        assert!(DType::from_wire(WireType::Complex128).is_err());
        assert!(DType::from_wire_code(0).is_err());
        assert!(DType::from_wire_code(999).is_err());
    }
}
