//! Conversion between serialized tensor payloads and runtime [`Tensor`]s.
//!
//! [`TensorProto`] mirrors the fields of ONNX `TensorProto` that carry
//! data. Parsing protobuf bytes into it happens elsewhere.

use ox_tensor::{DType, DynArray, NdArray, Shape, TensorError, WireType};

use crate::data::{StringArray, Tensor, TensorData};
use crate::error::{Result, RuntimeError};

/// Decoded-but-untyped tensor payload.
///
/// Only one payload field is populated for a given tensor. `raw_data`
/// (little-endian, fixed width) takes precedence over the typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TensorProto {
    pub name: Option<String>,
    pub dims: Vec<i64>,
    pub data_type: i32,
    pub float_data: Vec<f32>,
    /// INT32, and INT8/INT16/UINT8/UINT16/BOOL/FLOAT16/BFLOAT16 widened.
    pub int32_data: Vec<i32>,
    pub int64_data: Vec<i64>,
    pub double_data: Vec<f64>,
    /// UINT32 and UINT64.
    pub uint64_data: Vec<u64>,
    pub string_data: Vec<Vec<u8>>,
    pub raw_data: Option<Vec<u8>>,
}

fn shape_of(dims: &[i64]) -> Result<Shape> {
    let dims = dims
        .iter()
        .map(|&d| {
            usize::try_from(d)
                .map_err(|_| RuntimeError::shape("decode", format!("negative dimension {}", d)))
        })
        .collect::<Result<Vec<usize>>>()?;
    dims.iter()
        .try_fold(1usize, |count, &d| count.checked_mul(d))
        .ok_or_else(|| {
            RuntimeError::shape("decode", format!("element count of {:?} overflows", dims))
        })?;
    Ok(Shape::new(dims))
}

fn check_count(found: usize, shape: &Shape) -> Result<()> {
    if found != shape.numel() {
        return Err(RuntimeError::shape(
            "decode",
            format!("{} elements for shape {}", found, shape),
        ));
    }
    Ok(())
}

fn from_raw<T, const N: usize>(raw: &[u8], conv: impl Fn([u8; N]) -> T) -> Vec<T> {
    raw.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0u8; N];
            bytes.copy_from_slice(chunk);
            conv(bytes)
        })
        .collect()
}

fn numeric<T: ox_tensor::Element>(values: Vec<T>, shape: Shape) -> Result<TensorData> {
    check_count(values.len(), &shape)?;
    Ok(NdArray::from_vec(values, shape)?.into())
}

fn decode_raw(wire: WireType, raw: &[u8], shape: Shape) -> Result<TensorData> {
    let width = wire
        .storage_width()
        .ok_or_else(|| TensorError::UnsupportedType(format!("raw payload for {:?}", wire)))?;
    let expected = shape.numel().checked_mul(width).ok_or_else(|| {
        RuntimeError::shape("decode", format!("byte size of shape {} overflows", shape))
    })?;
    if raw.len() != expected {
        return Err(RuntimeError::shape(
            "decode",
            format!("{} raw bytes for shape {} at width {}", raw.len(), shape, width),
        ));
    }
    match wire {
        WireType::Float => numeric(from_raw(raw, f32::from_le_bytes), shape),
        WireType::Float16 => numeric(
            from_raw(raw, |b: [u8; 2]| half::f16::from_le_bytes(b).to_f32()),
            shape,
        ),
        WireType::BFloat16 => numeric(
            from_raw(raw, |b: [u8; 2]| half::bf16::from_le_bytes(b).to_f32()),
            shape,
        ),
        WireType::Double => numeric(from_raw(raw, f64::from_le_bytes), shape),
        WireType::Int8 => numeric(from_raw(raw, i8::from_le_bytes), shape),
        WireType::Int16 => numeric(from_raw(raw, i16::from_le_bytes), shape),
        WireType::Int32 => numeric(from_raw(raw, i32::from_le_bytes), shape),
        WireType::Int64 => numeric(from_raw(raw, i64::from_le_bytes), shape),
        WireType::Uint8 => numeric(raw.to_vec(), shape),
        WireType::Uint16 => numeric(from_raw(raw, u16::from_le_bytes), shape),
        WireType::Uint32 => numeric(from_raw(raw, u32::from_le_bytes), shape),
        WireType::Uint64 => numeric(from_raw(raw, u64::from_le_bytes), shape),
        WireType::Bool => numeric(raw.iter().map(|&b| b != 0).collect(), shape),
        other => Err(TensorError::UnsupportedType(format!("{:?}", other)).into()),
    }
}

fn decode_typed(wire: WireType, proto: &TensorProto, shape: Shape) -> Result<TensorData> {
    let ints = &proto.int32_data;
    match wire {
        WireType::Float => numeric(proto.float_data.clone(), shape),
        WireType::Double => numeric(proto.double_data.clone(), shape),
        WireType::Int32 => numeric(ints.clone(), shape),
        WireType::Int64 => numeric(proto.int64_data.clone(), shape),
        WireType::Int8 => numeric(ints.iter().map(|&v| v as i8).collect(), shape),
        WireType::Int16 => numeric(ints.iter().map(|&v| v as i16).collect(), shape),
        WireType::Uint8 => numeric(ints.iter().map(|&v| v as u8).collect(), shape),
        WireType::Uint16 => numeric(ints.iter().map(|&v| v as u16).collect(), shape),
        WireType::Bool => numeric(ints.iter().map(|&v| v != 0).collect(), shape),
        WireType::Float16 => numeric(
            ints.iter()
                .map(|&v| half::f16::from_bits(v as u16).to_f32())
                .collect(),
            shape,
        ),
        WireType::BFloat16 => numeric(
            ints.iter()
                .map(|&v| half::bf16::from_bits(v as u16).to_f32())
                .collect(),
            shape,
        ),
        WireType::Uint32 => numeric(
            proto.uint64_data.iter().map(|&v| v as u32).collect(),
            shape,
        ),
        WireType::Uint64 => numeric(proto.uint64_data.clone(), shape),
        WireType::String => {
            check_count(proto.string_data.len(), &shape)?;
            Ok(StringArray::new(proto.string_data.clone(), shape)?.into())
        }
        other => Err(TensorError::UnsupportedType(format!("{:?}", other)).into()),
    }
}

/// Builds a runtime tensor from a serialized payload.
///
/// Half-precision payloads are widened to `f32`.
pub fn decode(proto: &TensorProto) -> Result<Tensor> {
    DType::from_wire_code(proto.data_type)?;
    let wire = WireType::from_code(proto.data_type)
        .ok_or_else(|| TensorError::UnsupportedType(format!("wire code {}", proto.data_type)))?;
    let shape = shape_of(&proto.dims)?;

    let data = match &proto.raw_data {
        Some(raw) if wire != WireType::String => decode_raw(wire, raw, shape)?,
        _ => decode_typed(wire, proto, shape)?,
    };
    Ok(Tensor {
        name: proto.name.clone(),
        data,
    })
}

fn raw_bytes(array: &DynArray) -> Vec<u8> {
    fn le<T, const N: usize>(values: Vec<T>, f: impl Fn(T) -> [u8; N]) -> Vec<u8> {
        values.into_iter().flat_map(f).collect()
    }
    match array {
        DynArray::F32(a) => le(a.to_vec(), f32::to_le_bytes),
        DynArray::F64(a) => le(a.to_vec(), f64::to_le_bytes),
        DynArray::I8(a) => le(a.to_vec(), i8::to_le_bytes),
        DynArray::I16(a) => le(a.to_vec(), i16::to_le_bytes),
        DynArray::I32(a) => le(a.to_vec(), i32::to_le_bytes),
        DynArray::I64(a) => le(a.to_vec(), i64::to_le_bytes),
        DynArray::U8(a) => a.to_vec(),
        DynArray::U16(a) => le(a.to_vec(), u16::to_le_bytes),
        DynArray::U32(a) => le(a.to_vec(), u32::to_le_bytes),
        DynArray::U64(a) => le(a.to_vec(), u64::to_le_bytes),
        DynArray::Bool(a) => a.to_vec().into_iter().map(u8::from).collect(),
    }
}

/// Serializes a tensor. Numeric data goes to `raw_data`, strings to
/// `string_data`.
pub fn encode(tensor: &Tensor) -> TensorProto {
    let dims = tensor.shape().dims().iter().map(|&d| d as i64).collect();
    let mut proto = TensorProto {
        name: tensor.name.clone(),
        dims,
        data_type: tensor.dtype().to_wire().code(),
        ..TensorProto::default()
    };
    match &tensor.data {
        TensorData::Numeric(array) => proto.raw_data = Some(raw_bytes(array)),
        TensorData::Strings(strings) => proto.string_data = strings.values().to_vec(),
    }
    proto
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn check_roundtrip<T: ox_tensor::Element>(values: Vec<T>) {
        let len = values.len();
        let t = Tensor::named("t", NdArray::from_vec(values, [len]).unwrap());
        let proto = encode(&t);
        assert_eq!(proto.data_type, T::DTYPE.to_wire().code());
        assert_eq!(decode(&proto).unwrap(), t);

        let empty = Tensor::new(NdArray::<T>::from_vec(Vec::new(), [0, len]).unwrap());
        let proto = encode(&empty);
        assert_eq!(proto.raw_data.as_deref(), Some(&[][..]));
        let back = decode(&proto).unwrap();
        assert_eq!(back.dtype(), T::DTYPE);
        assert_eq!(back.shape().dims(), &[0, len]);
    }

    #[test]
    fn test_roundtrip_every_dtype() {
        check_roundtrip(vec![f32::MIN, -0.5, 1.25, f32::MAX]);
        check_roundtrip(vec![f64::MIN, -0.5, 1.0e-300, f64::MAX]);
        check_roundtrip(vec![i8::MIN, -1, 7, i8::MAX]);
        check_roundtrip(vec![i16::MIN, -1, 300, i16::MAX]);
        check_roundtrip(vec![i32::MIN, -1, 70_000, i32::MAX]);
        check_roundtrip(vec![i64::MIN, -1, 5_000_000_000, i64::MAX]);
        check_roundtrip(vec![u8::MIN, 1, 200, u8::MAX]);
        check_roundtrip(vec![u16::MIN, 1, 40_000, u16::MAX]);
        check_roundtrip(vec![u32::MIN, 1, 3_000_000_000, u32::MAX]);
        check_roundtrip(vec![u64::MIN, 1, 1 << 40, u64::MAX]);
        check_roundtrip(vec![true, false, false, true]);
    }

    #[test]
    fn test_roundtrip_values() {
        let t = Tensor::new(NdArray::from_vec(vec![-1i16, 300, 7], [3]).unwrap());
        assert_eq!(decode(&encode(&t)).unwrap(), t);

        let s = Tensor::new(StringArray::new(vec![b"x".to_vec(), Vec::new()], [2]).unwrap());
        assert_eq!(decode(&encode(&s)).unwrap(), s);
    }

    #[test]
    fn test_typed_fields() {
        let proto = TensorProto {
            dims: vec![2],
            data_type: WireType::Float.code(),
            float_data: vec![1.5, -2.0],
            ..Default::default()
        };
        let t = decode(&proto).unwrap();
        assert_eq!(t.as_array::<f32>().unwrap().to_vec(), vec![1.5, -2.0]);

        let proto = TensorProto {
            dims: vec![3],
            data_type: WireType::Bool.code(),
            int32_data: vec![1, 0, 1],
            ..Default::default()
        };
        let t = decode(&proto).unwrap();
        assert_eq!(t.as_array::<bool>().unwrap().to_vec(), vec![true, false, true]);
    }

    #[test]
    fn test_half_precision_widens() {
        let bytes: Vec<u8> = [half::f16::from_f32(0.5), half::f16::from_f32(-3.0)]
            .iter()
            .flat_map(|h| h.to_le_bytes())
            .collect();
        let proto = TensorProto {
            dims: vec![2],
            data_type: WireType::Float16.code(),
            raw_data: Some(bytes),
            ..Default::default()
        };
        let t = decode(&proto).unwrap();
        assert_eq!(t.dtype(), DType::F32);
        let values = t.as_array::<f32>().unwrap().to_vec();
        assert_relative_eq!(values[0], 0.5);
        assert_relative_eq!(values[1], -3.0);

        let proto = TensorProto {
            dims: vec![1],
            data_type: WireType::BFloat16.code(),
            int32_data: vec![half::bf16::from_f32(2.0).to_bits() as i32],
            ..Default::default()
        };
        let t = decode(&proto).unwrap();
        assert_relative_eq!(t.as_array::<f32>().unwrap().to_vec()[0], 2.0);
    }

    #[test]
    fn test_decode_errors() {
        let short = TensorProto {
            dims: vec![3],
            data_type: WireType::Int32.code(),
            raw_data: Some(vec![0; 8]),
            ..Default::default()
        };
        assert!(decode(&short).unwrap_err().is_shape_mismatch());

        let overflowing = TensorProto {
            dims: vec![i64::MAX, i64::MAX],
            data_type: WireType::Float.code(),
            raw_data: Some(vec![0; 4]),
            ..Default::default()
        };
        assert!(decode(&overflowing).unwrap_err().is_shape_mismatch());

        // Element count fits, byte size does not.
        let wide = TensorProto {
            dims: vec![i64::MAX / 2],
            data_type: WireType::Double.code(),
            raw_data: Some(vec![0; 8]),
            ..Default::default()
        };
        assert!(decode(&wide).unwrap_err().is_shape_mismatch());

        let negative = TensorProto {
            dims: vec![-1],
            data_type: WireType::Float.code(),
            ..Default::default()
        };
        assert!(decode(&negative).unwrap_err().is_shape_mismatch());

        let complex = TensorProto {
            dims: vec![1],
            data_type: WireType::Complex64.code(),
            raw_data: Some(vec![0; 8]),
            ..Default::default()
        };
        assert!(decode(&complex).unwrap_err().is_unsupported_type());
        assert!(decode(&TensorProto { data_type: 42, ..Default::default() })
            .unwrap_err()
            .is_unsupported_type());
    }
}
