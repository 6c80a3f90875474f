use crate::dtype::DType;
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::ndarray::{MutNdArray, NdArray};
use crate::shape::Shape;

/// A numeric array whose element type is known only at runtime.
///
/// One variant per numeric [`DType`]; typed code gets back to an
/// [`NdArray<T>`] with [`DynArray::downcast`].
#[derive(Debug, Clone, PartialEq)]
pub enum DynArray {
    F32(NdArray<f32>),
    F64(NdArray<f64>),
    I8(NdArray<i8>),
    I16(NdArray<i16>),
    I32(NdArray<i32>),
    I64(NdArray<i64>),
    U8(NdArray<u8>),
    U16(NdArray<u16>),
    U32(NdArray<u32>),
    U64(NdArray<u64>),
    Bool(NdArray<bool>),
}

/// Runs `$body` with `$a` bound to the typed array inside any variant.
#[macro_export]
macro_rules! dispatch_dyn {
    ($value:expr, $a:ident => $body:expr) => {
        match $value {
            $crate::DynArray::F32($a) => $body,
            $crate::DynArray::F64($a) => $body,
            $crate::DynArray::I8($a) => $body,
            $crate::DynArray::I16($a) => $body,
            $crate::DynArray::I32($a) => $body,
            $crate::DynArray::I64($a) => $body,
            $crate::DynArray::U8($a) => $body,
            $crate::DynArray::U16($a) => $body,
            $crate::DynArray::U32($a) => $body,
            $crate::DynArray::U64($a) => $body,
            $crate::DynArray::Bool($a) => $body,
        }
    };
}

fn zeros_of<T: Element>(shape: Shape) -> DynArray {
    T::into_dyn(MutNdArray::<T>::zeros(shape).into_frozen())
}

impl DynArray {
    /// Zero-initialised array of a runtime dtype.
    pub fn zeros(dtype: DType, shape: impl Into<Shape>) -> Result<DynArray> {
        let shape = shape.into();
        let array = match dtype {
            DType::F32 => zeros_of::<f32>(shape),
            DType::F64 => zeros_of::<f64>(shape),
            DType::I8 => zeros_of::<i8>(shape),
            DType::I16 => zeros_of::<i16>(shape),
            DType::I32 => zeros_of::<i32>(shape),
            DType::I64 => zeros_of::<i64>(shape),
            DType::U8 => zeros_of::<u8>(shape),
            DType::U16 => zeros_of::<u16>(shape),
            DType::U32 => zeros_of::<u32>(shape),
            DType::U64 => zeros_of::<u64>(shape),
            DType::Bool => zeros_of::<bool>(shape),
            DType::String => {
                return Err(TensorError::UnsupportedType(
                    "string tensors have no numeric storage".into(),
                ))
            }
        };
        Ok(array)
    }

    /// Element type of the wrapped array.
    pub fn dtype(&self) -> DType {
        dispatch_dyn!(self, a => a.dtype())
    }

    /// Shape of the wrapped array.
    pub fn shape(&self) -> &Shape {
        dispatch_dyn!(self, a => a.shape())
    }

    pub fn dims(&self) -> &[usize] {
        dispatch_dyn!(self, a => a.dims())
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        dispatch_dyn!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-copy sub-array; see [`NdArray::view`].
    pub fn view(&self, index: &[usize]) -> Result<DynArray> {
        dispatch_dyn!(self, a => a.view(index).map(Into::into))
    }

    /// Zero-copy reinterpretation; see [`NdArray::reshape`].
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<DynArray> {
        let shape = shape.into();
        dispatch_dyn!(self, a => a.reshape(shape).map(Into::into))
    }

    /// Borrows the typed array, failing if the dtype differs.
    pub fn downcast<T: Element>(&self) -> Result<&NdArray<T>> {
        T::from_dyn(self).ok_or(TensorError::DTypeMismatch {
            expected: T::DTYPE,
            got: self.dtype(),
        })
    }

    /// True when both arrays address the same allocation.
    pub fn shares_storage(&self, other: &DynArray) -> bool {
        match (self, other) {
            (DynArray::F32(a), DynArray::F32(b)) => a.shares_storage(b),
            (DynArray::F64(a), DynArray::F64(b)) => a.shares_storage(b),
            (DynArray::I8(a), DynArray::I8(b)) => a.shares_storage(b),
            (DynArray::I16(a), DynArray::I16(b)) => a.shares_storage(b),
            (DynArray::I32(a), DynArray::I32(b)) => a.shares_storage(b),
            (DynArray::I64(a), DynArray::I64(b)) => a.shares_storage(b),
            (DynArray::U8(a), DynArray::U8(b)) => a.shares_storage(b),
            (DynArray::U16(a), DynArray::U16(b)) => a.shares_storage(b),
            (DynArray::U32(a), DynArray::U32(b)) => a.shares_storage(b),
            (DynArray::U64(a), DynArray::U64(b)) => a.shares_storage(b),
            (DynArray::Bool(a), DynArray::Bool(b)) => a.shares_storage(b),
            _ => false,
        }
    }
}

impl<T: Element> From<NdArray<T>> for DynArray {
    fn from(array: NdArray<T>) -> Self {
        T::into_dyn(array)
    }
}

impl<T: Element> From<MutNdArray<T>> for DynArray {
    fn from(array: MutNdArray<T>) -> Self {
        T::into_dyn(array.into_frozen())
    }
}
