//! Named runtime values passed between operators.

use ox_tensor::{DType, DynArray, Element, NdArray, Shape};

use crate::error::{Result, RuntimeError};

/// A tensor of opaque byte strings. Strings never reach tiled storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StringArray {
    shape: Shape,
    values: Vec<Vec<u8>>,
}

impl StringArray {
    pub fn new(values: Vec<Vec<u8>>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if values.len() != shape.numel() {
            return Err(RuntimeError::shape(
                "StringArray",
                format!("{} values for shape {}", values.len(), shape),
            ));
        }
        Ok(StringArray { shape, values })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Numeric(DynArray),
    Strings(StringArray),
}

/// An optionally named value flowing through the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub name: Option<String>,
    pub data: TensorData,
}

impl Tensor {
    pub fn new(data: impl Into<TensorData>) -> Self {
        Tensor {
            name: None,
            data: data.into(),
        }
    }

    pub fn named(name: impl Into<String>, data: impl Into<TensorData>) -> Self {
        Tensor {
            name: Some(name.into()),
            data: data.into(),
        }
    }

    /// Same data under a new name. Numeric payloads are shared, not copied.
    pub fn rename(&self, name: impl Into<String>) -> Tensor {
        Tensor {
            name: Some(name.into()),
            data: self.data.clone(),
        }
    }

    pub fn dtype(&self) -> DType {
        match &self.data {
            TensorData::Numeric(a) => a.dtype(),
            TensorData::Strings(_) => DType::String,
        }
    }

    pub fn shape(&self) -> &Shape {
        match &self.data {
            TensorData::Numeric(a) => a.shape(),
            TensorData::Strings(s) => s.shape(),
        }
    }

    pub fn as_dyn(&self) -> Option<&DynArray> {
        match &self.data {
            TensorData::Numeric(a) => Some(a),
            TensorData::Strings(_) => None,
        }
    }

    /// Borrows the typed array, failing on a dtype mismatch.
    pub fn as_array<T: Element>(&self) -> Result<&NdArray<T>> {
        match &self.data {
            TensorData::Numeric(a) => Ok(a.downcast::<T>()?),
            TensorData::Strings(_) => Err(ox_tensor::TensorError::DTypeMismatch {
                expected: T::DTYPE,
                got: DType::String,
            }
            .into()),
        }
    }

    pub fn as_strings(&self) -> Option<&StringArray> {
        match &self.data {
            TensorData::Strings(s) => Some(s),
            TensorData::Numeric(_) => None,
        }
    }
}

impl From<DynArray> for TensorData {
    fn from(array: DynArray) -> Self {
        TensorData::Numeric(array)
    }
}

impl<T: Element> From<NdArray<T>> for TensorData {
    fn from(array: NdArray<T>) -> Self {
        TensorData::Numeric(array.into())
    }
}

impl From<StringArray> for TensorData {
    fn from(array: StringArray) -> Self {
        TensorData::Strings(array)
    }
}
