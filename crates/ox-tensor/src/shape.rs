use crate::error::{Result, TensorError};
use std::fmt;

/// Dimension sizes of a row-major tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Shape with the given dimension sizes, outermost first.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Shape of a rank-0 tensor, holding one element.
    pub fn scalar() -> Self {
        Shape { dims: Vec::new() }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Element count; zero when any dimension is zero.
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Dimension sizes, outermost first.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Row-major element strides, `[d1*d2, d2, 1]` for `[d0, d1, d2]`.
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.dims.len()];
        for axis in (1..self.dims.len()).rev() {
            strides[axis - 1] = strides[axis] * self.dims[axis];
        }
        strides
    }

    /// Resolves leading indices to a flat element offset and the shape of
    /// the remaining trailing dimensions.
    ///
    /// `[2, 3, 4]` indexed with `[1]` gives offset 12 and shape `[3, 4]`.
    pub fn sub_shape(&self, leading: &[usize]) -> Result<(usize, Shape)> {
        let out_of_bounds = leading.len() > self.dims.len()
            || leading.iter().zip(&self.dims).any(|(&i, &d)| i >= d);
        if out_of_bounds {
            return Err(TensorError::shape("view", &self.dims, leading));
        }
        let offset = leading
            .iter()
            .zip(self.strides())
            .map(|(&i, stride)| i * stride)
            .sum();
        Ok((offset, Shape::new(self.dims[leading.len()..].to_vec())))
    }

    /// Flat offset of a full index.
    pub fn offset_of(&self, index: &[usize]) -> Result<usize> {
        if index.len() != self.dims.len() {
            return Err(TensorError::shape("index", &self.dims, index));
        }
        self.sub_shape(index).map(|(offset, _)| offset)
    }

    /// NumPy broadcasting: dimensions are aligned from the right, missing
    /// leading dimensions count as 1, and each pair must be equal or
    /// contain a 1.
    pub fn broadcast_shape(a: &Shape, b: &Shape) -> Result<Shape> {
        let rank = a.ndim().max(b.ndim());
        let padded = |s: &Shape, axis: usize| {
            let pad = rank - s.ndim();
            if axis < pad {
                1
            } else {
                s.dims[axis - pad]
            }
        };
        let dims = (0..rank)
            .map(|axis| match (padded(a, axis), padded(b, axis)) {
                (x, y) if x == y || y == 1 => Ok(x),
                (1, y) => Ok(y),
                _ => Err(TensorError::shape("broadcast", &a.dims, &b.dims)),
            })
            .collect::<Result<Vec<usize>>>()?;
        Ok(Shape::new(dims))
    }
}

/// Maps flat indices of a broadcast output onto flat indices of one operand.
#[derive(Debug, Clone)]
pub(crate) struct BroadcastIndexer {
    out_dims: Vec<usize>,
    src_strides: Vec<usize>,
}

impl BroadcastIndexer {
    /// `source` must be broadcast-compatible with `output`.
    pub(crate) fn new(output: &Shape, source: &Shape) -> Self {
        let pad = output.ndim() - source.ndim();
        let strides = source.strides();
        let src_strides = (0..output.ndim())
            .map(|axis| {
                if axis < pad || source.dims[axis - pad] == 1 {
                    0
                } else {
                    strides[axis - pad]
                }
            })
            .collect();
        BroadcastIndexer {
            out_dims: output.dims.clone(),
            src_strides,
        }
    }

    pub(crate) fn map(&self, mut flat: usize) -> usize {
        let mut index = 0;
        for axis in (0..self.out_dims.len()).rev() {
            let dim = self.out_dims[axis];
            index += (flat % dim) * self.src_strides[axis];
            flat /= dim;
        }
        index
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::new(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::new(dims.to_vec())
    }
}
