use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dtype::DType;
use crate::element::Element;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::tiled::{tile_size_for, TiledArray};

pub(crate) type SharedStorage<T> = Arc<RwLock<TiledArray<T>>>;

/// A read-only handle onto a contiguous range of tiled storage.
///
/// Every handle is `(storage, offset, shape)`. Cloning a handle or taking
/// a [`NdArray::view`] never copies elements: all handles over the same
/// allocation observe writes made through any [`MutNdArray`] on it.
#[derive(Debug, Clone)]
pub struct NdArray<T: Element> {
    storage: SharedStorage<T>,
    offset: usize,
    shape: Shape,
}

impl<T: Element> NdArray<T> {
    /// Create an array owning `data` laid out row-major in `shape`.
    pub fn from_vec(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if data.len() != shape.numel() {
            return Err(TensorError::shape(
                "from_vec",
                shape.dims(),
                &[data.len()],
            ));
        }
        let tiles = TiledArray::from_vec(data, tile_size_for(&shape));
        Ok(NdArray {
            storage: Arc::new(RwLock::new(tiles)),
            offset: 0,
            shape,
        })
    }

    /// A rank-0 array holding one value.
    pub fn scalar(value: T) -> Self {
        let tiles = TiledArray::from_vec(vec![value], 1);
        NdArray {
            storage: Arc::new(RwLock::new(tiles)),
            offset: 0,
            shape: Shape::scalar(),
        }
    }

    /// Shape covered by this handle.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Dimension sizes of this handle.
    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of elements covered by this handle.
    pub fn len(&self) -> usize {
        self.shape.numel()
    }

    /// True when some dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type, fixed by `T`.
    pub fn dtype(&self) -> DType {
        T::DTYPE
    }

    /// Flat element offset of this handle inside its storage.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Tile length of the underlying storage.
    pub fn tile_size(&self) -> usize {
        self.storage.read_recursive().tile_size()
    }

    /// True when both handles address the same allocation.
    pub fn shares_storage(&self, other: &NdArray<T>) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Zero-copy sub-array selected by leading indices.
    ///
    /// For a `[2, 3, 4]` array, `view(&[1])` is the `[3, 4]` block at
    /// offset 12 and `view(&[1, 2])` the `[4]` row at offset 20.
    pub fn view(&self, index: &[usize]) -> Result<NdArray<T>> {
        let (offset, shape) = self.shape.sub_shape(index)?;
        Ok(NdArray {
            storage: Arc::clone(&self.storage),
            offset: self.offset + offset,
            shape,
        })
    }

    /// Zero-copy reinterpretation with the same number of elements.
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<NdArray<T>> {
        let shape = shape.into();
        if shape.numel() != self.len() {
            return Err(TensorError::shape("reshape", self.dims(), shape.dims()));
        }
        Ok(NdArray {
            storage: Arc::clone(&self.storage),
            offset: self.offset,
            shape,
        })
    }

    /// Reads one element by full index.
    pub fn get(&self, index: &[usize]) -> Result<T> {
        let offset = self.shape.offset_of(index)?;
        Ok(self.storage.read_recursive().get(self.offset + offset))
    }

    /// Copies the covered elements out in row-major order.
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.len()];
        self.storage.read_recursive().read_into(self.offset, &mut out);
        out
    }

    /// Deep copy into a fresh, independently owned array.
    pub fn to_mutable(&self) -> MutNdArray<T> {
        let tiles = TiledArray::from_vec(self.to_vec(), tile_size_for(&self.shape));
        MutNdArray {
            inner: NdArray {
                storage: Arc::new(RwLock::new(tiles)),
                offset: 0,
                shape: self.shape.clone(),
            },
        }
    }

    /// Elementwise unary transform into a freshly allocated array.
    pub fn map(&self, f: impl Fn(T) -> T) -> MutNdArray<T> {
        let out = MutNdArray::zeros(self.shape.clone());
        {
            let src = self.read();
            let mut dst = out.inner.write();
            dst.zip_with(0, &*src, self.offset, self.len(), |d, s| {
                for (x, y) in d.iter_mut().zip(s) {
                    *x = f(*y);
                }
            });
        }
        out
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TiledArray<T>> {
        self.storage.read_recursive()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TiledArray<T>> {
        self.storage.write()
    }
}

impl<T: Element> PartialEq for NdArray<T> {
    /// Equal shapes and elements; storage identity is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.to_vec() == other.to_vec()
    }
}

/// A writable handle onto tiled storage.
///
/// Dereferences to [`NdArray`] for every read operation. Writes snapshot
/// their source first and then take the storage lock for the duration of
/// one kernel, so no source lock is ever held alongside it. A range has a
/// single writer at a time; keeping writers on disjoint ranges is up to
/// the caller.
#[derive(Debug)]
pub struct MutNdArray<T: Element> {
    inner: NdArray<T>,
}

impl<T: Element> Deref for MutNdArray<T> {
    type Target = NdArray<T>;

    fn deref(&self) -> &NdArray<T> {
        &self.inner
    }
}

impl<T: Element> MutNdArray<T> {
    /// Zero-initialised array of the given shape.
    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let tiles = TiledArray::zeros(shape.numel(), tile_size_for(&shape));
        MutNdArray {
            inner: NdArray {
                storage: Arc::new(RwLock::new(tiles)),
                offset: 0,
                shape,
            },
        }
    }

    /// Writable array owning `data`; see [`NdArray::from_vec`].
    pub fn from_vec(data: Vec<T>, shape: impl Into<Shape>) -> Result<Self> {
        NdArray::from_vec(data, shape).map(|inner| MutNdArray { inner })
    }

    /// Writable zero-copy sub-array selected by leading indices.
    pub fn view_mut(&self, index: &[usize]) -> Result<MutNdArray<T>> {
        self.inner.view(index).map(|inner| MutNdArray { inner })
    }

    /// A read-only handle sharing this array's storage.
    pub fn as_view(&self) -> NdArray<T> {
        self.inner.clone()
    }

    /// Gives up write access.
    pub fn into_frozen(self) -> NdArray<T> {
        self.inner
    }

    /// Writes one element by full index.
    pub fn set(&mut self, index: &[usize], value: T) -> Result<()> {
        let offset = self.inner.shape.offset_of(index)?;
        self.inner.write().set(self.inner.offset + offset, value);
        Ok(())
    }

    /// Sets every covered element to `value`.
    pub fn fill(&mut self, value: T) {
        let (offset, len) = (self.inner.offset, self.len());
        self.inner.write().fill_range(offset, len, value);
    }

    /// Zero-fill in place.
    pub fn clean(&mut self) {
        self.fill(T::default());
    }

    /// Copies `src` into this array starting at flat element `offset`.
    pub fn copy_from(&mut self, offset: usize, src: &NdArray<T>) -> Result<()> {
        if offset + src.len() > self.len() {
            return Err(TensorError::shape("copy_from", self.dims(), src.dims()));
        }
        let start = self.inner.offset + offset;
        let values = src.to_vec();
        self.inner.write().write_from(start, &values);
        Ok(())
    }

    /// Elementwise unary transform in place.
    pub fn map_in_place(&mut self, f: impl Fn(T) -> T) {
        let (offset, len) = (self.inner.offset, self.len());
        self.inner.write().for_each_chunk_mut(offset, len, |_, chunk| {
            for x in chunk.iter_mut() {
                *x = f(*x);
            }
        });
    }
}
