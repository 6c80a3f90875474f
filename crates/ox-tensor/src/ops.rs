//! Elementwise and product kernels over [`NdArray`] handles.
//!
//! Kernels take read locks on their sources, gather what they need, and
//! release them before taking the destination's write lock. Sources may
//! therefore alias the destination.

use crate::element::{Element, NumElement};
use crate::error::{Result, TensorError};
use crate::ndarray::{MutNdArray, NdArray};
use crate::shape::{BroadcastIndexer, Shape};
use crate::tiled::zip_chunks;

impl<T: Element> NdArray<T> {
    /// Broadcasting binary transform into a freshly allocated array.
    pub fn combine(&self, other: &NdArray<T>, f: impl Fn(T, T) -> T) -> Result<MutNdArray<T>> {
        let shape = Shape::broadcast_shape(self.shape(), other.shape())?;
        if self.shape() == other.shape() {
            let mut data = Vec::with_capacity(self.len());
            let (lhs, rhs) = (self.read(), other.read());
            zip_chunks(&*lhs, self.offset(), &*rhs, other.offset(), self.len(), |a, b| {
                data.extend(a.iter().zip(b).map(|(x, y)| f(*x, *y)));
            });
            return MutNdArray::from_vec(data, shape);
        }

        let (lhs, rhs) = (self.to_vec(), other.to_vec());
        let li = BroadcastIndexer::new(&shape, self.shape());
        let ri = BroadcastIndexer::new(&shape, other.shape());
        let data = (0..shape.numel())
            .map(|i| f(lhs[li.map(i)], rhs[ri.map(i)]))
            .collect();
        MutNdArray::from_vec(data, shape)
    }
}

impl<T: NumElement> NdArray<T> {
    pub fn add(&self, other: &NdArray<T>) -> Result<MutNdArray<T>> {
        self.combine(other, <T as NumElement>::add)
    }

    pub fn sub(&self, other: &NdArray<T>) -> Result<MutNdArray<T>> {
        self.combine(other, <T as NumElement>::sub)
    }

    pub fn mul(&self, other: &NdArray<T>) -> Result<MutNdArray<T>> {
        self.combine(other, <T as NumElement>::mul)
    }

    pub fn div(&self, other: &NdArray<T>) -> Result<MutNdArray<T>> {
        self.combine(other, <T as NumElement>::div)
    }
}

impl<T: Element> MutNdArray<T> {
    /// `self[i] = f(self[i], src[i])`, broadcasting `src` up to this
    /// array's shape. The destination shape never changes.
    pub fn combine_assign(&mut self, src: &NdArray<T>, f: impl Fn(T, T) -> T) -> Result<()> {
        let out = Shape::broadcast_shape(self.shape(), src.shape())?;
        if &out != self.shape() {
            return Err(TensorError::shape("assign", self.dims(), src.dims()));
        }
        let (start, len) = (self.offset(), self.len());

        // Snapshot first: no source guard is held while the write lock is taken.
        let values = src.to_vec();
        let index = BroadcastIndexer::new(self.shape(), src.shape());
        self.write().for_each_chunk_mut(start, len, |pos, chunk| {
            for (k, x) in chunk.iter_mut().enumerate() {
                *x = f(*x, values[index.map(pos + k)]);
            }
        });
        Ok(())
    }
}

impl<T: NumElement> MutNdArray<T> {
    pub fn add_assign(&mut self, src: &NdArray<T>) -> Result<()> {
        self.combine_assign(src, <T as NumElement>::add)
    }

    pub fn mul_assign(&mut self, src: &NdArray<T>) -> Result<()> {
        self.combine_assign(src, <T as NumElement>::mul)
    }

    /// `self += a * b` elementwise. All three shapes must match.
    pub fn add_product_assign(&mut self, a: &NdArray<T>, b: &NdArray<T>) -> Result<()> {
        if a.shape() != self.shape() {
            return Err(TensorError::shape("add_product", self.dims(), a.dims()));
        }
        if b.shape() != self.shape() {
            return Err(TensorError::shape("add_product", self.dims(), b.dims()));
        }
        let len = self.len();
        let mut products = Vec::with_capacity(len);
        {
            let (ga, gb) = (a.read(), b.read());
            zip_chunks(&*ga, a.offset(), &*gb, b.offset(), len, |x, y| {
                products.extend(x.iter().zip(y).map(|(p, q)| p.mul(*q)));
            });
        }
        let start = self.offset();
        self.write().for_each_chunk_mut(start, len, |pos, chunk| {
            for (k, x) in chunk.iter_mut().enumerate() {
                *x = x.add(products[pos + k]);
            }
        });
        Ok(())
    }
}

/// Splits a `[K]` or `[M, K]` operand into `(M, K)`.
fn rows_of<T: Element>(a: &NdArray<T>) -> Result<(usize, usize)> {
    match *a.dims() {
        [k] => Ok((1, k)),
        [m, k] => Ok((m, k)),
        _ => Err(TensorError::shape("dot", a.dims(), &[])),
    }
}

fn check_dest<T: Element>(a: &NdArray<T>, dest: &NdArray<T>, m: usize, n: usize) -> Result<()> {
    let expected: Vec<usize> = if a.rank() == 1 { vec![n] } else { vec![m, n] };
    if dest.dims() != expected.as_slice() {
        return Err(TensorError::shape("dot", &expected, dest.dims()));
    }
    Ok(())
}

fn accumulate<T: NumElement>(dest: &mut MutNdArray<T>, sums: &[T]) {
    let start = dest.offset();
    dest.write().for_each_chunk_mut(start, sums.len(), |pos, chunk| {
        for (k, x) in chunk.iter_mut().enumerate() {
            *x = x.add(sums[pos + k]);
        }
    });
}

/// `dest += a · b` for `a: [K] | [M, K]`, `b: [K, N]`, `dest: [N] | [M, N]`.
pub fn dot<T: NumElement>(a: &NdArray<T>, b: &NdArray<T>, dest: &mut MutNdArray<T>) -> Result<()> {
    let (m, k) = rows_of(a)?;
    let n = match *b.dims() {
        [bk, n] if bk == k => n,
        _ => return Err(TensorError::shape("dot", a.dims(), b.dims())),
    };
    check_dest(a, dest, m, n)?;

    let lhs = a.to_vec();
    let mut sums = vec![T::ZERO; m * n];
    {
        let rhs = b.read();
        for row in 0..m {
            let out = &mut sums[row * n..(row + 1) * n];
            for p in 0..k {
                let scale = lhs[row * k + p];
                rhs.for_each_chunk(b.offset() + p * n, n, |pos, chunk| {
                    for (j, y) in chunk.iter().enumerate() {
                        out[pos + j] = out[pos + j].add(scale.mul(*y));
                    }
                });
            }
        }
    }
    accumulate(dest, &sums);
    Ok(())
}

/// `dest += a · bᵀ` for `a: [K] | [M, K]`, `b: [N, K]`, `dest: [N] | [M, N]`.
///
/// Both operands are walked along contiguous rows, which suits weight
/// matrices stored output-major.
pub fn dot_transposed<T: NumElement>(
    a: &NdArray<T>,
    b: &NdArray<T>,
    dest: &mut MutNdArray<T>,
) -> Result<()> {
    let (m, k) = rows_of(a)?;
    let n = match *b.dims() {
        [n, bk] if bk == k => n,
        _ => return Err(TensorError::shape("dot", a.dims(), b.dims())),
    };
    check_dest(a, dest, m, n)?;

    let mut sums = vec![T::ZERO; m * n];
    {
        let (lhs, rhs) = (a.read(), b.read());
        for row in 0..m {
            for col in 0..n {
                let mut acc = T::ZERO;
                zip_chunks(
                    &*lhs,
                    a.offset() + row * k,
                    &*rhs,
                    b.offset() + col * k,
                    k,
                    |x, y| {
                        for (p, q) in x.iter().zip(y) {
                            acc = acc.add(p.mul(*q));
                        }
                    },
                );
                sums[row * n + col] = acc;
            }
        }
    }
    accumulate(dest, &sums);
    Ok(())
}
