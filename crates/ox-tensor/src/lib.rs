//! `ox-tensor` - typed, tiled tensor storage for ox-runtime.
//!
//! This crate provides:
//! - `TiledArray`, element storage split into bounded contiguous tiles
//! - `NdArray` / `MutNdArray`, zero-copy views `(storage, offset, shape)`
//! - Elementwise, broadcasting and dot-product kernels, monomorphised per
//!   element type
//! - `DynArray` for arrays whose dtype is only known at runtime
//! - Data type definitions and the wire type-code mapping

pub mod dtype;
pub mod dyn_array;
pub mod element;
pub mod error;
pub mod ndarray;
pub mod ops;
pub mod shape;
pub mod tiled;

// Re-export primary types at the crate root for convenience.
pub use dtype::{DType, WireType};
pub use dyn_array::DynArray;
pub use element::{Element, FloatElement, NumElement};
pub use error::{Result, TensorError};
pub use ndarray::{MutNdArray, NdArray};
pub use ops::{dot, dot_transposed};
pub use shape::Shape;
pub use tiled::{tile_size_for, TiledArray, MAX_TILE_SIZE};
