//! Per-type specialisation.
//!
//! Kernels are written once, generic over these traits, and monomorphised
//! for every concrete element type. Nothing here boxes values.

use std::fmt::Debug;

use crate::dtype::DType;
use crate::dyn_array::DynArray;
use crate::ndarray::NdArray;

/// A type that can live in tiled storage.
pub trait Element: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    const DTYPE: DType;

    /// Wraps a typed array into its [`DynArray`] variant.
    fn into_dyn(array: NdArray<Self>) -> DynArray;

    /// Borrows the typed array out of a [`DynArray`] of the same dtype.
    fn from_dyn(array: &DynArray) -> Option<&NdArray<Self>>;
}

/// Elements with arithmetic.
///
/// Integer variants wrap on overflow and yield zero on division by zero,
/// so kernels never panic on data.
pub trait NumElement: Element + PartialOrd {
    const ZERO: Self;
    const ONE: Self;

    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Self;
}

/// Floating point elements, used by activation kernels.
pub trait FloatElement: NumElement {
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn tanh(self) -> Self;
    fn abs(self) -> Self;
    fn max(self, other: Self) -> Self;
    fn min(self, other: Self) -> Self;
    fn neg(self) -> Self;
    fn from_f64(value: f64) -> Self;
    fn to_f64(self) -> f64;
}

macro_rules! impl_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn into_dyn(array: NdArray<Self>) -> DynArray {
                DynArray::$variant(array)
            }

            fn from_dyn(array: &DynArray) -> Option<&NdArray<Self>> {
                match array {
                    DynArray::$variant(a) => Some(a),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! impl_int_element {
    ($t:ty, $variant:ident) => {
        impl_element!($t, $variant);

        impl NumElement for $t {
            const ZERO: Self = 0;
            const ONE: Self = 1;

            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }
            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }
            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }
            fn div(self, rhs: Self) -> Self {
                self.checked_div(rhs).unwrap_or(0)
            }
        }
    };
}

macro_rules! impl_float_element {
    ($t:ty, $variant:ident) => {
        impl_element!($t, $variant);

        impl NumElement for $t {
            const ZERO: Self = 0.0;
            const ONE: Self = 1.0;

            fn add(self, rhs: Self) -> Self {
                self + rhs
            }
            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }
            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }
            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
        }

        impl FloatElement for $t {
            fn exp(self) -> Self {
                <$t>::exp(self)
            }
            fn ln(self) -> Self {
                <$t>::ln(self)
            }
            fn tanh(self) -> Self {
                <$t>::tanh(self)
            }
            fn abs(self) -> Self {
                <$t>::abs(self)
            }
            fn max(self, other: Self) -> Self {
                <$t>::max(self, other)
            }
            fn min(self, other: Self) -> Self {
                <$t>::min(self, other)
            }
            fn neg(self) -> Self {
                -self
            }
            fn from_f64(value: f64) -> Self {
                value as $t
            }
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_float_element!(f32, F32);
impl_float_element!(f64, F64);
impl_int_element!(i8, I8);
impl_int_element!(i16, I16);
impl_int_element!(i32, I32);
impl_int_element!(i64, I64);
impl_int_element!(u8, U8);
impl_int_element!(u16, U16);
impl_int_element!(u32, U32);
impl_int_element!(u64, U64);
impl_element!(bool, Bool);
