//! Element traits mapping Rust types to DType

use super::DType;
use bytemuck::{Pod, Zeroable};
use std::ops::{Add, Div, Mul, Sub};

/// Trait for types that can be elements of a blob
///
/// Implemented for `f32`, `f64`, `i32` and `u32`. Any element type can be
/// stored, reshaped, shared and copied; arithmetic on the parameter buffers
/// additionally requires [`FloatElement`].
pub trait Element:
    Copy
    + Clone
    + Send
    + Sync
    + Pod
    + Zeroable
    + std::fmt::Debug
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + PartialOrd
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

/// Capability trait for element types that support parameter updates,
/// reductions and scaling.
///
/// Only floating point types implement it, so `update`, `sum_abs_*`,
/// `sum_squares_*` and `scale_*` simply do not exist on integer blobs:
///
/// ```compile_fail
/// use numblob::prelude::*;
///
/// let mut blob = Blob::<i32, CpuRuntime>::with_shape(&[4], BlobConfig::default()).unwrap();
/// blob.update().unwrap();
/// ```
///
/// ```compile_fail
/// use numblob::prelude::*;
///
/// let blob = Blob::<u32, CpuRuntime>::with_shape(&[4], BlobConfig::default()).unwrap();
/// let _ = blob.sum_abs_data();
/// ```
pub trait FloatElement: Element + num_traits::Float {}

macro_rules! impl_element {
    ($ty:ty, $dtype:expr, $zero:expr, $one:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                $zero
            }

            #[inline]
            fn one() -> Self {
                $one
            }
        }
    };
}

impl_element!(f64, DType::F64, 0.0, 1.0);
impl_element!(f32, DType::F32, 0.0, 1.0);
impl_element!(i32, DType::I32, 0, 1);
impl_element!(u32, DType::U32, 0, 1);

impl FloatElement for f32 {}
impl FloatElement for f64 {}
