//! Data type system for blob elements
//!
//! Blobs are generic over a Rust element type; `DType` is the runtime tag
//! used in error messages and for backend dispatch (cuBLAS/cuSPARSE pick
//! their single- or double-precision entry points from it).

mod element;

pub use element::{Element, FloatElement};

use std::fmt;

/// Data types a blob can hold
///
/// # Discriminant Values (Serialization Stability)
///
/// Discriminants are grouped into stable ranges:
/// - Floats: 0-9 (F64=0, F32=1)
/// - Signed ints: 10-19 (I32=11)
/// - Unsigned ints: 20-29 (U32=21)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point (most common)
    F32 = 1,
    /// 32-bit signed integer
    I32 = 11,
    /// 32-bit unsigned integer
    U32 = 21,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 => 8,
            Self::F32 | Self::I32 | Self::U32 => 4,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32)
    }

    /// Returns true if this is any integer type (signed or unsigned)
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I32 | Self::U32)
    }

    /// Short name for display (e.g., "f32", "i32")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}
