//! Compile-time enforced typed kernel traits
//!
//! A backend implements [`BlobKernel<T>`] and [`SparseKernel<T>`] once per
//! floating-point element type it supports. The blob arithmetic layer is
//! bounded on these traits, so asking an integer blob for `update()` or a
//! reduction is a compile error rather than a runtime `UnsupportedDType`.
//!
//! ```text
//! Blob<T, R>::update()
//!        │   where R::Client: FloatKernels<T>
//!        ▼
//! ┌───────────────────────────────────────────────┐
//! │ BlobKernel<T: FloatElement>                   │
//! │  axpy / mul / asum / dot / scal on handles    │
//! └───────────────────────────────────────────────┘
//!        │
//!   ┌────┴──────────────┐
//!   ▼                   ▼
//! CpuClient (slices)  CudaClient (cuBLAS + PTX)
//! ```
//!
//! All handles (`x`, `y`, `out`, ...) are device pointers as `u64`; for the
//! CPU backend they are host addresses.

use crate::dtype::FloatElement;
use crate::error::Result;
use crate::sparse::CsrParts;

/// Level-1 BLAS style kernels over device handles.
pub trait BlobKernel<T: FloatElement>: Send + Sync {
    /// `y[i] += alpha * x[i]` for `i < len`
    fn axpy(&self, alpha: T, x: u64, y: u64, len: usize) -> Result<()>;

    /// `out[i] = a[i] * b[i]` for `i < len`
    ///
    /// `out` may alias `a` or `b`.
    fn mul(&self, a: u64, b: u64, out: u64, len: usize) -> Result<()>;

    /// Sum of absolute values
    fn asum(&self, x: u64, len: usize) -> Result<T>;

    /// Inner product of `x` and `y`
    fn dot(&self, x: u64, y: u64, len: usize) -> Result<T>;

    /// `x[i] *= alpha` for `i < len`
    fn scal(&self, alpha: T, x: u64, len: usize) -> Result<()>;
}

/// Dense to compressed-sparse-row conversion.
pub trait SparseKernel<T: FloatElement>: Send + Sync {
    /// Convert a row-major `rows x cols` dense matrix at `dense` into CSR.
    ///
    /// The returned parts live in host memory, with 32-bit indices.
    fn dense_to_csr(&self, dense: u64, rows: usize, cols: usize) -> Result<CsrParts<T>>;
}

/// Every kernel a floating-point blob needs, as one bound.
pub trait FloatKernels<T: FloatElement>: BlobKernel<T> + SparseKernel<T> {}

impl<T: FloatElement, C: BlobKernel<T> + SparseKernel<T>> FloatKernels<T> for C {}
