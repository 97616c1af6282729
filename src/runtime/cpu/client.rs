//! CPU client implementation

use super::device::CpuDevice;
use super::kernels;
use super::runtime::CpuRuntime;
use crate::dtype::FloatElement;
use crate::error::Result;
use crate::runtime::{BlobKernel, RuntimeClient, SparseKernel};
use crate::sparse::CsrParts;

/// CPU client for kernel dispatch
///
/// Handles are host addresses. Kernels wrap them into slices and run the
/// shared slice kernels, so the client is the reference implementation
/// other backends are tested against.
#[derive(Clone, Debug, Default)]
pub struct CpuClient {
    pub(crate) device: CpuDevice,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        // CPU operations are synchronous, nothing to do
        Ok(())
    }
}

/// # Safety
/// `ptr` must address `len` initialized, properly aligned `T`s.
unsafe fn view<'a, T>(ptr: u64, len: usize) -> &'a [T] {
    if len == 0 {
        return &[];
    }
    unsafe { std::slice::from_raw_parts(ptr as *const T, len) }
}

/// # Safety
/// As [`view`], and nothing else may access the range for `'a`.
unsafe fn view_mut<'a, T>(ptr: u64, len: usize) -> &'a mut [T] {
    if len == 0 {
        return &mut [];
    }
    unsafe { std::slice::from_raw_parts_mut(ptr as *mut T, len) }
}

impl<T: FloatElement> BlobKernel<T> for CpuClient {
    fn axpy(&self, alpha: T, x: u64, y: u64, len: usize) -> Result<()> {
        let (x, y) = unsafe { (view::<T>(x, len), view_mut::<T>(y, len)) };
        kernels::axpy(alpha, x, y);
        Ok(())
    }

    fn mul(&self, a: u64, b: u64, out: u64, len: usize) -> Result<()> {
        // In-place forms must not hold a shared and a mutable view together.
        unsafe {
            if out == b {
                kernels::mul_assign(view::<T>(a, len), view_mut::<T>(out, len));
            } else if out == a {
                kernels::mul_assign(view::<T>(b, len), view_mut::<T>(out, len));
            } else {
                kernels::mul(view::<T>(a, len), view::<T>(b, len), view_mut::<T>(out, len));
            }
        }
        Ok(())
    }

    fn asum(&self, x: u64, len: usize) -> Result<T> {
        Ok(kernels::asum(unsafe { view::<T>(x, len) }))
    }

    fn dot(&self, x: u64, y: u64, len: usize) -> Result<T> {
        Ok(unsafe { kernels::dot(view::<T>(x, len), view::<T>(y, len)) })
    }

    fn scal(&self, alpha: T, x: u64, len: usize) -> Result<()> {
        kernels::scal(alpha, unsafe { view_mut::<T>(x, len) });
        Ok(())
    }
}

impl<T: FloatElement> SparseKernel<T> for CpuClient {
    fn dense_to_csr(&self, dense: u64, rows: usize, cols: usize) -> Result<CsrParts<T>> {
        let dense = unsafe { view::<T>(dense, rows * cols) };
        Ok(kernels::dense_to_csr(dense, rows, cols))
    }
}
