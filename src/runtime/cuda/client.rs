//! CUDA Client implementation
//!
//! CudaClient owns the context, stream and library handles for one device.
//!
//! # Thread Safety
//!
//! `CudaClient` is `Clone` and can be shared across threads. The underlying
//! CUDA context, stream and handles are reference-counted via `Arc`; every
//! kernel entry point binds the context to the calling thread first.

use cudarc::cublas::CudaBlas;
use cudarc::cublas::sys::{
    cublasDasum_v2, cublasDaxpy_v2, cublasDdot_v2, cublasDscal_v2, cublasSasum_v2,
    cublasSaxpy_v2, cublasSdot_v2, cublasSscal_v2, cublasStatus_t,
};
use cudarc::driver::safe::{CudaContext, CudaStream};
use std::sync::Arc;

use super::CudaRuntime;
use super::cusparse::CudaSparse;
use super::device::CudaDevice;
use super::kernels;
use crate::dtype::{Element, FloatElement};
use crate::error::{Error, Result};
use crate::runtime::{BlobKernel, RuntimeClient, SparseKernel};
use crate::sparse::CsrParts;

/// CUDA Runtime Client
///
/// All copies and kernels for the device launch on `self.stream`, which
/// keeps them ordered without extra events.
#[derive(Clone)]
pub struct CudaClient {
    /// GPU device index
    pub(crate) device: CudaDevice,

    /// CUDA context for this device
    pub(crate) context: Arc<CudaContext>,

    /// Stream on which all kernels launch
    pub(crate) stream: Arc<CudaStream>,

    /// cuBLAS handle for level-1 kernels
    pub(crate) cublas: Arc<CudaBlas>,

    /// cuSPARSE handle for dense to CSR conversion
    pub(crate) cusparse: Arc<CudaSparse>,
}

impl std::fmt::Debug for CudaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CudaClient")
            .field("device", &self.device)
            .finish_non_exhaustive()
    }
}

impl CudaClient {
    /// Create a new CUDA client for a device.
    ///
    /// Initializes the CUDA context, creates a stream, and sets up cuBLAS
    /// and cuSPARSE on that stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the device does not exist or any handle fails to
    /// initialize.
    pub fn new(device: CudaDevice) -> Result<Self> {
        let context = CudaContext::new(device.index)?;
        context.bind_to_thread()?;

        let stream = context.new_stream()?;

        let cublas = CudaBlas::new(stream.clone())
            .map_err(|e| Error::Backend(format!("Failed to initialize cuBLAS: {:?}", e)))?;
        let cusparse = CudaSparse::new(stream.clone())?;

        Ok(Self {
            device,
            context,
            stream,
            cublas: Arc::new(cublas),
            cusparse: Arc::new(cusparse),
        })
    }

    /// Get reference to the CUDA stream.
    #[inline]
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    /// Get reference to the CUDA context.
    #[inline]
    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }
}

impl RuntimeClient<CudaRuntime> for CudaClient {
    fn device(&self) -> &CudaDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize()?;
        Ok(())
    }
}

fn check_cublas(status: cublasStatus_t, call: &str) -> Result<()> {
    if status == cublasStatus_t::CUBLAS_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(Error::Backend(format!("{} failed: {:?}", call, status)))
    }
}

/// cuBLAS takes element counts as `int`
fn blas_len(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| Error::InvalidArgument {
        arg: "len",
        reason: format!("{} elements exceed the cuBLAS limit", len),
    })
}

macro_rules! impl_blob_kernel {
    ($ty:ty, $axpy:ident, $asum:ident, $dot:ident, $scal:ident) => {
        impl BlobKernel<$ty> for CudaClient {
            fn axpy(&self, alpha: $ty, x: u64, y: u64, len: usize) -> Result<()> {
                if len == 0 {
                    return Ok(());
                }
                let n = blas_len(len)?;
                self.context.bind_to_thread()?;
                unsafe {
                    check_cublas(
                        $axpy(
                            *self.cublas.handle(),
                            n,
                            &alpha,
                            x as *const $ty,
                            1,
                            y as *mut $ty,
                            1,
                        ),
                        stringify!($axpy),
                    )
                }
            }

            fn mul(&self, a: u64, b: u64, out: u64, len: usize) -> Result<()> {
                self.context.bind_to_thread()?;
                unsafe {
                    kernels::launch_mul(
                        &self.context,
                        &self.stream,
                        self.device.index,
                        <$ty as Element>::DTYPE,
                        a,
                        b,
                        out,
                        len,
                    )
                }
            }

            fn asum(&self, x: u64, len: usize) -> Result<$ty> {
                if len == 0 {
                    return Ok(0.0);
                }
                let n = blas_len(len)?;
                self.context.bind_to_thread()?;
                let mut result: $ty = 0.0;
                unsafe {
                    check_cublas(
                        $asum(*self.cublas.handle(), n, x as *const $ty, 1, &mut result),
                        stringify!($asum),
                    )?;
                }
                Ok(result)
            }

            fn dot(&self, x: u64, y: u64, len: usize) -> Result<$ty> {
                if len == 0 {
                    return Ok(0.0);
                }
                let n = blas_len(len)?;
                self.context.bind_to_thread()?;
                let mut result: $ty = 0.0;
                unsafe {
                    check_cublas(
                        $dot(
                            *self.cublas.handle(),
                            n,
                            x as *const $ty,
                            1,
                            y as *const $ty,
                            1,
                            &mut result,
                        ),
                        stringify!($dot),
                    )?;
                }
                Ok(result)
            }

            fn scal(&self, alpha: $ty, x: u64, len: usize) -> Result<()> {
                if len == 0 {
                    return Ok(());
                }
                let n = blas_len(len)?;
                self.context.bind_to_thread()?;
                unsafe {
                    check_cublas(
                        $scal(*self.cublas.handle(), n, &alpha, x as *mut $ty, 1),
                        stringify!($scal),
                    )
                }
            }
        }

        impl SparseKernel<$ty> for CudaClient {
            fn dense_to_csr(&self, dense: u64, rows: usize, cols: usize) -> Result<CsrParts<$ty>> {
                self.context.bind_to_thread()?;
                dense_to_csr::<$ty>(self, dense, rows, cols)
            }
        }
    };
}

impl_blob_kernel!(
    f32,
    cublasSaxpy_v2,
    cublasSasum_v2,
    cublasSdot_v2,
    cublasSscal_v2
);
impl_blob_kernel!(
    f64,
    cublasDaxpy_v2,
    cublasDasum_v2,
    cublasDdot_v2,
    cublasDscal_v2
);

/// Device scratch memory released on drop
struct DeviceScratch<'a> {
    ptr: u64,
    size: usize,
    device: &'a CudaDevice,
}

impl<'a> DeviceScratch<'a> {
    fn new(size: usize, device: &'a CudaDevice) -> Result<Self> {
        let ptr = <CudaRuntime as crate::runtime::Runtime>::allocate(size, device)?;
        Ok(Self { ptr, size, device })
    }
}

impl Drop for DeviceScratch<'_> {
    fn drop(&mut self) {
        <CudaRuntime as crate::runtime::Runtime>::deallocate(self.ptr, self.size, self.device);
    }
}

/// Dense row-major `rows x cols` to CSR with cuSPARSE `DenseToSparse`.
///
/// cuSPARSE reads the row-major buffer as a column-major `cols x rows`
/// matrix (the transpose). The CSC form of that transpose has exactly the
/// CSR arrays of the original: column offsets become row pointers and row
/// indices become column indices.
fn dense_to_csr<T: FloatElement>(
    client: &CudaClient,
    dense: u64,
    rows: usize,
    cols: usize,
) -> Result<CsrParts<T>> {
    use super::cusparse::{
        CscMatrixDescriptor, DenseMatrixDescriptor, check_cusparse, dtype_to_cusparse,
    };
    use crate::runtime::Runtime;
    use cudarc::cusparse::sys::{
        cusparseDenseToSparse_analysis, cusparseDenseToSparse_bufferSize,
        cusparseDenseToSparse_convert, cusparseDenseToSparseAlg_t, cusparseOrder_t,
    };
    use std::mem::size_of;

    if rows == 0 || cols == 0 {
        return Ok(CsrParts {
            rows,
            cols,
            row_ptrs: vec![0; rows + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
        });
    }

    let device = &client.device;
    let data_type = dtype_to_cusparse(T::DTYPE)?;
    let handle = client.cusparse.handle();
    let alg = cusparseDenseToSparseAlg_t::CUSPARSE_DENSETOSPARSE_ALG_DEFAULT;

    let offsets = DeviceScratch::new((rows + 1) * size_of::<i32>(), device)?;

    // SAFETY: every pointer handed to cuSPARSE is a live scratch or caller
    // buffer sized to match its descriptor, and all work is ordered on the
    // client's stream before the final copies synchronize it.
    unsafe {
        let mat_dense = DenseMatrixDescriptor::new(
            cols as i64,
            rows as i64,
            cols as i64,
            dense,
            data_type,
            cusparseOrder_t::CUSPARSE_ORDER_COL,
        )?;
        let mat_csc =
            CscMatrixDescriptor::with_offsets(cols as i64, rows as i64, offsets.ptr, data_type)?;

        let mut buffer_size: usize = 0;
        check_cusparse(
            cusparseDenseToSparse_bufferSize(
                handle,
                mat_dense.handle(),
                mat_csc.handle(),
                alg,
                &mut buffer_size,
            ),
            "cusparseDenseToSparse_bufferSize",
        )?;
        let workspace = DeviceScratch::new(buffer_size, device)?;

        check_cusparse(
            cusparseDenseToSparse_analysis(
                handle,
                mat_dense.handle(),
                mat_csc.handle(),
                alg,
                workspace.ptr as *mut std::ffi::c_void,
            ),
            "cusparseDenseToSparse_analysis",
        )?;

        let nnz = usize::try_from(mat_csc.nnz()?).map_err(|_| {
            Error::Backend("cusparseSpMatGetSize reported a negative entry count".to_string())
        })?;

        let mut row_ptrs = vec![0i32; rows + 1];
        let mut col_indices = vec![0i32; nnz];
        let mut values = vec![<T as Element>::zero(); nnz];

        if nnz > 0 {
            let indices = DeviceScratch::new(nnz * size_of::<i32>(), device)?;
            let stored = DeviceScratch::new(nnz * size_of::<T>(), device)?;
            mat_csc.set_pointers(offsets.ptr, indices.ptr, stored.ptr)?;

            check_cusparse(
                cusparseDenseToSparse_convert(
                    handle,
                    mat_dense.handle(),
                    mat_csc.handle(),
                    alg,
                    workspace.ptr as *mut std::ffi::c_void,
                ),
                "cusparseDenseToSparse_convert",
            )?;

            CudaRuntime::copy_from_device(
                offsets.ptr,
                bytemuck::cast_slice_mut(&mut row_ptrs),
                device,
            )?;
            CudaRuntime::copy_from_device(
                indices.ptr,
                bytemuck::cast_slice_mut(&mut col_indices),
                device,
            )?;
            CudaRuntime::copy_from_device(
                stored.ptr,
                bytemuck::cast_slice_mut(&mut values),
                device,
            )?;
        }

        Ok(CsrParts {
            rows,
            cols,
            row_ptrs,
            col_indices,
            values,
        })
    }
}
