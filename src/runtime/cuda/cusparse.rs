//! cuSPARSE wrapper for dense to CSR conversion
//!
//! Provides RAII wrappers around the cuSPARSE handle and the descriptors the
//! conversion needs.

#![allow(unsafe_op_in_unsafe_fn)]

use crate::dtype::DType;
use crate::error::{Error, Result};
use cudarc::cusparse::sys::*;
use cudarc::driver::CudaStream;
use std::ptr::null_mut;
use std::sync::Arc;

/// RAII wrapper for cuSPARSE handle
pub struct CudaSparse {
    handle: cusparseHandle_t,
    _stream: Arc<CudaStream>,
}

impl CudaSparse {
    /// Create a cuSPARSE handle bound to `stream`
    pub fn new(stream: Arc<CudaStream>) -> Result<Self> {
        unsafe {
            let mut handle = null_mut();
            check_cusparse(cusparseCreate(&mut handle), "cusparseCreate")?;

            let bound = check_cusparse(
                cusparseSetStream(handle, stream.cu_stream() as cudaStream_t),
                "cusparseSetStream",
            );
            if let Err(e) = bound {
                let _ = cusparseDestroy(handle);
                return Err(e);
            }

            Ok(Self {
                handle,
                _stream: stream,
            })
        }
    }

    /// Get the raw cuSPARSE handle
    #[inline]
    pub fn handle(&self) -> cusparseHandle_t {
        self.handle
    }
}

impl Drop for CudaSparse {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroy(self.handle);
        }
    }
}

// cusparseHandle_t is a raw pointer, so we need to manually implement Send/Sync
// SAFETY: cuSPARSE calls are ordered by the associated CUDA stream, and the
// client serializes host-side use through its owning blob.
unsafe impl Send for CudaSparse {}
unsafe impl Sync for CudaSparse {}

/// Check cuSPARSE status and convert to Result
pub fn check_cusparse(status: cusparseStatus_t, call: &str) -> Result<()> {
    if status == cusparseStatus_t::CUSPARSE_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(Error::Backend(format!("{} failed: {:?}", call, status)))
    }
}

/// Convert DType to cudaDataType for cuSPARSE
pub fn dtype_to_cusparse(dtype: DType) -> Result<cudaDataType> {
    match dtype {
        DType::F64 => Ok(cudaDataType::CUDA_R_64F),
        DType::F32 => Ok(cudaDataType::CUDA_R_32F),
        other => Err(Error::unsupported_dtype(other, "cusparse")),
    }
}

/// RAII wrapper for a dense matrix descriptor
pub struct DenseMatrixDescriptor {
    descr: cusparseDnMatDescr_t,
}

impl DenseMatrixDescriptor {
    /// Create a dense matrix descriptor
    ///
    /// # Safety
    /// `values` must point to valid device memory with `ld * cols` elements
    /// for column-major order (`ld * rows` for row-major).
    pub unsafe fn new(
        rows: i64,
        cols: i64,
        ld: i64,
        values: u64,
        data_type: cudaDataType,
        order: cusparseOrder_t,
    ) -> Result<Self> {
        let mut descr = null_mut();
        check_cusparse(
            cusparseCreateDnMat(
                &mut descr,
                rows,
                cols,
                ld,
                values as *mut std::ffi::c_void,
                data_type,
                order,
            ),
            "cusparseCreateDnMat",
        )?;
        Ok(Self { descr })
    }

    /// Get the raw descriptor handle
    #[inline]
    pub fn handle(&self) -> cusparseDnMatDescr_t {
        self.descr
    }
}

impl Drop for DenseMatrixDescriptor {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroyDnMat(self.descr);
        }
    }
}

/// RAII wrapper for a CSC sparse matrix descriptor
pub struct CscMatrixDescriptor {
    descr: cusparseSpMatDescr_t,
}

impl CscMatrixDescriptor {
    /// Create a CSC descriptor whose row indices and values are attached later
    ///
    /// # Safety
    /// `col_ptrs` must point to valid device memory with `cols + 1` `i32`s.
    pub unsafe fn with_offsets(
        rows: i64,
        cols: i64,
        col_ptrs: u64,
        data_type: cudaDataType,
    ) -> Result<Self> {
        let mut descr = null_mut();
        check_cusparse(
            cusparseCreateCsc(
                &mut descr,
                rows,
                cols,
                0,
                col_ptrs as *mut std::ffi::c_void,
                null_mut(),
                null_mut(),
                cusparseIndexType_t::CUSPARSE_INDEX_32I,
                cusparseIndexType_t::CUSPARSE_INDEX_32I,
                cusparseIndexBase_t::CUSPARSE_INDEX_BASE_ZERO,
                data_type,
            ),
            "cusparseCreateCsc",
        )?;
        Ok(Self { descr })
    }

    /// Number of stored entries recorded in the descriptor
    pub fn nnz(&self) -> Result<i64> {
        let (mut rows, mut cols, mut nnz) = (0i64, 0i64, 0i64);
        unsafe {
            check_cusparse(
                cusparseSpMatGetSize(self.descr, &mut rows, &mut cols, &mut nnz),
                "cusparseSpMatGetSize",
            )?;
        }
        Ok(nnz)
    }

    /// Attach row-index and value arrays sized for [`nnz`](Self::nnz).
    ///
    /// # Safety
    /// Both pointers must address valid device memory with `nnz` elements.
    pub unsafe fn set_pointers(&self, col_ptrs: u64, row_indices: u64, values: u64) -> Result<()> {
        check_cusparse(
            cusparseCscSetPointers(
                self.descr,
                col_ptrs as *mut std::ffi::c_void,
                row_indices as *mut std::ffi::c_void,
                values as *mut std::ffi::c_void,
            ),
            "cusparseCscSetPointers",
        )
    }

    /// Get the raw descriptor handle
    #[inline]
    pub fn handle(&self) -> cusparseSpMatDescr_t {
        self.descr
    }
}

impl Drop for CscMatrixDescriptor {
    fn drop(&mut self) {
        unsafe {
            let _ = cusparseDestroySpMat(self.descr);
        }
    }
}
