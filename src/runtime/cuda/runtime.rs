//! CUDA runtime implementation

use super::cache::{
    get_or_create_client, is_cuda_context_valid, log_cuda_memory_error, try_get_cached_stream,
};
use super::client::CudaClient;
use super::device::CudaDevice;
use crate::error::{Error, Result};
use crate::runtime::Runtime;
use cudarc::driver::sys::{self as cu, CUresult};

/// CUDA Runtime adapter
///
/// Implements the generic Runtime trait for CUDA backend.
/// Uses cudarc for direct GPU control.
#[derive(Clone, Debug, Default)]
pub struct CudaRuntime;

impl Runtime for CudaRuntime {
    type Device = CudaDevice;
    type Client = CudaClient;

    fn name() -> &'static str {
        "cuda"
    }

    /// Allocate GPU memory.
    ///
    /// Returns `Err(OutOfMemory)` if CUDA memory allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let mut ptr: u64 = 0;
            let result = cu::cuMemAllocAsync(&mut ptr, size_bytes, client.stream.cu_stream());
            if result == CUresult::CUDA_SUCCESS {
                log::debug!("cuda:{}: allocated {} bytes", device.index, size_bytes);
                return Ok(ptr);
            }

            // Pending async frees may still hold the memory
            client.stream.synchronize()?;

            let result = cu::cuMemAllocAsync(&mut ptr, size_bytes, client.stream.cu_stream());
            if result == CUresult::CUDA_SUCCESS {
                return Ok(ptr);
            }
        }

        Err(Error::OutOfMemory { size: size_bytes })
    }

    fn deallocate(ptr: u64, _size_bytes: usize, device: &Self::Device) {
        if ptr == 0 {
            return;
        }

        unsafe {
            // Memory is reclaimed with the context when it is already gone
            if !is_cuda_context_valid() {
                return;
            }

            let result = match try_get_cached_stream(device.index) {
                Some(stream) => cu::cuMemFreeAsync(ptr, stream),
                None => cu::cuMemFree_v2(ptr),
            };

            if result != CUresult::CUDA_SUCCESS && result != CUresult::CUDA_ERROR_ILLEGAL_ADDRESS {
                log_cuda_memory_error("cuMemFree", ptr, result);
            }
        }
    }

    /// Copy data from host to device.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()> {
        if src.is_empty() || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result = cu::cuMemcpyHtoDAsync_v2(
                dst,
                src.as_ptr() as *const std::ffi::c_void,
                src.len(),
                client.stream.cu_stream(),
            );
            check_copy(result, "host-to-device", src.len())?;
        }

        // The source slice may be released as soon as we return
        client.stream.synchronize()?;
        Ok(())
    }

    /// Copy data from device to host.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()> {
        if dst.is_empty() || src == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result = cu::cuMemcpyDtoHAsync_v2(
                dst.as_mut_ptr() as *mut std::ffi::c_void,
                src,
                dst.len(),
                client.stream.cu_stream(),
            );
            check_copy(result, "device-to-host", dst.len())?;
        }

        client.stream.synchronize()?;
        Ok(())
    }

    /// Copy data within device memory.
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()> {
        if size_bytes == 0 || src == 0 || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result =
                cu::cuMemcpyDtoDAsync_v2(dst, src, size_bytes, client.stream.cu_stream());
            check_copy(result, "device-to-device", size_bytes)?;
        }
        Ok(())
    }

    fn fill_zeros(dst: u64, size_bytes: usize, device: &Self::Device) -> Result<()> {
        if size_bytes == 0 || dst == 0 {
            return Ok(());
        }

        let client = get_or_create_client(device)?;

        unsafe {
            let result = cu::cuMemsetD8Async(dst, 0, size_bytes, client.stream.cu_stream());
            if result != CUresult::CUDA_SUCCESS {
                return Err(Error::Backend(format!(
                    "CUDA memset failed: {} bytes ({:?})",
                    size_bytes, result
                )));
            }
        }
        Ok(())
    }

    fn default_device() -> Self::Device {
        CudaDevice::new(0)
    }

    fn default_client(device: &Self::Device) -> Result<Self::Client> {
        get_or_create_client(device)
    }
}

fn check_copy(result: CUresult, direction: &str, size_bytes: usize) -> Result<()> {
    if result != CUresult::CUDA_SUCCESS {
        return Err(Error::Backend(format!(
            "CUDA {} copy failed: {} bytes ({:?})",
            direction, size_bytes, result
        )));
    }
    Ok(())
}

/// Get the default CUDA device (device 0)
pub fn cuda_device() -> CudaDevice {
    CudaDevice::new(0)
}

/// Check if CUDA is available on this system
///
/// Creating the client for device 0 initializes its context, stream and
/// library handles; any failure means no usable GPU.
pub fn is_cuda_available() -> bool {
    get_or_create_client(&cuda_device()).is_ok()
}
