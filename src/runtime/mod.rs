//! Runtime backends for blob storage and kernels
//!
//! This module defines the `Runtime` trait and provides implementations
//! for the host-only backend (CPU) and the accelerator backend (CUDA).
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, raw memory movement)
//! ├── Device (identifies a specific GPU/CPU)
//! └── Client (dispatches kernels, owns stream/handles)
//!     ├── BlobKernel<T>   (axpy, mul, asum, dot, scal)
//!     └── SparseKernel<T> (dense → CSR)
//! ```
//!
//! Host memory for every blob is always managed by [`CpuRuntime`]; the
//! runtime parameter of a blob decides where its *device* copy lives.

pub mod kernel;

pub mod cpu;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use cpu::{CpuClient, CpuDevice, CpuRuntime};
pub use kernel::{BlobKernel, FloatKernels, SparseKernel};

#[cfg(feature = "cuda")]
pub use cuda::{CudaClient, CudaDevice, CudaRuntime};

use crate::error::Result;

/// Core trait for compute backends
///
/// `Runtime` abstracts over where a blob's device-side copy lives. It uses
/// static dispatch via generics; all memory is addressed by raw `u64`
/// handles so that the blob layer never needs backend-specific types.
///
/// # Example
///
/// ```ignore
/// use numblob::runtime::{Runtime, CpuRuntime};
///
/// fn scratch<R: Runtime>(device: &R::Device) -> numblob::Result<()> {
///     let ptr = R::allocate(1024, device)?;
///     R::fill_zeros(ptr, 1024, device)?;
///     R::deallocate(ptr, 1024, device);
///     Ok(())
/// }
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: Device;

    /// Client for dispatching kernels
    type Client: RuntimeClient<Self>;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Whether this runtime's memory is distinct from host memory.
    ///
    /// A host-only runtime reports `false`; every device-side request on a
    /// blob then fails with [`Error::NoAccelerator`](crate::Error::NoAccelerator).
    fn is_accelerator() -> bool {
        true
    }

    /// Allocate device memory
    ///
    /// Returns a device pointer (u64) that can be used for operations.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy data within device (device to device)
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Zero-fill `size_bytes` of device memory starting at `dst`
    fn fill_zeros(dst: u64, size_bytes: usize, device: &Self::Device) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    fn default_client(device: &Self::Device) -> Result<Self::Client>;
}

/// Trait for device identification
pub trait Device: Clone + Send + Sync + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}

/// Trait for runtime clients that handle kernel dispatch
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self) -> Result<()>;
}
