//! Common test utilities
#![allow(dead_code)]

use numblob::Result;
use numblob::dtype::FloatElement;
use numblob::runtime::{
    BlobKernel, CpuClient, CpuDevice, CpuRuntime, Device, Runtime, RuntimeClient, SparseKernel,
};
use numblob::sparse::CsrParts;
use std::cell::Cell;

#[cfg(feature = "cuda")]
use numblob::runtime::cuda::CudaDevice;

thread_local! {
    static TO_DEVICE: Cell<usize> = const { Cell::new(0) };
    static TO_HOST: Cell<usize> = const { Cell::new(0) };
    static WITHIN_DEVICE: Cell<usize> = const { Cell::new(0) };
    static KERNELS: Cell<usize> = const { Cell::new(0) };
}

fn bump(counter: &'static std::thread::LocalKey<Cell<usize>>) {
    counter.with(|c| c.set(c.get() + 1));
}

/// Transfers and kernel launches seen by [`MirrorRuntime`] on this thread
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Traffic {
    pub to_device: usize,
    pub to_host: usize,
    pub within_device: usize,
    pub kernels: usize,
}

/// Current counters for this thread
pub fn traffic() -> Traffic {
    Traffic {
        to_device: TO_DEVICE.with(Cell::get),
        to_host: TO_HOST.with(Cell::get),
        within_device: WITHIN_DEVICE.with(Cell::get),
        kernels: KERNELS.with(Cell::get),
    }
}

/// Zero this thread's counters
pub fn reset_traffic() {
    for counter in [&TO_DEVICE, &TO_HOST, &WITHIN_DEVICE, &KERNELS] {
        counter.with(|c| c.set(0));
    }
}

/// Device of the mock accelerator
#[derive(Clone, Debug, Default)]
pub struct MirrorDevice;

impl Device for MirrorDevice {
    fn id(&self) -> usize {
        0
    }

    fn name(&self) -> String {
        "mirror:0".to_string()
    }
}

/// Mock accelerator whose "device" memory is a second host allocation
///
/// Every transfer really copies bytes, so host and device copies can drift
/// apart exactly as they would on a GPU. Transfers are counted per thread.
#[derive(Clone, Debug, Default)]
pub struct MirrorRuntime;

impl Runtime for MirrorRuntime {
    type Device = MirrorDevice;
    type Client = MirrorClient;

    fn name() -> &'static str {
        "mirror"
    }

    fn allocate(size_bytes: usize, _device: &MirrorDevice) -> Result<u64> {
        CpuRuntime::allocate(size_bytes, &CpuDevice::new())
    }

    fn deallocate(ptr: u64, size_bytes: usize, _device: &MirrorDevice) {
        CpuRuntime::deallocate(ptr, size_bytes, &CpuDevice::new())
    }

    fn copy_to_device(src: &[u8], dst: u64, _device: &MirrorDevice) -> Result<()> {
        bump(&TO_DEVICE);
        CpuRuntime::copy_to_device(src, dst, &CpuDevice::new())
    }

    fn copy_from_device(src: u64, dst: &mut [u8], _device: &MirrorDevice) -> Result<()> {
        bump(&TO_HOST);
        CpuRuntime::copy_from_device(src, dst, &CpuDevice::new())
    }

    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        _device: &MirrorDevice,
    ) -> Result<()> {
        bump(&WITHIN_DEVICE);
        CpuRuntime::copy_within_device(src, dst, size_bytes, &CpuDevice::new())
    }

    fn fill_zeros(dst: u64, size_bytes: usize, _device: &MirrorDevice) -> Result<()> {
        CpuRuntime::fill_zeros(dst, size_bytes, &CpuDevice::new())
    }

    fn default_device() -> MirrorDevice {
        MirrorDevice
    }

    fn default_client(device: &MirrorDevice) -> Result<MirrorClient> {
        Ok(MirrorClient {
            device: device.clone(),
            inner: CpuClient::new(CpuDevice::new()),
        })
    }
}

/// Kernel client of [`MirrorRuntime`]; runs the host kernels on device handles
#[derive(Clone, Debug)]
pub struct MirrorClient {
    device: MirrorDevice,
    inner: CpuClient,
}

impl RuntimeClient<MirrorRuntime> for MirrorClient {
    fn device(&self) -> &MirrorDevice {
        &self.device
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}

impl<T: FloatElement> BlobKernel<T> for MirrorClient {
    fn axpy(&self, alpha: T, x: u64, y: u64, len: usize) -> Result<()> {
        bump(&KERNELS);
        BlobKernel::<T>::axpy(&self.inner, alpha, x, y, len)
    }

    fn mul(&self, a: u64, b: u64, out: u64, len: usize) -> Result<()> {
        bump(&KERNELS);
        BlobKernel::<T>::mul(&self.inner, a, b, out, len)
    }

    fn asum(&self, x: u64, len: usize) -> Result<T> {
        bump(&KERNELS);
        BlobKernel::<T>::asum(&self.inner, x, len)
    }

    fn dot(&self, x: u64, y: u64, len: usize) -> Result<T> {
        bump(&KERNELS);
        BlobKernel::<T>::dot(&self.inner, x, y, len)
    }

    fn scal(&self, alpha: T, x: u64, len: usize) -> Result<()> {
        bump(&KERNELS);
        BlobKernel::<T>::scal(&self.inner, alpha, x, len)
    }
}

impl<T: FloatElement> SparseKernel<T> for MirrorClient {
    fn dense_to_csr(&self, dense: u64, rows: usize, cols: usize) -> Result<CsrParts<T>> {
        bump(&KERNELS);
        SparseKernel::<T>::dense_to_csr(&self.inner, dense, rows, cols)
    }
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two f32 slices are close within tolerance
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// A CUDA device, or None if CUDA is unavailable
#[cfg(feature = "cuda")]
pub fn cuda_device() -> Option<CudaDevice> {
    if !numblob::runtime::cuda::is_cuda_available() {
        return None;
    }
    Some(CudaDevice::new(0))
}
