//! SyncedBuffer: one logical byte buffer mirrored in host and device memory

use crate::error::{Error, Result};
use crate::runtime::cpu::CpuRuntime;
use crate::runtime::{CpuDevice, Runtime};
use std::fmt;

/// Which copy of a [`SyncedBuffer`] is authoritative
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncHead {
    /// Nothing has been allocated yet
    Uninitialized,
    /// The host copy is newer than the device copy (or the only one)
    AtHost,
    /// The device copy is newer than the host copy (or the only one)
    AtDevice,
    /// Both copies hold the same bytes
    Synced,
}

/// A byte buffer that lazily migrates between host and device memory
///
/// Host memory is always managed by [`CpuRuntime`]; device memory by `R`.
/// Read access copies at most once and leaves the buffer `Synced`. Mutable
/// access makes the requested side the sole authority, so the next read
/// on the other side copies again.
///
/// ```text
///               read_host / mutable_host
/// Uninitialized ────────────────────────► AtHost ◄──┐ mutable_host
///       │                                   │       │
///       │ read_device / mutable_device      │ read_device
///       ▼                                   ▼       │
///    AtDevice ────────── read_host ───────► Synced ─┘
///       ▲                                   │
///       └────────── mutable_device ─────────┘
/// ```
///
/// Fresh allocations on either side are zero-filled.
pub struct SyncedBuffer<R: Runtime> {
    size: usize,
    host_ptr: u64,
    /// If false the host memory was adopted and is never freed here
    own_host: bool,
    device_ptr: u64,
    device: R::Device,
    head: SyncHead,
}

impl<R: Runtime> SyncedBuffer<R> {
    /// Create a buffer of `size` bytes. Nothing is allocated until first access.
    pub fn new(size: usize, device: &R::Device) -> Result<Self> {
        if size == 0 {
            return Err(Error::ZeroSizedBuffer);
        }
        Ok(Self {
            size,
            host_ptr: 0,
            own_host: false,
            device_ptr: 0,
            device: device.clone(),
            head: SyncHead::Uninitialized,
        })
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current authority state
    pub fn head(&self) -> SyncHead {
        self.head
    }

    /// Device holding the device copy
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Whether the host memory is owned (and freed) by this buffer
    pub fn owns_host(&self) -> bool {
        self.own_host
    }

    /// Host copy, synchronized if the device copy was newer.
    pub fn read_host(&mut self) -> Result<&[u8]> {
        self.sync_to_host()?;
        Ok(self.host_bytes())
    }

    /// Host copy for writing. The host becomes the sole authority.
    pub fn mutable_host(&mut self) -> Result<&mut [u8]> {
        self.sync_to_host()?;
        self.head = SyncHead::AtHost;
        Ok(self.host_bytes_mut())
    }

    /// Device handle, synchronized if the host copy was newer.
    pub fn read_device(&mut self) -> Result<u64> {
        self.sync_to_device()?;
        Ok(self.device_ptr)
    }

    /// Device handle for writing. The device becomes the sole authority.
    pub fn mutable_device(&mut self) -> Result<u64> {
        self.sync_to_device()?;
        self.head = SyncHead::AtDevice;
        Ok(self.device_ptr)
    }

    /// Adopt caller-owned host memory as the authoritative copy.
    ///
    /// Previously owned host memory is freed. The device copy (if any) is
    /// kept allocated but is stale until the next device access.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, 64-byte aligned, valid for reads and writes
    /// of [`size`](Self::size) bytes, and must outlive this buffer (or the
    /// next `set_host_ptr`). It is never freed by the buffer.
    pub unsafe fn set_host_ptr(&mut self, ptr: *mut u8) {
        self.release_host();
        self.host_ptr = ptr as u64;
        self.own_host = false;
        self.head = SyncHead::AtHost;
    }

    /// Bring the host copy up to date without changing authority beyond
    /// `AtDevice -> Synced`.
    pub(crate) fn sync_to_host(&mut self) -> Result<()> {
        match self.head {
            SyncHead::Uninitialized => {
                self.alloc_host()?;
                self.head = SyncHead::AtHost;
            }
            SyncHead::AtDevice => {
                if self.host_ptr == 0 {
                    self.alloc_host()?;
                }
                log::debug!(
                    "{}: device -> host ({} bytes)",
                    R::name(),
                    self.size
                );
                let (src, device) = (self.device_ptr, self.device.clone());
                R::copy_from_device(src, self.host_bytes_mut(), &device)?;
                self.head = SyncHead::Synced;
            }
            SyncHead::AtHost | SyncHead::Synced => {}
        }
        Ok(())
    }

    /// Bring the device copy up to date.
    pub(crate) fn sync_to_device(&mut self) -> Result<()> {
        if !R::is_accelerator() {
            return Err(Error::NoAccelerator { op: "device access" });
        }
        match self.head {
            SyncHead::Uninitialized => {
                self.alloc_device()?;
                R::fill_zeros(self.device_ptr, self.size, &self.device)?;
                self.head = SyncHead::AtDevice;
            }
            SyncHead::AtHost => {
                if self.device_ptr == 0 {
                    self.alloc_device()?;
                }
                log::debug!(
                    "{}: host -> device ({} bytes)",
                    R::name(),
                    self.size
                );
                R::copy_to_device(self.host_bytes(), self.device_ptr, &self.device)?;
                self.head = SyncHead::Synced;
            }
            SyncHead::AtDevice | SyncHead::Synced => {}
        }
        Ok(())
    }

    /// Host bytes. Only meaningful after `sync_to_host`.
    pub(crate) fn host_bytes(&self) -> &[u8] {
        debug_assert!(self.host_ptr != 0);
        unsafe { std::slice::from_raw_parts(self.host_ptr as *const u8, self.size) }
    }

    /// Host bytes for writing. Only meaningful after `sync_to_host`.
    pub(crate) fn host_bytes_mut(&mut self) -> &mut [u8] {
        debug_assert!(self.host_ptr != 0);
        unsafe { std::slice::from_raw_parts_mut(self.host_ptr as *mut u8, self.size) }
    }

    fn alloc_host(&mut self) -> Result<()> {
        self.host_ptr = CpuRuntime::allocate(self.size, &CpuDevice::new())?;
        self.own_host = true;
        Ok(())
    }

    fn alloc_device(&mut self) -> Result<()> {
        self.device_ptr = R::allocate(self.size, &self.device)?;
        log::debug!(
            "{}: allocated {} device bytes on {}",
            R::name(),
            self.size,
            crate::runtime::Device::name(&self.device)
        );
        Ok(())
    }

    fn release_host(&mut self) {
        if self.own_host && self.host_ptr != 0 {
            CpuRuntime::deallocate(self.host_ptr, self.size, &CpuDevice::new());
        }
        self.host_ptr = 0;
        self.own_host = false;
    }
}

impl<R: Runtime> Drop for SyncedBuffer<R> {
    fn drop(&mut self) {
        self.release_host();
        if self.device_ptr != 0 {
            R::deallocate(self.device_ptr, self.size, &self.device);
        }
    }
}

impl<R: Runtime> fmt::Debug for SyncedBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedBuffer")
            .field("size", &self.size)
            .field("head", &self.head)
            .field("host_ptr", &format!("0x{:x}", self.host_ptr))
            .field("own_host", &self.own_host)
            .field("device_ptr", &format!("0x{:x}", self.device_ptr))
            .finish()
    }
}
