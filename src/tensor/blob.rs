//! Core Blob type

use super::shape::{self, MAX_AXES, Shape, TargetShape};
use super::synced::{SyncHead, SyncedBuffer};
use crate::config::BlobConfig;
use crate::dtype::Element;
use crate::error::{Error, Result};
use crate::DefaultRuntime;
use crate::runtime::Runtime;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;
use std::sync::Arc;

/// A buffer that may be shared by several blobs (parameter tying)
pub(crate) type SharedBuffer<R> = Arc<RwLock<SyncedBuffer<R>>>;

/// Read-only typed view of a buffer's host copy
pub type HostView<'a, T> = MappedRwLockReadGuard<'a, [T]>;

/// Writable typed view of a buffer's host copy
pub type HostViewMut<'a, T> = MappedRwLockWriteGuard<'a, [T]>;

/// Parameter blob: value, gradient and mask buffers plus a shape
///
/// A `Blob` owns up to six [`SyncedBuffer`]s:
/// - **data / diff / mask**: `capacity` elements each, index-aligned
/// - **csr values / row pointers / column indices**: the CSR view of a 2-D
///   value buffer, present only after extraction or loading
///
/// Each buffer migrates between host and device on demand; element-wise
/// operations run wherever the buffer's authoritative copy lives.
///
/// # Capacity
///
/// `capacity` is the largest `count` this blob was ever reshaped to.
/// Reshaping to a smaller count reuses the existing buffers, reshaping past
/// it replaces data, diff and mask together.
///
/// # Example
///
/// ```
/// use numblob::prelude::*;
///
/// let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[2, 3], BlobConfig::default())?;
/// blob.mutable_host_data()?.fill(1.0);
/// blob.mutable_host_diff()?.fill(0.25);
/// blob.update()?;
/// assert_eq!(blob.sum_abs_data()?, 4.5);
/// # Ok::<(), numblob::Error>(())
/// ```
pub struct Blob<T: Element, R: Runtime = DefaultRuntime> {
    shape: Shape,
    /// Device-visible mirror of `shape`, one i32 per axis
    shape_data: Option<SyncedBuffer<R>>,
    count: usize,
    capacity: usize,
    nnz: usize,
    sparse: bool,
    config: BlobConfig,
    device: R::Device,
    client: R::Client,
    pub(crate) data: Option<SharedBuffer<R>>,
    pub(crate) diff: Option<SharedBuffer<R>>,
    pub(crate) mask: Option<SharedBuffer<R>>,
    pub(crate) csr_values: Option<SharedBuffer<R>>,
    pub(crate) csr_row_ptrs: Option<SharedBuffer<R>>,
    pub(crate) csr_col_indices: Option<SharedBuffer<R>>,
    _marker: PhantomData<T>,
}

impl<T: Element, R: Runtime> Blob<T, R> {
    /// Create an empty blob (count 0, capacity 0) on the default device.
    pub fn new(config: BlobConfig) -> Result<Self> {
        Self::new_on(&R::default_device(), config)
    }

    /// Create an empty blob on a specific device.
    pub fn new_on(device: &R::Device, config: BlobConfig) -> Result<Self> {
        Ok(Self {
            shape: Shape::new(),
            shape_data: None,
            count: 0,
            capacity: 0,
            nnz: 0,
            sparse: false,
            config,
            device: device.clone(),
            client: R::default_client(device)?,
            data: None,
            diff: None,
            mask: None,
            csr_values: None,
            csr_row_ptrs: None,
            csr_col_indices: None,
            _marker: PhantomData,
        })
    }

    /// Create a blob and reshape it to `dims`.
    pub fn with_shape(dims: &[usize], config: BlobConfig) -> Result<Self> {
        let mut blob = Self::new(config)?;
        blob.reshape(dims)?;
        Ok(blob)
    }

    /// Create a blob with the legacy 4-axis shape.
    pub fn with_legacy_shape(
        num: usize,
        channels: usize,
        height: usize,
        width: usize,
        config: BlobConfig,
    ) -> Result<Self> {
        Self::with_shape(&[num, channels, height, width], config)
    }

    // ===== Configuration and flags =====

    /// Current configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// The mask follows the new stage right away: a sparse blob entering the
    /// `Masked` stage gets an all-ones mask, and one leaving it drops its mask.
    pub fn set_config(&mut self, config: BlobConfig) -> Result<()> {
        self.config = config;
        self.sync_mask()
    }

    /// Whether sparse mode is active
    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    /// Enable or disable sparse mode.
    ///
    /// Enabling it on an allocated blob in the `Masked` stage materializes
    /// an all-ones mask if none exists yet, so nothing is pruned until the
    /// caller writes zeros into the mask. Disabling it drops the mask.
    pub fn set_sparse(&mut self, sparse: bool) -> Result<()> {
        self.sparse = sparse;
        self.sync_mask()
    }

    fn sync_mask(&mut self) -> Result<()> {
        if self.masks_active() {
            self.ensure_mask()
        } else {
            self.mask = None;
            Ok(())
        }
    }

    /// Allocate an all-ones mask if there is none, or the one present is
    /// smaller than the capacity, and the blob has capacity.
    pub(crate) fn ensure_mask(&mut self) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        let covers = match self.mask.as_ref() {
            Some(mask) => {
                let size = mask
                    .try_read()
                    .ok_or(Error::BufferBusy { buffer: "mask" })?
                    .size();
                size >= self.capacity * size_of::<T>()
            }
            None => false,
        };
        if !covers {
            self.mask = Some(self.ones_buffer(self.capacity)?);
        }
        Ok(())
    }

    /// Number of stored entries in the CSR view
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    /// Override the CSR entry count
    pub fn set_nnz(&mut self, nnz: usize) {
        self.nnz = nnz;
    }

    /// Whether the mask participates in updates for this blob
    pub(crate) fn masks_active(&self) -> bool {
        self.config.masks_active(self.sparse)
    }

    /// Device this blob's device-side buffers live on
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Kernel client bound to [`device`](Self::device)
    pub fn client(&self) -> &R::Client {
        &self.client
    }

    // ===== Shape =====

    /// Change the dimensions of the blob, allocating new memory if necessary.
    ///
    /// The whole dimension list is validated before anything changes, so a
    /// failed reshape leaves the blob untouched. Buffers are only replaced
    /// when the new count exceeds the capacity; their contents are not
    /// preserved in that case, and a replaced mask starts as all ones.
    pub fn reshape(&mut self, dims: &[usize]) -> Result<()> {
        if dims.len() > MAX_AXES {
            return Err(Error::TooManyAxes {
                ndim: dims.len(),
                max: MAX_AXES,
            });
        }
        let count = shape::checked_count(dims)?;

        // Everything fallible happens before the first assignment
        let grown = if count > self.capacity {
            let bytes = count * size_of::<T>();
            let data = self.alloc_buffer(bytes)?;
            let diff = self.alloc_buffer(bytes)?;
            let mask = if self.masks_active() {
                Some(self.ones_buffer(count)?)
            } else {
                None
            };
            Some((data, diff, mask))
        } else {
            None
        };
        self.mirror_shape(dims)?;

        if let Some((data, diff, mask)) = grown {
            log::debug!(
                "blob {:?}: growing capacity {} -> {}",
                dims,
                self.capacity,
                count
            );
            self.capacity = count;
            self.data = Some(data);
            self.diff = Some(diff);
            self.mask = mask;
        }
        self.shape = Shape::from(dims);
        self.count = count;
        Ok(())
    }

    /// Reshape from signed dimensions (as carried by serialized shapes).
    pub fn reshape_from_message_shape(&mut self, dims: &[i64]) -> Result<()> {
        let shape = Shape::from_signed(dims)?;
        self.reshape(&shape)
    }

    /// Reshape to the legacy `(num, channels, height, width)` form.
    pub fn reshape_legacy(
        &mut self,
        num: usize,
        channels: usize,
        height: usize,
        width: usize,
    ) -> Result<()> {
        self.reshape(&[num, channels, height, width])
    }

    /// Reshape to the shape of another blob.
    pub fn reshape_like<U: Element>(&mut self, other: &Blob<U, R>) -> Result<()> {
        let dims = other.shape.clone();
        self.reshape(&dims)
    }

    fn mirror_shape(&mut self, dims: &[usize]) -> Result<()> {
        if dims.is_empty() {
            return Ok(());
        }
        let bytes = dims.len() * size_of::<i32>();
        let fill = |mirror: &mut SyncedBuffer<R>| -> Result<()> {
            let host: &mut [i32] = bytemuck::cast_slice_mut(mirror.mutable_host()?);
            for (slot, &dim) in host.iter_mut().zip(dims) {
                *slot = dim as i32;
            }
            Ok(())
        };
        if let Some(mirror) = self.shape_data.as_mut().filter(|b| b.size() >= bytes) {
            return fill(mirror);
        }
        let mut mirror = SyncedBuffer::new(bytes, &self.device)?;
        fill(&mut mirror)?;
        self.shape_data = Some(mirror);
        Ok(())
    }

    /// Dimensions
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of axes
    pub fn num_axes(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of elements (product of the dimensions)
    pub fn count(&self) -> usize {
        self.count
    }

    /// Largest count this blob was ever reshaped to
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of an axis; negative indices count from the end.
    pub fn shape_at(&self, axis: isize) -> Result<usize> {
        Ok(self.shape[self.canonical_axis_index(axis)?])
    }

    /// Resolve a possibly negative axis index.
    pub fn canonical_axis_index(&self, axis: isize) -> Result<usize> {
        self.shape.canonical_axis(axis)
    }

    /// Product of the dimensions in `start..end`.
    pub fn count_range(&self, start: usize, end: usize) -> Result<usize> {
        let ndim = self.num_axes();
        if start > end || end > ndim {
            return Err(Error::InvalidArgument {
                arg: "range",
                reason: format!("{}..{} is not within 0..{}", start, end, ndim),
            });
        }
        Ok(self.shape[start..end].iter().product())
    }

    /// Product of the dimensions from `start` to the last axis.
    pub fn count_from(&self, start: usize) -> Result<usize> {
        self.count_range(start, self.num_axes())
    }

    /// Axis size under the legacy 4-axis convention (see [`Shape::legacy_dim`]).
    pub fn legacy_dim(&self, index: isize) -> Result<usize> {
        self.shape.legacy_dim(index)
    }

    /// Legacy `num` axis (`legacy_dim(0)`)
    pub fn num(&self) -> Result<usize> {
        self.legacy_dim(0)
    }

    /// Legacy `channels` axis (`legacy_dim(1)`)
    pub fn channels(&self) -> Result<usize> {
        self.legacy_dim(1)
    }

    /// Legacy `height` axis (`legacy_dim(2)`)
    pub fn height(&self) -> Result<usize> {
        self.legacy_dim(2)
    }

    /// Legacy `width` axis (`legacy_dim(3)`)
    pub fn width(&self) -> Result<usize> {
        self.legacy_dim(3)
    }

    /// Flat offset of a legacy `(n, c, h, w)` index.
    pub fn offset(&self, n: usize, c: usize, h: usize, w: usize) -> Result<usize> {
        let dims = [self.num()?, self.channels()?, self.height()?, self.width()?];
        for (axis, (&index, &size)) in [n, c, h, w].iter().zip(&dims).enumerate() {
            if index > size {
                return Err(Error::InvalidArgument {
                    arg: "index",
                    reason: format!("{} exceeds axis {} of size {}", index, axis, size),
                });
            }
        }
        Ok(((n * dims[1] + c) * dims[2] + h) * dims[3] + w)
    }

    /// Whether this blob's shape is compatible with `target`.
    ///
    /// A legacy target is compared against the last four axes; an explicit
    /// target must match exactly, rank included.
    pub fn shape_equals(&self, target: &TargetShape) -> bool {
        target.matches(&self.shape)
    }

    /// Device handle of the shape mirror (one i32 per axis).
    pub fn device_shape(&mut self) -> Result<u64> {
        self.shape_data
            .as_mut()
            .ok_or(Error::Uninitialized { buffer: "shape" })?
            .read_device()
    }

    // ===== Mask =====

    /// Materialize an all-ones mask once the blob is at capacity.
    ///
    /// Does nothing while `count < capacity` or when the blob is empty.
    pub fn add_mask(&mut self) -> Result<()> {
        if self.count < self.capacity || self.capacity == 0 {
            return Ok(());
        }
        self.mask = Some(self.ones_buffer(self.capacity)?);
        log::debug!("blob {}: materialized mask of {}", self.shape, self.capacity);
        Ok(())
    }

    fn ones_buffer(&self, len: usize) -> Result<SharedBuffer<R>> {
        let buf = self.alloc_buffer(len * size_of::<T>())?;
        write_view::<T, R>(&buf, len, "mask")?.fill(T::one());
        Ok(buf)
    }

    pub(crate) fn alloc_buffer(&self, bytes: usize) -> Result<SharedBuffer<R>> {
        Ok(Arc::new(RwLock::new(SyncedBuffer::new(bytes, &self.device)?)))
    }

    // ===== Buffer access =====

    /// Authority state of the value buffer (`Uninitialized` if absent)
    pub fn data_head(&self) -> Result<SyncHead> {
        head_of(self.data.as_ref(), "data")
    }

    /// Authority state of the gradient buffer (`Uninitialized` if absent)
    pub fn diff_head(&self) -> Result<SyncHead> {
        head_of(self.diff.as_ref(), "diff")
    }

    /// Authority state of the mask buffer (`Uninitialized` if absent)
    pub fn mask_head(&self) -> Result<SyncHead> {
        head_of(self.mask.as_ref(), "mask")
    }

    /// Whether a mask buffer exists
    pub fn has_mask(&self) -> bool {
        self.mask.is_some()
    }

    /// Host view of the values, `count` elements
    pub fn host_data(&self) -> Result<HostView<'_, T>> {
        read_view(required(&self.data, "data")?, self.count, "data")
    }

    /// Host view of the gradient, `count` elements
    pub fn host_diff(&self) -> Result<HostView<'_, T>> {
        read_view(required(&self.diff, "diff")?, self.count, "diff")
    }

    /// Host view of the mask, `count` elements
    pub fn host_mask(&self) -> Result<HostView<'_, T>> {
        read_view(required(&self.mask, "mask")?, self.count, "mask")
    }

    /// Writable host view of the values; the host becomes authoritative.
    pub fn mutable_host_data(&mut self) -> Result<HostViewMut<'_, T>> {
        write_view(required(&self.data, "data")?, self.count, "data")
    }

    /// Writable host view of the gradient; the host becomes authoritative.
    pub fn mutable_host_diff(&mut self) -> Result<HostViewMut<'_, T>> {
        write_view(required(&self.diff, "diff")?, self.count, "diff")
    }

    /// Writable host view of the mask; the host becomes authoritative.
    pub fn mutable_host_mask(&mut self) -> Result<HostViewMut<'_, T>> {
        write_view(required(&self.mask, "mask")?, self.count, "mask")
    }

    /// Device handle of the values
    pub fn device_data(&self) -> Result<u64> {
        lock_mut(required(&self.data, "data")?, "data")?.read_device()
    }

    /// Device handle of the gradient
    pub fn device_diff(&self) -> Result<u64> {
        lock_mut(required(&self.diff, "diff")?, "diff")?.read_device()
    }

    /// Device handle of the mask
    pub fn device_mask(&self) -> Result<u64> {
        lock_mut(required(&self.mask, "mask")?, "mask")?.read_device()
    }

    /// Device handle of the values for writing; the device becomes authoritative.
    pub fn mutable_device_data(&mut self) -> Result<u64> {
        lock_mut(required(&self.data, "data")?, "data")?.mutable_device()
    }

    /// Device handle of the gradient for writing
    pub fn mutable_device_diff(&mut self) -> Result<u64> {
        lock_mut(required(&self.diff, "diff")?, "diff")?.mutable_device()
    }

    /// Device handle of the mask for writing
    pub fn mutable_device_mask(&mut self) -> Result<u64> {
        lock_mut(required(&self.mask, "mask")?, "mask")?.mutable_device()
    }

    /// Adopt caller-owned host memory as the value buffer's host copy.
    ///
    /// # Safety
    ///
    /// `ptr` must be 64-byte aligned, valid for reads and writes of
    /// `capacity` elements, and must outlive the value buffer (including any
    /// blob sharing it). The memory is never freed by the blob.
    pub unsafe fn set_host_data(&mut self, ptr: *mut T) -> Result<()> {
        if ptr.is_null() {
            return Err(Error::InvalidArgument {
                arg: "ptr",
                reason: "host pointer is null".to_string(),
            });
        }
        let mut buf = lock_mut(required(&self.data, "data")?, "data")?;
        unsafe { buf.set_host_ptr(ptr.cast::<u8>()) };
        Ok(())
    }

    // ===== Sharing and copying =====

    /// Make this blob's value buffer the same buffer as `other`'s.
    ///
    /// Both blobs must have the same count. The previous buffer is released
    /// once no other blob refers to it.
    pub fn share_data(&mut self, other: &Blob<T, R>) -> Result<()> {
        self.data = Some(self.share_from(other, other.data.as_ref(), "share_data")?);
        Ok(())
    }

    /// Make this blob's gradient buffer the same buffer as `other`'s.
    pub fn share_diff(&mut self, other: &Blob<T, R>) -> Result<()> {
        self.diff = Some(self.share_from(other, other.diff.as_ref(), "share_diff")?);
        Ok(())
    }

    /// Make this blob's mask buffer the same buffer as `other`'s.
    pub fn share_mask(&mut self, other: &Blob<T, R>) -> Result<()> {
        self.mask = Some(self.share_from(other, other.mask.as_ref(), "share_mask")?);
        Ok(())
    }

    fn share_from(
        &self,
        other: &Blob<T, R>,
        buf: Option<&SharedBuffer<R>>,
        op: &'static str,
    ) -> Result<SharedBuffer<R>> {
        if other.count != self.count {
            return Err(Error::CountMismatch {
                op,
                expected: self.count,
                got: other.count,
            });
        }
        buf.cloned().ok_or(Error::Uninitialized { buffer: op })
    }

    /// Copy values (and the mask, when both blobs have one) or the gradient
    /// from `source`.
    ///
    /// With `reshape` set, a differently shaped blob is first reshaped to
    /// match; otherwise differing shapes are an error. The copy runs on the
    /// device when the source's authoritative copy is there.
    pub fn copy_from(&mut self, source: &Blob<T, R>, copy_diff: bool, reshape: bool) -> Result<()> {
        if source.count != self.count || source.shape != self.shape {
            if !reshape {
                return Err(Error::shape_mismatch(&self.shape, &source.shape));
            }
            self.reshape_like(source)?;
        }

        if copy_diff {
            return copy_buffer::<T, R>(
                required(&source.diff, "diff")?,
                required(&self.diff, "diff")?,
                self.count,
                "diff",
            );
        }

        copy_buffer::<T, R>(
            required(&source.data, "data")?,
            required(&self.data, "data")?,
            self.count,
            "data",
        )?;
        if let (Some(src), Some(dst)) = (source.mask.as_ref(), self.mask.as_ref()) {
            copy_buffer::<T, R>(src, dst, self.count, "mask")?;
        }
        Ok(())
    }
}

impl<T: Element, R: Runtime> fmt::Debug for Blob<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("dtype", &T::DTYPE)
            .field("runtime", &R::name())
            .field("shape", &self.shape)
            .field("capacity", &self.capacity)
            .field("sparse", &self.sparse)
            .field("nnz", &self.nnz)
            .field("config", &self.config)
            .finish()
    }
}

// ===== Buffer helpers =====

pub(crate) fn required<'a, R: Runtime>(
    buf: &'a Option<SharedBuffer<R>>,
    name: &'static str,
) -> Result<&'a SharedBuffer<R>> {
    buf.as_ref().ok_or(Error::Uninitialized { buffer: name })
}

pub(crate) fn head_of<R: Runtime>(
    buf: Option<&SharedBuffer<R>>,
    name: &'static str,
) -> Result<SyncHead> {
    match buf {
        None => Ok(SyncHead::Uninitialized),
        Some(buf) => Ok(buf
            .try_read()
            .ok_or(Error::BufferBusy { buffer: name })?
            .head()),
    }
}

pub(crate) fn lock_mut<'a, R: Runtime>(
    buf: &'a SharedBuffer<R>,
    name: &'static str,
) -> Result<RwLockWriteGuard<'a, SyncedBuffer<R>>> {
    buf.try_write().ok_or(Error::BufferBusy { buffer: name })
}

fn check_extent<R: Runtime>(
    buf: &SyncedBuffer<R>,
    len: usize,
    elem_size: usize,
    name: &'static str,
) -> Result<()> {
    if buf.size() < len * elem_size {
        return Err(Error::CountMismatch {
            op: name,
            expected: len,
            got: buf.size() / elem_size,
        });
    }
    Ok(())
}

/// Typed read view of the first `len` elements, migrating to host if needed.
pub(crate) fn read_view<'a, T: bytemuck::Pod, R: Runtime>(
    buf: &'a SharedBuffer<R>,
    len: usize,
    name: &'static str,
) -> Result<HostView<'a, T>> {
    let guard = {
        let current = buf.try_read().ok_or(Error::BufferBusy { buffer: name })?;
        if matches!(current.head(), SyncHead::AtHost | SyncHead::Synced) {
            current
        } else {
            drop(current);
            let mut guard = lock_mut(buf, name)?;
            guard.sync_to_host()?;
            RwLockWriteGuard::downgrade(guard)
        }
    };
    check_extent(&guard, len, size_of::<T>(), name)?;
    Ok(RwLockReadGuard::map(guard, |b| {
        &bytemuck::cast_slice::<u8, T>(b.host_bytes())[..len]
    }))
}

/// Typed write view of the first `len` elements; the host becomes authoritative.
pub(crate) fn write_view<'a, T: bytemuck::Pod, R: Runtime>(
    buf: &'a SharedBuffer<R>,
    len: usize,
    name: &'static str,
) -> Result<HostViewMut<'a, T>> {
    let mut guard = lock_mut(buf, name)?;
    check_extent(&guard, len, size_of::<T>(), name)?;
    guard.mutable_host()?;
    Ok(RwLockWriteGuard::map(guard, |b| {
        &mut bytemuck::cast_slice_mut::<u8, T>(b.host_bytes_mut())[..len]
    }))
}

fn copy_buffer<T: Element, R: Runtime>(
    src: &SharedBuffer<R>,
    dst: &SharedBuffer<R>,
    len: usize,
    name: &'static str,
) -> Result<()> {
    if Arc::ptr_eq(src, dst) || len == 0 {
        return Ok(());
    }

    let on_device = matches!(
        head_of(Some(src), name)?,
        SyncHead::AtDevice | SyncHead::Synced
    ) && R::is_accelerator();

    if on_device {
        let from = lock_mut(src, name)?.read_device()?;
        let mut target = lock_mut(dst, name)?;
        check_extent(&target, len, size_of::<T>(), name)?;
        let device = target.device().clone();
        let to = target.mutable_device()?;
        R::copy_within_device(from, to, len * size_of::<T>(), &device)
    } else {
        let from = read_view::<T, R>(src, len, name)?;
        write_view::<T, R>(dst, len, name)?.copy_from_slice(&from);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::CpuRuntime;

    type CpuBlob = Blob<f32, CpuRuntime>;

    #[test]
    fn test_new_is_empty() {
        let blob = CpuBlob::new(BlobConfig::default()).unwrap();
        assert_eq!(blob.count(), 0);
        assert_eq!(blob.capacity(), 0);
        assert_eq!(blob.data_head().unwrap(), SyncHead::Uninitialized);
        assert!(matches!(
            blob.host_data(),
            Err(Error::Uninitialized { buffer: "data" })
        ));
    }

    #[test]
    fn test_scalar_reshape_has_count_one() {
        let mut blob = CpuBlob::new(BlobConfig::default()).unwrap();
        blob.reshape(&[]).unwrap();
        assert_eq!(blob.count(), 1);
        assert_eq!(blob.host_data().unwrap().len(), 1);
    }

    #[test]
    fn test_shape_mirror_tracks_dims() {
        let mut blob = CpuBlob::with_shape(&[2, 3, 4], BlobConfig::default()).unwrap();
        let mirror = blob.shape_data.as_mut().unwrap();
        let dims: &[i32] = bytemuck::cast_slice(mirror.read_host().unwrap());
        assert_eq!(&dims[..3], &[2, 3, 4]);

        blob.reshape(&[7]).unwrap();
        let mirror = blob.shape_data.as_mut().unwrap();
        assert_eq!(mirror.size(), 12);
        let dims: &[i32] = bytemuck::cast_slice(mirror.read_host().unwrap());
        assert_eq!(dims[0], 7);
    }

    #[test]
    fn test_conflicting_view_is_busy() {
        let mut blob = CpuBlob::with_shape(&[4], BlobConfig::default()).unwrap();
        blob.mutable_host_data().unwrap();
        let data = blob.data.clone().unwrap();
        let _view = read_view::<f32, CpuRuntime>(&data, 4, "data").unwrap();
        assert!(matches!(
            write_view::<f32, CpuRuntime>(&data, 4, "data"),
            Err(Error::BufferBusy { buffer: "data" })
        ));
    }

    #[test]
    fn test_offset() {
        let blob = CpuBlob::with_legacy_shape(2, 3, 4, 5, BlobConfig::default()).unwrap();
        assert_eq!(blob.offset(1, 2, 3, 4).unwrap(), 119);
        assert_eq!(blob.offset(0, 0, 0, 0).unwrap(), 0);
        assert!(blob.offset(3, 0, 0, 0).is_err());
    }

    #[test]
    fn test_count_range() {
        let blob = CpuBlob::with_shape(&[2, 3, 4], BlobConfig::default()).unwrap();
        assert_eq!(blob.count_range(1, 3).unwrap(), 12);
        assert_eq!(blob.count_from(0).unwrap(), 24);
        assert_eq!(blob.count_range(1, 1).unwrap(), 1);
        assert!(blob.count_range(2, 4).is_err());
    }
}
