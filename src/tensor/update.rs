//! Parameter update, reductions and scaling
//!
//! Every operation dispatches on the authoritative copy of the buffer it
//! touches: host kernels when the host copy is authoritative, the runtime
//! client's kernels when the device copy is authoritative or both are in
//! sync. On a host-only runtime buffers never leave the host, so only the
//! host path is ever taken.

use super::blob::{Blob, SharedBuffer, head_of, lock_mut, read_view, required, write_view};
use super::synced::SyncHead;
use crate::dtype::{Element, FloatElement};
use crate::error::{Error, Result};
use crate::runtime::cpu::kernels;
use crate::runtime::{BlobKernel, FloatKernels, Runtime};

impl<T, R> Blob<T, R>
where
    T: FloatElement,
    R: Runtime,
    R::Client: FloatKernels<T>,
{
    /// Apply the gradient: `data -= diff`, then `data *= mask` when the mask
    /// is active (sparse blob in the `Masked` stage).
    pub fn update(&mut self) -> Result<()> {
        let count = self.count();
        let data = required(&self.data, "data")?;
        let diff = required(&self.diff, "diff")?;
        let mask = if self.masks_active() {
            Some(required(&self.mask, "mask")?)
        } else {
            None
        };
        let minus_one = -<T as Element>::one();

        match head_of(Some(data), "data")? {
            SyncHead::AtHost => {
                let mut value = write_view::<T, R>(data, count, "data")?;
                kernels::axpy(minus_one, &read_view::<T, R>(diff, count, "diff")?, &mut value);
                if let Some(mask) = mask {
                    kernels::mul_assign(&read_view::<T, R>(mask, count, "mask")?, &mut value);
                }
            }
            SyncHead::AtDevice | SyncHead::Synced => {
                let grad = lock_mut(diff, "diff")?.read_device()?;
                let value = lock_mut(data, "data")?.mutable_device()?;
                self.client().axpy(minus_one, grad, value, count)?;
                if let Some(mask) = mask {
                    let mask = lock_mut(mask, "mask")?.read_device()?;
                    self.client().mul(mask, value, value, count)?;
                }
            }
            SyncHead::Uninitialized => return Err(Error::Uninitialized { buffer: "data" }),
        }
        Ok(())
    }

    /// Sum of absolute values of the data (0 if never initialized)
    pub fn sum_abs_data(&self) -> Result<T> {
        self.sum_abs(self.data.as_ref(), "data")
    }

    /// Sum of absolute values of the gradient
    pub fn sum_abs_diff(&self) -> Result<T> {
        self.sum_abs(self.diff.as_ref(), "diff")
    }

    /// Sum of absolute values of the mask
    pub fn sum_abs_mask(&self) -> Result<T> {
        self.sum_abs(self.mask.as_ref(), "mask")
    }

    /// Sum of squares of the data (0 if never initialized)
    pub fn sum_squares_data(&self) -> Result<T> {
        self.sum_squares(self.data.as_ref(), "data")
    }

    /// Sum of squares of the gradient
    pub fn sum_squares_diff(&self) -> Result<T> {
        self.sum_squares(self.diff.as_ref(), "diff")
    }

    /// Sum of squares of the mask
    pub fn sum_squares_mask(&self) -> Result<T> {
        self.sum_squares(self.mask.as_ref(), "mask")
    }

    /// Multiply the data by `factor` (no-op if never initialized)
    pub fn scale_data(&mut self, factor: T) -> Result<()> {
        self.scale(self.data.as_ref(), factor, "data")
    }

    /// Multiply the gradient by `factor`
    pub fn scale_diff(&mut self, factor: T) -> Result<()> {
        self.scale(self.diff.as_ref(), factor, "diff")
    }

    /// Multiply the mask by `factor`
    pub fn scale_mask(&mut self, factor: T) -> Result<()> {
        self.scale(self.mask.as_ref(), factor, "mask")
    }

    fn sum_abs(&self, buf: Option<&SharedBuffer<R>>, name: &'static str) -> Result<T> {
        let count = self.count();
        match (buf, head_of(buf, name)?) {
            (Some(buf), SyncHead::AtHost) => Ok(kernels::asum(&read_view::<T, R>(buf, count, name)?)),
            (Some(buf), SyncHead::AtDevice | SyncHead::Synced) => {
                let x = lock_mut(buf, name)?.read_device()?;
                self.client().asum(x, count)
            }
            _ => Ok(<T as Element>::zero()),
        }
    }

    fn sum_squares(&self, buf: Option<&SharedBuffer<R>>, name: &'static str) -> Result<T> {
        let count = self.count();
        match (buf, head_of(buf, name)?) {
            (Some(buf), SyncHead::AtHost) => {
                let x = read_view::<T, R>(buf, count, name)?;
                Ok(kernels::dot(&x, &x))
            }
            (Some(buf), SyncHead::AtDevice | SyncHead::Synced) => {
                let x = lock_mut(buf, name)?.read_device()?;
                self.client().dot(x, x, count)
            }
            _ => Ok(<T as Element>::zero()),
        }
    }

    fn scale(&self, buf: Option<&SharedBuffer<R>>, factor: T, name: &'static str) -> Result<()> {
        let count = self.count();
        match (buf, head_of(buf, name)?) {
            (Some(buf), SyncHead::AtHost) => {
                kernels::scal(factor, &mut write_view::<T, R>(buf, count, name)?);
                Ok(())
            }
            (Some(buf), SyncHead::AtDevice | SyncHead::Synced) => {
                let x = lock_mut(buf, name)?.mutable_device()?;
                self.client().scal(factor, x, count)
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{BlobConfig, PruneStage};
    use crate::runtime::CpuRuntime;
    use crate::tensor::{Blob, SyncHead};

    fn blob(dims: &[usize], config: BlobConfig) -> Blob<f64, CpuRuntime> {
        Blob::with_shape(dims, config).unwrap()
    }

    #[test]
    fn test_update_subtracts_gradient() {
        let mut b = blob(&[3], BlobConfig::default());
        b.mutable_host_data().unwrap().copy_from_slice(&[1.0, 2.0, 3.0]);
        b.mutable_host_diff().unwrap().copy_from_slice(&[0.5, 0.5, 4.0]);
        b.update().unwrap();
        assert_eq!(&*b.host_data().unwrap(), &[0.5, 1.5, -1.0]);
    }

    #[test]
    fn test_update_applies_mask() {
        let mut b = blob(&[4], BlobConfig::default());
        b.set_sparse(true).unwrap();
        b.mutable_host_data().unwrap().fill(2.0);
        b.mutable_host_diff().unwrap().fill(1.0);
        b.mutable_host_mask()
            .unwrap()
            .copy_from_slice(&[1.0, 0.0, 1.0, 0.0]);
        b.update().unwrap();
        assert_eq!(&*b.host_data().unwrap(), &[1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_compressed_stage_skips_mask() {
        let config = BlobConfig::default().with_prune_stage(PruneStage::Compressed);
        let mut b = blob(&[2], config);
        b.set_sparse(true).unwrap();
        assert!(!b.has_mask());
        b.mutable_host_data().unwrap().fill(2.0);
        b.update().unwrap();
        assert_eq!(&*b.host_data().unwrap(), &[2.0, 2.0]);
    }

    #[test]
    fn test_update_uninitialized_fails() {
        let mut b = blob(&[2], BlobConfig::default());
        assert_eq!(b.data_head().unwrap(), SyncHead::Uninitialized);
        assert!(b.update().is_err());
    }

    #[test]
    fn test_reductions_on_uninitialized_are_zero() {
        let mut b = blob(&[8], BlobConfig::default());
        assert_eq!(b.sum_abs_data().unwrap(), 0.0);
        assert_eq!(b.sum_squares_diff().unwrap(), 0.0);
        assert_eq!(b.sum_abs_mask().unwrap(), 0.0);
        b.scale_data(3.0).unwrap();
        assert_eq!(b.data_head().unwrap(), SyncHead::Uninitialized);
    }

    #[test]
    fn test_reductions_and_scale() {
        let mut b = blob(&[3], BlobConfig::default());
        b.mutable_host_diff()
            .unwrap()
            .copy_from_slice(&[1.0, -2.0, 2.0]);
        assert_eq!(b.sum_abs_diff().unwrap(), 5.0);
        assert_eq!(b.sum_squares_diff().unwrap(), 9.0);
        b.scale_diff(-0.5).unwrap();
        assert_eq!(&*b.host_diff().unwrap(), &[-0.5, 1.0, -1.0]);
    }

    #[test]
    fn test_reductions_cover_count_not_capacity() {
        let mut b = blob(&[4], BlobConfig::default());
        b.mutable_host_data().unwrap().fill(1.0);
        b.reshape(&[2]).unwrap();
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.sum_abs_data().unwrap(), 2.0);
    }
}
