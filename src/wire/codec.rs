//! Blob <-> BlobMessage conversion

use super::{BlobMessage, BlobShape, WireField};
use crate::config::PruneStage;
use crate::dtype::{Element, FloatElement};
use crate::error::{Error, Result};
use crate::runtime::{FloatKernels, Runtime};
use crate::tensor::{Blob, SharedBuffer, read_view, write_view};

/// Element types with a native wire encoding
///
/// `f32` blobs write the single-precision fields, `f64` blobs the
/// `double_*` fields.
pub trait WireElement: FloatElement {
    /// Append `values` to the field slot matching this precision.
    fn append(msg: &mut BlobMessage, field: WireField, values: &[Self]);
}

impl WireElement for f32 {
    fn append(msg: &mut BlobMessage, field: WireField, values: &[Self]) {
        msg.single_mut(field).extend_from_slice(values);
    }
}

impl WireElement for f64 {
    fn append(msg: &mut BlobMessage, field: WireField, values: &[Self]) {
        msg.double_mut(field).extend_from_slice(values);
    }
}

impl<T, R> Blob<T, R>
where
    T: WireElement,
    R: Runtime,
    R::Client: FloatKernels<T>,
{
    /// Serialize this blob.
    ///
    /// A sparse blob is compressed first and written as its CSR arrays plus
    /// `nnz`; unless `emit_dense_with_csr` is off it also carries the dense
    /// values and mask. A dense blob writes its values, and its gradient when
    /// `include_gradient` is set.
    pub fn to_wire(&mut self, include_gradient: bool) -> Result<BlobMessage> {
        let mut msg = BlobMessage {
            shape: Some(BlobShape {
                dim: self.shape().iter().map(|&d| d as i64).collect(),
            }),
            sparse: self.is_sparse(),
            ..Default::default()
        };

        if self.is_sparse() {
            self.extract_csr()?;
            let parts = self.csr_parts()?;
            T::append(&mut msg, WireField::CsrVal, &parts.values);
            msg.csrrowptr = parts.row_ptrs;
            msg.csrcolind = parts.col_indices;
            msg.nnz = Some(i32::try_from(parts.values.len()).map_err(|_| Error::CountOverflow {
                shape: self.shape().to_vec(),
            })?);

            if self.config().emit_dense_with_csr {
                self.append_dense(&mut msg, self.data.as_ref(), WireField::Data)?;
                self.append_dense(&mut msg, self.mask.as_ref(), WireField::Mask)?;
            }
        } else {
            self.append_dense(&mut msg, self.data.as_ref(), WireField::Data)?;
            if include_gradient {
                self.append_dense(&mut msg, self.diff.as_ref(), WireField::Diff)?;
            }
        }
        Ok(msg)
    }

    fn append_dense(
        &self,
        msg: &mut BlobMessage,
        buf: Option<&SharedBuffer<R>>,
        field: WireField,
    ) -> Result<()> {
        if let Some(buf) = buf {
            T::append(msg, field, &read_view::<T, R>(buf, self.count(), field.name())?);
        }
        Ok(())
    }
}

impl<T: Element, R: Runtime> Blob<T, R> {
    /// Load this blob from a message.
    ///
    /// With `reshape` set the blob takes the message's shape; otherwise the
    /// shapes must already agree. Dense arrays are length-checked against
    /// `count`, CSR arrays against `nnz` and the row count. A message marked
    /// sparse switches the blob into sparse mode. In the `Compressed` stage
    /// the dense part of a sparse message is ignored.
    pub fn from_wire(&mut self, msg: &BlobMessage, reshape: bool) -> Result<()> {
        if msg.sparse && !self.is_sparse() {
            self.set_sparse(true)?;
        }

        let skip_dense = msg.sparse && self.config().prune_stage == PruneStage::Compressed;
        if !skip_dense {
            let target = msg.target_shape();
            if reshape {
                self.reshape_from_message_shape(&target.dims())?;
            } else if !self.shape_equals(&target) {
                let got: Vec<usize> = target.dims().iter().map(|&d| d.max(0) as usize).collect();
                return Err(Error::shape_mismatch(self.shape(), &got));
            }

            self.load_dense(msg, WireField::Data)?;
            self.load_dense(msg, WireField::Diff)?;
            if self.masks_active() {
                self.ensure_mask()?;
                self.load_dense(msg, WireField::Mask)?;
            }
        }

        self.load_csr(msg)
    }

    fn load_dense(&mut self, msg: &BlobMessage, field: WireField) -> Result<()> {
        let count = self.count();
        let buf = match field {
            WireField::Data => self.data.as_ref(),
            WireField::Diff => self.diff.as_ref(),
            WireField::Mask => self.mask.as_ref(),
            WireField::CsrVal => None,
        };

        let double = msg.double(field);
        let single = msg.single(field);
        if !double.is_empty() {
            check_len(field.double_name(), count, double.len())?;
            if let Some(buf) = buf {
                fill_converted(buf, double, field.double_name(), T::from_f64)?;
            }
        } else if !single.is_empty() {
            check_len(field.name(), count, single.len())?;
            if let Some(buf) = buf {
                fill_converted(buf, single, field.name(), |v| T::from_f64(f64::from(v)))?;
            }
        }
        Ok(())
    }

    fn load_csr(&mut self, msg: &BlobMessage) -> Result<()> {
        let carries_csr = !msg.csrval.is_empty()
            || !msg.double_csrval.is_empty()
            || !msg.csrrowptr.is_empty()
            || !msg.csrcolind.is_empty();
        if !carries_csr {
            return Ok(());
        }

        let nnz = match msg.nnz {
            Some(n) => usize::try_from(n).map_err(|_| Error::InvalidArgument {
                arg: "nnz",
                reason: format!("negative entry count {}", n),
            })?,
            None => 0,
        };

        if !msg.double_csrval.is_empty() {
            check_len("double_csrval", nnz, msg.double_csrval.len())?;
            let values: Vec<T> = msg.double_csrval.iter().map(|&v| T::from_f64(v)).collect();
            self.set_csr_values(&values)?;
        } else if !msg.csrval.is_empty() {
            check_len("csrval", nnz, msg.csrval.len())?;
            let values: Vec<T> = msg
                .csrval
                .iter()
                .map(|&v| T::from_f64(f64::from(v)))
                .collect();
            self.set_csr_values(&values)?;
        }

        if !msg.csrrowptr.is_empty() {
            match self.shape().first() {
                Some(&rows) => check_len("csrrowptr", rows + 1, msg.csrrowptr.len())?,
                None => log::warn!(
                    "blob has no axes; accepting {} CSR row pointers unchecked",
                    msg.csrrowptr.len()
                ),
            }
            self.set_csr_row_ptrs(&msg.csrrowptr)?;
        }

        if !msg.csrcolind.is_empty() {
            check_len("csrcolind", nnz, msg.csrcolind.len())?;
            self.set_csr_col_indices(&msg.csrcolind)?;
        }

        self.set_nnz(nnz);
        log::info!("loaded CSR arrays for blob {}: nnz {}", self.shape(), nnz);
        Ok(())
    }
}

fn check_len(field: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::length_mismatch(field, expected, got));
    }
    Ok(())
}

fn fill_converted<T: Element, U: Copy, R: Runtime>(
    buf: &SharedBuffer<R>,
    values: &[U],
    name: &'static str,
    convert: impl Fn(U) -> T,
) -> Result<()> {
    let mut dst = write_view::<T, R>(buf, values.len(), name)?;
    for (slot, &v) in dst.iter_mut().zip(values) {
        *slot = convert(v);
    }
    Ok(())
}
