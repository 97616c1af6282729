//! CSR extraction and storage on a blob

use super::CsrParts;
use crate::dtype::{Element, FloatElement};
use crate::error::{Error, Result};
use crate::runtime::cpu::kernels;
use crate::runtime::{FloatKernels, Runtime, SparseKernel};
use crate::tensor::{
    Blob, HostView, SharedBuffer, SyncHead, head_of, lock_mut, read_view, required, write_view,
};
use std::mem::size_of;

impl<T, R> Blob<T, R>
where
    T: FloatElement,
    R: Runtime,
    R::Client: FloatKernels<T>,
{
    /// Compress the value buffer of a 2-D blob into its CSR arrays.
    ///
    /// The conversion runs where the values currently are: the host
    /// reference kernel when the host copy is authoritative or nothing was
    /// written yet, the runtime's sparse kernel otherwise. The result replaces the blob's CSR buffers
    /// and `nnz`. Returns the number of stored entries.
    pub fn extract_csr(&mut self) -> Result<usize> {
        let (rows, cols) = self.matrix_dims("extract_csr")?;
        let data = required(&self.data, "data")?;
        let count = self.count();

        // Never-written values read as zeros on the host
        let on_device = match head_of(Some(data), "data")? {
            SyncHead::AtHost | SyncHead::Uninitialized => false,
            SyncHead::AtDevice | SyncHead::Synced => true,
        };
        let parts = if on_device {
            let dense = lock_mut(data, "data")?.read_device()?;
            SparseKernel::<T>::dense_to_csr(self.client(), dense, rows, cols)?
        } else {
            kernels::dense_to_csr(&read_view::<T, R>(data, count, "data")?, rows, cols)
        };

        log::info!(
            "extracted CSR from {}x{} {} blob: nnz {}",
            rows,
            cols,
            T::DTYPE,
            parts.nnz()
        );
        self.store_csr(&parts)?;
        Ok(parts.nnz())
    }
}

impl<T: Element, R: Runtime> Blob<T, R> {
    /// Rows and columns of a 2-D blob
    pub(crate) fn matrix_dims(&self, op: &'static str) -> Result<(usize, usize)> {
        match self.shape().as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(Error::InvalidArgument {
                arg: op,
                reason: format!("CSR requires a 2-D blob, shape is {:?}", other),
            }),
        }
    }

    /// Replace the CSR buffers with `parts` and record its nnz.
    pub(crate) fn store_csr(&mut self, parts: &CsrParts<T>) -> Result<()> {
        self.set_csr_values(&parts.values)?;
        self.set_csr_row_ptrs(&parts.row_ptrs)?;
        self.set_csr_col_indices(&parts.col_indices)?;
        self.set_nnz(parts.nnz());
        Ok(())
    }

    /// Replace the CSR value buffer (empty clears it).
    pub(crate) fn set_csr_values(&mut self, values: &[T]) -> Result<()> {
        self.csr_values = self.filled_buffer(values, "csr_values")?;
        Ok(())
    }

    /// Replace the CSR row-pointer buffer (empty clears it).
    pub(crate) fn set_csr_row_ptrs(&mut self, row_ptrs: &[i32]) -> Result<()> {
        self.csr_row_ptrs = self.filled_buffer(row_ptrs, "csr_row_ptrs")?;
        Ok(())
    }

    /// Replace the CSR column-index buffer (empty clears it).
    pub(crate) fn set_csr_col_indices(&mut self, col_indices: &[i32]) -> Result<()> {
        self.csr_col_indices = self.filled_buffer(col_indices, "csr_col_indices")?;
        Ok(())
    }

    fn filled_buffer<U: bytemuck::Pod>(
        &self,
        values: &[U],
        name: &'static str,
    ) -> Result<Option<SharedBuffer<R>>> {
        if values.is_empty() {
            return Ok(None);
        }
        let buf = self.alloc_buffer(values.len() * size_of::<U>())?;
        write_view::<U, R>(&buf, values.len(), name)?.copy_from_slice(values);
        Ok(Some(buf))
    }

    /// Host view of the CSR values (`nnz` elements)
    pub fn host_csr_values(&self) -> Result<HostView<'_, T>> {
        let buf = required(&self.csr_values, "csr_values")?;
        read_view(buf, self.nnz(), "csr_values")
    }

    /// Host view of the CSR row pointers (`rows + 1` elements)
    pub fn host_csr_row_ptrs(&self) -> Result<HostView<'_, i32>> {
        let buf = required(&self.csr_row_ptrs, "csr_row_ptrs")?;
        let len = buf
            .try_read()
            .ok_or(Error::BufferBusy {
                buffer: "csr_row_ptrs",
            })?
            .size()
            / size_of::<i32>();
        read_view(buf, len, "csr_row_ptrs")
    }

    /// Host view of the CSR column indices (`nnz` elements)
    pub fn host_csr_col_indices(&self) -> Result<HostView<'_, i32>> {
        let buf = required(&self.csr_col_indices, "csr_col_indices")?;
        read_view(buf, self.nnz(), "csr_col_indices")
    }

    /// Device handle of the CSR values
    pub fn device_csr_values(&self) -> Result<u64> {
        lock_mut(required(&self.csr_values, "csr_values")?, "csr_values")?.read_device()
    }

    /// Device handle of the CSR row pointers
    pub fn device_csr_row_ptrs(&self) -> Result<u64> {
        lock_mut(required(&self.csr_row_ptrs, "csr_row_ptrs")?, "csr_row_ptrs")?.read_device()
    }

    /// Device handle of the CSR column indices
    pub fn device_csr_col_indices(&self) -> Result<u64> {
        lock_mut(
            required(&self.csr_col_indices, "csr_col_indices")?,
            "csr_col_indices",
        )?
        .read_device()
    }

    /// Copy the CSR view out as owned parts.
    ///
    /// A blob with `nnz == 0` and no row pointers yields all-zero row
    /// pointers for its current row count.
    pub fn csr_parts(&self) -> Result<CsrParts<T>> {
        let (rows, cols) = self.matrix_dims("csr_parts")?;
        let row_ptrs = match self.csr_row_ptrs {
            Some(_) => self.host_csr_row_ptrs()?.to_vec(),
            None => vec![0; rows + 1],
        };
        let (values, col_indices) = if self.nnz() == 0 {
            (Vec::new(), Vec::new())
        } else {
            (
                self.host_csr_values()?.to_vec(),
                self.host_csr_col_indices()?.to_vec(),
            )
        };
        Ok(CsrParts {
            rows,
            cols,
            row_ptrs,
            col_indices,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::BlobConfig;
    use crate::error::Error;
    use crate::runtime::CpuRuntime;
    use crate::tensor::Blob;

    #[test]
    fn test_extract_csr_on_host() {
        let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[2, 3], BlobConfig::default()).unwrap();
        blob.mutable_host_data()
            .unwrap()
            .copy_from_slice(&[0.0, 1.5, 0.0, 2.0, 0.0, -3.0]);

        assert_eq!(blob.extract_csr().unwrap(), 3);
        assert_eq!(blob.nnz(), 3);
        assert_eq!(&*blob.host_csr_row_ptrs().unwrap(), &[0, 1, 3]);
        assert_eq!(&*blob.host_csr_col_indices().unwrap(), &[1, 0, 2]);
        assert_eq!(&*blob.host_csr_values().unwrap(), &[1.5, 2.0, -3.0]);
    }

    #[test]
    fn test_extract_csr_requires_matrix() {
        let mut blob = Blob::<f32, CpuRuntime>::with_shape(&[6], BlobConfig::default()).unwrap();
        blob.mutable_host_data().unwrap();
        assert!(matches!(
            blob.extract_csr(),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_all_zero_matrix_has_no_values() {
        let mut blob = Blob::<f64, CpuRuntime>::with_shape(&[3, 2], BlobConfig::default()).unwrap();
        blob.mutable_host_data().unwrap();
        assert_eq!(blob.extract_csr().unwrap(), 0);
        let parts = blob.csr_parts().unwrap();
        assert_eq!(parts.row_ptrs, vec![0, 0, 0, 0]);
        assert!(parts.values.is_empty());
        assert_eq!(parts.to_dense().unwrap(), vec![0.0; 6]);
    }
}
