//! Compressed sparse row extraction for 2-D parameter blobs
//!
//! A pruned weight matrix is mostly zeros. Before serialization its value
//! buffer is compressed into the three CSR arrays:
//!
//! ```text
//! Dense (3x3):       CSR:
//! [1, 0, 2]          row_ptrs:    [0, 2, 2, 3]
//! [0, 0, 0]    →     col_indices: [0, 2, 1]
//! [0, 3, 0]          values:      [1, 2, 3]
//! ```
//!
//! Indices are 32-bit, matching cuSPARSE and the wire format.

mod convert;

use crate::dtype::Element;
use crate::error::{Error, Result};

/// Host-resident CSR arrays of a `rows x cols` matrix
#[derive(Clone, Debug, PartialEq)]
pub struct CsrParts<T> {
    /// Number of rows
    pub rows: usize,
    /// Number of columns
    pub cols: usize,
    /// Row pointers (length: rows + 1)
    pub row_ptrs: Vec<i32>,
    /// Column index of each stored value (length: nnz)
    pub col_indices: Vec<i32>,
    /// Stored values in row-major order (length: nnz)
    pub values: Vec<T>,
}

impl<T: Element> CsrParts<T> {
    /// Number of stored entries
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Check structural consistency.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - row_ptrs length != rows + 1
    /// - col_indices and values have different lengths
    /// - row_ptrs does not start at 0, decreases, or does not end at nnz
    /// - a column index is outside `0..cols`
    pub fn validate(&self) -> Result<()> {
        if self.row_ptrs.len() != self.rows + 1 {
            return Err(Error::length_mismatch(
                "row_ptrs",
                self.rows + 1,
                self.row_ptrs.len(),
            ));
        }
        if self.col_indices.len() != self.values.len() {
            return Err(Error::length_mismatch(
                "col_indices",
                self.values.len(),
                self.col_indices.len(),
            ));
        }

        let nnz = self.nnz();
        if self.row_ptrs[0] != 0 || self.row_ptrs[self.rows] as usize != nnz {
            return Err(Error::InvalidArgument {
                arg: "row_ptrs",
                reason: format!(
                    "expected [0]=0 and [{}]={}, got [0]={} and [{}]={}",
                    self.rows, nnz, self.row_ptrs[0], self.rows, self.row_ptrs[self.rows]
                ),
            });
        }
        if self.row_ptrs.windows(2).any(|w| w[0] > w[1]) {
            return Err(Error::InvalidArgument {
                arg: "row_ptrs",
                reason: "row pointers must be non-decreasing".to_string(),
            });
        }

        for &c in &self.col_indices {
            if c < 0 || c as usize >= self.cols {
                return Err(Error::InvalidArgument {
                    arg: "col_indices",
                    reason: format!("column index {} outside 0..{}", c, self.cols),
                });
            }
        }
        Ok(())
    }

    /// Expand back into a row-major dense matrix.
    pub fn to_dense(&self) -> Result<Vec<T>> {
        self.validate()?;

        let mut dense = vec![T::zero(); self.rows * self.cols];
        for row in 0..self.rows {
            let start = self.row_ptrs[row] as usize;
            let end = self.row_ptrs[row + 1] as usize;
            for k in start..end {
                dense[row * self.cols + self.col_indices[k] as usize] = self.values[k];
            }
        }
        Ok(dense)
    }
}
