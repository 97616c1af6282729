//! CPU kernel implementations
//!
//! Slice kernels shared by the CPU client (which wraps raw handles into
//! slices) and by the blob layer's host path (which already holds slices).
//! With the `rayon` feature, element-wise kernels split work across threads
//! once the input is large enough to amortize the fork.

use crate::dtype::{Element, FloatElement};
use crate::sparse::CsrParts;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Below this many elements kernels stay on the calling thread.
#[cfg(feature = "rayon")]
const PARALLEL_MIN_LEN: usize = 1 << 15;

/// `y += alpha * x`
pub fn axpy<T: FloatElement>(alpha: T, x: &[T], y: &mut [T]) {
    debug_assert_eq!(x.len(), y.len());

    #[cfg(feature = "rayon")]
    if y.len() >= PARALLEL_MIN_LEN {
        y.par_iter_mut()
            .zip(x.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|(yi, &xi)| *yi = *yi + alpha * xi);
        return;
    }

    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + alpha * xi;
    }
}

/// `y *= a` element-wise
pub fn mul_assign<T: Element>(a: &[T], y: &mut [T]) {
    debug_assert_eq!(a.len(), y.len());

    #[cfg(feature = "rayon")]
    if y.len() >= PARALLEL_MIN_LEN {
        y.par_iter_mut()
            .zip(a.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|(yi, &ai)| *yi = *yi * ai);
        return;
    }

    for (yi, &ai) in y.iter_mut().zip(a) {
        *yi = *yi * ai;
    }
}

/// `out = a * b` element-wise
pub fn mul<T: Element>(a: &[T], b: &[T], out: &mut [T]) {
    debug_assert!(a.len() == out.len() && b.len() == out.len());
    for ((o, &ai), &bi) in out.iter_mut().zip(a).zip(b) {
        *o = ai * bi;
    }
}

/// Sum of absolute values, accumulated in the element type.
pub fn asum<T: FloatElement>(x: &[T]) -> T {
    #[cfg(feature = "rayon")]
    if x.len() >= PARALLEL_MIN_LEN {
        return x
            .par_iter()
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|v| v.abs())
            .reduce(<T as Element>::zero, |a, b| a + b);
    }

    x.iter()
        .fold(<T as Element>::zero(), |acc, v| acc + v.abs())
}

/// Inner product
pub fn dot<T: FloatElement>(x: &[T], y: &[T]) -> T {
    debug_assert_eq!(x.len(), y.len());

    #[cfg(feature = "rayon")]
    if x.len() >= PARALLEL_MIN_LEN {
        return x
            .par_iter()
            .zip(y.par_iter())
            .with_min_len(PARALLEL_MIN_LEN)
            .map(|(&a, &b)| a * b)
            .reduce(<T as Element>::zero, |a, b| a + b);
    }

    x.iter()
        .zip(y)
        .fold(<T as Element>::zero(), |acc, (&a, &b)| acc + a * b)
}

/// `x *= alpha`
pub fn scal<T: FloatElement>(alpha: T, x: &mut [T]) {
    #[cfg(feature = "rayon")]
    if x.len() >= PARALLEL_MIN_LEN {
        x.par_iter_mut()
            .with_min_len(PARALLEL_MIN_LEN)
            .for_each(|v| *v = *v * alpha);
        return;
    }

    for v in x.iter_mut() {
        *v = *v * alpha;
    }
}

/// Extract the CSR form of a row-major `rows x cols` matrix.
///
/// An entry is stored iff it compares unequal to zero, so NaN is kept and
/// negative zero is dropped.
pub fn dense_to_csr<T: FloatElement>(dense: &[T], rows: usize, cols: usize) -> CsrParts<T> {
    debug_assert_eq!(dense.len(), rows * cols);

    let zero = <T as Element>::zero();
    let mut row_ptrs = Vec::with_capacity(rows + 1);
    let mut col_indices = Vec::new();
    let mut values = Vec::new();

    row_ptrs.push(0i32);
    for row in dense.chunks_exact(cols.max(1)).take(rows) {
        for (col, &v) in row.iter().enumerate().take(cols) {
            if v != zero {
                col_indices.push(col as i32);
                values.push(v);
            }
        }
        row_ptrs.push(values.len() as i32);
    }
    // cols == 0: every row is empty
    row_ptrs.resize(rows + 1, 0);

    CsrParts {
        rows,
        cols,
        row_ptrs,
        col_indices,
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axpy_negative_alpha() {
        let x = [0.5f32, 1.0, -2.0];
        let mut y = [1.0f32, 1.0, 1.0];
        axpy(-1.0, &x, &mut y);
        assert_eq!(y, [0.5, 0.0, 3.0]);
    }

    #[test]
    fn test_mul_assign() {
        let mut y = [2.0f64, 3.0, 4.0];
        mul_assign(&[1.0, 0.0, 1.0], &mut y);
        assert_eq!(y, [2.0, 0.0, 4.0]);
    }

    #[test]
    fn test_reductions() {
        let x = [1.0f32, -2.0, 3.0];
        assert_eq!(asum(&x), 6.0);
        assert_eq!(dot(&x, &x), 14.0);
        assert_eq!(asum::<f32>(&[]), 0.0);
    }

    #[test]
    fn test_scal() {
        let mut x = [1.0f64, -2.0];
        scal(0.5, &mut x);
        assert_eq!(x, [0.5, -1.0]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_parallel_asum_matches_serial() {
        let x: Vec<f64> = (0..PARALLEL_MIN_LEN * 2).map(|i| (i % 7) as f64 - 3.0).collect();
        let serial: f64 = x.iter().map(|v| v.abs()).sum();
        assert_eq!(asum(&x), serial);
    }

    #[test]
    fn test_dense_to_csr() {
        let dense = [1.0f32, 0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 3.0, 0.0];
        let csr = dense_to_csr(&dense, 3, 3);
        assert_eq!(csr.row_ptrs, vec![0, 2, 2, 3]);
        assert_eq!(csr.col_indices, vec![0, 2, 1]);
        assert_eq!(csr.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_dense_to_csr_keeps_nan() {
        let csr = dense_to_csr(&[f32::NAN, -0.0], 1, 2);
        assert_eq!(csr.col_indices, vec![0]);
        assert!(csr.values[0].is_nan());
    }

    #[test]
    fn test_dense_to_csr_zero_cols() {
        let csr = dense_to_csr::<f32>(&[], 3, 0);
        assert_eq!(csr.row_ptrs, vec![0, 0, 0, 0]);
        assert!(csr.values.is_empty());
    }
}
