//! Offset sub-block access on [`Matrix`].
//!
//! Windows are addressed by a signed top-left corner `(y, x)` and a size
//! `(h, w)`; anything that falls outside the source is clipped. This is what
//! the convolution and pooling layers build on, and it is also how tiled
//! blocks (several same-shaped items laid side by side in one matrix) are
//! read and written.

use std::ops::Range;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Intersection of `[start, start + len)` with `[0, bound)`.
fn clip(start: isize, len: usize, bound: usize) -> Range<usize> {
    let lo = start.max(0);
    let hi = (start + len as isize).min(bound as isize);
    if hi <= lo {
        0..0
    } else {
        lo as usize..hi as usize
    }
}

impl Matrix {
    /// Copies the `h × w` block whose top-left corner is `(y, x)`.
    /// Cells outside `self` read as zero.
    pub fn window(&self, y: isize, x: isize, h: usize, w: usize) -> Matrix {
        let mut res = Matrix::zeros(h, w);
        for i in clip(y, h, self.rows()) {
            for j in clip(x, w, self.cols()) {
                *res.at_mut((i as isize - y) as usize, (j as isize - x) as usize) = self.at(i, j);
            }
        }
        res
    }

    /// Overwrites the block at `(y, x)` with `src`, dropping whatever
    /// falls outside `self`.
    pub fn fill_window(&mut self, y: isize, x: isize, src: &Matrix) -> &mut Self {
        self.fill_window_with(y, x, src, |_, s| s)
    }

    /// Like [`Matrix::fill_window`] but combines the old and new values with
    /// `functor(old, src)`; `|a, b| a + b` accumulates.
    pub fn fill_window_with<F>(&mut self, y: isize, x: isize, src: &Matrix, functor: F) -> &mut Self
    where
        F: Fn(f64, f64) -> f64,
    {
        for i in clip(y, src.rows(), self.rows()) {
            for j in clip(x, src.cols(), self.cols()) {
                let s = src.at((i as isize - y) as usize, (j as isize - x) as usize);
                let cell = self.at_mut(i, j);
                *cell = functor(*cell, s);
            }
        }
        self
    }

    pub fn scale_window(&mut self, y: isize, x: isize, h: usize, w: usize, a: f64) -> &mut Self {
        self.map_window(y, x, h, w, |v| v * a)
    }

    pub fn map_window<F>(&mut self, y: isize, x: isize, h: usize, w: usize, functor: F) -> &mut Self
    where
        F: Fn(f64) -> f64,
    {
        for i in clip(y, h, self.rows()) {
            for j in clip(x, w, self.cols()) {
                let cell = self.at_mut(i, j);
                *cell = functor(*cell);
            }
        }
        self
    }

    /// Folds the in-bounds part of a window. Unlike [`Matrix::window`] no
    /// zero padding takes part in the fold.
    pub fn reduce_window<F>(&self, y: isize, x: isize, h: usize, w: usize, functor: F, init: f64) -> f64
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut acc = init;
        for i in clip(y, h, self.rows()) {
            for j in clip(x, w, self.cols()) {
                acc = functor(acc, self.at(i, j));
            }
        }
        acc
    }

    /// `[self | other]`
    pub fn connect_right(&self, other: &Matrix) -> Result<Matrix> {
        if self.rows() != other.rows() {
            return Err(NnError::shape("connect_right", self.shape(), other.shape()));
        }
        let mut res = Matrix::zeros(self.rows(), self.cols() + other.cols());
        res.fill_window(0, 0, self).fill_window(0, self.cols() as isize, other);
        Ok(res)
    }

    /// `[other | self]`
    pub fn connect_left(&self, other: &Matrix) -> Result<Matrix> {
        other.connect_right(self).map_err(|_| {
            NnError::shape("connect_left", self.shape(), other.shape())
        })
    }

    /// `self` stacked above `other`.
    pub fn connect_bottom(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols() != other.cols() {
            return Err(NnError::shape("connect_bottom", self.shape(), other.shape()));
        }
        let mut res = Matrix::zeros(self.rows() + other.rows(), self.cols());
        res.fill_window(0, 0, self).fill_window(self.rows() as isize, 0, other);
        Ok(res)
    }

    /// `other` stacked above `self`.
    pub fn connect_top(&self, other: &Matrix) -> Result<Matrix> {
        other.connect_bottom(self).map_err(|_| {
            NnError::shape("connect_top", self.shape(), other.shape())
        })
    }

    /// Same-size correlation with `kernel` centred at `((kr - 1) / 2, (kc - 1) / 2)`.
    /// Cells beyond the border count as zero. For odd kernels the output
    /// lines up exactly with the input.
    pub fn convolve(&self, kernel: &Matrix) -> Matrix {
        let mid_m = (kernel.rows() as isize - 1) / 2;
        let mid_n = (kernel.cols() as isize - 1) / 2;
        let mut res = Matrix::zeros(self.rows(), self.cols());
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                let top = i as isize - mid_m;
                let left = j as isize - mid_n;
                let mut sum = 0.0;
                for p in clip(top, kernel.rows(), self.rows()) {
                    for q in clip(left, kernel.cols(), self.cols()) {
                        sum += self.at(p, q)
                            * kernel.at((p as isize - top) as usize, (q as isize - left) as usize);
                    }
                }
                *res.at_mut(i, j) = sum;
            }
        }
        res
    }

    /// Strided pooling. The output has `ceil(rows / stride_m) × ceil(cols / stride_n)`
    /// cells, each the fold of a `pool_m × pool_n` window clipped to `self`.
    /// A zero stride is an `InvalidSpec` error.
    pub fn pool<F>(
        &self,
        pool_m: usize,
        pool_n: usize,
        stride_m: usize,
        stride_n: usize,
        functor: F,
        init: f64,
    ) -> Result<Matrix>
    where
        F: Fn(f64, f64) -> f64,
    {
        if stride_m == 0 || stride_n == 0 {
            return Err(NnError::InvalidSpec(format!(
                "pool stride must be non-zero, got {stride_m}x{stride_n}"
            )));
        }
        let out_m = self.rows().div_ceil(stride_m);
        let out_n = self.cols().div_ceil(stride_n);
        let mid_m = (pool_m as isize - stride_m as isize) / 2;
        let mid_n = (pool_n as isize - stride_n as isize) / 2;
        let mut res = Matrix::zeros(out_m, out_n);
        for i in 0..out_m {
            for j in 0..out_n {
                *res.at_mut(i, j) = self.reduce_window(
                    (i * stride_m) as isize - mid_m,
                    (j * stride_n) as isize - mid_n,
                    pool_m,
                    pool_n,
                    &functor,
                    init,
                );
            }
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: usize, cols: usize) -> Matrix {
        let values = (0..rows * cols).map(|v| v as f64).collect();
        Matrix::from_vec(rows, cols, values).unwrap()
    }

    #[test]
    fn window_pads_outside_cells_with_zero() {
        let a = grid(3, 3);
        let w = a.window(-1, -1, 2, 2);
        assert_eq!(w.to_vec(), vec![0.0, 0.0, 0.0, 0.0]);
        let w = a.window(1, 1, 3, 3);
        assert_eq!(w.to_vec(), vec![4.0, 5.0, 0.0, 7.0, 8.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn fill_window_clips_at_the_border() {
        let mut a = Matrix::zeros(2, 2);
        a.fill_window(1, -1, &Matrix::filled(2, 2, 7.0));
        assert_eq!(a.to_vec(), vec![0.0, 0.0, 7.0, 0.0]);
    }

    #[test]
    fn fill_window_with_accumulates() {
        let mut a = Matrix::filled(2, 2, 1.0);
        a.fill_window_with(0, 0, &Matrix::filled(1, 2, 2.0), |x, y| x + y);
        assert_eq!(a.to_vec(), vec![3.0, 3.0, 1.0, 1.0]);
    }

    #[test]
    fn window_round_trip_leaves_matrix_unchanged() {
        let mut a = grid(4, 5);
        let before = a.clone();
        let block = a.window(1, 2, 2, 3);
        a.fill_window(1, 2, &block);
        assert_eq!(a, before);
    }

    #[test]
    fn in_place_window_mutators() {
        let mut a = Matrix::filled(3, 3, 2.0);
        a.scale_window(1, 1, 5, 5, 3.0);
        assert_eq!(a.sum(), 5.0 * 2.0 + 4.0 * 6.0);
        a.map_window(-1, -1, 2, 2, |v| v - 2.0);
        assert_eq!(a.get(0, 0).unwrap(), 0.0);
        assert_eq!(a.reduce_window(1, 1, 9, 9, f64::max, f64::NEG_INFINITY), 6.0);
    }

    #[test]
    fn connect_concatenates_on_each_side() {
        let a = Matrix::filled(2, 1, 1.0);
        let b = Matrix::filled(2, 2, 2.0);
        assert_eq!(a.connect_right(&b).unwrap().to_vec(), vec![1.0, 2.0, 2.0, 1.0, 2.0, 2.0]);
        assert_eq!(a.connect_left(&b).unwrap().to_vec(), vec![2.0, 2.0, 1.0, 2.0, 2.0, 1.0]);
        let c = Matrix::filled(1, 2, 3.0);
        assert_eq!(b.connect_bottom(&c).unwrap().shape(), (3, 2));
        assert_eq!(b.connect_top(&c).unwrap().row(0).unwrap().to_vec(), vec![3.0, 3.0]);
        assert!(a.connect_bottom(&b).is_err());
        assert!(c.connect_left(&a).is_err());
    }

    #[test]
    fn convolve_is_same_size_and_centred() {
        let a = grid(3, 3);
        let mut k = Matrix::zeros(3, 3);
        k.set(1, 1, 1.0).unwrap();
        assert_eq!(a.convolve(&k), a);

        let box3 = Matrix::filled(3, 3, 1.0);
        let c = a.convolve(&box3);
        assert_eq!(c.shape(), (3, 3));
        assert_eq!(c.get(1, 1).unwrap(), a.sum());
        assert_eq!(c.get(0, 0).unwrap(), 0.0 + 1.0 + 3.0 + 4.0);
    }

    #[test]
    fn pool_rounds_output_up() {
        let a = grid(3, 4);
        let p = a.pool(2, 2, 2, 2, f64::max, f64::NEG_INFINITY).unwrap();
        assert_eq!(p.shape(), (2, 2));
        assert_eq!(p.to_vec(), vec![5.0, 7.0, 9.0, 11.0]);
    }

    #[test]
    fn pool_rejects_zero_stride() {
        let a = grid(3, 4);
        assert!(matches!(a.pool(2, 2, 0, 2, f64::max, f64::NEG_INFINITY), Err(NnError::InvalidSpec(_))));
        assert!(matches!(a.pool(2, 2, 2, 0, f64::max, f64::NEG_INFINITY), Err(NnError::InvalidSpec(_))));
    }
}
