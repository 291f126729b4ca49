use std::fmt;
use std::ops::{Add, Mul, Sub};

use crate::error::{NnError, Result};

/// Magnitudes below this are treated as zero by [`like_zero`].
pub const EPSILON: f64 = 1e-9;

pub fn like_zero(x: f64) -> bool {
    x.abs() < EPSILON
}

/// Dense row-major matrix of `f64`.
///
/// Every row holds exactly `cols` values; the constructors reject anything
/// else, so the fields stay private. Operations return a new matrix; only
/// the `fill*`, `set` and `*_window` mutators work in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![0.0; cols]; rows],
        }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![vec![value; cols]; rows],
        }
    }

    /// Builds a matrix from row vectors. Ragged input is rejected.
    pub fn from_rows(data: Vec<Vec<f64>>) -> Result<Matrix> {
        let rows = data.len();
        let cols = data.first().map_or(0, |row| row.len());
        if let Some((i, row)) = data.iter().enumerate().find(|(_, row)| row.len() != cols) {
            return Err(NnError::shape("from_rows", (i, row.len()), (rows, cols)));
        }
        Ok(Matrix { rows, cols, data })
    }

    /// Builds a `rows × cols` matrix from row-major values.
    pub fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Result<Matrix> {
        let mut res = Matrix::zeros(rows, cols);
        res.fill_elements(&values)?;
        Ok(res)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn as_rows(&self) -> &[Vec<f64>] {
        &self.data
    }

    /// Row-major copy of all values.
    pub fn to_vec(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }

    pub fn get(&self, i: usize, j: usize) -> Result<f64> {
        self.check_index(i, j)?;
        Ok(self.data[i][j])
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        self.check_index(i, j)?;
        self.data[i][j] = value;
        Ok(())
    }

    pub fn row(&self, i: usize) -> Result<Matrix> {
        if i >= self.rows {
            return Err(NnError::OutOfRange { what: "row", index: i, len: self.rows });
        }
        Ok(Matrix {
            rows: 1,
            cols: self.cols,
            data: vec![self.data[i].clone()],
        })
    }

    pub fn col(&self, j: usize) -> Result<Matrix> {
        if j >= self.cols {
            return Err(NnError::OutOfRange { what: "column", index: j, len: self.cols });
        }
        Ok(Matrix {
            rows: self.rows,
            cols: 1,
            data: self.data.iter().map(|row| vec![row[j]]).collect(),
        })
    }

    pub fn fill(&mut self, value: f64) -> &mut Self {
        for row in &mut self.data {
            row.iter_mut().for_each(|x| *x = value);
        }
        self
    }

    /// Overwrites every cell from row-major `values`, which must hold exactly
    /// `rows * cols` numbers.
    pub fn fill_elements(&mut self, values: &[f64]) -> Result<&mut Self> {
        if values.len() != self.rows * self.cols {
            return Err(NnError::InvalidReshape {
                from: (1, values.len()),
                to: self.shape(),
            });
        }
        for (row, chunk) in self.data.iter_mut().zip(values.chunks(self.cols.max(1))) {
            row.copy_from_slice(chunk);
        }
        Ok(self)
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i][j] = self.data[j][i];
            }
        }

        res
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|row| row.iter().map(|&x| functor(x)).collect())
                .collect(),
        }
    }

    /// Left fold over all cells in row-major order.
    pub fn reduce<F>(&self, functor: F, init: f64) -> f64
    where
        F: Fn(f64, f64) -> f64,
    {
        self.data.iter().flatten().fold(init, |acc, &x| functor(acc, x))
    }

    pub fn sum(&self) -> f64 {
        self.reduce(|acc, x| acc + x, 0.0)
    }

    pub fn max(&self) -> f64 {
        self.reduce(f64::max, f64::NEG_INFINITY)
    }

    pub fn min(&self) -> f64 {
        self.reduce(f64::min, f64::INFINITY)
    }

    pub fn abs(&self) -> Matrix {
        self.map(f64::abs)
    }

    pub fn scale(&self, a: f64) -> Matrix {
        self.map(|x| x * a)
    }

    /// Affine combination `a1 * self + a2 * other`.
    ///
    /// This one routine covers plain sums, differences and `W + rate * dW`.
    pub fn add(&self, other: &Matrix, a1: f64, a2: f64) -> Result<Matrix> {
        self.check_same_shape("add", other)?;
        Ok(self.zip_with(other, |x, y| a1 * x + a2 * y))
    }

    /// Matrix product. Requires `self.cols == other.rows`.
    pub fn dot(&self, other: &Matrix) -> Result<Matrix> {
        if self.cols != other.rows {
            return Err(NnError::shape("dot", self.shape(), other.shape()));
        }

        let mut res = Matrix::zeros(self.rows, other.cols);

        for i in 0..res.rows {
            for j in 0..res.cols {
                let mut sum = 0.0;

                for k in 0..self.cols {
                    sum += self.data[i][k] * other.data[k][j];
                }

                res.data[i][j] = sum;
            }
        }

        Ok(res)
    }

    /// Element-wise (Hadamard) product of two same-shape matrices.
    pub fn elt_mul(&self, other: &Matrix) -> Result<Matrix> {
        self.check_same_shape("elt_mul", other)?;
        Ok(self.zip_with(other, |x, y| x * y))
    }

    /// Row-wise softmax, shifted by each row's maximum before `exp`.
    /// A row whose exponentials sum to zero is normalized by 1 instead.
    pub fn softmax(&self) -> Matrix {
        let data = self
            .data
            .iter()
            .map(|row| {
                let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = row.iter().map(|&x| (x - max).exp()).collect();
                let mut total: f64 = exps.iter().sum();
                if total == 0.0 {
                    total = 1.0;
                }
                exps.into_iter().map(|e| e / total).collect()
            })
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }

    /// Row-major reshape; the element count must not change.
    pub fn reshape(&self, rows: usize, cols: usize) -> Result<Matrix> {
        if rows * cols != self.rows * self.cols {
            return Err(NnError::InvalidReshape {
                from: self.shape(),
                to: (rows, cols),
            });
        }
        Matrix::from_vec(rows, cols, self.to_vec())
    }

    /// Reverses the order of columns (left-right flip).
    pub fn mirror_rows(&self) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .map(|row| row.iter().rev().copied().collect())
                .collect(),
        }
    }

    /// Reverses the order of rows (top-bottom flip).
    pub fn mirror_cols(&self) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().rev().cloned().collect(),
        }
    }

    /// True when both matrices share a shape and every pair of cells is
    /// within `eps` of each other.
    pub fn approx_eq(&self, other: &Matrix, eps: f64) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .flatten()
                .zip(other.data.iter().flatten())
                .all(|(a, b)| (a - b).abs() <= eps)
    }

    pub(crate) fn check_same_shape(&self, op: &'static str, other: &Matrix) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(NnError::shape(op, self.shape(), other.shape()));
        }
        Ok(())
    }

    fn check_index(&self, i: usize, j: usize) -> Result<()> {
        if i >= self.rows {
            return Err(NnError::OutOfRange { what: "row", index: i, len: self.rows });
        }
        if j >= self.cols {
            return Err(NnError::OutOfRange { what: "column", index: j, len: self.cols });
        }
        Ok(())
    }

    fn zip_with<F>(&self, other: &Matrix, functor: F) -> Matrix
    where
        F: Fn(f64, f64) -> f64,
    {
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(row_a, row_b)| {
                row_a.iter().zip(row_b.iter()).map(|(&x, &y)| functor(x, y)).collect()
            })
            .collect();
        Matrix { rows: self.rows, cols: self.cols, data }
    }

    // Raw cell access for the window and layer kernels; callers guarantee bounds.
    pub(crate) fn at(&self, i: usize, j: usize) -> f64 {
        self.data[i][j]
    }

    pub(crate) fn at_mut(&mut self, i: usize, j: usize) -> &mut f64 {
        &mut self.data[i][j]
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix { rows: 0, cols: 0, data: vec![] }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "-- matrix {}x{} --", self.rows, self.cols)?;
        for row in &self.data {
            let cells: Vec<String> = row.iter().map(|x| format!("{x:.6}")).collect();
            writeln!(f, "[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

impl Add for &Matrix {
    type Output = Result<Matrix>;

    fn add(self, rhs: Self) -> Self::Output {
        Matrix::add(self, rhs, 1.0, 1.0)
    }
}

impl Sub for &Matrix {
    type Output = Result<Matrix>;

    fn sub(self, rhs: Self) -> Self::Output {
        Matrix::add(self, rhs, 1.0, -1.0)
    }
}

impl Mul for &Matrix {
    type Output = Result<Matrix>;

    fn mul(self, rhs: Self) -> Self::Output {
        self.dot(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { op: "from_rows", .. }));
    }

    #[test]
    fn dot_multiplies_and_checks_inner_dimension() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let b = m(vec![vec![7.0, 8.0], vec![9.0, 10.0], vec![11.0, 12.0]]);
        let c = a.dot(&b).unwrap();
        assert_eq!(c, m(vec![vec![58.0, 64.0], vec![139.0, 154.0]]));

        let err = a.dot(&a).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { op: "dot", left: (2, 3), right: (2, 3) }));
    }

    #[test]
    fn add_is_an_affine_combination() {
        let a = m(vec![vec![1.0, 2.0]]);
        let b = m(vec![vec![10.0, 20.0]]);
        assert_eq!(a.add(&b, 1.0, 1.0).unwrap(), m(vec![vec![11.0, 22.0]]));
        assert_eq!(a.add(&b, 2.0, -0.5).unwrap(), m(vec![vec![-3.0, -6.0]]));
        assert_eq!((&b - &a).unwrap(), m(vec![vec![9.0, 18.0]]));
    }

    #[test]
    fn elementwise_ops_refuse_to_broadcast() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(2, 3);
        assert!(a.add(&b, 1.0, 1.0).is_err());
        assert!(a.elt_mul(&b).is_err());
        // Only one of the two dimensions differs.
        assert!(a.elt_mul(&Matrix::zeros(1, 2)).is_err());
    }

    #[test]
    fn reductions_cover_sum_max_min() {
        let a = m(vec![vec![1.0, -4.0], vec![2.5, 0.5]]);
        assert_eq!(a.sum(), 0.0);
        assert_eq!(a.max(), 2.5);
        assert_eq!(a.min(), -4.0);
        assert_eq!(a.abs().sum(), 8.0);
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![-1000.0, 0.0, 1000.0]]);
        let s = a.softmax();
        for i in 0..s.rows() {
            assert!((s.row(i).unwrap().sum() - 1.0).abs() < 1e-9);
        }
        assert!((s.get(1, 2).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reshape_keeps_row_major_order() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let r = a.reshape(3, 2).unwrap();
        assert_eq!(r, m(vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]));
        assert_eq!(r.reshape(2, 3).unwrap(), a);
        assert!(matches!(a.reshape(4, 2), Err(NnError::InvalidReshape { .. })));
    }

    #[test]
    fn row_and_col_extract_and_bound_check() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(a.row(1).unwrap(), m(vec![vec![3.0, 4.0]]));
        assert_eq!(a.col(0).unwrap(), m(vec![vec![1.0], vec![3.0]]));
        assert!(matches!(a.row(2), Err(NnError::OutOfRange { what: "row", index: 2, len: 2 })));
        assert!(a.get(0, 5).is_err());
    }

    #[test]
    fn mirrors_flip_the_expected_axis() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(a.mirror_rows(), m(vec![vec![2.0, 1.0], vec![4.0, 3.0]]));
        assert_eq!(a.mirror_cols(), m(vec![vec![3.0, 4.0], vec![1.0, 2.0]]));
    }

    #[test]
    fn fill_elements_requires_exact_count() {
        let mut a = Matrix::zeros(2, 2);
        a.fill_elements(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(a.get(1, 0).unwrap(), 3.0);
        assert!(a.fill_elements(&[1.0]).is_err());
    }

    #[test]
    fn like_zero_uses_epsilon() {
        assert!(like_zero(1e-10));
        assert!(!like_zero(1e-8));
    }
}
