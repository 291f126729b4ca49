use crate::error::Result;
use crate::math::matrix::Matrix;

/// Categorical cross-entropy for a softmax output.
pub struct CrossEntropyLoss;

/// Probabilities are clipped to `[CLIP, 1 - CLIP]` before taking logs.
pub const CLIP: f64 = 1e-15;

impl CrossEntropyLoss {
    pub fn clip(p: f64) -> f64 {
        p.clamp(CLIP, 1.0 - CLIP)
    }

    /// Per-row loss as an `m × 1` column:
    ///   L_i = -sum_j(expected[i][j] * ln(p[i][j])) / m
    ///
    /// where `p` is the clipped prediction row renormalized to sum to one
    /// (a zero sum is treated as one).
    pub fn loss(expected: &Matrix, predicted: &Matrix) -> Result<Matrix> {
        predicted.check_same_shape("cross_entropy", expected)?;
        let m = predicted.rows();
        let mut res = Matrix::zeros(m, 1);
        for i in 0..m {
            let row = predicted.row(i)?.map(CrossEntropyLoss::clip);
            let mut total = row.sum();
            if total == 0.0 {
                total = 1.0;
            }
            let log_p = row.scale(1.0 / total).map(f64::ln);
            let value = -log_p.elt_mul(&expected.row(i)?)?.sum() / m as f64;
            res.set(i, 0, value)?;
        }
        Ok(res)
    }
}
