use crate::error::Result;
use crate::math::matrix::Matrix;

pub struct MaeLoss;

impl MaeLoss {
    /// Scalar MAE: mean(|predicted - expected|) over every cell.
    pub fn loss(predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        let n = (predicted.rows() * predicted.cols()) as f64;
        let diff = expected.add(predicted, 1.0, -1.0)?;
        if n == 0.0 {
            return Ok(0.0);
        }
        Ok(diff.abs().sum() / n)
    }
}
