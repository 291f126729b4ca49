use crate::error::{NnError, Result};
use crate::layers::layer::{check_shape, Cache, Layer};
use crate::loss::cross_entropy::CrossEntropyLoss;
use crate::math::matrix::Matrix;

/// Softmax output layer paired with cross-entropy.
///
/// It only works as the last layer of a chain: the chain seeds the backward
/// pass with `expected - predicted`, which already is the gradient of the
/// softmax/cross-entropy pair with respect to this layer's input. A
/// standalone `backward_prop` is therefore refused.
#[derive(Debug)]
pub struct LogRegression {
    rows: usize,
    cols: usize,
    cache: Cache,
}

impl LogRegression {
    pub fn new(input_rows: usize, input_cols: usize) -> LogRegression {
        LogRegression { rows: input_rows, cols: input_cols, cache: Cache::default() }
    }

    /// Per-row cross-entropy of `predicted` against `expected`, as an `m × 1` column.
    pub fn loss(&self, expected: &Matrix, predicted: &Matrix) -> Result<Matrix> {
        CrossEntropyLoss::loss(expected, predicted)
    }
}

impl Layer for LogRegression {
    fn name(&self) -> &'static str {
        "LogRegression"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        check_shape("LogRegression input", self.input_dim(), input)?;
        let output = input.softmax();
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, _output_grad: &Matrix) -> Result<Matrix> {
        Err(NnError::Unsupported { layer: self.name(), op: "backward_prop" })
    }

    fn backward_terminal(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        check_shape("LogRegression gradient", self.output_dim(), output_grad)?;
        self.cache.grad = Some(output_grad.clone());
        Ok(output_grad.clone())
    }

    fn cache(&self) -> &Cache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }
}
