use crate::error::Result;
use crate::layers::layer::{Cache, Layer};
use crate::math::matrix::Matrix;

/// Reshapes an `m × n` block into a single `1 × (m·n)` row and back.
#[derive(Debug)]
pub struct Flatten {
    input_rows: usize,
    input_cols: usize,
    cache: Cache,
}

impl Flatten {
    pub fn new(input_rows: usize, input_cols: usize) -> Flatten {
        Flatten { input_rows, input_cols, cache: Cache::default() }
    }
}

impl Layer for Flatten {
    fn name(&self) -> &'static str {
        "Flatten"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.input_rows, self.input_cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        (1, self.input_rows * self.input_cols)
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        let (rows, cols) = self.output_dim();
        let output = input.reshape(rows, cols)?;
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        let input_grad = output_grad.reshape(self.input_rows, self.input_cols)?;
        self.cache.grad = Some(input_grad.clone());
        Ok(input_grad)
    }

    fn cache(&self) -> &Cache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }
}
