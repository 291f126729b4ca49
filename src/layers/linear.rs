use rand::Rng;

use crate::error::Result;
use crate::layers::layer::{check_shape, replace_deltas, Cache, Layer};
use crate::math::matrix::Matrix;

/// Fully connected layer: `output = input · W (+ B)`.
#[derive(Debug)]
pub struct Linear {
    pub weights: Matrix,
    pub biases: Matrix,
    /// `[dW]` or `[dW, dB]` when the bias is enabled.
    delta: Vec<Matrix>,
    pub weight_scale: f64,
    pub weight_decay: f64,
    enable_bias: bool,
    input_rows: usize,
    input_cols: usize,
    cache: Cache,
}

impl Linear {
    /// `W` (`input_cols × output_cols`) is drawn from N(0, weight_scale);
    /// `B` (`input_rows × output_cols`) starts at zero.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        input_rows: usize,
        input_cols: usize,
        output_cols: usize,
        weight_scale: f64,
        weight_decay: f64,
        enable_bias: bool,
    ) -> Linear {
        let weights = Matrix::gaussian(input_cols, output_cols, rng, 0.0, weight_scale);
        let biases = Matrix::zeros(input_rows, output_cols);
        let mut delta = vec![Matrix::zeros(input_cols, output_cols)];
        if enable_bias {
            delta.push(Matrix::zeros(input_rows, output_cols));
        }

        Linear {
            weights,
            biases,
            delta,
            weight_scale,
            weight_decay,
            enable_bias,
            input_rows,
            input_cols,
            cache: Cache::default(),
        }
    }

    pub fn bias_enabled(&self) -> bool {
        self.enable_bias
    }
}

impl Layer for Linear {
    fn name(&self) -> &'static str {
        "Linear"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.input_rows, self.input_cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        (self.input_rows, self.weights.cols())
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        check_shape("Linear input", self.input_dim(), input)?;
        let mut output = input.dot(&self.weights)?;
        if self.enable_bias {
            output = output.add(&self.biases, 1.0, 1.0)?;
        }
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        check_shape("Linear gradient", self.output_dim(), output_grad)?;
        let input = self.cache.last_input(self.name())?;

        // dW = inputᵀ·grad + weight_decay·W; shrinking weights needs a negative decay.
        let d_weights = input
            .transpose()
            .dot(output_grad)?
            .add(&self.weights, 1.0, self.weight_decay)?;
        let input_grad = output_grad.dot(&self.weights.transpose())?;

        let mut delta = vec![d_weights];
        if self.enable_bias {
            // Column sums of the gradient, repeated on every bias row.
            let col_sum = Matrix::filled(1, output_grad.rows(), 1.0).dot(output_grad)?;
            let mut d_biases = Matrix::zeros(self.biases.rows(), self.biases.cols());
            for i in 0..d_biases.rows() {
                d_biases.fill_window(i as isize, 0, &col_sum);
            }
            delta.push(d_biases);
        }

        self.delta = delta;
        self.cache.grad = Some(input_grad.clone());
        Ok(input_grad)
    }

    fn params_update(&mut self, rate: f64) -> Result<()> {
        let weights = self.weights.add(&self.delta[0], 1.0, rate)?;
        let biases = match self.delta.get(1) {
            Some(d_biases) => self.biases.add(d_biases, 1.0, rate)?,
            None => self.biases.clone(),
        };
        self.weights = weights;
        self.biases = biases;
        Ok(())
    }

    fn delta_count(&self) -> usize {
        self.delta.len()
    }

    fn delta(&self) -> Vec<Matrix> {
        self.delta.clone()
    }

    fn correct_delta(&mut self, delta: &[Matrix], offset: usize) -> Result<()> {
        replace_deltas(self.name(), &mut self.delta, delta, offset)
    }

    fn cache(&self) -> &Cache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }
}
