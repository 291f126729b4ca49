use rand::Rng;

use crate::error::Result;
use crate::layers::layer::{check_shape, replace_deltas, Cache, Layer};
use crate::math::matrix::Matrix;

/// Multi-channel 2D convolution over a tiled block.
///
/// The input holds `items` rows of tiles, one tile per input channel, each
/// `item_rows × item_cols`; the output has the same tiling with one tile
/// per output channel. `W` stacks one `kernel_rows × kernel_cols` kernel per
/// (input channel, output channel) pair: kernel `(j, k)` sits at
/// `(j·kernel_rows, k·kernel_cols)`. `B` has one bias per (item, output
/// channel), added to every pixel of that output tile.
#[derive(Debug)]
pub struct Convolution {
    pub weights: Matrix,
    pub biases: Matrix,
    pub weight_decay: f64,
    delta: Vec<Matrix>,
    items: usize,
    in_channels: usize,
    out_channels: usize,
    item_rows: usize,
    item_cols: usize,
    kernel_rows: usize,
    kernel_cols: usize,
    cache: Cache,
}

impl Convolution {
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        items: usize,
        in_channels: usize,
        out_channels: usize,
        item_rows: usize,
        item_cols: usize,
        kernel_rows: usize,
        kernel_cols: usize,
        weight_decay: f64,
    ) -> Convolution {
        let w_shape = (in_channels * kernel_rows, out_channels * kernel_cols);
        let weights = Matrix::random(w_shape.0, w_shape.1, rng, -1.0, 1.0);
        let biases = Matrix::zeros(items, out_channels);
        Convolution {
            weights,
            biases,
            weight_decay,
            delta: vec![Matrix::zeros(w_shape.0, w_shape.1), Matrix::zeros(items, out_channels)],
            items,
            in_channels,
            out_channels,
            item_rows,
            item_cols,
            kernel_rows,
            kernel_cols,
            cache: Cache::default(),
        }
    }

    fn kernel(&self, j: usize, k: usize) -> Matrix {
        self.weights.window(
            (j * self.kernel_rows) as isize,
            (k * self.kernel_cols) as isize,
            self.kernel_rows,
            self.kernel_cols,
        )
    }

    fn tile(&self, m: &Matrix, i: usize, c: usize) -> Matrix {
        m.window(
            (i * self.item_rows) as isize,
            (c * self.item_cols) as isize,
            self.item_rows,
            self.item_cols,
        )
    }

    fn mid(&self) -> (isize, isize) {
        ((self.kernel_rows as isize - 1) / 2, (self.kernel_cols as isize - 1) / 2)
    }
}

impl Layer for Convolution {
    fn name(&self) -> &'static str {
        "Convolution"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.items * self.item_rows, self.in_channels * self.item_cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        (self.items * self.item_rows, self.out_channels * self.item_cols)
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        check_shape("Convolution input", self.input_dim(), input)?;
        let (rows, cols) = self.output_dim();
        let mut output = Matrix::zeros(rows, cols);

        for i in 0..self.items {
            for k in 0..self.out_channels {
                let bias = self.biases.get(i, k)?;
                let mut acc = Matrix::filled(self.item_rows, self.item_cols, bias);
                for j in 0..self.in_channels {
                    let conv = self.tile(input, i, j).convolve(&self.kernel(j, k));
                    acc = acc.add(&conv, 1.0, 1.0)?;
                }
                output.fill_window((i * self.item_rows) as isize, (k * self.item_cols) as isize, &acc);
            }
        }

        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        check_shape("Convolution gradient", self.output_dim(), output_grad)?;
        let input = self.cache.last_input(self.name())?;
        let (mid_m, mid_n) = self.mid();
        let (in_rows, in_cols) = self.input_dim();

        let mut input_grad = Matrix::zeros(in_rows, in_cols);
        let mut d_weights = Matrix::zeros(self.weights.rows(), self.weights.cols());
        let mut d_biases = Matrix::zeros(self.items, self.out_channels);
        let pixels = (self.item_rows * self.item_cols) as f64;

        for i in 0..self.items {
            for k in 0..self.out_channels {
                let grad_tile = self.tile(output_grad, i, k);
                d_biases.set(i, k, grad_tile.sum() / pixels)?;
            }

            for j in 0..self.in_channels {
                let input_tile = self.tile(input, i, j);
                let mut tile_grad = Matrix::zeros(self.item_rows, self.item_cols);

                for k in 0..self.out_channels {
                    let kernel = self.kernel(j, k);
                    let grad_tile = self.tile(output_grad, i, k);
                    let mut d_kernel = Matrix::zeros(self.kernel_rows, self.kernel_cols);

                    for y in 0..self.item_rows {
                        for x in 0..self.item_cols {
                            let g = grad_tile.at(y, x);
                            if g == 0.0 {
                                continue;
                            }
                            let top = y as isize - mid_m;
                            let left = x as isize - mid_n;
                            tile_grad.fill_window_with(top, left, &kernel, |a, b| a + g * b);
                            let patch = input_tile.window(top, left, self.kernel_rows, self.kernel_cols);
                            d_kernel = d_kernel.add(&patch, 1.0, g)?;
                        }
                    }

                    d_weights.fill_window_with(
                        (j * self.kernel_rows) as isize,
                        (k * self.kernel_cols) as isize,
                        &d_kernel,
                        |a, b| a + b,
                    );
                }

                input_grad.fill_window((i * self.item_rows) as isize, (j * self.item_cols) as isize, &tile_grad);
            }
        }

        // Only dW is averaged over items; the input gradient is left unscaled.
        self.delta = vec![d_weights.scale(1.0 / self.items as f64), d_biases];
        self.cache.grad = Some(input_grad.clone());
        Ok(input_grad)
    }

    fn params_update(&mut self, rate: f64) -> Result<()> {
        let weights = self.weights.add(&self.delta[0], 1.0 - self.weight_decay, rate)?;
        let biases = self.biases.add(&self.delta[1], 1.0, rate)?;
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
