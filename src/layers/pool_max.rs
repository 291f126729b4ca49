use crate::error::{NnError, Result};
use crate::layers::layer::{check_shape, Cache, Layer};
use crate::math::matrix::Matrix;

/// Non-overlapping max pooling over every tile of a tiled block.
///
/// A tile of `item_rows × item_cols` pools to
/// `ceil(item_rows / pool_rows) × ceil(item_cols / pool_cols)`; windows on
/// the ragged edge are clipped to the tile.
#[derive(Debug)]
pub struct MaxPool {
    items: usize,
    channels: usize,
    item_rows: usize,
    item_cols: usize,
    pool_rows: usize,
    pool_cols: usize,
    /// 1 where an input cell reached its window's maximum, 0 elsewhere.
    contribution: Option<Matrix>,
    cache: Cache,
}

impl MaxPool {
    pub fn new(
        items: usize,
        channels: usize,
        item_rows: usize,
        item_cols: usize,
        pool_rows: usize,
        pool_cols: usize,
    ) -> Result<MaxPool> {
        if pool_rows == 0 || pool_cols == 0 {
            return Err(NnError::InvalidSpec(format!(
                "max pool window must be non-empty, got {pool_rows}x{pool_cols}"
            )));
        }
        Ok(MaxPool {
            items,
            channels,
            item_rows,
            item_cols,
            pool_rows,
            pool_cols,
            contribution: None,
            cache: Cache::default(),
        })
    }

    pub fn contribution(&self) -> Option<&Matrix> {
        self.contribution.as_ref()
    }

    fn pooled_dim(&self) -> (usize, usize) {
        (self.item_rows.div_ceil(self.pool_rows), self.item_cols.div_ceil(self.pool_cols))
    }

    fn tile_origin(&self, i: usize, c: usize) -> (isize, isize) {
        ((i * self.item_rows) as isize, (c * self.item_cols) as isize)
    }

    /// Pooled output and contribution mask for `input`.
    fn pool_tiles(&self, input: &Matrix) -> Result<(Matrix, Matrix)> {
        let (pr, pc) = self.pooled_dim();
        let (out_rows, out_cols) = self.output_dim();
        let mut output = Matrix::zeros(out_rows, out_cols);
        let mut mask = Matrix::zeros(input.rows(), input.cols());

        for i in 0..self.items {
            for c in 0..self.channels {
                let (y0, x0) = self.tile_origin(i, c);
                let tile = input.window(y0, x0, self.item_rows, self.item_cols);
                let pooled = tile.pool(
                    self.pool_rows,
                    self.pool_cols,
                    self.pool_rows,
                    self.pool_cols,
                    f64::max,
                    f64::NEG_INFINITY,
                )?;

                let mut tile_mask = Matrix::zeros(self.item_rows, self.item_cols);
                for y in 0..pr {
                    for x in 0..pc {
                        let top = (y * self.pool_rows) as isize;
                        let left = (x * self.pool_cols) as isize;
                        let max = pooled.at(y, x);
                        let hits = tile
                            .window(top, left, self.pool_rows, self.pool_cols)
                            .map(|v| if v == max { 1.0 } else { 0.0 });
                        tile_mask.fill_window(top, left, &hits);
                    }
                }

                output.fill_window((i * pr) as isize, (c * pc) as isize, &pooled);
                mask.fill_window(y0, x0, &tile_mask);
            }
        }
        Ok((output, mask))
    }
}

impl Layer for MaxPool {
    fn name(&self) -> &'static str {
        "MaxPool"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.items * self.item_rows, self.channels * self.item_cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        let (pr, pc) = self.pooled_dim();
        (self.items * pr, self.channels * pc)
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        check_shape("MaxPool input", self.input_dim(), input)?;
        let (output, mask) = self.pool_tiles(input)?;
        self.contribution = Some(mask);
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        check_shape("MaxPool gradient", self.output_dim(), output_grad)?;
        // The mask is rebuilt from the cached input so a replayed cache
        // routes the gradient through that step's maxima.
        let (_, mask) = self.pool_tiles(self.cache.last_input("MaxPool")?)?;
        let (pr, pc) = self.pooled_dim();
        let mut input_grad = Matrix::zeros(mask.rows(), mask.cols());

        for i in 0..self.items {
            for c in 0..self.channels {
                let (y0, x0) = self.tile_origin(i, c);
                let tile_mask = mask.window(y0, x0, self.item_rows, self.item_cols);
                let mut tile_grad = Matrix::zeros(self.item_rows, self.item_cols);

                for y in 0..pr {
                    for x in 0..pc {
                        let top = (y * self.pool_rows) as isize;
                        let left = (x * self.pool_cols) as isize;
                        let g = output_grad.at(i * pr + y, c * pc + x);
                        let hits = tile_mask.window(top, left, self.pool_rows, self.pool_cols);
                        let share = g / hits.sum().max(1.0);
                        tile_grad.fill_window(top, left, &hits.scale(share));
                    }
                }

                input_grad.fill_window(y0, x0, &tile_grad);
            }
        }

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
