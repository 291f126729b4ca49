use crate::activation::activation::ActivationFunction;
use crate::error::Result;
use crate::layers::layer::{check_shape, Cache, Layer};
use crate::math::matrix::Matrix;

/// Applies an [`ActivationFunction`] cell by cell. Parameterless.
#[derive(Debug)]
pub struct Activation {
    pub function: ActivationFunction,
    rows: usize,
    cols: usize,
    cache: Cache,
}

impl Activation {
    pub fn new(input_rows: usize, input_cols: usize, function: ActivationFunction) -> Activation {
        Activation {
            function,
            rows: input_rows,
            cols: input_cols,
            cache: Cache::default(),
        }
    }
}

impl Layer for Activation {
    fn name(&self) -> &'static str {
        "Activation"
    }

    fn input_dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn output_dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        check_shape("Activation input", self.input_dim(), input)?;
        let function = self.function;
        let output = input.map(|x| function.function(x));
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        let function = self.function;
        let slope = self
            .cache
            .last_output(self.name())?
            .map(|y| function.derivative(y));
        let input_grad = output_grad.elt_mul(&slope)?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_uses_cached_output() {
        let mut a = Activation::new(1, 2, ActivationFunction::Sigmoid);
        let out = a.forward_prop(&Matrix::from_rows(vec![vec![0.0, 2.0]]).unwrap()).unwrap();
        let grad = a.backward_prop(&Matrix::filled(1, 2, 2.0)).unwrap();
        let y = out.get(0, 1).unwrap();
        assert_eq!(grad.get(0, 0).unwrap(), 0.5);
        assert!((grad.get(0, 1).unwrap() - 2.0 * y * (1.0 - y)).abs() < 1e-15);
    }

    #[test]
    fn restored_output_drives_the_derivative() {
        let mut a = Activation::new(1, 1, ActivationFunction::Tanh);
        a.forward_prop(&Matrix::filled(1, 1, 3.0)).unwrap();
        a.cache_mut().output = Some(Matrix::filled(1, 1, 0.5));
        let grad = a.backward_prop(&Matrix::filled(1, 1, 1.0)).unwrap();
        assert_eq!(grad.get(0, 0).unwrap(), 0.75);
    }

    #[test]
    fn relu_blocks_negative_side() {
        let mut a = Activation::new(1, 3, ActivationFunction::ReLU);
        let out = a.forward_prop(&Matrix::from_rows(vec![vec![-1.0, 0.0, 4.0]]).unwrap()).unwrap();
        assert_eq!(out.to_vec(), vec![0.0, 0.0, 4.0]);
        let grad = a.backward_prop(&Matrix::filled(1, 3, 3.0)).unwrap();
        assert_eq!(grad.to_vec(), vec![0.0, 0.0, 3.0]);
    }
}
