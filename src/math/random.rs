use rand::Rng;
use std::f64::consts::PI;

use crate::math::matrix::Matrix;

/// Samples a single value from N(0, 1) using the Box-Muller transform.
pub fn sample_standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // Draw two independent uniform samples in (0, 1] to avoid log(0).
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = 1.0 - rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

pub fn sample_gaussian<R: Rng + ?Sized>(rng: &mut R, mu: f64, std_dev: f64) -> f64 {
    mu + sample_standard_normal(rng) * std_dev
}

impl Matrix {
    /// Uniform samples in `[a, b)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R, a: f64, b: f64) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        res.fill_random(rng, a, b);
        res
    }

    /// Samples from N(mu, std_dev).
    pub fn gaussian<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R, mu: f64, std_dev: f64) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        res.fill_gaussian(rng, mu, std_dev);
        res
    }

    pub fn fill_random<R: Rng + ?Sized>(&mut self, rng: &mut R, a: f64, b: f64) -> &mut Self {
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                *self.at_mut(i, j) = rng.gen::<f64>() * (b - a) + a;
            }
        }
        self
    }

    pub fn fill_gaussian<R: Rng + ?Sized>(&mut self, rng: &mut R, mu: f64, std_dev: f64) -> &mut Self {
        for i in 0..self.rows() {
            for j in 0..self.cols() {
                *self.at_mut(i, j) = sample_gaussian(rng, mu, std_dev);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn fill_random_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = Matrix::random(20, 20, &mut rng, -1.0, 1.0);
        assert!(m.min() >= -1.0);
        assert!(m.max() < 1.0);
    }

    #[test]
    fn gaussian_moments_are_close() {
        let mut rng = StdRng::seed_from_u64(11);
        let m = Matrix::gaussian(100, 100, &mut rng, 2.0, 0.5);
        let n = 10_000.0;
        let mean = m.sum() / n;
        let var = m.map(|x| (x - mean).powi(2)).sum() / n;
        assert!((mean - 2.0).abs() < 0.05, "mean = {mean}");
        assert!((var.sqrt() - 0.5).abs() < 0.05, "std = {}", var.sqrt());
    }

    #[test]
    fn same_seed_same_weights() {
        let a = Matrix::gaussian(3, 3, &mut StdRng::seed_from_u64(3), 0.0, 1.0);
        let b = Matrix::gaussian(3, 3, &mut StdRng::seed_from_u64(3), 0.0, 1.0);
        assert_eq!(a, b);
    }
}
