pub mod matrix;
pub mod random;
pub mod window;

pub use matrix::{like_zero, Matrix, EPSILON};
pub use random::{sample_gaussian, sample_standard_normal};
