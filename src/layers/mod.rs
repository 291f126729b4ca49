pub mod activation;
pub mod convolution;
pub mod flatten;
pub mod layer;
pub mod linear;
pub mod log_regression;
pub mod pool_max;

pub use activation::Activation;
pub use convolution::Convolution;
pub use flatten::Flatten;
pub use layer::{Cache, Layer};
pub use linear::Linear;
pub use log_regression::LogRegression;
pub use pool_max::MaxPool;
