pub mod activation;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod shadow;

// Convenience re-exports
pub use activation::activation::ActivationFunction;
pub use error::{NnError, Result};
pub use layers::layer::{Cache, Layer};
pub use layers::{Activation, Convolution, Flatten, Linear, LogRegression, MaxPool};
pub use loss::{CrossEntropyLoss, MaeLoss};
pub use math::matrix::Matrix;
pub use network::{Chain, ChainSpec, LayerKind, LayerSpec, RecurrentChain};
pub use shadow::{Recurrence, Shadow, ShadowPolicy};
