pub mod cross_entropy;
pub mod mae;

pub use cross_entropy::CrossEntropyLoss;
pub use mae::MaeLoss;
