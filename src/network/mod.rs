pub mod chain;
pub mod recurrent;
pub mod spec;

pub use chain::Chain;
pub use recurrent::RecurrentChain;
pub use spec::{ChainSpec, LayerKind, LayerSpec};
