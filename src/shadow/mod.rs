//! Unrolling of memoryless layers over a sequence (backpropagation through time).

pub mod policy;
pub mod record;
pub mod shadow;

pub use policy::{BasicRecurrence, DelayUpdate, DeltaSum, Recurrence, Remember, Replay, ShadowPolicy};
pub use record::Record;
pub use shadow::Shadow;
