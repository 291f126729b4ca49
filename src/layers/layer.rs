use std::fmt::Debug;

use crate::error::{NnError, Result};
use crate::math::matrix::Matrix;

/// Memo of the most recent call on a layer.
///
/// There is exactly one slot per field and every call overwrites it, so two
/// unrelated forward calls never batch together. The shadow wrappers swap
/// historical values back in here before running a backward step.
#[derive(Debug, Clone, Default)]
pub struct Cache {
    pub input: Option<Matrix>,
    pub output: Option<Matrix>,
    pub grad: Option<Matrix>,
}

impl Cache {
    pub fn last_input(&self, layer: &'static str) -> Result<&Matrix> {
        self.input.as_ref().ok_or(NnError::MissingCache { layer, what: "input" })
    }

    pub fn last_output(&self, layer: &'static str) -> Result<&Matrix> {
        self.output.as_ref().ok_or(NnError::MissingCache { layer, what: "output" })
    }
}

/// Capabilities shared by every learnable unit, including whole chains and
/// shadow wrappers.
///
/// Gradients follow one sign convention throughout: the seed handed to the
/// last layer is `expected - predicted`, deltas point in the direction that
/// reduces the loss, and `params_update` *adds* `rate * delta`.
pub trait Layer: Debug {
    /// Short static name used in error messages.
    fn name(&self) -> &'static str;

    fn input_dim(&self) -> (usize, usize);

    fn output_dim(&self) -> (usize, usize);

    /// Computes the output for `input`, caching both.
    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix>;

    /// Computes the input gradient for `output_grad` and memoizes parameter
    /// deltas. Never touches the parameters themselves.
    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix>;

    /// Backward step for the last layer of a chain. A terminal layer whose
    /// loss gradient is already folded into the chain's seed overrides this
    /// to pass the seed through.
    fn backward_terminal(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.backward_prop(output_grad)
    }

    /// Applies the memoized deltas scaled by `rate`.
    fn params_update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }

    fn delta_count(&self) -> usize {
        0
    }

    fn delta(&self) -> Vec<Matrix> {
        Vec::new()
    }

    /// Replaces this layer's deltas with `delta[offset..offset + delta_count()]`.
    fn correct_delta(&mut self, _delta: &[Matrix], _offset: usize) -> Result<()> {
        Ok(())
    }

    /// Drops per-sequence state before an independent sequence starts.
    /// Only shadow wrappers, and chains holding them, keep any.
    fn reset_record(&mut self) {}

    /// Every cache slot a later backward call reads, this layer's own first.
    /// Containers append their members' slots in order.
    fn snapshot(&self) -> Vec<Cache> {
        vec![self.cache().clone()]
    }

    /// Puts back slots taken by [`Layer::snapshot`] and returns how many
    /// were consumed.
    fn restore(&mut self, snapshot: &[Cache]) -> Result<usize> {
        let own = snapshot.first().ok_or(NnError::OutOfRange { what: "snapshot", index: 0, len: 0 })?;
        *self.cache_mut() = own.clone();
        Ok(1)
    }

    fn cache(&self) -> &Cache;

    fn cache_mut(&mut self) -> &mut Cache;
}

pub(crate) fn check_shape(op: &'static str, expected: (usize, usize), actual: &Matrix) -> Result<()> {
    if actual.shape() != expected {
        return Err(NnError::shape(op, expected, actual.shape()));
    }
    Ok(())
}

/// Validates and then swaps in `delta[offset..]` over `own`. Either every
/// slot is replaced or none is.
pub(crate) fn replace_deltas(
    layer: &'static str,
    own: &mut [Matrix],
    delta: &[Matrix],
    offset: usize,
) -> Result<()> {
    if own.is_empty() {
        return Ok(());
    }
    let end = offset + own.len();
    if end > delta.len() {
        return Err(NnError::OutOfRange { what: "delta", index: end - 1, len: delta.len() });
    }
    for (current, incoming) in own.iter().zip(&delta[offset..end]) {
        current.check_same_shape(layer, incoming)?;
    }
    for (current, incoming) in own.iter_mut().zip(&delta[offset..end]) {
        *current = incoming.clone();
    }
    Ok(())
}
