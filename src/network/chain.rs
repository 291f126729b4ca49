use log::debug;

use crate::error::{NnError, Result};
use crate::layers::layer::{Cache, Layer};
use crate::loss::mae::MaeLoss;
use crate::math::matrix::Matrix;

/// An ordered stack of layers trained as one unit.
///
/// A chain is itself a [`Layer`], so chains nest and can be wrapped in a
/// [`crate::shadow::Shadow`].
#[derive(Debug, Default)]
pub struct Chain {
    layers: Vec<Box<dyn Layer>>,
    cache: Cache,
}

impl Chain {
    pub fn new() -> Chain {
        Chain::default()
    }

    pub fn add_layer<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        self.push_boxed(Box::new(layer))
    }

    pub(crate) fn push_boxed(&mut self, layer: Box<dyn Layer>) -> &mut Self {
        debug!(
            "chain layer {}: {} {:?} -> {:?}",
            self.layers.len(),
            layer.name(),
            layer.input_dim(),
            layer.output_dim()
        );
        self.layers.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, i: usize) -> Option<&dyn Layer> {
        self.layers.get(i).map(|l| l.as_ref())
    }

    /// Forward pass through every layer in order.
    pub fn predict(&mut self, input: &Matrix) -> Result<Matrix> {
        let mut next = input.clone();
        for layer in &mut self.layers {
            next = layer.forward_prop(&next)?;
        }
        Ok(next)
    }

    /// Seeds the backward pass with `expected - predicted` and runs it from
    /// the last layer to the first. Parameters are left untouched.
    pub fn learn(&mut self, predicted: &Matrix, expected: &Matrix) -> Result<&mut Self> {
        let seed = expected.add(predicted, 1.0, -1.0)?;
        self.propagate_back(&seed, true)?;
        Ok(self)
    }

    /// Applies every layer's pending deltas, last layer first.
    pub fn update(&mut self, rate: f64) -> Result<&mut Self> {
        for layer in self.layers.iter_mut().rev() {
            layer.params_update(rate)?;
        }
        Ok(self)
    }

    /// One training step; returns the prediction it learned from.
    pub fn fit(&mut self, input: &Matrix, expected: &Matrix, rate: f64) -> Result<Matrix> {
        let predicted = self.predict(input)?;
        self.learn(&predicted, expected)?.update(rate)?;
        Ok(predicted)
    }

    /// Mean absolute error.
    pub fn error(&self, predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        MaeLoss::loss(predicted, expected)
    }

    fn propagate_back(&mut self, grad: &Matrix, terminal: bool) -> Result<Matrix> {
        let last = self.layers.len().saturating_sub(1);
        let mut next = grad.clone();
        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            next = if terminal && i == last {
                layer.backward_terminal(&next)?
            } else {
                layer.backward_prop(&next)?
            };
        }
        Ok(next)
    }

    /// Hands each member its slice of `delta`, starting at `offset`.
    fn distribute_delta(&mut self, delta: &[Matrix], offset: usize) -> Result<()> {
        let mut offset = offset;
        for layer in &mut self.layers {
            layer.correct_delta(delta, offset)?;
            offset += layer.delta_count();
        }
        Ok(())
    }

    fn backward(&mut self, output_grad: &Matrix, terminal: bool) -> Result<Matrix> {
        if self.layers.is_empty() {
            return Err(NnError::Unsupported { layer: "Chain", op: "backward_prop on an empty chain" });
        }
        let input_grad = self.propagate_back(output_grad, terminal)?;
        self.cache.grad = Some(input_grad.clone());
        Ok(input_grad)
    }
}

impl Layer for Chain {
    fn name(&self) -> &'static str {
        "Chain"
    }

    fn input_dim(&self) -> (usize, usize) {
        self.layers.first().map_or((0, 0), |l| l.input_dim())
    }

    fn output_dim(&self) -> (usize, usize) {
        self.layers.last().map_or((0, 0), |l| l.output_dim())
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        let output = self.predict(input)?;
        self.cache.input = Some(input.clone());
        self.cache.output = Some(output.clone());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.backward(output_grad, false)
    }

    fn backward_terminal(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.backward(output_grad, true)
    }

    fn params_update(&mut self, rate: f64) -> Result<()> {
        self.update(rate).map(|_| ())
    }

    fn delta_count(&self) -> usize {
        self.layers.iter().map(|l| l.delta_count()).sum()
    }

    fn delta(&self) -> Vec<Matrix> {
        self.layers.iter().flat_map(|l| l.delta()).collect()
    }

    fn correct_delta(&mut self, delta: &[Matrix], offset: usize) -> Result<()> {
        let end = offset + self.delta_count();
        if end > delta.len() {
            return Err(NnError::OutOfRange { what: "delta", index: end.saturating_sub(1), len: delta.len() });
        }
        // A member that rejects its slice puts the earlier members back.
        let previous = self.delta();
        if let Err(err) = self.distribute_delta(delta, offset) {
            self.distribute_delta(&previous, 0)?;
            return Err(err);
        }
        Ok(())
    }

    fn reset_record(&mut self) {
        for layer in &mut self.layers {
            layer.reset_record();
        }
    }

    fn snapshot(&self) -> Vec<Cache> {
        let mut slots = vec![self.cache.clone()];
        for layer in &self.layers {
            slots.extend(layer.snapshot());
        }
        slots
    }

    fn restore(&mut self, snapshot: &[Cache]) -> Result<usize> {
        let own = snapshot.first().ok_or(NnError::OutOfRange { what: "snapshot", index: 0, len: 0 })?;
        let mut used = 1;
        for layer in &mut self.layers {
            used += layer.restore(snapshot.get(used..).unwrap_or_default())?;
        }
        self.cache = own.clone();
        Ok(used)
    }

    fn cache(&self) -> &Cache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }
}
