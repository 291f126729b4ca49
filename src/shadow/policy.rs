use std::fmt::Debug;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{NnError, Result};
use crate::layers::layer::Layer;
use crate::math::matrix::Matrix;
use crate::shadow::record::Record;

/// Which per-step value a shadow remembers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remember {
    Input,
    Output,
}

/// Recurrence behaviour selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    InputRecord,
    OutputRecord,
    #[default]
    InputRecordDelayUpdate,
    OutputRecordDelayUpdate,
    BasicRecurrence,
}

impl Recurrence {
    pub fn remembers(self) -> Remember {
        match self {
            Recurrence::InputRecord | Recurrence::InputRecordDelayUpdate => Remember::Input,
            Recurrence::OutputRecord
            | Recurrence::OutputRecordDelayUpdate
            | Recurrence::BasicRecurrence => Remember::Output,
        }
    }

    /// Builds the policy for a wrapped layer with the given output width.
    /// Only [`Recurrence::BasicRecurrence`] draws from `rng`.
    pub fn policy<R: Rng + ?Sized>(self, output_cols: usize, rng: &mut R) -> Box<dyn ShadowPolicy> {
        match self {
            Recurrence::InputRecord | Recurrence::OutputRecord => Box::new(Replay::new(self)),
            Recurrence::InputRecordDelayUpdate | Recurrence::OutputRecordDelayUpdate => {
                Box::new(DelayUpdate::new(self))
            }
            Recurrence::BasicRecurrence => Box::new(BasicRecurrence::new(output_cols, rng)),
        }
    }
}

/// Hooks a [`crate::shadow::Shadow`] calls around its wrapped layer.
///
/// A policy never moves the record's cursor itself; the shadow does that
/// after `record_step` and after `aggregate_delta`.
pub trait ShadowPolicy: Debug {
    fn kind(&self) -> Recurrence;

    /// Clears any per-sequence accumulator.
    fn reset_record(&mut self) {}

    /// Value appended to the history after a forward step.
    fn record_step(&self, inner: &dyn Layer) -> Result<Matrix> {
        let cache = inner.cache();
        let value = match self.kind().remembers() {
            Remember::Input => cache.last_input(inner.name())?,
            Remember::Output => cache.last_output(inner.name())?,
        };
        Ok(value.clone())
    }

    fn augment_input(&self, _record: &Record, input: &Matrix) -> Result<Matrix> {
        Ok(input.clone())
    }

    fn augment_gradient(&self, _record: &Record, grad: &Matrix) -> Result<Matrix> {
        Ok(grad.clone())
    }

    /// Runs after the wrapped layer's backward step, cursor not yet moved.
    fn aggregate_delta(&mut self, _record: &Record, _inner: &dyn Layer, _input_grad: &Matrix) -> Result<()> {
        Ok(())
    }

    /// Runs once the cursor is back at 0. Returns whether the wrapped layer
    /// should apply its own deltas afterwards.
    fn apply_delta(&mut self, _inner: &mut dyn Layer, _rate: f64) -> Result<bool> {
        Ok(true)
    }
}

/// Remembers input or output and replays it; the wrapped layer updates
/// from whatever delta its last backward step left behind.
#[derive(Debug)]
pub struct Replay {
    kind: Recurrence,
}

impl Replay {
    pub fn new(kind: Recurrence) -> Replay {
        Replay { kind }
    }
}

impl ShadowPolicy for Replay {
    fn kind(&self) -> Recurrence {
        self.kind
    }
}

/// Element-wise running sum of a layer's deltas over an unroll.
#[derive(Debug, Default)]
pub struct DeltaSum {
    sum: Option<Vec<Matrix>>,
}

impl DeltaSum {
    pub fn add(&mut self, delta: Vec<Matrix>) -> Result<()> {
        let sum = match self.sum.take() {
            None => delta,
            Some(sum) => {
                if sum.len() != delta.len() {
                    return Err(NnError::OutOfRange { what: "delta", index: delta.len(), len: sum.len() });
                }
                sum.iter()
                    .zip(&delta)
                    .map(|(s, d)| s.add(d, 1.0, 1.0))
                    .collect::<Result<Vec<_>>>()?
            }
        };
        self.sum = Some(sum);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.sum = None;
    }

    pub fn get(&self) -> Option<&[Matrix]> {
        self.sum.as_deref()
    }

    /// Injects the sum into `inner`. `false` when nothing was aggregated.
    fn inject(&mut self, inner: &mut dyn Layer) -> Result<bool> {
        match self.sum.take() {
            Some(sum) => {
                inner.correct_delta(&sum, 0)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Replay plus one combined update from the deltas of every step.
#[derive(Debug)]
pub struct DelayUpdate {
    kind: Recurrence,
    deltas: DeltaSum,
}

impl DelayUpdate {
    pub fn new(kind: Recurrence) -> DelayUpdate {
        DelayUpdate { kind, deltas: DeltaSum::default() }
    }

    pub fn aggregated(&self) -> Option<&[Matrix]> {
        self.deltas.get()
    }
}

impl ShadowPolicy for DelayUpdate {
    fn kind(&self) -> Recurrence {
        self.kind
    }

    fn reset_record(&mut self) {
        self.deltas.clear();
    }

    fn aggregate_delta(&mut self, _record: &Record, inner: &dyn Layer, _input_grad: &Matrix) -> Result<()> {
        self.deltas.add(inner.delta())
    }

    fn apply_delta(&mut self, inner: &mut dyn Layer, _rate: f64) -> Result<bool> {
        self.deltas.inject(inner)
    }
}

/// Elman-style recurrence on the wrapped layer's output.
///
/// Step `t` sees `input + h(t-1)·H`, with `h(-1) = 0`. The wrapped layer's
/// own deltas are summed across steps like [`DelayUpdate`] does.
#[derive(Debug)]
pub struct BasicRecurrence {
    pub weights: Matrix,
    d_weights: Matrix,
    /// Input gradient of the step unwound last, i.e. the one after the
    /// current step in time.
    last_delta: Option<Matrix>,
    deltas: DeltaSum,
}

impl BasicRecurrence {
    /// `H` is `n × n`, uniform in [-1, 1).
    pub fn new<R: Rng + ?Sized>(n: usize, rng: &mut R) -> BasicRecurrence {
        BasicRecurrence::with_weights(Matrix::random(n, n, rng, -1.0, 1.0))
    }

    pub fn with_weights(weights: Matrix) -> BasicRecurrence {
        let d_weights = Matrix::zeros(weights.rows(), weights.cols());
        BasicRecurrence { weights, d_weights, last_delta: None, deltas: DeltaSum::default() }
    }

    pub fn d_weights(&self) -> &Matrix {
        &self.d_weights
    }
}

impl ShadowPolicy for BasicRecurrence {
    fn kind(&self) -> Recurrence {
        Recurrence::BasicRecurrence
    }

    fn reset_record(&mut self) {
        self.d_weights = Matrix::zeros(self.weights.rows(), self.weights.cols());
        self.last_delta = None;
        self.deltas.clear();
    }

    fn augment_input(&self, record: &Record, input: &Matrix) -> Result<Matrix> {
        let carried = record.current()?.dot(&self.weights)?;
        input.add(&carried, 1.0, 1.0)
    }

    fn augment_gradient(&self, _record: &Record, grad: &Matrix) -> Result<Matrix> {
        match &self.last_delta {
            Some(delta) => grad.add(&delta.dot(&self.weights.transpose())?, 1.0, 1.0),
            None => Ok(grad.clone()),
        }
    }

    fn aggregate_delta(&mut self, record: &Record, inner: &dyn Layer, input_grad: &Matrix) -> Result<()> {
        let step = record.previous()?.transpose().dot(input_grad)?;
        let d_weights = self.d_weights.add(&step, 1.0, 1.0)?;
        self.deltas.add(inner.delta())?;
        self.d_weights = d_weights;
        self.last_delta = Some(input_grad.clone());
        Ok(())
    }

    fn apply_delta(&mut self, inner: &mut dyn Layer, rate: f64) -> Result<bool> {
        self.weights = self.weights.add(&self.d_weights, 1.0, rate)?;
        self.deltas.inject(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn kinds_deserialize_from_snake_case() {
        let k: Recurrence = serde_json::from_str("\"basic_recurrence\"").unwrap();
        assert_eq!(k, Recurrence::BasicRecurrence);
        assert_eq!(Recurrence::default(), Recurrence::InputRecordDelayUpdate);
        assert_eq!(
            serde_json::to_string(&Recurrence::OutputRecordDelayUpdate).unwrap(),
            "\"output_record_delay_update\""
        );
    }

    #[test]
    fn policy_matches_kind() {
        let mut rng = StdRng::seed_from_u64(0);
        for kind in [
            Recurrence::InputRecord,
            Recurrence::OutputRecord,
            Recurrence::InputRecordDelayUpdate,
            Recurrence::OutputRecordDelayUpdate,
            Recurrence::BasicRecurrence,
        ] {
            assert_eq!(kind.policy(4, &mut rng).kind(), kind);
        }
    }

    #[test]
    fn delta_sum_adds_elementwise() {
        let mut sum = DeltaSum::default();
        sum.add(vec![Matrix::filled(1, 2, 1.0)]).unwrap();
        sum.add(vec![Matrix::filled(1, 2, 2.5)]).unwrap();
        assert_eq!(sum.get().unwrap()[0].to_vec(), vec![3.5, 3.5]);
        assert!(sum.add(vec![]).is_err());
        sum.clear();
        assert!(sum.get().is_none());
    }

    #[test]
    fn recurrence_carries_previous_output() {
        let policy = BasicRecurrence::with_weights(Matrix::filled(2, 2, 0.5));
        let mut record = Record::new(1, 2);
        let input = Matrix::filled(1, 2, 1.0);
        assert_eq!(policy.augment_input(&record, &input).unwrap(), input);

        record.push(Matrix::from_rows(vec![vec![2.0, 4.0]]).unwrap(), Default::default());
        assert_eq!(policy.augment_input(&record, &input).unwrap().to_vec(), vec![4.0, 4.0]);
    }
}
