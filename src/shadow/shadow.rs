use log::{debug, trace};
use rand::Rng;

use crate::error::{NnError, Result};
use crate::layers::layer::{Cache, Layer};
use crate::math::matrix::Matrix;
use crate::shadow::policy::{Recurrence, Remember, ShadowPolicy};
use crate::shadow::record::Record;

/// Wraps a layer so it can be unrolled over a sequence.
///
/// Every forward call records one step and moves the cursor forward; every
/// backward call replays the step under the cursor and moves it back. The
/// wrapped layer's parameters only change through `params_update` once the
/// cursor has returned to 0, after which the record starts over.
#[derive(Debug)]
pub struct Shadow {
    inner: Box<dyn Layer>,
    record: Record,
    policy: Box<dyn ShadowPolicy>,
}

impl Shadow {
    pub fn new(inner: Box<dyn Layer>, policy: Box<dyn ShadowPolicy>) -> Shadow {
        let (rows, cols) = match policy.kind().remembers() {
            Remember::Input => inner.input_dim(),
            Remember::Output => inner.output_dim(),
        };
        Shadow { inner, record: Record::new(rows, cols), policy }
    }

    pub fn with_recurrence<L, R>(layer: L, kind: Recurrence, rng: &mut R) -> Shadow
    where
        L: Layer + 'static,
        R: Rng + ?Sized,
    {
        let policy = kind.policy(layer.output_dim().1, rng);
        Shadow::new(Box::new(layer), policy)
    }

    pub fn kind(&self) -> Recurrence {
        self.policy.kind()
    }

    pub fn cursor(&self) -> usize {
        self.record.cursor()
    }

    /// Number of history entries, counting the zero seed.
    pub fn history_len(&self) -> usize {
        self.record.len()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn inner(&self) -> &dyn Layer {
        self.inner.as_ref()
    }

    pub fn inner_mut(&mut self) -> &mut dyn Layer {
        self.inner.as_mut()
    }

    pub fn policy(&self) -> &dyn ShadowPolicy {
        self.policy.as_ref()
    }

    fn backward_step(&mut self, output_grad: &Matrix, terminal: bool) -> Result<Matrix> {
        if self.record.cursor() == 0 {
            return Err(NnError::OutOfRange { what: "shadow cursor", index: 0, len: self.record.len() });
        }
        let grad = self.policy.augment_gradient(&self.record, output_grad)?;
        self.inner.restore(self.record.snapshot()?)?;

        let input_grad = if terminal {
            self.inner.backward_terminal(&grad)?
        } else {
            self.inner.backward_prop(&grad)?
        };

        self.policy.aggregate_delta(&self.record, self.inner.as_ref(), &input_grad)?;
        self.record.retreat()?;
        trace!("{} shadow unwound to step {}", self.inner.name(), self.record.cursor());
        Ok(input_grad)
    }
}

impl Layer for Shadow {
    fn name(&self) -> &'static str {
        "Shadow"
    }

    fn input_dim(&self) -> (usize, usize) {
        self.inner.input_dim()
    }

    fn output_dim(&self) -> (usize, usize) {
        self.inner.output_dim()
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        let input = self.policy.augment_input(&self.record, input)?;
        let output = self.inner.forward_prop(&input)?;
        let value = self.policy.record_step(self.inner.as_ref())?;
        self.record.push(value, self.inner.snapshot());
        trace!("{} shadow recorded step {}", self.inner.name(), self.record.cursor());
        Ok(output)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.backward_step(output_grad, false)
    }

    fn backward_terminal(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.backward_step(output_grad, true)
    }

    fn params_update(&mut self, rate: f64) -> Result<()> {
        if self.record.cursor() > 0 {
            debug!(
                "{} shadow skips update: {} step(s) not unwound",
                self.inner.name(),
                self.record.cursor()
            );
            return Ok(());
        }
        if self.policy.apply_delta(self.inner.as_mut(), rate)? {
            self.inner.params_update(rate)?;
        }
        self.reset_record();
        Ok(())
    }

    fn delta_count(&self) -> usize {
        self.inner.delta_count()
    }

    fn delta(&self) -> Vec<Matrix> {
        self.inner.delta()
    }

    fn correct_delta(&mut self, delta: &[Matrix], offset: usize) -> Result<()> {
        self.inner.correct_delta(delta, offset)
    }

    fn reset_record(&mut self) {
        if self.record.cursor() > 0 {
            debug!(
                "{} shadow drops {} recorded step(s)",
                self.inner.name(),
                self.record.cursor()
            );
        }
        self.record.reset();
        self.policy.reset_record();
        self.inner.reset_record();
    }

    fn snapshot(&self) -> Vec<Cache> {
        self.inner.snapshot()
    }

    fn restore(&mut self, snapshot: &[Cache]) -> Result<usize> {
        self.inner.restore(snapshot)
    }

    fn cache(&self) -> &Cache {
        self.inner.cache()
    }

    fn cache_mut(&mut self) -> &mut Cache {
        self.inner.cache_mut()
    }
}
