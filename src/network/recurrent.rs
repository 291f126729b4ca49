use rand::Rng;

use crate::error::Result;
use crate::layers::layer::{Cache, Layer};
use crate::math::matrix::Matrix;
use crate::network::chain::Chain;
use crate::shadow::policy::{DelayUpdate, Recurrence};
use crate::shadow::shadow::Shadow;

/// A [`Chain`] whose every member is wrapped in a [`Shadow`].
///
/// Call [`RecurrentChain::predict`] once per time step, then
/// [`RecurrentChain::learn`] once per step in reverse time order, then
/// [`RecurrentChain::update`]. Start each independent sequence with
/// [`RecurrentChain::predict_restart`].
#[derive(Debug, Default)]
pub struct RecurrentChain {
    chain: Chain,
}

impl RecurrentChain {
    pub fn new() -> RecurrentChain {
        RecurrentChain::default()
    }

    /// Adds `layer` with the default delayed-update input recording.
    pub fn add_layer<L: Layer + 'static>(&mut self, layer: L) -> &mut Self {
        let policy = Box::new(DelayUpdate::new(Recurrence::InputRecordDelayUpdate));
        self.chain.push_boxed(Box::new(Shadow::new(Box::new(layer), policy)));
        self
    }

    pub fn add_recurrent_layer<L, R>(&mut self, layer: L, kind: Recurrence, rng: &mut R) -> &mut Self
    where
        L: Layer + 'static,
        R: Rng + ?Sized,
    {
        self.chain.push_boxed(Box::new(Shadow::with_recurrence(layer, kind, rng)));
        self
    }

    pub(crate) fn add_recurrent_boxed<R: Rng + ?Sized>(
        &mut self,
        layer: Box<dyn Layer>,
        kind: Recurrence,
        rng: &mut R,
    ) -> &mut Self {
        let policy = kind.policy(layer.output_dim().1, rng);
        self.chain.push_boxed(Box::new(Shadow::new(layer, policy)));
        self
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn layer(&self, i: usize) -> Option<&dyn Layer> {
        self.chain.layer(i)
    }

    /// Forgets every recorded step so the next `predict` is time step 0.
    pub fn predict_restart(&mut self) -> &mut Self {
        self.chain.reset_record();
        self
    }

    pub fn predict(&mut self, input: &Matrix) -> Result<Matrix> {
        self.chain.predict(input)
    }

    pub fn learn(&mut self, predicted: &Matrix, expected: &Matrix) -> Result<&mut Self> {
        self.chain.learn(predicted, expected)?;
        Ok(self)
    }

    pub fn update(&mut self, rate: f64) -> Result<&mut Self> {
        self.chain.update(rate)?;
        Ok(self)
    }

    pub fn fit(&mut self, input: &Matrix, expected: &Matrix, rate: f64) -> Result<Matrix> {
        self.chain.fit(input, expected, rate)
    }

    pub fn error(&self, predicted: &Matrix, expected: &Matrix) -> Result<f64> {
        self.chain.error(predicted, expected)
    }
}

impl Layer for RecurrentChain {
    fn name(&self) -> &'static str {
        "RecurrentChain"
    }

    fn input_dim(&self) -> (usize, usize) {
        self.chain.input_dim()
    }

    fn output_dim(&self) -> (usize, usize) {
        self.chain.output_dim()
    }

    fn forward_prop(&mut self, input: &Matrix) -> Result<Matrix> {
        self.chain.forward_prop(input)
    }

    fn backward_prop(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.chain.backward_prop(output_grad)
    }

    fn backward_terminal(&mut self, output_grad: &Matrix) -> Result<Matrix> {
        self.chain.backward_terminal(output_grad)
    }

    fn params_update(&mut self, rate: f64) -> Result<()> {
        self.chain.params_update(rate)
    }

    fn delta_count(&self) -> usize {
        self.chain.delta_count()
    }

    fn delta(&self) -> Vec<Matrix> {
        self.chain.delta()
    }

    fn correct_delta(&mut self, delta: &[Matrix], offset: usize) -> Result<()> {
        self.chain.correct_delta(delta, offset)
    }

    fn reset_record(&mut self) {
        self.chain.reset_record();
    }

    fn snapshot(&self) -> Vec<Cache> {
        self.chain.snapshot()
    }

    fn restore(&mut self, snapshot: &[Cache]) -> Result<usize> {
        self.chain.restore(snapshot)
    }

    fn cache(&self) -> &Cache {
        self.chain.cache()
    }

    fn cache_mut(&mut self) -> &mut Cache {
        self.chain.cache_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationFunction;
    use crate::layers::{Activation, Linear};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn network(rng: &mut StdRng) -> RecurrentChain {
        let mut net = RecurrentChain::new();
        net.add_layer(Linear::new(rng, 1, 2, 4, 0.5, 0.0, false))
            .add_recurrent_layer(Activation::new(1, 4, ActivationFunction::Sigmoid), Recurrence::BasicRecurrence, rng)
            .add_layer(Linear::new(rng, 1, 4, 1, 0.5, 0.0, false))
            .add_recurrent_layer(Activation::new(1, 1, ActivationFunction::Sigmoid), Recurrence::OutputRecord, rng);
        net
    }

    #[test]
    fn every_layer_is_shadowed() {
        let net = network(&mut StdRng::seed_from_u64(1));
        assert_eq!(net.len(), 4);
        for i in 0..4 {
            assert_eq!(net.layer(i).unwrap().name(), "Shadow");
        }
        assert_eq!(net.input_dim(), (1, 2));
        assert_eq!(net.output_dim(), (1, 1));
    }

    #[test]
    fn outputs_depend_on_earlier_steps() {
        let mut net = network(&mut StdRng::seed_from_u64(2));
        let x = Matrix::from_rows(vec![vec![1.0, 1.0]]).unwrap();
        let first = net.predict(&x).unwrap();
        let second = net.predict(&x).unwrap();
        assert_ne!(first, second);

        net.predict_restart();
        assert_eq!(net.predict(&x).unwrap(), first);
    }

    #[test]
    fn update_waits_for_the_full_unwind() {
        let mut net = network(&mut StdRng::seed_from_u64(3));
        let x = Matrix::from_rows(vec![vec![1.0, 0.0]]).unwrap();
        let target = Matrix::filled(1, 1, 1.0);
        let p0 = net.predict(&x).unwrap();
        let p1 = net.predict(&x).unwrap();

        net.learn(&p1, &target).unwrap().update(1.0).unwrap();
        net.predict_restart();
        assert_eq!(net.predict(&x).unwrap(), p0);

        net.predict_restart();
        net.predict(&x).unwrap();
        net.predict(&x).unwrap();
        net.learn(&p1, &target).unwrap();
        net.learn(&p0, &target).unwrap();
        net.update(1.0).unwrap();
        assert_ne!(net.predict(&x).unwrap(), p0);
    }

    #[test]
    fn chain_member_sums_per_step_deltas() {
        let member = || {
            let mut rng = StdRng::seed_from_u64(6);
            let mut chain = Chain::new();
            chain
                .add_layer(Linear::new(&mut rng, 1, 2, 2, 0.5, 0.0, false))
                .add_layer(Linear::new(&mut rng, 1, 2, 1, 0.5, 0.0, false));
            chain
        };
        let inputs = [
            Matrix::from_rows(vec![vec![1.0, 0.0]]).unwrap(),
            Matrix::from_rows(vec![vec![0.0, 2.0]]).unwrap(),
        ];
        let (zero, one) = (Matrix::zeros(1, 1), Matrix::filled(1, 1, 1.0));

        let mut net = RecurrentChain::new();
        net.add_layer(member());
        for x in &inputs {
            net.predict(x).unwrap();
        }
        net.learn(&zero, &one).unwrap().learn(&zero, &one).unwrap();
        net.update(0.0).unwrap();

        // The same member run once per step, outside any recurrence.
        let mut expected = member().delta();
        for x in &inputs {
            let mut plain = member();
            plain.predict(x).unwrap();
            plain.learn(&zero, &one).unwrap();
            for (sum, d) in expected.iter_mut().zip(plain.delta()) {
                *sum = sum.add(&d, 1.0, 1.0).unwrap();
            }
        }
        let summed = net.delta();
        assert_eq!(summed.len(), 2);
        for (got, want) in summed.iter().zip(&expected) {
            assert!(got.approx_eq(want, 1e-12), "{got} vs {want}");
        }
    }
}
