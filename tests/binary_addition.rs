use penumbra_nn::{Activation, ActivationFunction, Linear, Matrix, RecurrentChain, Recurrence};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BITS: usize = 8;

fn bit(x: usize, i: usize) -> f64 {
    ((x >> i) & 1) as f64
}

fn decode(outputs: &[Matrix]) -> usize {
    outputs
        .iter()
        .enumerate()
        .map(|(i, m)| if m.get(0, 0).unwrap() > 0.5 { 1 << i } else { 0 })
        .sum()
}

fn unroll(net: &mut RecurrentChain, a: usize, b: usize) -> Vec<Matrix> {
    (0..BITS)
        .map(|i| net.predict(&Matrix::from_rows(vec![vec![bit(a, i), bit(b, i)]]).unwrap()).unwrap())
        .collect()
}

fn adder(rng: &mut StdRng) -> RecurrentChain {
    let hidden = 16;
    let mut net = RecurrentChain::new();
    net.add_layer(Linear::new(rng, 1, 2, hidden, 0.5, 0.0, false))
        .add_recurrent_layer(Activation::new(1, hidden, ActivationFunction::Sigmoid), Recurrence::BasicRecurrence, rng)
        .add_layer(Linear::new(rng, 1, hidden, 1, 0.5, 0.0, false))
        .add_recurrent_layer(Activation::new(1, 1, ActivationFunction::Sigmoid), Recurrence::OutputRecord, rng);
    net
}

#[test]
fn recurrent_chain_learns_binary_addition() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut net = adder(&mut rng);

    for _ in 0..20000 {
        let (a, b) = (rng.gen_range(0..128), rng.gen_range(0..128));
        let c = a + b;
        net.predict_restart();
        let outputs = unroll(&mut net, a, b);
        for i in (0..BITS).rev() {
            net.learn(&outputs[i], &Matrix::filled(1, 1, bit(c, i))).unwrap();
        }
        net.update(0.1).unwrap();
    }

    let trials = 2000;
    let mut wrong = 0;
    for _ in 0..trials {
        let (a, b) = (rng.gen_range(0..128), rng.gen_range(0..128));
        net.predict_restart();
        if decode(&unroll(&mut net, a, b)) != a + b {
            wrong += 1;
        }
    }
    let rate = wrong as f64 / trials as f64;
    assert!(rate < 0.5, "test error rate {rate}");
}

#[test]
fn partial_unwind_keeps_weights() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut net = adder(&mut rng);
    let reference = unroll(&mut net, 3, 5);

    net.predict_restart();
    let outputs = unroll(&mut net, 3, 5);
    for i in (4..BITS).rev() {
        net.learn(&outputs[i], &Matrix::filled(1, 1, 1.0)).unwrap();
    }
    net.update(0.5).unwrap();

    net.predict_restart();
    assert_eq!(unroll(&mut net, 3, 5), reference);
}
