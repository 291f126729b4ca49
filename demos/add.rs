//! Learns 8-bit binary addition one bit at a time, least significant first.

use log::info;
use penumbra_nn::{Activation, ActivationFunction, Linear, Matrix, RecurrentChain, Recurrence};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const BITS: usize = 8;

/// Bit `i` of `x`, least significant first.
fn bit(x: usize, i: usize) -> f64 {
    ((x >> i) & 1) as f64
}

fn decode(bits: &[f64]) -> usize {
    bits.iter().enumerate().map(|(i, &b)| if b > 0.5 { 1 << i } else { 0 }).sum()
}

/// Runs one addition through the network, returning the raw output bits.
fn run(net: &mut RecurrentChain, a: usize, b: usize) -> penumbra_nn::Result<Vec<Matrix>> {
    (0..BITS)
        .map(|i| net.predict(&Matrix::from_rows(vec![vec![bit(a, i), bit(b, i)]])?))
        .collect()
}

fn main() -> penumbra_nn::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(7);
    let hidden = 16;
    let mut net = RecurrentChain::new();
    net.add_layer(Linear::new(&mut rng, 1, 2, hidden, 0.5, 0.0, false))
        .add_recurrent_layer(
            Activation::new(1, hidden, ActivationFunction::Sigmoid),
            Recurrence::BasicRecurrence,
            &mut rng,
        )
        .add_layer(Linear::new(&mut rng, 1, hidden, 1, 0.5, 0.0, false))
        .add_recurrent_layer(
            Activation::new(1, 1, ActivationFunction::Sigmoid),
            Recurrence::OutputRecord,
            &mut rng,
        );

    let mut wrong = 0;
    for example in 1..=20000 {
        let (a, b) = (rng.gen_range(0..128), rng.gen_range(0..128));
        let c = a + b;

        net.predict_restart();
        let outputs = run(&mut net, a, b)?;
        for i in (0..BITS).rev() {
            net.learn(&outputs[i], &Matrix::filled(1, 1, bit(c, i)))?;
        }
        net.update(0.1)?;

        let bits: Vec<f64> = outputs.iter().map(|m| m.get(0, 0)).collect::<penumbra_nn::Result<_>>()?;
        if decode(&bits) != c {
            wrong += 1;
        }
        if example % 1000 == 0 {
            info!("examples {example:>5}: error {:.2}%, last {a} + {b} -> {}", wrong as f64 / 10.0, decode(&bits));
            wrong = 0;
        }
    }

    let trials = 20000;
    let mut wrong = 0;
    for _ in 0..trials {
        let (a, b) = (rng.gen_range(0..128), rng.gen_range(0..128));
        net.predict_restart();
        let bits: Vec<f64> = run(&mut net, a, b)?
            .iter()
            .map(|m| m.get(0, 0))
            .collect::<penumbra_nn::Result<_>>()?;
        if decode(&bits) != a + b {
            wrong += 1;
        }
    }
    info!("test error: {:.2}%", 100.0 * wrong as f64 / trials as f64);
    Ok(())
}
