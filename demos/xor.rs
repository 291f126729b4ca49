use log::info;
use penumbra_nn::{Activation, ActivationFunction, Chain, Linear, Matrix};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() -> penumbra_nn::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(42);
    let mut chain = Chain::new();
    chain
        .add_layer(Linear::new(&mut rng, 1, 2, 16, 0.5, 0.0, true))
        .add_layer(Activation::new(1, 16, ActivationFunction::Sigmoid))
        .add_layer(Linear::new(&mut rng, 1, 16, 1, 0.5, 0.0, true))
        .add_layer(Activation::new(1, 1, ActivationFunction::Sigmoid));

    let inputs = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let expected = [0.0, 1.0, 1.0, 0.0];
    let samples = 20000;
    let rate = 0.2;

    let mut running = 0.0;
    for step in 0..samples {
        let k = rng.gen_range(0..inputs.len());
        let x = Matrix::from_rows(vec![inputs[k].to_vec()])?;
        let y = Matrix::filled(1, 1, expected[k]);
        let predicted = chain.fit(&x, &y, rate)?;
        running += chain.error(&predicted, &y)?;
        if (step + 1) % 2000 == 0 {
            info!("step {:>5}: mean abs error = {:.6}", step + 1, running / 2000.0);
            running = 0.0;
        }
    }

    let mut wrong = 0;
    for _ in 0..samples {
        let k = rng.gen_range(0..inputs.len());
        let out = chain.predict(&Matrix::from_rows(vec![inputs[k].to_vec()])?)?;
        if (out.get(0, 0)? > 0.5) != (expected[k] > 0.5) {
            wrong += 1;
        }
    }
    info!("replay error rate: {:.2}%", 100.0 * wrong as f64 / samples as f64);

    for (input, _) in inputs.iter().zip(expected) {
        let out = chain.predict(&Matrix::from_rows(vec![input.to_vec()])?)?;
        println!("Input: {:?} -> Output: {:.4}", input, out.get(0, 0)?);
    }
    Ok(())
}
