use denfit::density::{Density, MixtureDensity, NormalDensity, UniformKernelDensity};
use env_logger::Builder;
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::io::prelude::*;

fn main() {
    Builder::new()
        .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
        .filter(None, log::LevelFilter::Info)
        .init();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);

    // A bimodal mixture of a parametric and a nonparametric component.
    let pdf = MixtureDensity::new(
        vec![
            NormalDensity::new(-2.0_f64, 0.5).unwrap(),
            UniformKernelDensity::new(vec![1.5, 2.0, 2.5], 0.75, None).unwrap(),
        ],
        Some(&[0.4, 0.6]),
    )
    .unwrap();

    for step in -8..=8 {
        let x = step as f64 * 0.5;

        info!("log p({:+.1}) = {:.4}", x, pdf.log_probability(&x));
    }

    let draws = (0..10)
        .map(|_| pdf.sample(&mut rng).unwrap())
        .collect::<Vec<f64>>();

    info!("draws: {:?}", draws);
}
