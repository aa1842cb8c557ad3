use denfit::density::{Density, DiscreteDensity, NormalDensity, Univariate};
use env_logger::Builder;
use log::info;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::{collections::BTreeMap, io::prelude::*};

fn main() {
    Builder::new()
        .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
        .filter(None, log::LevelFilter::Info)
        .init();

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(100);

    // Stream batches drawn from a hidden source through the accumulator and
    // commit a single update at the end.
    let source = Normal::new(3.0_f64, 0.75).unwrap();
    let mut pdf: Univariate<f64> = NormalDensity::new(0.0, 1.0).unwrap();

    for batch_idx in 0..10 {
        let batch = (0..1_000)
            .map(|_| source.sample(&mut rng))
            .collect::<Vec<f64>>();

        pdf.summarize(&batch, None).unwrap();

        info!("batch {} summarized", batch_idx);
    }

    pdf.fit_from_summaries(0.0).unwrap();

    match &pdf {
        Univariate::Normal(normal) => info!(
            "committed normal estimate: mean={:.4} std_dev={:.4}",
            normal.mean(),
            normal.std_dev()
        ),
        _ => unreachable!(),
    }

    // The same protocol over categorical observations, blended against the
    // previous state with an inertia of 0.5.
    let mut labels =
        DiscreteDensity::new(BTreeMap::from([("hot", 0.5_f64), ("cold", 0.5)])).unwrap();

    labels
        .fit(&["hot", "hot", "hot", "cold"], None, 0.5)
        .unwrap();

    for (category, probability) in labels.probabilities() {
        info!("P({}) = {:.4}", category, probability);
    }
}
