use criterion::{black_box, criterion_group, criterion_main, Criterion};
use denfit::density::{Density, MixtureDensity, NormalDensity, UniformDensity};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_xoshiro::Xoshiro256PlusPlus;

fn bench_scoring(c: &mut Criterion) {
    let pdf = MixtureDensity::new(
        vec![
            NormalDensity::new(-1.0_f64, 0.5).unwrap(),
            NormalDensity::new(1.5, 1.0).unwrap(),
            UniformDensity::new(-4.0, 4.0).unwrap(),
        ],
        Some(&[0.3, 0.5, 0.2]),
    )
    .unwrap();

    let grid = (0..1_000)
        .map(|idx| -4.0 + idx as f64 * 0.008)
        .collect::<Vec<f64>>();

    c.bench_function("mixture_log_probability_1k", |b| {
        b.iter(|| {
            grid.iter()
                .map(|x| pdf.log_probability(black_box(x)))
                .sum::<f64>()
        })
    });
}

fn bench_estimation(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let source = Normal::new(0.0_f64, 1.0).unwrap();

    let data = (0..10_000)
        .map(|_| source.sample(&mut rng))
        .collect::<Vec<f64>>();

    c.bench_function("normal_summarize_commit_10k", |b| {
        b.iter(|| {
            let mut pdf = NormalDensity::new(0.0_f64, 1.0).unwrap();

            pdf.summarize(black_box(&data), None).unwrap();
            pdf.fit_from_summaries(0.0).unwrap();
        })
    });
}

criterion_group!(benches, bench_scoring, bench_estimation);
criterion_main!(benches);
