use criterion::{black_box, criterion_group, criterion_main, Criterion};

use catsim_core::model::{EstimationMethod, Item, ItemPool, StoppingRule};
use catsim_core::session::run_seeded_session;

fn bench_sessions(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");

    let small: Vec<f64> = (0..10).map(|i| -2.0 + 0.5 * i as f64).collect();
    let small = ItemPool::from_difficulties(&small).unwrap();

    let large = ItemPool::new(
        (0..300)
            .map(|i| Item::new(i + 1, -3.0 + 0.02 * i as f64, 0.8 + (i % 5) as f64 * 0.3))
            .collect(),
    )
    .unwrap();

    group.bench_function("fixed_7_of_10", |b| {
        b.iter(|| {
            run_seeded_session(
                black_box(&small),
                0.7,
                EstimationMethod::Mle,
                StoppingRule::FixedLength { length: 7 },
                42,
            )
        })
    });

    group.bench_function("target_sem_0.3_of_300_wle", |b| {
        b.iter(|| {
            run_seeded_session(
                black_box(&large),
                0.7,
                EstimationMethod::Wle,
                StoppingRule::TargetSem { target: 0.3 },
                42,
            )
        })
    });

    group.finish();
}

criterion_group!(benches, bench_sessions);
criterion_main!(benches);
