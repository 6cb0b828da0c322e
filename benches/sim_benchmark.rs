//! Benchmarks for running complete simulations.

#![allow(missing_docs)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use hivelog::{MaintenanceOrder, SimConfig, run_sim};

fn bench_single_sim(c: &mut Criterion) {
    let config = SimConfig::default();

    c.bench_function("single_sim_default", |b| {
        b.iter(|| {
            let result = run_sim(black_box(42), black_box(&config));
            black_box(result)
        });
    });
}

fn bench_maintenance_last(c: &mut Criterion) {
    let config = SimConfig {
        maintenance_order: MaintenanceOrder::Last,
        ..SimConfig::default()
    };

    c.bench_function("single_sim_maintenance_last", |b| {
        b.iter(|| black_box(run_sim(black_box(42), black_box(&config))));
    });
}

fn bench_sim_batch(c: &mut Criterion) {
    // 10 short runs sequentially (without parallel overhead)
    let config = SimConfig {
        ticks: 50,
        ..SimConfig::default()
    };

    c.bench_function("10_sims_sequential", |b| {
        b.iter(|| {
            for seed in 0..10u64 {
                let _ = black_box(run_sim(black_box(seed), black_box(&config)));
            }
        });
    });
}

criterion_group!(benches, bench_single_sim, bench_maintenance_last, bench_sim_batch);
criterion_main!(benches);
