// ABOUTME: Criterion benchmarks for the trend statistics hot paths
use benchwatch_core::trend::stats;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn series(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 150.0 + (i as f64 * 0.37).sin() * 12.0 + (i % 7) as f64)
        .collect()
}

fn bench_linear_regression(c: &mut Criterion) {
    let values = series(1000);
    c.bench_function("linear_regression_1k", |b| {
        b.iter(|| stats::linear_regression(black_box(&values)))
    });
}

fn bench_autocorrelation(c: &mut Criterion) {
    let values = series(1000);
    c.bench_function("autocorrelation_1k_lag10", |b| {
        b.iter(|| stats::autocorrelation(black_box(&values), 10))
    });
}

criterion_group!(benches, bench_linear_regression, bench_autocorrelation);
criterion_main!(benches);
