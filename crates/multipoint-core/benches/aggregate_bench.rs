// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregation Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the aggregation hot paths.
//!
//! Stack shape mirrors a torque-ripple study: N rotor positions times a
//! P-point field. Output buffers are reused across iterations the way an
//! optimizer loop reuses them.

use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use multipoint_core::linalg::{LuFactors, QrFactors};
use multipoint_core::{
    ArithmeticMeanAggregator, HarmonicFitAggregator, HarmonicMode, InducedExponentialAggregator,
    MultipointAggregator, MultipointStack, SimpleRng,
};

const N: usize = 8;
const P: usize = 4096;

// ── Helpers ───────────────────────────────────────────────────────────

fn make_stack(seed: u64) -> MultipointStack {
    SimpleRng::new(seed).stack(N, P, 2.0)
}

fn make_seed() -> Vec<f64> {
    SimpleRng::new(5).vec(P, 1.0)
}

fn make_angles(n: usize) -> Vec<f64> {
    (0..n).map(|i| 2.0 * PI * i as f64 / n as f64).collect()
}

fn make_design(n: usize) -> Vec<f64> {
    make_angles(n)
        .iter()
        .flat_map(|&t| [1.0, t.sin(), t.cos()])
        .collect()
}

fn bench_aggregator(c: &mut Criterion, label: &str, agg: &dyn MultipointAggregator) {
    let data = SimpleRng::new(1).stack(agg.num_pts(), P, 2.0);
    let data_dot = SimpleRng::new(2).stack(agg.num_pts(), P, 1.0);
    let seed = make_seed();
    let mut out = vec![0.0; P];
    let mut bar = MultipointStack::zeros(agg.num_pts(), P);

    c.bench_function(&format!("{label}_evaluate"), |b| {
        b.iter(|| agg.evaluate_into(black_box(&data), &mut out))
    });
    c.bench_function(&format!("{label}_tangent"), |b| {
        b.iter(|| agg.tangent_into(black_box(&data), black_box(&data_dot), &mut out))
    });
    c.bench_function(&format!("{label}_adjoint"), |b| {
        b.iter(|| agg.adjoint_into(black_box(&data), Some(&seed), &mut bar))
    });
}

// ── Aggregator benchmarks ────────────────────────────────────────────

fn bench_induced_exponential(c: &mut Criterion) {
    let Ok(agg) = InducedExponentialAggregator::new(N, P, 10.0) else {
        return;
    };
    bench_aggregator(c, "induced_exp_8x4096", &agg);
}

fn bench_arithmetic_mean(c: &mut Criterion) {
    let Ok(agg) = ArithmeticMeanAggregator::new(N, P) else {
        return;
    };
    bench_aggregator(c, "mean_8x4096", &agg);
}

fn bench_harmonic_exact(c: &mut Criterion) {
    let Ok(agg) = HarmonicFitAggregator::new(P, make_angles(3), HarmonicMode::Maximum) else {
        return;
    };
    bench_aggregator(c, "harmonic_exact_3x4096", &agg);
}

fn bench_harmonic_least_squares(c: &mut Criterion) {
    let Ok(agg) = HarmonicFitAggregator::new(P, make_angles(N), HarmonicMode::Maximum) else {
        return;
    };
    bench_aggregator(c, "harmonic_lsq_8x4096", &agg);
}

fn bench_harmonic_construction(c: &mut Criterion) {
    c.bench_function("harmonic_new_8_angles", |b| {
        b.iter(|| {
            HarmonicFitAggregator::new(P, black_box(make_angles(N)), HarmonicMode::Amplitude)
        })
    });
}

// ── Linear algebra benchmarks ────────────────────────────────────────

fn bench_lu_factor(c: &mut Criterion) {
    let a = make_design(3);
    c.bench_function("lu_factor_3x3", |b| b.iter(|| LuFactors::factor(black_box(&a), 3)));
}

fn bench_qr_factor(c: &mut Criterion) {
    let a = make_design(N);
    c.bench_function("qr_factor_8x3", |b| {
        b.iter(|| QrFactors::factor(black_box(&a), N, 3))
    });
}

fn bench_qr_least_squares(c: &mut Criterion) {
    let Ok(qr) = QrFactors::factor(&make_design(N), N, 3) else {
        return;
    };
    let rhs = make_stack(3).row(0)[..N].to_vec();
    let mut b_scratch = vec![0.0; N];
    let mut x = [0.0; 3];
    c.bench_function("qr_least_squares_8x3", |b| {
        b.iter(|| {
            b_scratch.copy_from_slice(&rhs);
            qr.least_squares(black_box(&mut b_scratch), &mut x);
        })
    });
}

criterion_group!(
    aggregators,
    bench_induced_exponential,
    bench_arithmetic_mean,
    bench_harmonic_exact,
    bench_harmonic_least_squares,
    bench_harmonic_construction,
);

criterion_group!(linalg, bench_lu_factor, bench_qr_factor, bench_qr_least_squares,);

criterion_main!(aggregators, linalg);
