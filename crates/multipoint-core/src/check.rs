// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Derivative Verification
// ─────────────────────────────────────────────────────────────────────
//! Central-difference checks for tangent and adjoint implementations,
//! and the tangent/adjoint inner-product identity
//! `⟨tangent(D, u), v⟩ == ⟨u, adjoint(D, v)⟩`.

use serde::{Deserialize, Serialize};

use multipoint_types::{AggregationResult, MultipointStack};

use crate::aggregator::{check_points, check_stack, MultipointAggregator};
use crate::linalg::dot;

/// Minimal xorshift64 RNG for perturbation directions (no external dep).
#[derive(Debug, Clone)]
pub struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0xDEAD_BEEF_CAFE_BABE } else { seed },
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in [-amplitude, amplitude).
    pub fn next_signed(&mut self, amplitude: f64) -> f64 {
        (2.0 * self.next_f64() - 1.0) * amplitude
    }

    pub fn vec(&mut self, len: usize, amplitude: f64) -> Vec<f64> {
        (0..len).map(|_| self.next_signed(amplitude)).collect()
    }

    pub fn stack(&mut self, num_pts: usize, size: usize, amplitude: f64) -> MultipointStack {
        MultipointStack::from_flat(num_pts, size, self.vec(num_pts * size, amplitude))
            .unwrap_or_else(|_| MultipointStack::zeros(num_pts, size))
    }
}

/// Central-difference directional derivative along `data_dot`.
pub fn fd_tangent(
    agg: &dyn MultipointAggregator,
    data: &MultipointStack,
    data_dot: &MultipointStack,
    eps: f64,
) -> AggregationResult<Vec<f64>> {
    check_stack(agg, data)?;
    check_stack(agg, data_dot)?;

    let mut probe = data.clone();
    for (x, (d, u)) in probe
        .as_mut_slice()
        .iter_mut()
        .zip(data.as_slice().iter().zip(data_dot.as_slice()))
    {
        *x = d + eps * u;
    }
    let plus = agg.evaluate(&probe)?;
    for (x, (d, u)) in probe
        .as_mut_slice()
        .iter_mut()
        .zip(data.as_slice().iter().zip(data_dot.as_slice()))
    {
        *x = d - eps * u;
    }
    let minus = agg.evaluate(&probe)?;

    Ok(plus
        .iter()
        .zip(&minus)
        .map(|(p, m)| (p - m) / (2.0 * eps))
        .collect())
}

/// Central-difference estimate of the Jacobian-transpose action of
/// `seed` (all-ones when `None`), one stack entry at a time.
///
/// Every column only depends on its own stack column, so entry
/// `(i, p)` is `seed[p] · ∂A[p]/∂D[i, p]`.
pub fn fd_adjoint(
    agg: &dyn MultipointAggregator,
    data: &MultipointStack,
    seed: Option<&[f64]>,
    eps: f64,
) -> AggregationResult<MultipointStack> {
    check_stack(agg, data)?;
    if let Some(s) = seed {
        check_points("seed length", agg.size(), s)?;
    }

    let (n, size) = (agg.num_pts(), agg.size());
    let mut grad = MultipointStack::zeros(n, size);
    let mut probe = data.clone();

    for i in 0..n {
        for p in 0..size {
            let x0 = data.get(i, p);
            probe.set(i, p, x0 + eps);
            let plus = agg.evaluate(&probe)?;
            probe.set(i, p, x0 - eps);
            let minus = agg.evaluate(&probe)?;
            probe.set(i, p, x0); // restore

            let s = seed.map_or(1.0, |s| s[p]);
            grad.set(i, p, s * (plus[p] - minus[p]) / (2.0 * eps));
        }
    }

    Ok(grad)
}

/// Outcome of one tangent/adjoint inner-product comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DualityReport {
    /// `⟨tangent(D, u), v⟩`
    pub forward: f64,
    /// `⟨u, adjoint(D, v)⟩`
    pub reverse: f64,
}

impl DualityReport {
    pub fn abs_error(&self) -> f64 {
        (self.forward - self.reverse).abs()
    }

    pub fn rel_error(&self) -> f64 {
        self.abs_error() / self.forward.abs().max(self.reverse.abs()).max(1e-300)
    }

    pub fn passes(&self, rel_tol: f64, abs_tol: f64) -> bool {
        self.abs_error() <= abs_tol || self.rel_error() <= rel_tol
    }
}

/// Draw a random perturbation `u` and seed `v` and compare both sides
/// of the inner-product identity.
pub fn check_duality(
    agg: &dyn MultipointAggregator,
    data: &MultipointStack,
    rng_seed: u64,
) -> AggregationResult<DualityReport> {
    check_stack(agg, data)?;
    let mut rng = SimpleRng::new(rng_seed);
    let u = rng.stack(agg.num_pts(), agg.size(), 1.0);
    let v = rng.vec(agg.size(), 1.0);

    let forward = dot(&agg.tangent(data, &u)?, &v);
    let reverse = u.dot(&agg.adjoint(data, Some(&v))?)?;

    let report = DualityReport { forward, reverse };
    log::debug!(
        "{}: duality forward={:.6e} reverse={:.6e} rel={:.3e}",
        agg.name(),
        report.forward,
        report.reverse,
        report.rel_error()
    );
    Ok(report)
}
