// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Induced Exponential Aggregator (smooth maximum)
// ─────────────────────────────────────────────────────────────────────
//! Discrete induced-exponential functional, a differentiable
//! approximation of the per-column maximum across the stack:
//!
//!   W[i,p] = exp(ρ (D[i,p] - m))
//!   A[p]   = Σ_i D[i,p] W[i,p] / Σ_i W[i,p]
//!
//! `m` is a stability shift that cancels out of the ratio. By default it
//! is the single maximum over the whole stack; `ExpShift::PerColumn`
//! uses each column's own maximum instead.
//!
//! `A` is non-decreasing in ρ (its ρ-derivative is the W-weighted
//! variance of the column) and tends to the column maximum as ρ → ∞.

use multipoint_types::config::{validate_num_pts, validate_rho, validate_size};
use multipoint_types::{AggregationError, AggregationResult, ExpShift, MultipointStack};

use crate::aggregator::{
    check_adjoint_args, check_points, check_stack, check_tangent_args, seed_at,
    MultipointAggregator,
};

#[derive(Debug, Clone)]
pub struct InducedExponentialAggregator {
    num_pts: usize,
    size: usize,
    rho: f64,
    shift: ExpShift,
}

/// Intermediates of one forward pass, reused by both derivative modes.
struct Forward {
    /// N × P, row-major.
    weights: Vec<f64>,
    num: Vec<f64>,
    denom: Vec<f64>,
    /// Common value of each all-equal column.
    constant: Vec<Option<f64>>,
}

impl InducedExponentialAggregator {
    pub fn new(num_pts: usize, size: usize, rho: f64) -> AggregationResult<Self> {
        Self::with_shift(num_pts, size, rho, ExpShift::Global)
    }

    pub fn with_shift(
        num_pts: usize,
        size: usize,
        rho: f64,
        shift: ExpShift,
    ) -> AggregationResult<Self> {
        validate_num_pts(num_pts)?;
        validate_size(size)?;
        validate_rho(rho)?;
        log::debug!("induced_exponential: N={num_pts}, P={size}, rho={rho}, shift={shift:?}");
        Ok(Self {
            num_pts,
            size,
            rho,
            shift,
        })
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub fn shift(&self) -> ExpShift {
        self.shift
    }

    fn forward(&self, data: &MultipointStack) -> AggregationResult<Forward> {
        data.ensure_finite("induced_exponential data")?;

        let (n, size, rho) = (self.num_pts, self.size, self.rho);
        let mut shifts = vec![0.0; size];
        match self.shift {
            ExpShift::Global => shifts.fill(data.max_value()),
            ExpShift::PerColumn => {
                shifts.fill(f64::NEG_INFINITY);
                for row in data.rows() {
                    for (m, &d) in shifts.iter_mut().zip(row) {
                        *m = m.max(d);
                    }
                }
            }
        }
        // All-equal columns are shifted onto themselves, so their weights
        // are exactly 1 whatever the global maximum.
        let constant: Vec<Option<f64>> = (0..size).map(|p| constant_column(data, p)).collect();
        for (m, c) in shifts.iter_mut().zip(&constant) {
            if let Some(v) = c {
                *m = *v;
            }
        }

        let mut weights = vec![0.0; n * size];
        let mut num = vec![0.0; size];
        let mut denom = vec![0.0; size];
        for i in 0..n {
            let row = data.row(i);
            let w_row = &mut weights[i * size..(i + 1) * size];
            for p in 0..size {
                let w = (rho * (row[p] - shifts[p])).exp();
                w_row[p] = w;
                num[p] += row[p] * w;
                denom[p] += w;
            }
        }

        for p in 0..size {
            let collapsed = denom[p] == 0.0 || !denom[p].is_finite() || !num[p].is_finite();
            if collapsed && constant[p].is_none() {
                log::warn!(
                    "induced_exponential: weights collapsed at point {p} \
                     (denom={:.3e}, rho={rho}, shift={:.6e})",
                    denom[p],
                    shifts[p]
                );
                return Err(AggregationError::NumericOverflow(format!(
                    "exponential weights at point {p} sum to {:e} (rho={rho}); \
                     column lies too far below the shift {:e}",
                    denom[p], shifts[p]
                )));
            }
        }

        Ok(Forward {
            weights,
            num,
            denom,
            constant,
        })
    }
}

/// Common value of column `p` if every stack entry is equal.
fn constant_column(data: &MultipointStack, p: usize) -> Option<f64> {
    let first = data.get(0, p);
    (1..data.num_pts())
        .all(|i| data.get(i, p) == first)
        .then_some(first)
}

impl MultipointAggregator for InducedExponentialAggregator {
    fn name(&self) -> &'static str {
        "induced_exponential"
    }

    fn num_pts(&self) -> usize {
        self.num_pts
    }

    fn size(&self) -> usize {
        self.size
    }

    fn evaluate_into(&self, data: &MultipointStack, out: &mut [f64]) -> AggregationResult<()> {
        check_stack(self, data)?;
        check_points("output length", self.size, out)?;
        let fwd = self.forward(data)?;
        for (p, o) in out.iter_mut().enumerate() {
            *o = fwd.constant[p].unwrap_or(fwd.num[p] / fwd.denom[p]);
        }
        Ok(())
    }

    fn tangent_into(
        &self,
        data: &MultipointStack,
        data_dot: &MultipointStack,
        out: &mut [f64],
    ) -> AggregationResult<()> {
        check_tangent_args(self, data, data_dot, out)?;
        data_dot.ensure_finite("induced_exponential perturbation")?;
        let fwd = self.forward(data)?;
        let (size, rho) = (self.size, self.rho);

        let mut num_dot = vec![0.0; size];
        let mut denom_dot = vec![0.0; size];
        for i in 0..self.num_pts {
            let row = data.row(i);
            let dot_row = data_dot.row(i);
            let w_row = &fwd.weights[i * size..(i + 1) * size];
            for p in 0..size {
                let w_dot = rho * w_row[p] * dot_row[p];
                num_dot[p] += w_row[p] * dot_row[p] + row[p] * w_dot;
                denom_dot[p] += w_dot;
            }
        }

        let n = self.num_pts as f64;
        for (p, o) in out.iter_mut().enumerate() {
            let denom = fwd.denom[p];
            *o = if fwd.constant[p].is_some() {
                // Uniform weights: the smooth max moves with the mean
                (0..self.num_pts).map(|i| data_dot.get(i, p)).sum::<f64>() / n
            } else {
                num_dot[p] / denom - fwd.num[p] * denom_dot[p] / (denom * denom)
            };
        }
        Ok(())
    }

    fn adjoint_into(
        &self,
        data: &MultipointStack,
        seed: Option<&[f64]>,
        out: &mut MultipointStack,
    ) -> AggregationResult<()> {
        check_adjoint_args(self, data, seed, out)?;
        let fwd = self.forward(data)?;
        let (size, rho) = (self.size, self.rho);

        // A = num / denom
        let mut num_bar = vec![0.0; size];
        let mut denom_bar = vec![0.0; size];
        for p in 0..size {
            let a_bar = seed_at(seed, p);
            let denom = fwd.denom[p];
            num_bar[p] = a_bar / denom;
            denom_bar[p] = -a_bar * fwd.num[p] / (denom * denom);
        }

        // num = Σ D W, denom = Σ W, W = exp(ρ (D - m))
        for i in 0..self.num_pts {
            let row = data.row(i);
            let w_row = &fwd.weights[i * size..(i + 1) * size];
            let bar_row = out.row_mut(i);
            for p in 0..size {
                if fwd.constant[p].is_some() {
                    bar_row[p] = seed_at(seed, p) / self.num_pts as f64;
                    continue;
                }
                let w_bar = denom_bar[p] + num_bar[p] * row[p];
                bar_row[p] = num_bar[p] * w_row[p] + w_bar * rho * w_row[p];
            }
        }
        Ok(())
    }
}
