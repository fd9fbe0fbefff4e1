// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Arithmetic Mean Aggregator
// ─────────────────────────────────────────────────────────────────────
//! Plain per-column mean across the stack, e.g. torque averaged over
//! rotor positions. Linear, so the tangent ignores `data` and the
//! adjoint spreads the seed evenly over the stack.

use multipoint_types::config::{validate_num_pts, validate_size};
use multipoint_types::{AggregationResult, MultipointStack};

use crate::aggregator::{
    check_adjoint_args, check_points, check_stack, check_tangent_args, seed_at,
    MultipointAggregator,
};

#[derive(Debug, Clone)]
pub struct ArithmeticMeanAggregator {
    num_pts: usize,
    size: usize,
}

impl ArithmeticMeanAggregator {
    pub fn new(num_pts: usize, size: usize) -> AggregationResult<Self> {
        validate_num_pts(num_pts)?;
        validate_size(size)?;
        log::debug!("arithmetic_mean: N={num_pts}, P={size}");
        Ok(Self { num_pts, size })
    }
}

/// `out = Σ_i rows[i] / N`, overwriting `out`.
fn column_mean(stack: &MultipointStack, out: &mut [f64]) {
    out.fill(0.0);
    for row in stack.rows() {
        for (o, &v) in out.iter_mut().zip(row) {
            *o += v;
        }
    }
    let n = stack.num_pts() as f64;
    for o in out.iter_mut() {
        *o /= n;
    }
}

impl MultipointAggregator for ArithmeticMeanAggregator {
    fn name(&self) -> &'static str {
        "arithmetic_mean"
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
        column_mean(data, out);
        Ok(())
    }

    fn tangent_into(
        &self,
        data: &MultipointStack,
        data_dot: &MultipointStack,
        out: &mut [f64],
    ) -> AggregationResult<()> {
        check_tangent_args(self, data, data_dot, out)?;
        column_mean(data_dot, out);
        Ok(())
    }

    fn adjoint_into(
        &self,
        data: &MultipointStack,
        seed: Option<&[f64]>,
        out: &mut MultipointStack,
    ) -> AggregationResult<()> {
        check_adjoint_args(self, data, seed, out)?;
        let n = self.num_pts as f64;
        for i in 0..self.num_pts {
            for (p, v) in out.row_mut(i).iter_mut().enumerate() {
                *v = seed_at(seed, p) / n;
            }
        }
        Ok(())
    }
}
