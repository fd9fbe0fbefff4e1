// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregator Contract
// ─────────────────────────────────────────────────────────────────────
//! Common contract for all aggregators plus the config-driven factory.
//!
//! Every aggregator reduces an `N × P` stack to one length-`P` array and
//! offers the forward (tangent) and reverse (adjoint) derivative of that
//! reduction against the same stack.

use multipoint_types::{
    AggregationError, AggregationResult, AggregatorConfig, AggregatorKind, MultipointStack,
};

use crate::harmonic::HarmonicFitAggregator;
use crate::induced_exp::InducedExponentialAggregator;
use crate::mean::ArithmeticMeanAggregator;

/// Differentiable reduction of a multipoint stack.
///
/// Implementations hold configuration only. Each `_into` call overwrites
/// its whole output buffer, so buffers can be reused across iterations.
/// A call that returns an error leaves its output buffer as it was.
pub trait MultipointAggregator: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Configured stack length N.
    fn num_pts(&self) -> usize;

    /// Configured per-point array length P.
    fn size(&self) -> usize;

    /// Aggregate `data` into `out` (length P).
    fn evaluate_into(&self, data: &MultipointStack, out: &mut [f64]) -> AggregationResult<()>;

    /// Directional derivative along `data_dot` into `out` (length P).
    fn tangent_into(
        &self,
        data: &MultipointStack,
        data_dot: &MultipointStack,
        out: &mut [f64],
    ) -> AggregationResult<()>;

    /// Jacobian-transpose action of `seed` (all-ones when `None`) into
    /// `out` (N × P).
    fn adjoint_into(
        &self,
        data: &MultipointStack,
        seed: Option<&[f64]>,
        out: &mut MultipointStack,
    ) -> AggregationResult<()>;

    fn evaluate(&self, data: &MultipointStack) -> AggregationResult<Vec<f64>> {
        let mut out = vec![0.0; self.size()];
        self.evaluate_into(data, &mut out)?;
        Ok(out)
    }

    fn tangent(
        &self,
        data: &MultipointStack,
        data_dot: &MultipointStack,
    ) -> AggregationResult<Vec<f64>> {
        let mut out = vec![0.0; self.size()];
        self.tangent_into(data, data_dot, &mut out)?;
        Ok(out)
    }

    fn adjoint(
        &self,
        data: &MultipointStack,
        seed: Option<&[f64]>,
    ) -> AggregationResult<MultipointStack> {
        let mut out = MultipointStack::zeros(self.num_pts(), self.size());
        self.adjoint_into(data, seed, &mut out)?;
        Ok(out)
    }
}

/// Reject a stack whose shape differs from the configured `N × P`.
#[inline]
pub fn check_stack(agg: &dyn MultipointAggregator, stack: &MultipointStack) -> AggregationResult<()> {
    stack.check_shape(agg.num_pts(), agg.size())
}

/// Reject a per-point array (seed or output) of the wrong length.
#[inline]
pub fn check_points(what: &'static str, expected: usize, values: &[f64]) -> AggregationResult<()> {
    if values.len() != expected {
        return Err(AggregationError::ShapeMismatch {
            what,
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

/// Seed value at point `p`; `None` stands for an all-ones seed.
#[inline]
pub(crate) fn seed_at(seed: Option<&[f64]>, p: usize) -> f64 {
    seed.map_or(1.0, |s| s[p])
}

/// Shape checks shared by every `adjoint_into`.
pub(crate) fn check_adjoint_args(
    agg: &dyn MultipointAggregator,
    data: &MultipointStack,
    seed: Option<&[f64]>,
    out: &MultipointStack,
) -> AggregationResult<()> {
    check_stack(agg, data)?;
    if let Some(s) = seed {
        check_points("seed length", agg.size(), s)?;
    }
    out.check_shape(agg.num_pts(), agg.size())
}

/// Shape checks shared by every `tangent_into`.
pub(crate) fn check_tangent_args(
    agg: &dyn MultipointAggregator,
    data: &MultipointStack,
    data_dot: &MultipointStack,
    out: &[f64],
) -> AggregationResult<()> {
    check_stack(agg, data)?;
    check_stack(agg, data_dot)?;
    check_points("output length", agg.size(), out)
}

/// Build the aggregator described by `config`.
pub fn build_aggregator(
    config: &AggregatorConfig,
) -> AggregationResult<Box<dyn MultipointAggregator>> {
    config.validate()?;
    let agg: Box<dyn MultipointAggregator> = match &config.kind {
        AggregatorKind::InducedExponential { rho, shift } => Box::new(
            InducedExponentialAggregator::with_shift(config.num_pts, config.size, *rho, *shift)?,
        ),
        AggregatorKind::ArithmeticMean => Box::new(ArithmeticMeanAggregator::new(
            config.num_pts,
            config.size,
        )?),
        AggregatorKind::HarmonicFit {
            angles,
            mode,
            frequency,
        } => Box::new(HarmonicFitAggregator::with_frequency(
            config.size,
            angles.clone(),
            *mode,
            *frequency,
        )?),
    };
    Ok(agg)
}
