// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Harmonic Fit Aggregator (periodic envelope)
// ─────────────────────────────────────────────────────────────────────
//! Per-point single-harmonic fit over the phase angles of the stack:
//!
//!   f(θ) = f0 + A sin(ωθ) + B cos(ωθ)
//!
//! solved exactly for N = 3 and in the least-squares sense for N > 3.
//! The design matrix depends only on the angles, so it is factored once
//! at construction and reused for every point, forward and transposed.
//!
//! The adjoint never differentiates a matrix inverse: the coefficient
//! seed from the reported quantity is pushed back through the
//! transposed solve (`Jᵀ x = c̄` for N = 3, `Q R⁻ᵀ c̄` for N > 3).

use serde::{Deserialize, Serialize};

use multipoint_types::config::{validate_harmonic, validate_size, DEFAULT_FREQUENCY};
use multipoint_types::{AggregationError, AggregationResult, HarmonicMode, MultipointStack};

use crate::aggregator::{
    check_adjoint_args, check_points, check_stack, check_tangent_args, seed_at,
    MultipointAggregator,
};
use crate::linalg::{dot, LuFactors, QrFactors};

/// Unknowns per point: offset, sine and cosine coefficients.
const N_COEFFS: usize = 3;

/// Fitted coefficients at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SineFit {
    /// f0
    pub offset: f64,
    /// A
    pub sin_coeff: f64,
    /// B
    pub cos_coeff: f64,
}

impl SineFit {
    fn from_coeffs(c: &[f64; N_COEFFS]) -> Self {
        Self {
            offset: c[0],
            sin_coeff: c[1],
            cos_coeff: c[2],
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.sin_coeff.hypot(self.cos_coeff)
    }

    pub fn phase(&self) -> f64 {
        self.cos_coeff.atan2(self.sin_coeff)
    }

    pub fn maximum(&self) -> f64 {
        self.offset + self.amplitude()
    }

    pub fn value(&self, mode: HarmonicMode) -> f64 {
        match mode {
            HarmonicMode::Average => self.offset,
            HarmonicMode::Amplitude => self.amplitude(),
            HarmonicMode::Maximum => self.maximum(),
            HarmonicMode::Phase => self.phase(),
        }
    }

    /// Gradient of `value(mode)` w.r.t. `(f0, A, B)`, scaled by `seed`.
    ///
    /// Amplitude, maximum and phase have no gradient at zero amplitude.
    fn coeff_seed(&self, mode: HarmonicMode, seed: f64) -> Option<[f64; N_COEFFS]> {
        let amp = self.amplitude();
        // Unit vector along (A, B)
        let unit = (amp != 0.0).then(|| (self.sin_coeff / amp, self.cos_coeff / amp));
        match mode {
            HarmonicMode::Average => Some([seed, 0.0, 0.0]),
            HarmonicMode::Amplitude => unit.map(|(ua, ub)| [0.0, seed * ua, seed * ub]),
            HarmonicMode::Maximum => unit.map(|(ua, ub)| [seed, seed * ua, seed * ub]),
            HarmonicMode::Phase => unit.map(|(ua, ub)| [0.0, -seed * ub / amp, seed * ua / amp]),
        }
    }
}

/// Factored design matrix.
#[derive(Debug, Clone)]
enum FitSolver {
    /// N = 3: `J c = d`.
    Exact(LuFactors),
    /// N > 3: `min ‖J c - d‖₂`.
    LeastSquares(QrFactors),
}

#[derive(Debug, Clone)]
pub struct HarmonicFitAggregator {
    size: usize,
    angles: Vec<f64>,
    mode: HarmonicMode,
    frequency: f64,
    solver: FitSolver,
}

impl HarmonicFitAggregator {
    pub fn new(size: usize, angles: Vec<f64>, mode: HarmonicMode) -> AggregationResult<Self> {
        Self::with_frequency(size, angles, mode, DEFAULT_FREQUENCY)
    }

    pub fn with_frequency(
        size: usize,
        angles: Vec<f64>,
        mode: HarmonicMode,
        frequency: f64,
    ) -> AggregationResult<Self> {
        validate_size(size)?;
        let n = angles.len();
        validate_harmonic(n, &angles, frequency)?;

        let jac = design_matrix(&angles, frequency);
        let solver = if n == N_COEFFS {
            LuFactors::factor(&jac, N_COEFFS).map(FitSolver::Exact)
        } else {
            QrFactors::factor(&jac, n, N_COEFFS).map(FitSolver::LeastSquares)
        }
        .map_err(|e| {
            log::warn!("harmonic_fit: design matrix rejected for angles {angles:?}: {e}");
            AggregationError::SingularSystem(format!(
                "phase angles {angles:?} (frequency {frequency}) are not distinct enough \
                 to fit offset, sine and cosine terms: {e}"
            ))
        })?;

        log::debug!(
            "harmonic_fit: N={n}, P={size}, mode={mode:?}, frequency={frequency}, {}",
            if n == N_COEFFS { "exact" } else { "least squares" }
        );
        Ok(Self {
            size,
            angles,
            mode,
            frequency,
            solver,
        })
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn mode(&self) -> HarmonicMode {
        self.mode
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Solve one column in place; `col` is scratch of length N.
    fn solve_column(&self, col: &mut [f64], coeffs: &mut [f64; N_COEFFS]) {
        match &self.solver {
            FitSolver::Exact(lu) => {
                lu.solve(col);
                coeffs.copy_from_slice(&col[..N_COEFFS]);
            }
            FitSolver::LeastSquares(qr) => qr.least_squares(col, coeffs),
        }
    }

    /// Transposed solve: coefficient seed → per-entry sensitivity.
    fn solve_column_adjoint(&self, coeffs_bar: &[f64; N_COEFFS], col_bar: &mut [f64]) {
        match &self.solver {
            FitSolver::Exact(lu) => {
                col_bar.copy_from_slice(coeffs_bar);
                lu.solve_transpose(col_bar);
            }
            FitSolver::LeastSquares(qr) => qr.least_squares_adjoint(coeffs_bar, col_bar),
        }
    }

    fn fit_point(&self, data: &MultipointStack, p: usize, col: &mut [f64]) -> SineFit {
        let mut coeffs = [0.0; N_COEFFS];
        data.column_into(p, col);
        self.solve_column(col, &mut coeffs);
        SineFit::from_coeffs(&coeffs)
    }

    fn coeff_seed_at(&self, fit: &SineFit, seed: f64, p: usize) -> AggregationResult<[f64; N_COEFFS]> {
        fit.coeff_seed(self.mode, seed).ok_or_else(|| {
            log::warn!("harmonic_fit: zero amplitude at point {p}, {:?} gradient undefined", self.mode);
            AggregationError::SingularSystem(format!(
                "amplitude is exactly zero at point {p}; {:?} derivative is undefined",
                self.mode
            ))
        })
    }

    /// Coefficient seeds for every point, checked before any output is
    /// written so a failing call leaves the caller's buffer untouched.
    fn coeff_seeds(
        &self,
        data: &MultipointStack,
        seed: Option<&[f64]>,
    ) -> AggregationResult<Vec<[f64; N_COEFFS]>> {
        let mut col = vec![0.0; self.angles.len()];
        (0..self.size)
            .map(|p| {
                let fit = self.fit_point(data, p, &mut col);
                self.coeff_seed_at(&fit, seed_at(seed, p), p)
            })
            .collect()
    }

    /// Full per-point fit `(f0, A, B)`.
    pub fn coefficients(&self, data: &MultipointStack) -> AggregationResult<Vec<SineFit>> {
        check_stack(self, data)?;
        data.ensure_finite("harmonic_fit data")?;
        let mut col = vec![0.0; self.angles.len()];
        Ok((0..self.size)
            .map(|p| self.fit_point(data, p, &mut col))
            .collect())
    }
}

/// Row-major `N × 3` matrix with rows `[1, sin(ωθ), cos(ωθ)]`.
fn design_matrix(angles: &[f64], frequency: f64) -> Vec<f64> {
    let mut jac = Vec::with_capacity(angles.len() * N_COEFFS);
    for &theta in angles {
        let (s, c) = (frequency * theta).sin_cos();
        jac.extend_from_slice(&[1.0, s, c]);
    }
    jac
}

impl MultipointAggregator for HarmonicFitAggregator {
    fn name(&self) -> &'static str {
        "harmonic_fit"
    }

    fn num_pts(&self) -> usize {
        self.angles.len()
    }

    fn size(&self) -> usize {
        self.size
    }

    fn evaluate_into(&self, data: &MultipointStack, out: &mut [f64]) -> AggregationResult<()> {
        check_stack(self, data)?;
        check_points("output length", self.size, out)?;
        data.ensure_finite("harmonic_fit data")?;

        let mut col = vec![0.0; self.angles.len()];
        for (p, o) in out.iter_mut().enumerate() {
            *o = self.fit_point(data, p, &mut col).value(self.mode);
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
        data.ensure_finite("harmonic_fit data")?;
        data_dot.ensure_finite("harmonic_fit perturbation")?;

        let grads = self.coeff_seeds(data, None)?;
        let mut col = vec![0.0; self.angles.len()];
        let mut coeffs_dot = [0.0; N_COEFFS];
        for (p, (o, grad)) in out.iter_mut().zip(&grads).enumerate() {
            // Solve is linear: ċ = J⁺ ḋ
            data_dot.column_into(p, &mut col);
            self.solve_column(&mut col, &mut coeffs_dot);
            *o = dot(grad, &coeffs_dot);
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
        data.ensure_finite("harmonic_fit data")?;

        let seeds = self.coeff_seeds(data, seed)?;
        let mut col_bar = vec![0.0; self.angles.len()];
        for (p, coeffs_bar) in seeds.iter().enumerate() {
            self.solve_column_adjoint(coeffs_bar, &mut col_bar);
            for (i, &v) in col_bar.iter().enumerate() {
                out.set(i, p, v);
            }
        }
        Ok(())
    }
}
