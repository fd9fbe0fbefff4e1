// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregation Kernel
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Differentiable reductions of a multipoint stack (N evaluations of a
//! length-P field, e.g. torque at N rotor angles) into one length-P
//! array, for gradient-based design optimization.
//!
//! Architecture:
//!   - MultipointAggregator: evaluate / tangent / adjoint contract
//!   - InducedExponentialAggregator: smooth maximum, shifted for stability
//!   - ArithmeticMeanAggregator: plain mean
//!   - HarmonicFitAggregator: f0 + A sin + B cos fit (average, amplitude,
//!     maximum, phase)
//!   - linalg: LU / Householder QR for the fit, forward and transposed
//!   - check: finite-difference and tangent/adjoint duality checks

pub mod aggregator;
pub mod check;
pub mod harmonic;
pub mod induced_exp;
pub mod linalg;
pub mod mean;

pub use aggregator::{build_aggregator, MultipointAggregator};
pub use check::{check_duality, fd_adjoint, fd_tangent, DualityReport, SimpleRng};
pub use harmonic::{HarmonicFitAggregator, SineFit};
pub use induced_exp::InducedExponentialAggregator;
pub use mean::ArithmeticMeanAggregator;

pub use multipoint_types::{
    AggregationError, AggregationResult, AggregatorConfig, AggregatorKind, ExpShift, HarmonicMode,
    MultipointStack,
};
