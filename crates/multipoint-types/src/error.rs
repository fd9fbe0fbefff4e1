// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregation Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all aggregation failures.
///
/// None of these are transient: each one is a caller contract violation
/// or an ill-posed numerical configuration, so retrying the same call
/// gives the same error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// Invalid aggregator configuration (ρ, N, P, angles, frequency).
    #[error("config error: {0}")]
    Config(String),

    /// Stack, seed or output buffer does not match the configured shape.
    #[error("shape mismatch: {what} expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Design matrix not well-conditioned, or a derivative is undefined
    /// at a zero-amplitude point.
    #[error("singular system: {0}")]
    SingularSystem(String),

    /// NaN/Inf in the input, or exponential weights that collapsed.
    #[error("numeric overflow: {0}")]
    NumericOverflow(String),
}

pub type AggregationResult<T> = Result<T, AggregationError>;
