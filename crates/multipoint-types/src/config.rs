// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Aggregator Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, AggregationResult};

/// Default induced-exponential sharpness.
pub const DEFAULT_RHO: f64 = 10.0;

/// Default harmonic frequency (one period per 2π of phase angle).
pub const DEFAULT_FREQUENCY: f64 = 1.0;

/// Minimum stack size for a three-coefficient harmonic fit.
pub const MIN_HARMONIC_POINTS: usize = 3;

/// Stability shift applied before exponentiation in the induced
/// exponential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpShift {
    /// One global maximum over the whole stack.
    #[default]
    Global,
    /// Maximum of each column. Changes results in the last bits and
    /// avoids weight underflow when columns differ widely in magnitude.
    PerColumn,
}

/// Quantity reported by the harmonic fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmonicMode {
    /// Offset `f0`.
    Average,
    /// `sqrt(A² + B²)`.
    Amplitude,
    /// Envelope peak `f0 + amplitude`.
    #[default]
    Maximum,
    /// `atan2(B, A)`.
    Phase,
}

/// Aggregator selection plus its kind-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregatorKind {
    InducedExponential {
        #[serde(default = "default_rho")]
        rho: f64,
        #[serde(default)]
        shift: ExpShift,
    },
    ArithmeticMean,
    HarmonicFit {
        /// Phase angles in radians, one per stack entry.
        angles: Vec<f64>,
        #[serde(default)]
        mode: HarmonicMode,
        #[serde(default = "default_frequency")]
        frequency: f64,
    },
}

fn default_rho() -> f64 {
    DEFAULT_RHO
}

fn default_frequency() -> f64 {
    DEFAULT_FREQUENCY
}

/// Immutable aggregator configuration, validated once before use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Number of stack entries N (operating points).
    pub num_pts: usize,
    /// Length P of every per-point array.
    pub size: usize,
    #[serde(flatten)]
    pub kind: AggregatorKind,
}

impl AggregatorConfig {
    pub fn induced_exponential(num_pts: usize, size: usize, rho: f64) -> Self {
        Self {
            num_pts,
            size,
            kind: AggregatorKind::InducedExponential {
                rho,
                shift: ExpShift::Global,
            },
        }
    }

    pub fn arithmetic_mean(num_pts: usize, size: usize) -> Self {
        Self {
            num_pts,
            size,
            kind: AggregatorKind::ArithmeticMean,
        }
    }

    pub fn harmonic_fit(size: usize, angles: Vec<f64>, mode: HarmonicMode) -> Self {
        Self {
            num_pts: angles.len(),
            size,
            kind: AggregatorKind::HarmonicFit {
                angles,
                mode,
                frequency: DEFAULT_FREQUENCY,
            },
        }
    }

    /// Validate configuration parameters.
    ///
    /// Conditioning of the harmonic design matrix needs a factorization
    /// and is checked when the aggregator is built.
    pub fn validate(&self) -> AggregationResult<()> {
        validate_num_pts(self.num_pts)?;
        validate_size(self.size)?;
        match &self.kind {
            AggregatorKind::InducedExponential { rho, .. } => validate_rho(*rho),
            AggregatorKind::ArithmeticMean => Ok(()),
            AggregatorKind::HarmonicFit {
                angles, frequency, ..
            } => validate_harmonic(self.num_pts, angles, *frequency),
        }
    }

    /// Load from JSON string and validate.
    pub fn from_json(json: &str) -> AggregationResult<Self> {
        let cfg: Self = serde_json::from_str(json)
            .map_err(|e| AggregationError::Config(format!("JSON parse error: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_json(&self) -> AggregationResult<String> {
        serde_json::to_string(self)
            .map_err(|e| AggregationError::Config(format!("JSON encode error: {e}")))
    }
}

pub fn validate_num_pts(num_pts: usize) -> AggregationResult<()> {
    if num_pts == 0 {
        return Err(AggregationError::Config(
            "num_pts must be >= 1, nothing to aggregate".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_size(size: usize) -> AggregationResult<()> {
    if size == 0 {
        return Err(AggregationError::Config(
            "size must be >= 1".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_rho(rho: f64) -> AggregationResult<()> {
    if !(rho.is_finite() && rho > 0.0) {
        return Err(AggregationError::Config(format!(
            "rho must be finite and > 0, got {rho}"
        )));
    }
    Ok(())
}

pub fn validate_harmonic(num_pts: usize, angles: &[f64], frequency: f64) -> AggregationResult<()> {
    if num_pts < MIN_HARMONIC_POINTS {
        return Err(AggregationError::Config(format!(
            "harmonic fit needs num_pts >= {MIN_HARMONIC_POINTS}, got {num_pts}"
        )));
    }
    if angles.len() != num_pts {
        return Err(AggregationError::Config(format!(
            "expected {num_pts} phase angles, got {}",
            angles.len()
        )));
    }
    if let Some(i) = angles.iter().position(|a| !a.is_finite()) {
        return Err(AggregationError::Config(format!(
            "phase angle {i} is not finite"
        )));
    }
    if !(frequency.is_finite() && frequency > 0.0) {
        return Err(AggregationError::Config(format!(
            "frequency must be finite and > 0, got {frequency}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_default_rho_from_json() {
        let cfg = AggregatorConfig::from_json(
            r#"{"num_pts": 3, "size": 4, "kind": "induced_exponential"}"#,
        )
        .unwrap();
        assert_eq!(
            cfg.kind,
            AggregatorKind::InducedExponential {
                rho: DEFAULT_RHO,
                shift: ExpShift::Global
            }
        );
    }

    #[test]
    fn test_harmonic_from_json() {
        let cfg = AggregatorConfig::from_json(
            r#"{"num_pts": 3, "size": 1, "kind": "harmonic_fit",
                "angles": [0.0, 1.5707963267948966, 3.141592653589793],
                "mode": "average"}"#,
        )
        .unwrap();
        match cfg.kind {
            AggregatorKind::HarmonicFit {
                angles,
                mode,
                frequency,
            } => {
                assert_eq!(angles.len(), 3);
                assert_eq!(mode, HarmonicMode::Average);
                assert_eq!(frequency, DEFAULT_FREQUENCY);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_json_round_trip() {
        let cfg = AggregatorConfig::harmonic_fit(8, vec![0.0, PI / 2.0, PI], HarmonicMode::Phase);
        let back = AggregatorConfig::from_json(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(cfg, back);
    }

    #[test]
    fn test_rejects_non_positive_rho() {
        assert!(AggregatorConfig::induced_exponential(3, 4, 0.0).validate().is_err());
        assert!(AggregatorConfig::induced_exponential(3, 4, -2.0).validate().is_err());
        assert!(AggregatorConfig::induced_exponential(3, 4, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_rejects_empty_stack() {
        let err = AggregatorConfig::arithmetic_mean(0, 4).validate().unwrap_err();
        assert!(matches!(err, AggregationError::Config(_)));
    }

    #[test]
    fn test_rejects_zero_size() {
        assert!(AggregatorConfig::arithmetic_mean(2, 0).validate().is_err());
    }

    #[test]
    fn test_rejects_short_harmonic_stack() {
        let err = AggregatorConfig::harmonic_fit(1, vec![0.0, 1.0], HarmonicMode::Maximum)
            .validate()
            .unwrap_err();
        assert!(matches!(err, AggregationError::Config(_)));
    }

    #[test]
    fn test_rejects_angle_count_mismatch() {
        let cfg = AggregatorConfig {
            num_pts: 4,
            size: 1,
            kind: AggregatorKind::HarmonicFit {
                angles: vec![0.0, 1.0, 2.0],
                mode: HarmonicMode::Maximum,
                frequency: 1.0,
            },
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_frequency() {
        let cfg = AggregatorConfig {
            num_pts: 3,
            size: 1,
            kind: AggregatorKind::HarmonicFit {
                angles: vec![0.0, 1.0, 2.0],
                mode: HarmonicMode::Maximum,
                frequency: 0.0,
            },
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_invalid_json() {
        let err = AggregatorConfig::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("JSON parse error"));
    }
}
