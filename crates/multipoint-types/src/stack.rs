// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Multipoint Stack Container
// ─────────────────────────────────────────────────────────────────────
//! `N × P` row-major container: one row per operating point, one column
//! per spatial point.

use serde::{Deserialize, Serialize};

use crate::error::{AggregationError, AggregationResult};

/// Ordered set of per-point arrays, one per discrete operating condition.
///
/// Row `i` always refers to the same operating condition across
/// `evaluate`/`tangent`/`adjoint` calls of one optimization iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStack")]
pub struct MultipointStack {
    num_pts: usize,
    size: usize,
    data: Vec<f64>,
}

/// Wire form, checked through `from_flat` on the way in.
#[derive(Deserialize)]
struct RawStack {
    num_pts: usize,
    size: usize,
    data: Vec<f64>,
}

impl TryFrom<RawStack> for MultipointStack {
    type Error = AggregationError;

    fn try_from(raw: RawStack) -> AggregationResult<Self> {
        Self::from_flat(raw.num_pts, raw.size, raw.data)
    }
}

impl MultipointStack {
    pub fn zeros(num_pts: usize, size: usize) -> Self {
        Self {
            num_pts,
            size,
            data: vec![0.0; num_pts * size],
        }
    }

    /// Build from per-point arrays. All rows must share one length.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> AggregationResult<Self> {
        let first = rows.first().ok_or_else(|| {
            AggregationError::Config("stack must contain at least one entry".to_string())
        })?;
        let size = first.as_ref().len();
        let mut data = Vec::with_capacity(rows.len() * size);
        for row in rows {
            let row = row.as_ref();
            if row.len() != size {
                return Err(AggregationError::ShapeMismatch {
                    what: "per-point array length",
                    expected: size,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            num_pts: rows.len(),
            size,
            data,
        })
    }

    /// Stack of scalars: N rows of length 1.
    pub fn from_scalars(values: &[f64]) -> Self {
        Self {
            num_pts: values.len(),
            size: 1,
            data: values.to_vec(),
        }
    }

    /// Wrap a row-major buffer of length `num_pts * size`.
    pub fn from_flat(num_pts: usize, size: usize, data: Vec<f64>) -> AggregationResult<Self> {
        if data.len() != num_pts * size {
            return Err(AggregationError::ShapeMismatch {
                what: "flat stack length",
                expected: num_pts * size,
                actual: data.len(),
            });
        }
        Ok(Self {
            num_pts,
            size,
            data,
        })
    }

    /// Number of stack entries N.
    #[inline]
    pub fn num_pts(&self) -> usize {
        self.num_pts
    }

    /// Per-point array length P.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.size..(i + 1) * self.size]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        &mut self.data[i * self.size..(i + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunk size 0 panics; a zero-width stack yields no rows
        self.data.chunks(self.size.max(1)).take(self.num_pts)
    }

    #[inline]
    pub fn get(&self, i: usize, p: usize) -> f64 {
        self.data[i * self.size + p]
    }

    #[inline]
    pub fn set(&mut self, i: usize, p: usize, value: f64) {
        self.data[i * self.size + p] = value;
    }

    /// Copy column `p` (one value per stack entry) into `out`.
    pub fn column_into(&self, p: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.num_pts);
        for (i, v) in out.iter_mut().enumerate() {
            *v = self.data[i * self.size + p];
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn scale(&mut self, k: f64) {
        for v in self.data.iter_mut() {
            *v *= k;
        }
    }

    /// Frobenius inner product. Shapes must match.
    pub fn dot(&self, other: &Self) -> AggregationResult<f64> {
        other.check_shape(self.num_pts, self.size)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a * b)
            .sum())
    }

    /// Largest entry; `-inf` for an empty stack. NaN entries are skipped.
    pub fn max_value(&self) -> f64 {
        self.data.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Fail with `NumericOverflow` naming the first NaN/Inf entry.
    pub fn ensure_finite(&self, label: &str) -> AggregationResult<()> {
        if let Some(idx) = self.data.iter().position(|v| !v.is_finite()) {
            let (i, p) = (idx / self.size.max(1), idx % self.size.max(1));
            log::warn!("{label}: non-finite value {} at entry {i}, point {p}", self.data[idx]);
            return Err(AggregationError::NumericOverflow(format!(
                "{label} contains non-finite value {} at entry {i}, point {p}",
                self.data[idx]
            )));
        }
        Ok(())
    }

    /// Check stack length first, then per-point length.
    pub fn check_shape(&self, num_pts: usize, size: usize) -> AggregationResult<()> {
        if self.num_pts != num_pts {
            return Err(AggregationError::ShapeMismatch {
                what: "stack entries",
                expected: num_pts,
                actual: self.num_pts,
            });
        }
        if self.size != size {
            return Err(AggregationError::ShapeMismatch {
                what: "per-point array length",
                expected: size,
                actual: self.size,
            });
        }
        Ok(())
    }
}
