// ─────────────────────────────────────────────────────────────────────
// Motor MDO — Small Dense Linear Algebra
// ─────────────────────────────────────────────────────────────────────
//! Pure-Rust LU (partial pivoting) and Householder QR for the tiny
//! systems the harmonic fit solves once per spatial point.
//!
//! Matrices are row-major slices. Factorizations are built once at
//! aggregator construction and then applied to many right-hand sides,
//! forward and transposed.

use multipoint_types::{AggregationError, AggregationResult};

/// Relative pivot threshold below which a matrix is treated as singular.
pub const SINGULAR_TOL: f64 = 1e-10;

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// LU factors of a square matrix: `P A = L U`, unit-diagonal `L`.
#[derive(Debug, Clone)]
pub struct LuFactors {
    n: usize,
    lu: Vec<f64>,
    /// Row `i` of `P A` is row `perm[i]` of `A`.
    perm: Vec<usize>,
}

impl LuFactors {
    /// Doolittle elimination with partial pivoting.
    pub fn factor(a: &[f64], n: usize) -> AggregationResult<Self> {
        debug_assert_eq!(a.len(), n * n);
        let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if scale == 0.0 || !scale.is_finite() {
            return Err(AggregationError::SingularSystem(format!(
                "{n}x{n} matrix is zero or non-finite"
            )));
        }

        let mut lu = a.to_vec();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // Pivot search
            let mut piv = k;
            let mut piv_abs = lu[k * n + k].abs();
            for r in (k + 1)..n {
                let v = lu[r * n + k].abs();
                if v > piv_abs {
                    piv = r;
                    piv_abs = v;
                }
            }
            if piv_abs <= SINGULAR_TOL * scale {
                return Err(AggregationError::SingularSystem(format!(
                    "pivot {k} of {n}x{n} matrix is {piv_abs:.3e} (scale {scale:.3e})"
                )));
            }
            if piv != k {
                for c in 0..n {
                    lu.swap(k * n + c, piv * n + c);
                }
                perm.swap(k, piv);
            }

            let pivot = lu[k * n + k];
            for r in (k + 1)..n {
                let factor = lu[r * n + k] / pivot;
                lu[r * n + k] = factor;
                for c in (k + 1)..n {
                    lu[r * n + c] -= factor * lu[k * n + c];
                }
            }
        }

        Ok(Self { n, lu, perm })
    }

    /// Solve `A x = b` in place.
    pub fn solve(&self, b: &mut [f64]) {
        let n = self.n;
        debug_assert_eq!(b.len(), n);

        let mut y = [0.0f64; 8];
        let mut heap;
        let y: &mut [f64] = if n <= y.len() {
            &mut y[..n]
        } else {
            heap = vec![0.0; n];
            &mut heap
        };

        // L y = P b
        for i in 0..n {
            let mut s = b[self.perm[i]];
            for j in 0..i {
                s -= self.lu[i * n + j] * y[j];
            }
            y[i] = s;
        }
        // U x = y
        for i in (0..n).rev() {
            let mut s = y[i];
            for j in (i + 1)..n {
                s -= self.lu[i * n + j] * b[j];
            }
            b[i] = s / self.lu[i * n + i];
        }
    }

    /// Solve `Aᵀ x = b` in place. `Aᵀ = Uᵀ Lᵀ P`.
    pub fn solve_transpose(&self, b: &mut [f64]) {
        let n = self.n;
        debug_assert_eq!(b.len(), n);

        // Uᵀ y = b  (forward, lower-triangular)
        for i in 0..n {
            let mut s = b[i];
            for j in 0..i {
                s -= self.lu[j * n + i] * b[j];
            }
            b[i] = s / self.lu[i * n + i];
        }
        // Lᵀ z = y  (backward, unit diagonal)
        for i in (0..n).rev() {
            let mut s = b[i];
            for j in (i + 1)..n {
                s -= self.lu[j * n + i] * b[j];
            }
            b[i] = s;
        }
        // x = Pᵀ z
        let mut x = [0.0f64; 8];
        if n <= x.len() {
            for i in 0..n {
                x[self.perm[i]] = b[i];
            }
            b.copy_from_slice(&x[..n]);
        } else {
            let z = b.to_vec();
            for i in 0..n {
                b[self.perm[i]] = z[i];
            }
        }
    }
}

/// Householder QR of a tall `rows × cols` matrix (`rows ≥ cols`).
///
/// `Q` is kept implicitly as `cols` unit reflectors `H_k = I - 2 v_k v_kᵀ`
/// acting on rows `k..rows`.
#[derive(Debug, Clone)]
pub struct QrFactors {
    rows: usize,
    cols: usize,
    /// Reflector `k` occupies `rows - k` entries starting at `offsets[k]`.
    reflectors: Vec<f64>,
    offsets: Vec<usize>,
    /// Upper-triangular `cols × cols`, row-major.
    r: Vec<f64>,
}

impl QrFactors {
    pub fn factor(a: &[f64], rows: usize, cols: usize) -> AggregationResult<Self> {
        debug_assert_eq!(a.len(), rows * cols);
        if rows < cols {
            return Err(AggregationError::Config(format!(
                "least squares needs rows >= cols, got {rows}x{cols}"
            )));
        }

        let mut work = a.to_vec();
        let mut col_scale = 0.0f64;
        for c in 0..cols {
            let norm = (0..rows)
                .map(|r| work[r * cols + c].powi(2))
                .sum::<f64>()
                .sqrt();
            col_scale = col_scale.max(norm);
        }
        if col_scale == 0.0 || !col_scale.is_finite() {
            return Err(AggregationError::SingularSystem(format!(
                "{rows}x{cols} matrix is zero or non-finite"
            )));
        }

        let mut reflectors = Vec::with_capacity(cols * rows);
        let mut offsets = Vec::with_capacity(cols);
        let mut r = vec![0.0; cols * cols];

        for k in 0..cols {
            let len = rows - k;
            let norm = (k..rows)
                .map(|i| work[i * cols + k].powi(2))
                .sum::<f64>()
                .sqrt();
            if norm <= SINGULAR_TOL * col_scale {
                return Err(AggregationError::SingularSystem(format!(
                    "column {k} of {rows}x{cols} matrix is linearly dependent \
                     (residual norm {norm:.3e})"
                )));
            }

            let akk = work[k * cols + k];
            let alpha = if akk >= 0.0 { -norm } else { norm };

            // v = x - alpha e1, normalised
            let start = reflectors.len();
            offsets.push(start);
            for i in k..rows {
                reflectors.push(work[i * cols + k]);
            }
            reflectors[start] -= alpha;
            let vnorm = reflectors[start..start + len]
                .iter()
                .map(|v| v * v)
                .sum::<f64>()
                .sqrt();
            for v in &mut reflectors[start..start + len] {
                *v /= vnorm;
            }

            // Apply H_k to the trailing columns
            let v = &reflectors[start..start + len];
            for c in k..cols {
                let s: f64 = (0..len).map(|i| v[i] * work[(k + i) * cols + c]).sum();
                for i in 0..len {
                    work[(k + i) * cols + c] -= 2.0 * s * v[i];
                }
            }

            for c in k..cols {
                r[k * cols + c] = work[k * cols + c];
            }
        }

        Ok(Self {
            rows,
            cols,
            reflectors,
            offsets,
            r,
        })
    }

    fn reflector(&self, k: usize) -> &[f64] {
        let start = self.offsets[k];
        &self.reflectors[start..start + self.rows - k]
    }

    /// `b ← Qᵀ b`
    fn apply_qt(&self, b: &mut [f64]) {
        for k in 0..self.cols {
            let v = self.reflector(k);
            let s = dot(v, &b[k..]);
            for (bi, vi) in b[k..].iter_mut().zip(v) {
                *bi -= 2.0 * s * vi;
            }
        }
    }

    /// `y ← Q y`
    fn apply_q(&self, y: &mut [f64]) {
        for k in (0..self.cols).rev() {
            let v = self.reflector(k);
            let s = dot(v, &y[k..]);
            for (yi, vi) in y[k..].iter_mut().zip(v) {
                *yi -= 2.0 * s * vi;
            }
        }
    }

    /// Minimum-residual solution of `A x ≈ b`.
    ///
    /// `b` (length `rows`) is used as scratch and left holding `Qᵀ b`.
    pub fn least_squares(&self, b: &mut [f64], x: &mut [f64]) {
        let (m, n) = (self.rows, self.cols);
        debug_assert_eq!(b.len(), m);
        debug_assert_eq!(x.len(), n);

        self.apply_qt(b);
        // R x = (Qᵀ b)[..n]
        for i in (0..n).rev() {
            let mut s = b[i];
            for j in (i + 1)..n {
                s -= self.r[i * n + j] * x[j];
            }
            x[i] = s / self.r[i * n + i];
        }
    }

    /// Transpose of the least-squares operator: `b_bar = Q [R⁻ᵀ x_bar; 0]`.
    pub fn least_squares_adjoint(&self, x_bar: &[f64], b_bar: &mut [f64]) {
        let (m, n) = (self.rows, self.cols);
        debug_assert_eq!(x_bar.len(), n);
        debug_assert_eq!(b_bar.len(), m);

        // Rᵀ z = x_bar  (forward substitution)
        for i in 0..n {
            let mut s = x_bar[i];
            for j in 0..i {
                s -= self.r[j * n + i] * b_bar[j];
            }
            b_bar[i] = s / self.r[i * n + i];
        }
        for v in &mut b_bar[n..] {
            *v = 0.0;
        }
        self.apply_q(b_bar);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matvec(a: &[f64], rows: usize, cols: usize, x: &[f64]) -> Vec<f64> {
        (0..rows)
            .map(|r| dot(&a[r * cols..(r + 1) * cols], x))
            .collect()
    }

    fn transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
        let mut t = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                t[c * rows + r] = a[r * cols + c];
            }
        }
        t
    }

    #[test]
    fn test_lu_solve_needs_pivoting() {
        // Zero leading entry forces a row swap
        let a = vec![0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
        let x_true = vec![1.0, -2.0, 0.5];
        let mut b = matvec(&a, 3, 3, &x_true);
        let lu = LuFactors::factor(&a, 3).unwrap();
        lu.solve(&mut b);
        for i in 0..3 {
            assert!((b[i] - x_true[i]).abs() < 1e-12, "x[{i}] = {}", b[i]);
        }
    }

    #[test]
    fn test_lu_solve_transpose() {
        let a = vec![0.0, 2.0, 1.0, 1.0, 1.0, 0.0, 3.0, 0.0, 1.0];
        let x_true = vec![0.3, 1.7, -1.1];
        let mut b = matvec(&transpose(&a, 3, 3), 3, 3, &x_true);
        let lu = LuFactors::factor(&a, 3).unwrap();
        lu.solve_transpose(&mut b);
        for i in 0..3 {
            assert!((b[i] - x_true[i]).abs() < 1e-12, "x[{i}] = {}", b[i]);
        }
    }

    #[test]
    fn test_lu_large_system() {
        let n = 10;
        let a: Vec<f64> = (0..n * n)
            .map(|k| {
                let (i, j) = (k / n, k % n);
                if i == j {
                    4.0 + i as f64
                } else {
                    1.0 / (1.0 + (i + j) as f64)
                }
            })
            .collect();
        let x_true: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin()).collect();
        let lu = LuFactors::factor(&a, n).unwrap();

        let mut b = matvec(&a, n, n, &x_true);
        lu.solve(&mut b);
        let mut bt = matvec(&transpose(&a, n, n), n, n, &x_true);
        lu.solve_transpose(&mut bt);
        for i in 0..n {
            assert!((b[i] - x_true[i]).abs() < 1e-10);
            assert!((bt[i] - x_true[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_lu_singular() {
        let a = vec![1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 0.0, 1.0];
        assert!(matches!(
            LuFactors::factor(&a, 3),
            Err(AggregationError::SingularSystem(_))
        ));
    }

    #[test]
    fn test_qr_square_matches_exact_solve() {
        let a = vec![2.0, 1.0, 1.0, 1.0, 3.0, 2.0, 1.0, 0.0, 0.0];
        let x_true = vec![1.0, 2.0, 3.0];
        let mut b = matvec(&a, 3, 3, &x_true);
        let qr = QrFactors::factor(&a, 3, 3).unwrap();
        let mut x = vec![0.0; 3];
        qr.least_squares(&mut b, &mut x);
        for i in 0..3 {
            assert!((x[i] - x_true[i]).abs() < 1e-12, "x[{i}] = {}", x[i]);
        }
    }

    #[test]
    fn test_qr_least_squares_normal_equations() {
        // Line fit through four points: residual must be orthogonal to columns
        let a = vec![1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0];
        let b0 = vec![1.0, 2.9, 5.2, 6.8];
        let qr = QrFactors::factor(&a, 4, 2).unwrap();
        let mut b = b0.clone();
        let mut x = vec![0.0; 2];
        qr.least_squares(&mut b, &mut x);

        let fit = matvec(&a, 4, 2, &x);
        let resid: Vec<f64> = b0.iter().zip(&fit).map(|(y, f)| y - f).collect();
        let at = transpose(&a, 4, 2);
        for c in 0..2 {
            let g = dot(&at[c * 4..(c + 1) * 4], &resid);
            assert!(g.abs() < 1e-12, "Aᵀr[{c}] = {g}");
        }
    }

    #[test]
    fn test_qr_adjoint_is_transpose() {
        // ⟨x_bar, L b⟩ == ⟨L* x_bar, b⟩ for the least-squares operator L
        let a = vec![1.0, 0.2, 0.9, 1.0, 0.7, -0.1, 1.0, -0.4, 0.3, 1.0, 0.1, -0.8, 1.0, 0.5, 0.5];
        let qr = QrFactors::factor(&a, 5, 3).unwrap();
        let b0 = vec![0.4, -1.3, 2.2, 0.7, 1.1];
        let x_bar = vec![0.9, -0.6, 1.5];

        let mut b = b0.clone();
        let mut x = vec![0.0; 3];
        qr.least_squares(&mut b, &mut x);
        let mut b_bar = vec![0.0; 5];
        qr.least_squares_adjoint(&x_bar, &mut b_bar);

        let lhs = dot(&x_bar, &x);
        let rhs = dot(&b_bar, &b0);
        assert!((lhs - rhs).abs() < 1e-12, "lhs={lhs} rhs={rhs}");
    }

    #[test]
    fn test_qr_rank_deficient() {
        let a = vec![1.0, 2.0, 2.0, 4.0, 3.0, 6.0];
        assert!(matches!(
            QrFactors::factor(&a, 3, 2),
            Err(AggregationError::SingularSystem(_))
        ));
    }

    #[test]
    fn test_qr_rejects_wide() {
        assert!(QrFactors::factor(&[1.0; 6], 2, 3).is_err());
    }
}
