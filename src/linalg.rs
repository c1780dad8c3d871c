//! Small, dependency-free dense linear algebra used by the GP kernel.
//!
//! The matrices here are either small (the t-by-t output covariance used
//! for PCA) or symmetric positive definite by construction (a covariance
//! kernel matrix with a strictly positive nugget on the diagonal), so a
//! hand-rolled Cholesky factorization and a cyclic Jacobi eigenvalue
//! solver are the right tool: no BLAS/LAPACK linkage, fully deterministic,
//! and easy to certify against the round-trip properties in the spec.

use ndarray::{Array1, Array2};

use crate::error::EmulatorError;

/// Lower-triangular Cholesky factor `L` of a symmetric positive definite
/// matrix `a`, such that `a == L * L^T`.
#[derive(Debug, Clone)]
pub struct Cholesky {
    l: Array2<f64>,
}

impl Cholesky {
    /// Factor `a`. `a` must be square and symmetric (only the lower
    /// triangle is read). Fails with `NumericallyIllConditioned` if any
    /// pivot is non-positive.
    pub fn factor(a: &Array2<f64>) -> Result<Self, EmulatorError> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(EmulatorError::DimensionMismatch(format!(
                "cholesky: matrix is {}x{}, expected square",
                n,
                a.ncols()
            )));
        }
        let mut l = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let mut sum = a[[i, j]];
                for k in 0..j {
                    sum -= l[[i, k]] * l[[j, k]];
                }
                if i == j {
                    if sum <= 0.0 {
                        return Err(EmulatorError::NumericallyIllConditioned(format!(
                            "cholesky: non-positive pivot {} at index {}",
                            sum, i
                        )));
                    }
                    l[[i, j]] = sum.sqrt();
                } else {
                    l[[i, j]] = sum / l[[j, j]];
                }
            }
        }
        Ok(Cholesky { l })
    }

    /// Solve `a x = b` for a single right-hand-side vector.
    pub fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let y = forward_substitute(&self.l, b);
        back_substitute_transpose(&self.l, &y)
    }

    /// Solve `a X = b` for a matrix of right-hand sides (columns).
    pub fn solve_mat(&self, b: &Array2<f64>) -> Array2<f64> {
        let n = self.l.nrows();
        let cols = b.ncols();
        let mut out = Array2::<f64>::zeros((n, cols));
        for c in 0..cols {
            let col = b.column(c).to_owned();
            out.column_mut(c).assign(&self.solve(&col));
        }
        out
    }

    /// `a^{-1}`, computed by solving against the identity matrix.
    pub fn inverse(&self) -> Array2<f64> {
        let n = self.l.nrows();
        self.solve_mat(&Array2::eye(n))
    }
}

fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = b[i];
        for k in 0..i {
            sum -= l[[i, k]] * y[k];
        }
        y[i] = sum / l[[i, i]];
    }
    y
}

fn back_substitute_transpose(l: &Array2<f64>, y: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = y[i];
        for k in (i + 1)..n {
            sum -= l[[k, i]] * x[k];
        }
        x[i] = sum / l[[i, i]];
    }
    x
}

/// Eigendecomposition of a real symmetric matrix via the cyclic Jacobi
/// eigenvalue algorithm. Returns `(eigenvalues, eigenvectors)` with
/// eigenvalues in **ascending** order and eigenvectors as the matching
/// columns of the returned matrix, mirroring
/// `Eigen::SelfAdjointEigenSolver`'s convention in the original
/// implementation this module is grounded on.
pub fn symmetric_eigen(a: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    debug_assert_eq!(a.ncols(), n);

    let mut m = a.clone();
    let mut v = Array2::<f64>::eye(n);

    const MAX_SWEEPS: usize = 100;
    let off_diagonal_norm = |m: &Array2<f64>| -> f64 {
        let mut sum = 0.0;
        for p in 0..n {
            for q in (p + 1)..n {
                sum += m[[p, q]] * m[[p, q]];
            }
        }
        sum.sqrt()
    };

    for _ in 0..MAX_SWEEPS {
        if n < 2 || off_diagonal_norm(&m) < 1e-14 {
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                if m[[p, q]].abs() < 1e-300 {
                    continue;
                }
                let theta = (m[[q, q]] - m[[p, p]]) / (2.0 * m[[p, q]]);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                let app = m[[p, p]];
                let aqq = m[[q, q]];
                let apq = m[[p, q]];

                m[[p, p]] = c * c * app - 2.0 * s * c * apq + s * s * aqq;
                m[[q, q]] = s * s * app + 2.0 * s * c * apq + c * c * aqq;
                m[[p, q]] = 0.0;
                m[[q, p]] = 0.0;

                for i in 0..n {
                    if i != p && i != q {
                        let aip = m[[i, p]];
                        let aiq = m[[i, q]];
                        m[[i, p]] = c * aip - s * aiq;
                        m[[p, i]] = m[[i, p]];
                        m[[i, q]] = s * aip + c * aiq;
                        m[[q, i]] = m[[i, q]];
                    }
                }

                for i in 0..n {
                    let vip = v[[i, p]];
                    let viq = v[[i, q]];
                    v[[i, p]] = c * vip - s * viq;
                    v[[i, q]] = s * vip + c * viq;
                }
            }
        }
    }

    let mut eigenvalues: Vec<f64> = (0..n).map(|i| m[[i, i]]).collect();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigenvalues[a].partial_cmp(&eigenvalues[b]).unwrap());

    let mut sorted_values = Array1::<f64>::zeros(n);
    let mut sorted_vectors = Array2::<f64>::zeros((n, n));
    for (new_idx, &old_idx) in order.iter().enumerate() {
        sorted_values[new_idx] = eigenvalues[old_idx];
        sorted_vectors.column_mut(new_idx).assign(&v.column(old_idx));
    }
    eigenvalues.clear();

    (sorted_values, sorted_vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn cholesky_recovers_identity_for_diagonal_matrix() {
        let a = array![[4.0, 0.0], [0.0, 9.0]];
        let chol = Cholesky::factor(&a).unwrap();
        let inv = chol.inverse();
        assert_abs_diff_eq!(inv[[0, 0]], 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(inv[[1, 1]], 1.0 / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn cholesky_solves_spd_system() {
        let a = array![[2.0, 1.0], [1.0, 2.0]];
        let b = array![3.0, 3.0];
        let chol = Cholesky::factor(&a).unwrap();
        let x = chol.solve(&b);
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn cholesky_rejects_non_positive_definite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(Cholesky::factor(&a).is_err());
    }

    #[test]
    fn symmetric_eigen_matches_known_spectrum() {
        let a = array![[2.0, 0.0], [0.0, 5.0]];
        let (values, vectors) = symmetric_eigen(&a);
        assert_abs_diff_eq!(values[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(values[1], 5.0, epsilon = 1e-10);
        // Eigenvectors should be the standard basis (up to sign).
        assert_abs_diff_eq!(vectors[[0, 0]].abs(), 1.0, epsilon = 1e-10);
        assert_abs_diff_eq!(vectors[[1, 1]].abs(), 1.0, epsilon = 1e-10);
    }

    #[test]
    fn symmetric_eigen_reconstructs_matrix() {
        let a = array![[4.0, 1.0, 0.0], [1.0, 3.0, 1.0], [0.0, 1.0, 2.0]];
        let (values, vectors) = symmetric_eigen(&a);
        let reconstructed = vectors.dot(&Array2::from_diag(&values)).dot(&vectors.t());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(reconstructed[[i, j]], a[[i, j]], epsilon = 1e-8);
            }
        }
    }
}
