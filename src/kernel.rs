//! Covariance kernels and the polynomial regression basis shared by every
//! [`crate::single_model::SingleModel`].

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::EmulatorError;

const NUGGET_TRIGGER: f64 = 1e-10;

/// The functional family of a covariance kernel. Each variant carries its
/// own hyperparameter layout inside a model's `thetas` vector:
/// `[amplitude, nugget, (power,)? length_scale_1..length_scale_p]`
/// (`power` only present for [`CovarianceKernel::PowerExponential`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CovarianceKernel {
    SquareExponential,
    PowerExponential,
    Matern32,
    Matern52,
}

impl CovarianceKernel {
    pub fn tag(&self) -> &'static str {
        match self {
            CovarianceKernel::SquareExponential => "SQUARE_EXPONENTIAL_FUNCTION",
            CovarianceKernel::PowerExponential => "POWER_EXPONENTIAL_FUNCTION",
            CovarianceKernel::Matern32 => "MATERN_32_FUNCTION",
            CovarianceKernel::Matern52 => "MATERN_52_FUNCTION",
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, EmulatorError> {
        match tag {
            "SQUARE_EXPONENTIAL_FUNCTION" => Ok(CovarianceKernel::SquareExponential),
            "POWER_EXPONENTIAL_FUNCTION" => Ok(CovarianceKernel::PowerExponential),
            "MATERN_32_FUNCTION" => Ok(CovarianceKernel::Matern32),
            "MATERN_52_FUNCTION" => Ok(CovarianceKernel::Matern52),
            other => Err(EmulatorError::ParseFailure(format!(
                "unknown covariance function tag {:?}",
                other
            ))),
        }
    }

    /// Number of length-scale offset slots before the per-dimension
    /// length scales begin (`amplitude, nugget[, power]`). Meaningless
    /// for the Matern kernels, which have a single shared length scale
    /// at index 2 regardless of `p` — use [`Self::number_thetas`] for
    /// their total hyperparameter count instead.
    pub fn theta_offset(&self) -> usize {
        match self {
            CovarianceKernel::PowerExponential => 3,
            _ => 2,
        }
    }

    /// Total number of hyperparameters for a model over `p` input
    /// dimensions. The Matern kernels collapse every dimension onto a
    /// single shared length scale, so their count is fixed at 3.
    pub fn number_thetas(&self, p: usize) -> usize {
        match self {
            CovarianceKernel::Matern32 | CovarianceKernel::Matern52 => 3,
            _ => self.theta_offset() + p,
        }
    }

    /// The covariance between two input points `v1` and `v2` given the
    /// model's `thetas` vector. A near-zero squared distance triggers the
    /// nugget term, matching the discrete jump at the training diagonal.
    pub fn covariance(
        &self,
        thetas: &Array1<f64>,
        v1: ArrayView1<f64>,
        v2: ArrayView1<f64>,
    ) -> f64 {
        let p = v1.len();
        debug_assert_eq!(thetas.len(), self.number_thetas(p));

        let amplitude = thetas[0];
        let nugget = thetas[1];

        let mut distance_squared = 0.0;
        match self {
            CovarianceKernel::Matern32 | CovarianceKernel::Matern52 => {
                let l = thetas[2];
                for i in 0..p {
                    let d = v1[i] - v2[i];
                    distance_squared += (d / l).powi(2);
                }
            }
            _ => {
                let offset = self.theta_offset();
                for i in 0..p {
                    let d = v1[i] - v2[i];
                    let l = thetas[offset + i];
                    distance_squared += (d / l).powi(2);
                }
            }
        }
        let nug = if distance_squared < NUGGET_TRIGGER {
            nugget
        } else {
            0.0
        };

        match self {
            CovarianceKernel::PowerExponential => {
                let power = thetas[2];
                nug + amplitude * (-0.5 * distance_squared.powf(0.5 * power)).exp()
            }
            CovarianceKernel::SquareExponential => {
                nug + amplitude * (-0.5 * distance_squared).exp()
            }
            CovarianceKernel::Matern32 => {
                const ROOT3: f64 = 1.7320508075688772;
                let distance = distance_squared.sqrt();
                nug + amplitude * (1.0 + ROOT3 * distance) * (-ROOT3 * distance).exp()
            }
            CovarianceKernel::Matern52 => {
                const ROOT5: f64 = 2.23606797749979;
                let distance = distance_squared.sqrt();
                nug + amplitude
                    * (1.0 + ROOT5 * distance + (5.0 / 3.0) * distance_squared)
                    * (-ROOT5 * distance).exp()
            }
        }
    }
}

/// Number of columns in a regression basis of `order` over `p`
/// parameters: the constant term plus `order` blocks of `p` monomials.
pub fn number_regression_functions(order: usize, p: usize) -> usize {
    1 + order * p
}

/// Build the `N x F` regression design matrix `H` for training inputs
/// `x` (`N x p`), where column 0 is the constant `1`, columns `1..=p`
/// are `x`, and each further block of `p` columns is the elementwise
/// product of the previous block with `x` (so order `k` block holds
/// `x^k`).
pub fn make_h_matrix(x: &Array2<f64>, order: usize) -> Array2<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let f = number_regression_functions(order, p);
    let mut h = Array2::<f64>::zeros((n, f));
    h.column_mut(0).fill(1.0);
    if order > 0 {
        h.slice_mut(ndarray::s![.., 1..1 + p]).assign(x);
    }
    for i in 1..order {
        let prev_start = 1 + (i - 1) * p;
        let cur_start = 1 + i * p;
        for row in 0..n {
            for col in 0..p {
                let prod = h[[row, prev_start + col]] * x[[row, col]];
                h[[row, cur_start + col]] = prod;
            }
        }
    }
    h
}

/// Build the regression basis vector `h(point)` for a single query
/// point, matching the layout of [`make_h_matrix`]'s rows.
pub fn make_h_vector(point: &Array1<f64>, order: usize) -> Array1<f64> {
    let p = point.len();
    let f = number_regression_functions(order, p);
    let mut h = Array1::<f64>::zeros(f);
    h[0] = 1.0;
    if order > 0 {
        for col in 0..p {
            h[1 + col] = point[col];
        }
    }
    for i in 1..order {
        let prev_start = 1 + (i - 1) * p;
        let cur_start = 1 + i * p;
        for col in 0..p {
            h[cur_start + col] = h[prev_start + col] * point[col];
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn square_exponential_is_amplitude_at_zero_distance_plus_nugget() {
        let thetas = array![2.0, 0.1, 1.0];
        let k = CovarianceKernel::SquareExponential;
        let v = array![0.0];
        assert_abs_diff_eq!(
            k.covariance(&thetas, v.view(), v.view()),
            2.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn matern_kernels_decay_with_distance() {
        let thetas = array![1.0, 0.0, 1.0];
        let v1 = array![0.0];
        let v2 = array![5.0];
        let c32 = CovarianceKernel::Matern32.covariance(&thetas, v1.view(), v2.view());
        let c52 = CovarianceKernel::Matern52.covariance(&thetas, v1.view(), v2.view());
        assert!(c32 > 0.0 && c32 < 1.0);
        assert!(c52 > 0.0 && c52 < 1.0);
    }

    #[test]
    fn h_matrix_matches_h_vector_per_row() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let h = make_h_matrix(&x, 2);
        let h_row0 = make_h_vector(&array![1.0, 2.0], 2);
        for col in 0..h.ncols() {
            assert_abs_diff_eq!(h[[0, col]], h_row0[col], epsilon = 1e-12);
        }
    }

    #[test]
    fn order_zero_basis_is_just_the_constant() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let h = make_h_matrix(&x, 0);
        assert_eq!(h.ncols(), 1);
        assert!(h.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn matern_kernels_use_a_single_shared_length_scale_regardless_of_p() {
        assert_eq!(CovarianceKernel::Matern32.number_thetas(5), 3);
        assert_eq!(CovarianceKernel::Matern52.number_thetas(5), 3);
        assert_eq!(CovarianceKernel::SquareExponential.number_thetas(5), 7);
        assert_eq!(CovarianceKernel::PowerExponential.number_thetas(5), 8);

        let thetas = array![1.0, 0.0, 2.0];
        let v1 = array![0.0, 0.0];
        let v2 = array![2.0, 0.0];
        let c = CovarianceKernel::Matern32.covariance(&thetas, v1.view(), v2.view());
        assert!(c > 0.0 && c < 1.0);
    }

    #[test]
    fn kernel_tag_round_trips() {
        for k in [
            CovarianceKernel::SquareExponential,
            CovarianceKernel::PowerExponential,
            CovarianceKernel::Matern32,
            CovarianceKernel::Matern52,
        ] {
            assert_eq!(CovarianceKernel::from_tag(k.tag()).unwrap(), k);
        }
    }
}
