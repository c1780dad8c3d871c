//! Gaussian observation likelihood: comparing model outputs against noisy
//! experimental measurements.

use ndarray::{Array1, Array2};

use crate::error::EmulatorError;
use crate::linalg::Cholesky;

/// A fixed set of experimental observations to compare model outputs
/// against: a mean vector and a covariance describing measurement
/// uncertainty.
#[derive(Debug, Clone)]
pub struct Observable {
    pub mean: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl Observable {
    pub fn new(mean: Array1<f64>, covariance: Array2<f64>) -> Result<Self, EmulatorError> {
        let t = mean.len();
        if covariance.nrows() != t || covariance.ncols() != t {
            return Err(EmulatorError::DimensionMismatch(format!(
                "observed covariance is {}x{}, expected {}x{}",
                covariance.nrows(),
                covariance.ncols(),
                t,
                t
            )));
        }
        Ok(Observable { mean, covariance })
    }

    /// A diagonal covariance built from per-output standard deviations.
    pub fn with_independent_errors(mean: Array1<f64>, sigma: Array1<f64>) -> Result<Self, EmulatorError> {
        let t = mean.len();
        if sigma.len() != t {
            return Err(EmulatorError::DimensionMismatch(format!(
                "sigma has length {}, expected {}",
                sigma.len(),
                t
            )));
        }
        let mut covariance = Array2::<f64>::zeros((t, t));
        for i in 0..t {
            covariance[[i, i]] = sigma[i] * sigma[i];
        }
        Ok(Observable { mean, covariance })
    }
}

/// `log N(model_mean; observed.mean, observed.covariance + model_covariance)`.
///
/// When `use_model_covariance` is false, only the observed covariance is
/// used (appropriate when the model's own predictive uncertainty should
/// not inflate the likelihood, e.g. comparing against a deterministic
/// simulator run directly rather than an emulator prediction).
pub fn log_likelihood(
    observed: &Observable,
    model_mean: &Array1<f64>,
    model_covariance: Option<&Array2<f64>>,
    use_model_covariance: bool,
) -> Result<f64, EmulatorError> {
    let t = observed.mean.len();
    if model_mean.len() != t {
        return Err(EmulatorError::DimensionMismatch(format!(
            "model mean has length {}, expected {}",
            model_mean.len(),
            t
        )));
    }

    let mut sigma = observed.covariance.clone();
    if use_model_covariance {
        if let Some(model_cov) = model_covariance {
            if model_cov.nrows() != t || model_cov.ncols() != t {
                return Err(EmulatorError::DimensionMismatch(format!(
                    "model covariance is {}x{}, expected {}x{}",
                    model_cov.nrows(),
                    model_cov.ncols(),
                    t,
                    t
                )));
            }
            sigma = &sigma + model_cov;
        }
    }

    let difference = model_mean - &observed.mean;

    let chol = Cholesky::factor(&sigma).map_err(|_| {
        EmulatorError::IllConditionedLikelihood(
            "combined observation covariance is not positive definite".to_string(),
        )
    })?;
    let solved = chol.solve(&difference);
    Ok(-0.5 * difference.dot(&solved))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn exact_match_gives_zero_log_likelihood() {
        let observed =
            Observable::with_independent_errors(array![1.0, 2.0], array![0.1, 0.1]).unwrap();
        let ll = log_likelihood(&observed, &array![1.0, 2.0], None, true).unwrap();
        assert_abs_diff_eq!(ll, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn larger_discrepancy_is_less_likely() {
        let observed =
            Observable::with_independent_errors(array![0.0], array![1.0]).unwrap();
        let near = log_likelihood(&observed, &array![0.5], None, true).unwrap();
        let far = log_likelihood(&observed, &array![5.0], None, true).unwrap();
        assert!(near > far);
    }

    #[test]
    fn model_covariance_widens_tolerance_when_included() {
        let observed =
            Observable::with_independent_errors(array![0.0], array![0.1]).unwrap();
        let model_cov = array![[10.0]];
        let without = log_likelihood(&observed, &array![1.0], Some(&model_cov), false).unwrap();
        let with = log_likelihood(&observed, &array![1.0], Some(&model_cov), true).unwrap();
        assert!(with > without);
    }

    #[test]
    fn zero_total_covariance_is_ill_conditioned() {
        let observed =
            Observable::with_independent_errors(array![0.0], array![0.0]).unwrap();
        assert!(log_likelihood(&observed, &array![1.0], None, true).is_err());
    }
}
