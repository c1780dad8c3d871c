//! A single Gaussian-process regression over one (PCA-transformed) output
//! component.
//!
//! `SingleModel` does not hold a back-pointer to the owning
//! [`crate::emulator::Emulator`]; the training design matrix is passed in
//! explicitly to every method that needs it, since an intrusive
//! back-pointer would force `Rc`/`RefCell` or `unsafe` for no real benefit
//! here.

use ndarray::{Array1, Array2};

use crate::distribution::Parameter;
use crate::error::EmulatorError;
use crate::kernel::{self, CovarianceKernel};
use crate::linalg::Cholesky;

/// The cached quantities `MakeCache` produces, used by every subsequent
/// prediction. `None` until the model has been cached.
#[derive(Debug, Clone)]
struct Cache {
    c_inverse: Array2<f64>,
    regression_matrix_1: Array2<f64>,
    regression_matrix_2: Array2<f64>,
    beta: Array1<f64>,
    gamma: Array1<f64>,
}

#[derive(Debug, Clone)]
pub struct SingleModel {
    pub kernel: CovarianceKernel,
    pub regression_order: usize,
    pub thetas: Array1<f64>,
    pub z_values: Array1<f64>,
    cache: Option<Cache>,
}

impl SingleModel {
    pub fn new(kernel: CovarianceKernel, regression_order: usize, z_values: Array1<f64>) -> Self {
        SingleModel {
            kernel,
            regression_order,
            thetas: Array1::zeros(0),
            z_values,
            cache: None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Drop the prediction cache, forcing the next `predict`/`predict_mean`
    /// call to fail until `make_cache` runs again. Used whenever something
    /// that the cache depends on (kernel, regression order, thetas) changes.
    pub fn clear_cache(&mut self) {
        self.cache = None;
    }

    /// Sets default hyperparameter values from the priors of the input
    /// parameters, the way a human analyst would seed a first training
    /// run rather than run full maximum-likelihood optimization.
    pub fn basic_training(
        &mut self,
        parameters: &[Parameter],
        default_nugget: f64,
        amplitude: f64,
        scale: f64,
    ) -> Result<(), EmulatorError> {
        let p = parameters.len();
        let mut thetas = Array1::<f64>::zeros(self.kernel.number_thetas(p));
        thetas[0] = amplitude;
        thetas[1] = default_nugget;

        let scale = scale.abs();
        let quartile_range =
            |param: &Parameter| (param.prior.quartile_range()).abs();

        match self.kernel {
            CovarianceKernel::PowerExponential => {
                thetas[2] = 2.0;
                for (j, param) in parameters.iter().enumerate() {
                    thetas[3 + j] = scale * quartile_range(param);
                }
            }
            CovarianceKernel::SquareExponential => {
                for (j, param) in parameters.iter().enumerate() {
                    thetas[2 + j] = scale * quartile_range(param);
                }
            }
            CovarianceKernel::Matern32 | CovarianceKernel::Matern52 => {
                let min_range = parameters
                    .iter()
                    .map(quartile_range)
                    .fold(f64::MAX, f64::min);
                thetas[2] = min_range * scale;
            }
        }
        self.thetas = thetas;
        self.cache = None;
        Ok(())
    }

    fn covariance_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut c = Array2::<f64>::zeros((n, n));
        for j in 0..n {
            let row_j = x.row(j);
            for k in j..n {
                let row_k = x.row(k);
                let v = self.kernel.covariance(&self.thetas, row_j, row_k);
                c[[j, k]] = v;
                c[[k, j]] = v;
            }
        }
        c
    }

    /// Build the cached quantities used by `predict`/`predict_mean`:
    /// `C^-1`, the two regression matrices, and the `beta`/`gamma`
    /// coefficient vectors. `x` is the `N x p` training design matrix
    /// owned by the emulator.
    pub fn make_cache(&mut self, x: &Array2<f64>) -> Result<(), EmulatorError> {
        let n = x.nrows();
        let p = x.ncols();
        let f = kernel::number_regression_functions(self.regression_order, p);
        if self.thetas.len() != self.kernel.number_thetas(p) {
            return Err(EmulatorError::DimensionMismatch(format!(
                "thetas has length {}, expected {}",
                self.thetas.len(),
                self.kernel.number_thetas(p)
            )));
        }
        if self.z_values.len() != n {
            return Err(EmulatorError::DimensionMismatch(format!(
                "z_values has length {}, expected {} (training points)",
                self.z_values.len(),
                n
            )));
        }

        let h = kernel::make_h_matrix(x, self.regression_order);
        let c = self.covariance_matrix(x);

        let c_chol = Cholesky::factor(&c).map_err(|_| {
            EmulatorError::NumericallyIllConditioned(
                "training covariance matrix is not positive definite".to_string(),
            )
        })?;
        let c_inverse = c_chol.inverse();

        let h_t_cinv = h.t().dot(&c_inverse);
        let inner = h_t_cinv.dot(&h);
        let inner_chol = Cholesky::factor(&inner).map_err(|_| {
            EmulatorError::NumericallyIllConditioned(format!(
                "regression matrix (F={}) is not positive definite; too few training points \
                 or too high a regression order",
                f
            ))
        })?;
        let regression_matrix_1 = inner_chol.inverse();
        let regression_matrix_2 = c_inverse.dot(&h).t().to_owned();

        let beta = regression_matrix_1.dot(&h_t_cinv.dot(&self.z_values));
        let gamma = c_inverse.dot(&(&self.z_values - &h.dot(&beta)));

        self.cache = Some(Cache {
            c_inverse,
            regression_matrix_1,
            regression_matrix_2,
            beta,
            gamma,
        });
        Ok(())
    }

    fn require_cache(&self) -> Result<&Cache, EmulatorError> {
        self.cache
            .as_ref()
            .ok_or_else(|| EmulatorError::NotReady("SingleModel has not been cached".to_string()))
    }

    fn kplus(&self, x: &Array2<f64>, point: &Array1<f64>) -> Array1<f64> {
        let n = x.nrows();
        let mut kplus = Array1::<f64>::zeros(n);
        for j in 0..n {
            let cov = self
                .kernel
                .covariance(&self.thetas, x.row(j), point.view());
            kplus[j] = if cov < 1e-10 { 0.0 } else { cov };
        }
        kplus
    }

    /// Predicted mean at `point`, without the variance.
    pub fn predict_mean(
        &self,
        x: &Array2<f64>,
        point: &Array1<f64>,
    ) -> Result<f64, EmulatorError> {
        let cache = self.require_cache()?;
        let h_vector = kernel::make_h_vector(point, self.regression_order);
        let kplus = self.kplus(x, point);
        Ok(h_vector.dot(&cache.beta) + kplus.dot(&cache.gamma))
    }

    /// Predicted mean and variance at `point`.
    pub fn predict(
        &self,
        x: &Array2<f64>,
        point: &Array1<f64>,
    ) -> Result<(f64, f64), EmulatorError> {
        let cache = self.require_cache()?;
        let h_vector = kernel::make_h_vector(point, self.regression_order);
        let kplus = self.kplus(x, point);

        let mean = h_vector.dot(&cache.beta) + kplus.dot(&cache.gamma);

        let f = &h_vector - &cache.regression_matrix_2.dot(&kplus);
        let self_cov = self.kernel.covariance(&self.thetas, point.view(), point.view());
        let variance = self_cov - kplus.dot(&cache.c_inverse.dot(&kplus))
            + f.dot(&cache.regression_matrix_1.dot(&f));
        Ok((mean, variance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn training_set() -> Array2<f64> {
        array![[0.0], [0.5], [1.0], [1.5], [2.0]]
    }

    #[test]
    fn basic_training_fills_length_scale_from_quartile_range() {
        let params = vec![Parameter::new("a", Distribution::uniform(0.0, 1.0))];
        let mut model = SingleModel::new(CovarianceKernel::SquareExponential, 1, array![0.0; 5]);
        model.basic_training(&params, 1e-3, 1.0, 1e-2).unwrap();
        assert_abs_diff_eq!(model.thetas[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.thetas[1], 1e-3, epsilon = 1e-12);
        assert!(model.thetas[2] > 0.0);
    }

    #[test]
    fn make_cache_reproduces_training_targets_closely() {
        let x = training_set();
        let z = x.column(0).mapv(|v| (v * 2.0).sin());
        let params = vec![Parameter::new("a", Distribution::uniform(0.0, 2.0))];
        let mut model = SingleModel::new(CovarianceKernel::SquareExponential, 1, z.clone());
        model.basic_training(&params, 1e-6, 1.0, 0.3).unwrap();
        model.make_cache(&x).unwrap();

        for i in 0..x.nrows() {
            let point = x.row(i).to_owned();
            let mean = model.predict_mean(&x, &point).unwrap();
            assert_abs_diff_eq!(mean, z[i], epsilon = 1e-6);
        }
    }

    #[test]
    fn variance_is_nonnegative_away_from_training_points() {
        let x = training_set();
        let z = x.column(0).mapv(|v| (v * 2.0).sin());
        let params = vec![Parameter::new("a", Distribution::uniform(0.0, 2.0))];
        let mut model = SingleModel::new(CovarianceKernel::SquareExponential, 1, z);
        model.basic_training(&params, 1e-6, 1.0, 0.3).unwrap();
        model.make_cache(&x).unwrap();

        let (_, variance) = model.predict(&x, &array![0.73]).unwrap();
        assert!(variance >= -1e-8);
    }

    #[test]
    fn predict_before_cache_is_not_ready() {
        let x = training_set();
        let model = SingleModel::new(CovarianceKernel::SquareExponential, 1, array![0.0; 5]);
        assert!(model.predict_mean(&x, &array![0.5]).is_err());
    }
}
