//! The multi-output Gaussian-process emulator: training-data storage, PCA
//! compression across outputs, and one [`SingleModel`] per retained
//! principal component.

use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;

use crate::distribution::Parameter;
use crate::error::EmulatorError;
use crate::kernel::CovarianceKernel;
use crate::linalg;
use crate::single_model::SingleModel;

/// The emulator's readiness, checked in order: each stage requires all
/// previous stages' invariants to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EmulatorStatus {
    /// Training data has not been loaded, or is internally inconsistent.
    Uninitialized,
    /// Training data loaded; no covariance kernels assigned yet.
    Untrained,
    /// Kernels and hyperparameters assigned, but the prediction caches
    /// (`C^-1`, regression matrices) have not been built.
    Uncached,
    /// Fully trained and cached; ready for `predict`/`predict_mean`.
    Ready,
}

#[derive(Debug, Clone)]
pub struct Emulator {
    parameters: Vec<Parameter>,
    output_names: Vec<String>,

    parameter_values: Array2<f64>,
    output_values: Array2<f64>,
    output_uncertainty_scales: Array1<f64>,

    output_means: Array1<f64>,
    pca_eigenvalues: Array1<f64>,
    pca_eigenvectors: Array2<f64>,

    retained_pca_eigenvalues: Array1<f64>,
    retained_pca_eigenvectors: Array2<f64>,

    models: Vec<SingleModel>,
    status: EmulatorStatus,
}

impl Emulator {
    /// Build a new emulator from training data: `parameter_values` is
    /// `N x p`, `output_values` is `N x t`. Uncertainty scales default to
    /// `1.0` and observed values to `0.0`, matching the defaults the
    /// original implementation fills in when they are absent from a
    /// loaded file.
    pub fn new(
        parameters: Vec<Parameter>,
        output_names: Vec<String>,
        parameter_values: Array2<f64>,
        output_values: Array2<f64>,
    ) -> Result<Self, EmulatorError> {
        let n = parameter_values.nrows();
        let p = parameters.len();
        let t = output_names.len();

        if parameter_values.ncols() != p {
            return Err(EmulatorError::DimensionMismatch(format!(
                "parameter_values has {} columns, expected {} (number of parameters)",
                parameter_values.ncols(),
                p
            )));
        }
        if output_values.nrows() != n {
            return Err(EmulatorError::DimensionMismatch(format!(
                "output_values has {} rows, expected {} (number of training points)",
                output_values.nrows(),
                n
            )));
        }
        if output_values.ncols() != t {
            return Err(EmulatorError::DimensionMismatch(format!(
                "output_values has {} columns, expected {} (number of outputs)",
                output_values.ncols(),
                t
            )));
        }
        if n < 1 || p < 1 || t < 1 {
            return Err(EmulatorError::DimensionMismatch(
                "emulator requires at least one training point, parameter, and output"
                    .to_string(),
            ));
        }

        Ok(Emulator {
            parameters,
            output_names,
            parameter_values,
            output_values,
            output_uncertainty_scales: Array1::ones(t),
            output_means: Array1::zeros(0),
            pca_eigenvalues: Array1::zeros(0),
            pca_eigenvectors: Array2::zeros((0, 0)),
            retained_pca_eigenvalues: Array1::zeros(0),
            retained_pca_eigenvectors: Array2::zeros((0, 0)),
            models: Vec::new(),
            status: EmulatorStatus::Untrained,
        })
    }

    pub fn status(&self) -> EmulatorStatus {
        self.status
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }

    pub fn number_training_points(&self) -> usize {
        self.parameter_values.nrows()
    }

    pub fn number_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn number_outputs(&self) -> usize {
        self.output_names.len()
    }

    pub fn number_pca_outputs(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[SingleModel] {
        &self.models
    }

    pub fn set_output_uncertainty_scales(
        &mut self,
        scales: Array1<f64>,
    ) -> Result<(), EmulatorError> {
        if scales.len() != self.number_outputs() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "uncertainty scales has length {}, expected {}",
                scales.len(),
                self.number_outputs()
            )));
        }
        if scales.iter().any(|&s| s <= 0.0) {
            return Err(EmulatorError::InvalidUncertainty(
                "output uncertainty scales must be strictly positive".to_string(),
            ));
        }
        self.output_uncertainty_scales = scales;
        Ok(())
    }

    pub fn output_uncertainty_scales(&self) -> &Array1<f64> {
        &self.output_uncertainty_scales
    }

    pub fn parameter_values(&self) -> &Array2<f64> {
        &self.parameter_values
    }

    pub fn output_means(&self) -> &Array1<f64> {
        &self.output_means
    }

    pub fn retained_pca_eigenvectors(&self) -> &Array2<f64> {
        &self.retained_pca_eigenvectors
    }

    pub fn retained_pca_eigenvalues(&self) -> &Array1<f64> {
        &self.retained_pca_eigenvalues
    }

    pub fn pca_eigenvalues(&self) -> &Array1<f64> {
        &self.pca_eigenvalues
    }

    pub fn pca_eigenvectors(&self) -> &Array2<f64> {
        &self.pca_eigenvectors
    }

    fn standardize_outputs(&self) -> Array2<f64> {
        let n = self.number_training_points();
        let t = self.number_outputs();
        let mut standardized = Array2::<f64>::zeros((n, t));
        for i in 0..t {
            let scale = 1.0 / self.output_uncertainty_scales[i];
            for j in 0..n {
                standardized[[j, i]] = scale * (self.output_values[[j, i]] - self.output_means[i]);
            }
        }
        standardized
    }

    /// Standardize, form the `t x t` output covariance matrix, and
    /// eigendecompose it. Eigenvalues come back ascending, matching
    /// `Eigen::SelfAdjointEigenSolver`'s convention.
    pub fn principal_component_decompose(&mut self) -> Result<(), EmulatorError> {
        let n = self.number_training_points();
        let t = self.number_outputs();

        self.output_means = self
            .output_values
            .mean_axis(Axis(0))
            .expect("at least one training row");

        let standardized = self.standardize_outputs();
        let ycov = standardized.t().dot(&standardized) / (n as f64);

        let (eigenvalues, eigenvectors) = linalg::symmetric_eigen(&ycov);
        debug_assert_eq!(eigenvalues.len(), t);

        self.pca_eigenvalues = eigenvalues;
        self.pca_eigenvectors = eigenvectors;
        Ok(())
    }

    /// Keep the smallest number `r` of leading principal components (by
    /// descending eigenvalue) whose cumulative "resolving power"
    /// `prod sqrt(1 + eigenvalue)` reaches `fraction` of the total
    /// resolving power across all `t` components.
    pub fn retain_principal_components(&mut self, fraction: f64) -> Result<(), EmulatorError> {
        if !(0.0 < fraction && fraction <= 1.0) {
            return Err(EmulatorError::InvalidArgument(format!(
                "fractional resolving power must be in (0, 1], got {}",
                fraction
            )));
        }
        let t = self.number_outputs();
        if self.pca_eigenvalues.len() != t {
            return Err(EmulatorError::NotReady(
                "principal_component_decompose must run before retain_principal_components"
                    .to_string(),
            ));
        }

        let total_resolving_power: f64 = self
            .pca_eigenvalues
            .iter()
            .map(|&lambda| (1.0 + lambda).sqrt())
            .product();
        let target = total_resolving_power * fraction;

        let mut resolving_power = 1.0;
        let mut r = t;
        for i in (0..t).rev() {
            resolving_power *= (1.0 + self.pca_eigenvalues[i]).sqrt();
            if resolving_power >= target {
                r = t - i;
                break;
            }
        }
        r = r.max(1);

        self.retained_pca_eigenvalues = self.pca_eigenvalues.slice(ndarray::s![t - r..]).to_owned();
        self.retained_pca_eigenvectors = self
            .pca_eigenvectors
            .slice(ndarray::s![.., t - r..])
            .to_owned();

        self.models = Vec::with_capacity(r);
        let z = self.build_z_vectors(r);
        for i in 0..r {
            self.models.push(SingleModel::new(
                CovarianceKernel::SquareExponential,
                0,
                z.column(i).to_owned(),
            ));
        }
        self.status = EmulatorStatus::Untrained;
        Ok(())
    }

    fn build_z_vectors(&self, r: usize) -> Array2<f64> {
        let standardized = self.standardize_outputs();
        standardized.dot(&self.retained_pca_eigenvectors.slice(ndarray::s![.., ..r]))
    }

    /// Rebuild every retained component's `z_values` from the current
    /// training data and retained eigenvectors. Needed after a
    /// `retain_principal_components` call, and exposed so a loader can
    /// recompute them from a persisted PCA block.
    pub fn rebuild_z_vectors(&mut self) -> Result<(), EmulatorError> {
        let r = self.models.len();
        if r == 0 {
            return Err(EmulatorError::NotReady(
                "retain_principal_components must run before rebuild_z_vectors".to_string(),
            ));
        }
        let z = self.build_z_vectors(r);
        for (i, model) in self.models.iter_mut().enumerate() {
            model.z_values = z.column(i).to_owned();
        }
        Ok(())
    }

    /// Assign default hyperparameters to every retained component's
    /// model, the way a first-pass analysis would before any
    /// maximum-likelihood refinement.
    pub fn basic_training(
        &mut self,
        kernel: CovarianceKernel,
        regression_order: usize,
        default_nugget: f64,
        amplitude: f64,
        scale: f64,
    ) -> Result<(), EmulatorError> {
        if self.models.is_empty() {
            return Err(EmulatorError::NotReady(
                "retain_principal_components must run before basic_training".to_string(),
            ));
        }
        if regression_order > 3 {
            return Err(EmulatorError::InvalidArgument(format!(
                "regression order {} exceeds the supported maximum of 3",
                regression_order
            )));
        }
        for model in self.models.iter_mut() {
            model.kernel = kernel;
            model.regression_order = regression_order;
            model.basic_training(&self.parameters, default_nugget, amplitude, scale)?;
        }
        self.status = EmulatorStatus::Uncached;
        Ok(())
    }

    /// Restore a single retained component's kernel, regression order,
    /// and trained hyperparameters directly, bypassing `basic_training`.
    /// Used when reloading a previously persisted emulator state.
    pub fn set_model_hyperparameters(
        &mut self,
        index: usize,
        kernel: CovarianceKernel,
        regression_order: usize,
        thetas: Array1<f64>,
    ) -> Result<(), EmulatorError> {
        let model = self.models.get_mut(index).ok_or_else(|| {
            EmulatorError::InvalidArgument(format!(
                "model index {} out of range (have {})",
                index,
                self.models.len()
            ))
        })?;
        let expected = kernel.number_thetas(self.parameter_values.ncols());
        if thetas.len() != expected {
            return Err(EmulatorError::DimensionMismatch(format!(
                "thetas has length {}, expected {}",
                thetas.len(),
                expected
            )));
        }
        model.kernel = kernel;
        model.regression_order = regression_order;
        model.thetas = thetas;
        model.clear_cache();
        self.status = EmulatorStatus::Uncached;
        Ok(())
    }

    /// Build every component's prediction cache. When `parallel` is
    /// true and the crate is built with the `rayon` feature, components
    /// are cached concurrently; otherwise they run in sequence. Both
    /// paths produce identical results, so tests can force the
    /// sequential path for determinism.
    pub fn make_cache(&mut self, parallel: bool) -> Result<(), EmulatorError> {
        if self.status != EmulatorStatus::Uncached && self.status != EmulatorStatus::Ready {
            return Err(EmulatorError::NotReady(format!(
                "emulator must be Uncached or Ready to build caches, was {:?}",
                self.status
            )));
        }
        let x = self.parameter_values.clone();

        if parallel {
            let results: Vec<Result<(), EmulatorError>> = self
                .models
                .par_iter_mut()
                .map(|m| m.make_cache(&x))
                .collect();
            for r in results {
                r?;
            }
        } else {
            for model in self.models.iter_mut() {
                model.make_cache(&x)?;
            }
        }
        self.status = EmulatorStatus::Ready;
        Ok(())
    }

    fn require_ready(&self) -> Result<(), EmulatorError> {
        if self.status != EmulatorStatus::Ready {
            return Err(EmulatorError::NotReady(format!(
                "emulator is not ready: status is {:?}",
                self.status
            )));
        }
        Ok(())
    }

    /// Predicted mean in the original (non-PCA) output space, without
    /// covariance.
    pub fn predict_mean(&self, point: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
        self.require_ready()?;
        if point.len() != self.number_parameters() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "query point has {} components, expected {}",
                point.len(),
                self.number_parameters()
            )));
        }
        let mut mean_pca = Array1::<f64>::zeros(self.models.len());
        for (i, model) in self.models.iter().enumerate() {
            mean_pca[i] = model.predict_mean(&self.parameter_values, point)?;
        }
        Ok(&self.output_means
            + &(&self.output_uncertainty_scales * &self.retained_pca_eigenvectors.dot(&mean_pca)))
    }

    /// Predicted mean and full `t x t` covariance in the original output
    /// space.
    pub fn predict(
        &self,
        point: &Array1<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>), EmulatorError> {
        self.require_ready()?;
        if point.len() != self.number_parameters() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "query point has {} components, expected {}",
                point.len(),
                self.number_parameters()
            )));
        }
        let r = self.models.len();
        let mut mean_pca = Array1::<f64>::zeros(r);
        let mut var_pca = Array1::<f64>::zeros(r);
        for (i, model) in self.models.iter().enumerate() {
            let (mean, variance) = model.predict(&self.parameter_values, point)?;
            mean_pca[i] = mean;
            var_pca[i] = variance;
        }

        let mean = &self.output_means
            + &(&self.output_uncertainty_scales * &self.retained_pca_eigenvectors.dot(&mean_pca));

        let t = self.number_outputs();
        let mut covariance = Array2::<f64>::zeros((t, t));
        let weighted = self
            .retained_pca_eigenvectors
            .dot(&Array2::from_diag(&var_pca))
            .dot(&self.retained_pca_eigenvectors.t());
        for i in 0..t {
            for j in 0..t {
                covariance[[i, j]] =
                    self.output_uncertainty_scales[i] * self.output_uncertainty_scales[j] * weighted[[i, j]];
            }
        }
        Ok((mean, covariance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn toy_emulator() -> Emulator {
        let parameters = vec![Parameter::new("x", Distribution::uniform(0.0, 3.0))];
        let output_names = vec!["a".to_string(), "b".to_string()];
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![
            [0.0, 1.0],
            [1.0, 0.5],
            [2.0, 0.0],
            [3.0, -0.5],
        ];
        Emulator::new(parameters, output_names, x, y).unwrap()
    }

    #[test]
    fn new_rejects_mismatched_dimensions() {
        let parameters = vec![Parameter::new("x", Distribution::uniform(0.0, 1.0))];
        let output_names = vec!["a".to_string()];
        let x = array![[0.0, 1.0]]; // 2 columns but 1 parameter
        let y = array![[1.0]];
        assert!(Emulator::new(parameters, output_names, x, y).is_err());
    }

    #[test]
    fn status_progresses_through_training_pipeline() {
        let mut emu = toy_emulator();
        assert_eq!(emu.status(), EmulatorStatus::Untrained);

        emu.principal_component_decompose().unwrap();
        emu.retain_principal_components(0.999).unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Untrained);

        emu.basic_training(CovarianceKernel::SquareExponential, 1, 1e-4, 1.0, 0.3)
            .unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Uncached);

        emu.make_cache(false).unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Ready);
    }

    #[test]
    fn s1_full_retention_reproduces_training_rows() {
        let mut emu = toy_emulator();
        emu.principal_component_decompose().unwrap();
        emu.retain_principal_components(1.0).unwrap();
        emu.basic_training(CovarianceKernel::SquareExponential, 1, 1e-8, 1.0, 0.3)
            .unwrap();
        emu.make_cache(false).unwrap();

        let x = emu.parameter_values().clone();
        for i in 0..x.nrows() {
            let point = x.row(i).to_owned();
            let (mean, _cov) = emu.predict(&point).unwrap();
            let actual = emu.output_values.row(i);
            for j in 0..mean.len() {
                assert_abs_diff_eq!(mean[j], actual[j], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn predict_before_ready_returns_not_ready() {
        let emu = toy_emulator();
        assert!(emu.predict(&array![1.0]).is_err());
    }

    #[test]
    fn retain_principal_components_rejects_out_of_range_fraction() {
        let mut emu = toy_emulator();
        emu.principal_component_decompose().unwrap();
        assert!(emu.retain_principal_components(0.0).is_err());
        assert!(emu.retain_principal_components(1.5).is_err());
    }

    #[test]
    fn set_model_hyperparameters_invalidates_a_ready_emulators_cache() {
        let mut emu = toy_emulator();
        emu.principal_component_decompose().unwrap();
        emu.retain_principal_components(1.0).unwrap();
        emu.basic_training(CovarianceKernel::SquareExponential, 1, 1e-6, 1.0, 0.3)
            .unwrap();
        emu.make_cache(false).unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Ready);

        emu.set_model_hyperparameters(
            0,
            CovarianceKernel::SquareExponential,
            1,
            array![2.0, 1e-6, 0.9],
        )
        .unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Uncached);
        assert!(emu.predict(&array![1.5]).is_err());

        emu.make_cache(false).unwrap();
        assert_eq!(emu.status(), EmulatorStatus::Ready);
        assert!(emu.predict(&array![1.5]).is_ok());
    }

    #[test]
    fn make_cache_is_idempotent() {
        let mut emu = toy_emulator();
        emu.principal_component_decompose().unwrap();
        emu.retain_principal_components(1.0).unwrap();
        emu.basic_training(CovarianceKernel::SquareExponential, 1, 1e-6, 1.0, 0.3)
            .unwrap();
        emu.make_cache(false).unwrap();
        let (mean_first, _) = emu.predict(&array![1.5]).unwrap();
        emu.make_cache(false).unwrap();
        let (mean_second, _) = emu.predict(&array![1.5]).unwrap();
        for j in 0..mean_first.len() {
            assert_abs_diff_eq!(mean_first[j], mean_second[j], epsilon = 1e-12);
        }
    }
}
