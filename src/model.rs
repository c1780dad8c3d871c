//! The `Model` abstraction shared by emulated and external simulators.

use ndarray::{Array1, Array2};

use crate::distribution::Parameter;
use crate::error::EmulatorError;
use crate::likelihood::{self, Observable};

/// Something that can be evaluated at a point in parameter space and
/// compared against an [`Observable`].
///
/// Implemented by [`crate::emulator::Emulator`]-backed models
/// (`EmulatedModel`) and by subprocess-backed models
/// (`crate::external_process::ExternalModel`). Object-safe so samplers
/// can hold a `dyn Model` without committing to a concrete backend.
pub trait Model {
    fn parameters(&self) -> &[Parameter];

    fn scalar_output_names(&self) -> &[String];

    /// Evaluate the model's scalar outputs at `parameters`.
    fn scalar_outputs(&self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError>;

    /// Evaluate the model's scalar outputs and, if the model has
    /// predictive uncertainty of its own, its output covariance.
    /// Defaults to calling `scalar_outputs` and reporting no covariance.
    fn scalar_outputs_and_covariance(
        &self,
        parameters: &Array1<f64>,
    ) -> Result<(Array1<f64>, Option<Array2<f64>>), EmulatorError> {
        Ok((self.scalar_outputs(parameters)?, None))
    }

    /// The experimental observation this model is being compared
    /// against.
    fn observed(&self) -> &Observable;

    /// Whether the model's own predictive covariance (if any) should be
    /// folded into the likelihood's combined covariance. Defaults to
    /// true.
    fn use_model_covariance(&self) -> bool {
        true
    }

    /// Log of the joint prior density `log pi(x)`, added on top of the
    /// Gaussian observation likelihood to form the full posterior
    /// log-likelihood. Defaults to the sum of each parameter's own
    /// prior log-density, which is `log pi(x)` for priors assumed
    /// independent across dimensions; overriding is only useful for a
    /// joint prior that couples parameters.
    fn log_prior_likelihood(&self, parameters: &Array1<f64>) -> f64 {
        self.parameters()
            .iter()
            .zip(parameters.iter())
            .map(|(param, &x)| param.prior.log_density(x))
            .sum()
    }

    /// Step size `h` used by `scalar_and_gradient_outputs`'s central
    /// difference. Defaults to `1e-4`, matching the original
    /// implementation's default gradient step.
    fn gradient_estimate_step_size(&self) -> f64 {
        1e-4
    }

    /// Evaluate scalar outputs and the combined log-likelihood
    /// (observation likelihood plus prior term) at `parameters`.
    fn scalar_outputs_and_log_likelihood(
        &self,
        parameters: &Array1<f64>,
    ) -> Result<(Array1<f64>, f64), EmulatorError> {
        let (scalars, covariance) = self.scalar_outputs_and_covariance(parameters)?;
        let observation_ll = likelihood::log_likelihood(
            self.observed(),
            &scalars,
            covariance.as_ref(),
            self.use_model_covariance(),
        )?;
        Ok((scalars, observation_ll + self.log_prior_likelihood(parameters)))
    }

    /// Central-difference gradient of output `output_index` with respect
    /// to each parameter flagged active in `active_parameters`, alongside
    /// the scalar outputs at `parameters` itself. The gradient vector has
    /// one entry per *active* parameter, in parameter order.
    fn scalar_and_gradient_outputs(
        &self,
        parameters: &Array1<f64>,
        active_parameters: &[bool],
        output_index: usize,
    ) -> Result<(Array1<f64>, Array1<f64>), EmulatorError> {
        if active_parameters.len() != self.parameters().len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "active_parameters has length {}, expected {}",
                active_parameters.len(),
                self.parameters().len()
            )));
        }
        if output_index >= self.scalar_output_names().len() {
            return Err(EmulatorError::InvalidArgument(format!(
                "output index {} out of range (have {} outputs)",
                output_index,
                self.scalar_output_names().len()
            )));
        }

        let h = self.gradient_estimate_step_size();
        let mut gradient = Vec::new();
        let mut probe = parameters.clone();

        for (i, &active) in active_parameters.iter().enumerate() {
            if !active {
                continue;
            }
            let original = probe[i];

            probe[i] = original + h;
            let forward = self.scalar_outputs(&probe)?;

            probe[i] = original - h;
            let backward = self.scalar_outputs(&probe)?;

            probe[i] = original;
            gradient.push((forward[output_index] - backward[output_index]) / (2.0 * h));
        }

        let scalars = self.scalar_outputs(parameters)?;
        Ok((scalars, Array1::from_vec(gradient)))
    }
}

/// A [`Model`] backed by a trained [`crate::emulator::Emulator`].
pub struct EmulatedModel {
    emulator: crate::emulator::Emulator,
    observed: Observable,
    use_model_covariance: bool,
}

impl EmulatedModel {
    pub fn new(emulator: crate::emulator::Emulator, observed: Observable) -> Result<Self, EmulatorError> {
        if observed.mean.len() != emulator.number_outputs() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "observed mean has length {}, expected {} (emulator outputs)",
                observed.mean.len(),
                emulator.number_outputs()
            )));
        }
        Ok(EmulatedModel {
            emulator,
            observed,
            use_model_covariance: true,
        })
    }

    pub fn set_use_model_covariance(&mut self, value: bool) {
        self.use_model_covariance = value;
    }

    pub fn emulator(&self) -> &crate::emulator::Emulator {
        &self.emulator
    }
}

impl Model for EmulatedModel {
    fn parameters(&self) -> &[Parameter] {
        self.emulator.parameters()
    }

    fn scalar_output_names(&self) -> &[String] {
        self.emulator.output_names()
    }

    fn scalar_outputs(&self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
        self.emulator.predict_mean(parameters)
    }

    fn scalar_outputs_and_covariance(
        &self,
        parameters: &Array1<f64>,
    ) -> Result<(Array1<f64>, Option<Array2<f64>>), EmulatorError> {
        let (mean, covariance) = self.emulator.predict(parameters)?;
        Ok((mean, Some(covariance)))
    }

    fn observed(&self) -> &Observable {
        &self.observed
    }

    fn use_model_covariance(&self) -> bool {
        self.use_model_covariance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::kernel::CovarianceKernel;
    use ndarray::array;

    fn trained_emulator() -> crate::emulator::Emulator {
        let parameters = vec![Parameter::new("x", Distribution::uniform(0.0, 3.0))];
        let output_names = vec!["a".to_string()];
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![[0.0], [1.0], [2.0], [3.0]];
        let mut emu = crate::emulator::Emulator::new(parameters, output_names, x, y).unwrap();
        emu.principal_component_decompose().unwrap();
        emu.retain_principal_components(1.0).unwrap();
        emu.basic_training(CovarianceKernel::SquareExponential, 1, 1e-6, 1.0, 0.3)
            .unwrap();
        emu.make_cache(false).unwrap();
        emu
    }

    #[test]
    fn emulated_model_reports_log_likelihood() {
        let emu = trained_emulator();
        let observed = Observable::with_independent_errors(array![1.5], array![0.2]).unwrap();
        let model = EmulatedModel::new(emu, observed).unwrap();
        let (scalars, ll) = model
            .scalar_outputs_and_log_likelihood(&array![1.5])
            .unwrap();
        assert!(scalars[0].is_finite());
        assert!(ll.is_finite());
    }

    #[test]
    fn gradient_matches_analytic_slope_for_linear_emulator() {
        let emu = trained_emulator();
        let observed = Observable::with_independent_errors(array![0.0], array![1.0]).unwrap();
        let model = EmulatedModel::new(emu, observed).unwrap();
        let (_scalars, gradient) = model
            .scalar_and_gradient_outputs(&array![1.5], &[true], 0)
            .unwrap();
        assert!((gradient[0] - 1.0).abs() < 1e-2);
    }
}
