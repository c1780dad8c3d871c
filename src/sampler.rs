//! Posterior samplers: random-walk Metropolis-Hastings and the
//! deterministic percentile grid.

use std::rc::Rc;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EmulatorError;
use crate::model::Model;
use crate::sample::Sample;

/// Shared sampler lifecycle: construct with a model, `initialize` to
/// draw or reset the starting state, then repeatedly call
/// `next_sample`.
pub trait Sampler {
    fn initialize(&mut self) -> Result<(), EmulatorError>;
    fn next_sample(&mut self) -> Result<Sample, EmulatorError>;
    fn active_parameters(&self) -> &[bool];
    fn set_active_parameters(&mut self, active: Vec<bool>) -> Result<(), EmulatorError>;

    fn number_of_active_parameters(&self) -> usize {
        self.active_parameters().iter().filter(|&&b| b).count()
    }
}

/// Random-walk Metropolis-Hastings over a model's active parameters.
pub struct MetropolisHastingsSampler {
    model: Rc<dyn Model>,
    rng: StdRng,
    active: Vec<bool>,
    step_size: f64,
    step_scales: Vec<f64>,
    current_parameters: Array1<f64>,
    current_outputs: Array1<f64>,
    current_log_likelihood: f64,
}

impl MetropolisHastingsSampler {
    pub fn new(model: Rc<dyn Model>, seed: u64) -> Self {
        let p = model.parameters().len();
        MetropolisHastingsSampler {
            model,
            rng: StdRng::seed_from_u64(seed),
            active: vec![true; p],
            step_size: 0.1,
            step_scales: vec![0.0; p],
            current_parameters: Array1::zeros(p),
            current_outputs: Array1::zeros(0),
            current_log_likelihood: f64::NEG_INFINITY,
        }
    }

    pub fn set_step_size(&mut self, step_size: f64) {
        self.step_size = step_size;
    }

    pub fn current_parameters(&self) -> &Array1<f64> {
        &self.current_parameters
    }

    pub fn current_log_likelihood(&self) -> f64 {
        self.current_log_likelihood
    }

    /// Fix the starting parameter vector, e.g. to freeze an inactive
    /// parameter at a specific value. Must be called before
    /// `initialize`, since `initialize` overwrites every active
    /// parameter with a fresh prior draw.
    pub fn set_current_parameters(&mut self, values: Array1<f64>) -> Result<(), EmulatorError> {
        if values.len() != self.model.parameters().len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "parameter vector has length {}, expected {}",
                values.len(),
                self.model.parameters().len()
            )));
        }
        self.current_parameters = values;
        Ok(())
    }
}

impl Sampler for MetropolisHastingsSampler {
    fn initialize(&mut self) -> Result<(), EmulatorError> {
        let params = self.model.parameters();
        for i in 0..params.len() {
            self.step_scales[i] = params[i].prior.quartile_range();
            if self.active[i] {
                self.current_parameters[i] = params[i].prior.sample(&mut self.rng);
            }
        }
        let (outputs, ll) = self
            .model
            .scalar_outputs_and_log_likelihood(&self.current_parameters)?;
        if ll.is_nan() {
            return Err(EmulatorError::NumericallyIllConditioned(
                "initial log-likelihood is NaN".to_string(),
            ));
        }
        self.current_outputs = outputs;
        self.current_log_likelihood = ll;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<Sample, EmulatorError> {
        let p = self.model.parameters().len();
        let mut candidate = self.current_parameters.clone();
        for i in 0..p {
            if self.active[i] {
                let step =
                    self.step_size * (self.rng.gen::<f64>() - 0.5) * self.step_scales[i];
                candidate[i] = self.current_parameters[i] + step;
            }
        }

        let (candidate_outputs, candidate_ll) =
            self.model.scalar_outputs_and_log_likelihood(&candidate)?;
        if candidate_ll.is_nan() {
            return Err(EmulatorError::NumericallyIllConditioned(
                "candidate log-likelihood is NaN".to_string(),
            ));
        }

        let delta = candidate_ll - self.current_log_likelihood;
        let accept = delta > 0.0 || delta.exp() > self.rng.gen::<f64>();

        if accept {
            self.current_parameters = candidate.clone();
            self.current_outputs = candidate_outputs.clone();
            self.current_log_likelihood = candidate_ll;
            Ok(Sample::new(candidate, candidate_outputs).with_log_likelihood(candidate_ll))
        } else {
            Ok(
                Sample::new(self.current_parameters.clone(), self.current_outputs.clone())
                    .with_log_likelihood(self.current_log_likelihood),
            )
        }
    }

    fn active_parameters(&self) -> &[bool] {
        &self.active
    }

    fn set_active_parameters(&mut self, active: Vec<bool>) -> Result<(), EmulatorError> {
        if active.len() != self.model.parameters().len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "active_parameters has length {}, expected {}",
                active.len(),
                self.model.parameters().len()
            )));
        }
        self.active = active;
        Ok(())
    }
}

/// Deterministic sweep over the prior percentiles of each active
/// parameter, enumerated lexicographically via an odometer-style state
/// vector.
pub struct PercentileGridSampler {
    model: Rc<dyn Model>,
    active: Vec<bool>,
    samples_per_dimension: usize,
    state_vector: Vec<usize>,
    exhausted: bool,
    current_parameters: Array1<f64>,
    current_outputs: Array1<f64>,
    current_log_likelihood: f64,
}

impl PercentileGridSampler {
    pub fn new(model: Rc<dyn Model>) -> Self {
        let p = model.parameters().len();
        PercentileGridSampler {
            model,
            active: vec![true; p],
            samples_per_dimension: 4,
            state_vector: vec![0; p],
            exhausted: false,
            current_parameters: Array1::zeros(p),
            current_outputs: Array1::zeros(0),
            current_log_likelihood: f64::NEG_INFINITY,
        }
    }

    /// Advance the odometer state vector by one step over the active
    /// dimensions. Sets `exhausted` once every active dimension has
    /// carried past its maximum value, i.e. the full grid has been
    /// enumerated.
    fn advance(&mut self) {
        let p = self.state_vector.len();
        let mut dim = 0;
        for _ in 0..p.max(1) {
            if self.active[dim] {
                if self.state_vector[dim] + 1 < self.samples_per_dimension {
                    self.state_vector[dim] += 1;
                    return;
                }
                self.state_vector[dim] = 0;
            }
            dim = (dim + 1) % p;
        }
        self.exhausted = true;
    }

    /// Choose the per-dimension grid resolution `n` so that
    /// `n^(active parameters)` is the smallest perfect grid size at
    /// least `target_total_samples`, clamped to a minimum of 2.
    pub fn set_number_of_samples(&mut self, target_total_samples: usize) -> Result<(), EmulatorError> {
        let p = self.number_of_active_parameters();
        if p == 0 {
            return Err(EmulatorError::InvalidArgument(
                "at least one parameter must be active".to_string(),
            ));
        }
        let n = (target_total_samples as f64).powf(1.0 / p as f64).ceil() as usize;
        self.samples_per_dimension = n.max(2);
        Ok(())
    }

    /// The exact total number of samples a full sweep will produce:
    /// `samples_per_dimension ^ (active parameters)`.
    pub fn number_of_samples(&self) -> usize {
        let p = self.number_of_active_parameters();
        if p == 0 {
            return 0;
        }
        self.samples_per_dimension.pow(p as u32)
    }

    pub fn current_parameters(&self) -> &Array1<f64> {
        &self.current_parameters
    }

    /// Fix the value held by inactive (frozen) parameters; active
    /// parameters are overwritten by `next_sample` regardless.
    pub fn set_current_parameters(&mut self, values: Array1<f64>) -> Result<(), EmulatorError> {
        if values.len() != self.model.parameters().len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "parameter vector has length {}, expected {}",
                values.len(),
                self.model.parameters().len()
            )));
        }
        self.current_parameters = values;
        Ok(())
    }
}

impl Sampler for PercentileGridSampler {
    fn initialize(&mut self) -> Result<(), EmulatorError> {
        let p = self.model.parameters().len();
        self.state_vector = vec![0; p];
        self.exhausted = false;
        Ok(())
    }

    fn next_sample(&mut self) -> Result<Sample, EmulatorError> {
        if self.number_of_active_parameters() == 0 {
            return Err(EmulatorError::InvalidArgument(
                "at least one parameter must be active".to_string(),
            ));
        }
        if self.exhausted {
            return Err(EmulatorError::OutputOutOfRange(
                "percentile grid sampler has enumerated every grid point; call initialize() \
                 to sweep again"
                    .to_string(),
            ));
        }
        let params = self.model.parameters();
        let p = params.len();
        let range_over_n = 1.0 / self.samples_per_dimension as f64;
        let start = 0.5 * range_over_n;

        for dim in 0..p {
            if self.active[dim] {
                let q = start + (self.state_vector[dim] as f64) * range_over_n;
                self.current_parameters[dim] = params[dim].prior.percentile(q);
            }
        }

        self.advance();

        let (outputs, ll) = self
            .model
            .scalar_outputs_and_log_likelihood(&self.current_parameters)?;
        self.current_outputs = outputs.clone();
        self.current_log_likelihood = ll;
        Ok(Sample::new(self.current_parameters.clone(), outputs).with_log_likelihood(ll))
    }

    fn active_parameters(&self) -> &[bool] {
        &self.active
    }

    fn set_active_parameters(&mut self, active: Vec<bool>) -> Result<(), EmulatorError> {
        if active.len() != self.model.parameters().len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "active_parameters has length {}, expected {}",
                active.len(),
                self.model.parameters().len()
            )));
        }
        self.active = active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use crate::distribution::Parameter;
    use crate::likelihood::Observable;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    struct LinearModel {
        parameters: Vec<Parameter>,
        output_names: Vec<String>,
        observed: Observable,
    }

    impl Model for LinearModel {
        fn parameters(&self) -> &[Parameter] {
            &self.parameters
        }
        fn scalar_output_names(&self) -> &[String] {
            &self.output_names
        }
        fn scalar_outputs(&self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
            Ok(array![parameters[0]])
        }
        fn observed(&self) -> &Observable {
            &self.observed
        }
    }

    fn linear_model() -> Rc<dyn Model> {
        Rc::new(LinearModel {
            parameters: vec![Parameter::new("x", Distribution::uniform(-5.0, 5.0))],
            output_names: vec!["y".to_string()],
            observed: Observable::with_independent_errors(array![0.0], array![1.0]).unwrap(),
        })
    }

    struct TwoParamModel {
        parameters: Vec<Parameter>,
        output_names: Vec<String>,
        observed: Observable,
    }

    impl Model for TwoParamModel {
        fn parameters(&self) -> &[Parameter] {
            &self.parameters
        }
        fn scalar_output_names(&self) -> &[String] {
            &self.output_names
        }
        fn scalar_outputs(&self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
            Ok(array![parameters[0] + parameters[1]])
        }
        fn observed(&self) -> &Observable {
            &self.observed
        }
    }

    fn two_param_model() -> Rc<dyn Model> {
        Rc::new(TwoParamModel {
            parameters: vec![
                Parameter::new("x", Distribution::uniform(20.0, 26.0)),
                Parameter::new("y", Distribution::uniform(-20.0, -8.0)),
            ],
            output_names: vec!["sum".to_string()],
            observed: Observable::with_independent_errors(array![0.0], array![1.0]).unwrap(),
        })
    }

    struct NanModel {
        parameters: Vec<Parameter>,
        output_names: Vec<String>,
        observed: Observable,
    }

    impl Model for NanModel {
        fn parameters(&self) -> &[Parameter] {
            &self.parameters
        }
        fn scalar_output_names(&self) -> &[String] {
            &self.output_names
        }
        fn scalar_outputs(&self, _parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
            Ok(array![f64::NAN])
        }
        fn observed(&self) -> &Observable {
            &self.observed
        }
    }

    fn nan_model() -> Rc<dyn Model> {
        Rc::new(NanModel {
            parameters: vec![Parameter::new("x", Distribution::uniform(-5.0, 5.0))],
            output_names: vec!["y".to_string()],
            observed: Observable::with_independent_errors(array![0.0], array![1.0]).unwrap(),
        })
    }

    #[test]
    fn mh_sampler_rejects_nan_log_likelihood_at_initialize_instead_of_masking_it() {
        let model = nan_model();
        let mut sampler = MetropolisHastingsSampler::new(model, 42);
        assert!(sampler.initialize().is_err());
    }

    #[test]
    fn mh_sampler_rejects_nan_candidate_log_likelihood_instead_of_silently_rejecting_it() {
        let model = linear_model();
        let mut sampler = MetropolisHastingsSampler::new(Rc::clone(&model), 42);
        sampler.initialize().unwrap();
        sampler.set_current_parameters(array![f64::NAN]).unwrap();
        assert!(sampler.next_sample().is_err());
    }

    #[test]
    fn mh_sampler_stays_within_prior_support_after_many_steps() {
        let model = linear_model();
        let mut sampler = MetropolisHastingsSampler::new(model, 42);
        sampler.initialize().unwrap();
        for _ in 0..200 {
            let sample = sampler.next_sample().unwrap();
            assert!(sample.parameters[0] >= -5.0 - 1e-6 && sample.parameters[0] <= 5.0 + 1e-6);
        }
    }

    #[test]
    fn percentile_grid_produces_exact_declared_count() {
        let model = linear_model();
        let mut sampler = PercentileGridSampler::new(model);
        sampler.set_number_of_samples(9).unwrap();
        sampler.initialize().unwrap();
        let total = sampler.number_of_samples();
        let mut seen = Vec::new();
        for _ in 0..total {
            let sample = sampler.next_sample().unwrap();
            seen.push(sample.parameters[0]);
        }
        assert_eq!(seen.len(), total);
        // Grid sweep must wrap back to the first point's neighborhood.
        assert_eq!(sampler.state_vector, vec![0]);
    }

    #[test]
    fn percentile_grid_rejects_zero_active_parameters() {
        let model = linear_model();
        let mut sampler = PercentileGridSampler::new(model);
        sampler.set_active_parameters(vec![false]).unwrap();
        assert!(sampler.set_number_of_samples(10).is_err());
    }

    #[test]
    fn percentile_grid_fails_fast_after_exhaustion_without_reset() {
        let model = linear_model();
        let mut sampler = PercentileGridSampler::new(model);
        sampler.set_number_of_samples(4).unwrap();
        sampler.initialize().unwrap();
        let total = sampler.number_of_samples();
        for _ in 0..total {
            sampler.next_sample().unwrap();
        }
        assert!(sampler.next_sample().is_err());
        sampler.initialize().unwrap();
        assert!(sampler.next_sample().is_ok());
    }

    #[test]
    fn percentile_grid_freezes_inactive_parameter_at_its_configured_value() {
        let model = two_param_model();
        let mut sampler = PercentileGridSampler::new(Rc::clone(&model));
        sampler.set_active_parameters(vec![false, true]).unwrap();
        sampler
            .set_current_parameters(array![23.2, -14.0])
            .unwrap();
        sampler.set_number_of_samples(10).unwrap();
        assert_eq!(sampler.number_of_samples(), 10);
        sampler.initialize().unwrap();
        for _ in 0..sampler.number_of_samples() {
            let sample = sampler.next_sample().unwrap();
            assert_abs_diff_eq!(sample.parameters[0], 23.2, epsilon = 1e-12);
        }
    }
}
