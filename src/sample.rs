//! A single evaluated point: parameter values paired with model outputs.

use ndarray::Array1;

/// One evaluation of a [`crate::model::Model`]: the parameter vector that
/// produced it, the resulting scalar outputs, and (for posterior samples)
/// the log-likelihood and an optional gradient.
#[derive(Debug, Clone)]
pub struct Sample {
    pub parameters: Array1<f64>,
    pub outputs: Array1<f64>,
    pub log_likelihood: Option<f64>,
    pub gradient: Option<Array1<f64>>,
}

impl Sample {
    pub fn new(parameters: Array1<f64>, outputs: Array1<f64>) -> Self {
        Sample {
            parameters,
            outputs,
            log_likelihood: None,
            gradient: None,
        }
    }

    pub fn with_log_likelihood(mut self, log_likelihood: f64) -> Self {
        self.log_likelihood = Some(log_likelihood);
        self
    }

    pub fn with_gradient(mut self, gradient: Array1<f64>) -> Self {
        self.gradient = Some(gradient);
        self
    }
}
