//! Prior distributions and the [`Parameter`] they attach to.

use rand::Rng;
use statrs::distribution::{ContinuousCDF, Normal};

/// A one-dimensional prior distribution.
///
/// Modeled as an enum rather than a trait object: the original
/// implementation has exactly two concrete priors and nothing in this
/// crate needs a third kind behind a dynamic dispatch boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distribution {
    Uniform { min: f64, max: f64 },
    Gaussian { mean: f64, sd: f64 },
}

impl Distribution {
    pub fn uniform(min: f64, max: f64) -> Self {
        Distribution::Uniform { min, max }
    }

    pub fn gaussian(mean: f64, sd: f64) -> Self {
        Distribution::Gaussian { mean, sd }
    }

    /// Probability density at `x`.
    pub fn density(&self, x: f64) -> f64 {
        match *self {
            Distribution::Uniform { min, max } => {
                if x < min || x > max {
                    0.0
                } else {
                    1.0 / (max - min)
                }
            }
            Distribution::Gaussian { mean, sd } => {
                let z = (x - mean) / sd;
                (-0.5 * z * z).exp() / (sd * (2.0 * std::f64::consts::PI).sqrt())
            }
        }
    }

    /// Log probability density at `x`.
    pub fn log_density(&self, x: f64) -> f64 {
        match *self {
            Distribution::Uniform { min, max } => {
                if x < min || x > max {
                    f64::NEG_INFINITY
                } else {
                    -((max - min).ln())
                }
            }
            Distribution::Gaussian { mean, sd } => {
                let z = (x - mean) / sd;
                -0.5 * z * z - sd.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
            }
        }
    }

    /// The value `x` such that `P(X <= x) == q`, for `q` in `(0, 1)`.
    ///
    /// For the Gaussian case this goes through the standard normal inverse
    /// CDF rather than hardcoding the legacy table of quartile constants;
    /// it agrees with that table to double precision at q=0.25 and q=0.75
    /// and is well defined for any quantile, unlike the table it replaces.
    pub fn percentile(&self, q: f64) -> f64 {
        match *self {
            Distribution::Uniform { min, max } => min + q * (max - min),
            Distribution::Gaussian { mean, sd } => {
                let standard = Normal::new(0.0, 1.0).expect("standard normal is always valid");
                mean + sd * standard.inverse_cdf(q)
            }
        }
    }

    /// Draw a single sample.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            Distribution::Uniform { min, max } => rng.gen_range(min..=max),
            Distribution::Gaussian { mean, sd } => {
                let q: f64 = rng.gen_range(f64::EPSILON..1.0 - f64::EPSILON);
                self_percentile_gaussian(mean, sd, q)
            }
        }
    }

    /// The inter-quartile range `percentile(0.75) - percentile(0.25)`,
    /// used by the Metropolis-Hastings sampler to scale its proposal step.
    pub fn quartile_range(&self) -> f64 {
        self.percentile(0.75) - self.percentile(0.25)
    }
}

fn self_percentile_gaussian(mean: f64, sd: f64, q: f64) -> f64 {
    let standard = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    mean + sd * standard.inverse_cdf(q)
}

/// A named input to a [`crate::model::Model`], with a prior distribution
/// and advisory bounds used for display/validation but not enforced by
/// the prior itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub prior: Distribution,
    pub min: f64,
    pub max: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, prior: Distribution) -> Self {
        let (min, max) = match prior {
            Distribution::Uniform { min, max } => (min, max),
            Distribution::Gaussian { mean, sd } => (mean - 4.0 * sd, mean + 4.0 * sd),
        };
        Parameter {
            name: name.into(),
            prior,
            min,
            max,
        }
    }

    /// Default prior: `Uniform[0, 1]`, matching the original implementation's
    /// default-constructed `Parameter`.
    pub fn with_default_prior(name: impl Into<String>) -> Self {
        Parameter::new(name, Distribution::uniform(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn gaussian_percentile_matches_legacy_quartile_constants() {
        let d = Distribution::gaussian(0.0, 1.0);
        assert_abs_diff_eq!(d.percentile(0.25), -0.6744897501960817, epsilon = 1e-9);
        assert_abs_diff_eq!(d.percentile(0.75), 0.6744897501960817, epsilon = 1e-9);
    }

    #[test]
    fn uniform_percentile_is_linear() {
        let d = Distribution::uniform(2.0, 6.0);
        assert_abs_diff_eq!(d.percentile(0.5), 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.percentile(0.0), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(d.percentile(1.0), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn uniform_density_is_zero_outside_support() {
        let d = Distribution::uniform(0.0, 1.0);
        assert_eq!(d.density(-0.1), 0.0);
        assert_eq!(d.density(1.1), 0.0);
        assert_abs_diff_eq!(d.density(0.5), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn quartile_range_is_positive_for_nondegenerate_priors() {
        let d = Distribution::gaussian(1.0, 2.0);
        assert!(d.quartile_range() > 0.0);
    }
}
