//! Latin-hypercube design generation.
//!
//! This crate's core is the emulator and samplers; the experiment-design
//! step that produces training inputs is a thin collaborator, specified
//! only by its output contract: an `N x p` matrix with exactly one
//! sample per stratum per dimension, independently permuted per column.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::error::EmulatorError;

/// Generate an `n x p` Latin hypercube design with values in `[0, 1)`.
/// Uses its own RNG stream (seeded independently from any sampler), so
/// design generation never perturbs a sampler's reproducibility.
pub fn generate(n: usize, p: usize, seed: u64) -> Result<Array2<f64>, EmulatorError> {
    if n == 0 || p == 0 {
        return Err(EmulatorError::InvalidArgument(
            "Latin hypercube design requires n > 0 and p > 0".to_string(),
        ));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut design = Array2::<f64>::zeros((n, p));

    for dim in 0..p {
        let mut strata: Vec<usize> = (0..n).collect();
        strata.shuffle(&mut rng);
        for (row, &stratum) in strata.iter().enumerate() {
            let jitter: f64 = rng.gen();
            design[[row, dim]] = (stratum as f64 + jitter) / n as f64;
        }
    }
    Ok(design)
}

/// Rescale a unit-interval design (as produced by [`generate`]) into the
/// `[min, max]` box described by `bounds`, one `(min, max)` pair per
/// column.
pub fn rescale(design: &Array2<f64>, bounds: &[(f64, f64)]) -> Result<Array2<f64>, EmulatorError> {
    if bounds.len() != design.ncols() {
        return Err(EmulatorError::DimensionMismatch(format!(
            "{} bounds given, expected {} (design columns)",
            bounds.len(),
            design.ncols()
        )));
    }
    let mut scaled = design.clone();
    for (col, &(min, max)) in bounds.iter().enumerate() {
        for row in 0..scaled.nrows() {
            scaled[[row, col]] = min + scaled[[row, col]] * (max - min);
        }
    }
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_column_has_one_sample_per_stratum() {
        let design = generate(8, 3, 7).unwrap();
        for col in 0..3 {
            let mut strata: Vec<usize> = design
                .column(col)
                .iter()
                .map(|&v| (v * 8.0).floor() as usize)
                .collect();
            strata.sort_unstable();
            assert_eq!(strata, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn rescale_maps_into_requested_bounds() {
        let design = generate(5, 2, 1).unwrap();
        let scaled = rescale(&design, &[(10.0, 20.0), (-1.0, 1.0)]).unwrap();
        for &v in scaled.column(0).iter() {
            assert!((10.0..20.0).contains(&v));
        }
        for &v in scaled.column(1).iter() {
            assert!((-1.0..1.0).contains(&v));
        }
    }

    #[test]
    fn rejects_zero_sized_design() {
        assert!(generate(0, 3, 1).is_err());
        assert!(generate(3, 0, 1).is_err());
    }
}
