//! `EmulatorState.dat`: the per-component covariance function,
//! regression order, and hyperparameter vector for every retained
//! principal component.

use std::io::{BufRead, Write};

use ndarray::Array1;

use crate::error::EmulatorError;
use crate::kernel::CovarianceKernel;

use super::{print_vector, read_vector};

#[derive(Debug, Clone)]
pub struct SubmodelState {
    pub kernel: CovarianceKernel,
    pub regression_order: usize,
    pub thetas: Array1<f64>,
}

pub fn write<W: Write>(writer: &mut W, submodels: &[SubmodelState]) -> std::io::Result<()> {
    writeln!(writer, "SUBMODELS\t{}", submodels.len())?;
    for (i, m) in submodels.iter().enumerate() {
        writeln!(writer, "MODEL {}", i)?;
        writeln!(writer, "COVARIANCE_FUNCTION\t{}", m.kernel.tag())?;
        writeln!(writer, "REGRESSION_ORDER\t{}", m.regression_order)?;
        writeln!(writer, "THETAS")?;
        print_vector(writer, &m.thetas)?;
        writeln!(writer, "END_OF_MODEL")?;
    }
    writeln!(writer, "END_OF_FILE")?;
    Ok(())
}

pub fn read<R: BufRead>(reader: &mut R) -> Result<Vec<SubmodelState>, EmulatorError> {
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let header = header.trim();
    let count_str = header.strip_prefix("SUBMODELS\t").ok_or_else(|| {
        EmulatorError::FileFormatError(format!("expected SUBMODELS header, got {:?}", header))
    })?;
    let count: usize = count_str
        .parse()
        .map_err(|_| EmulatorError::FileFormatError(format!("bad submodel count {:?}", count_str)))?;

    let mut submodels = Vec::with_capacity(count);
    for i in 0..count {
        let mut model_line = String::new();
        reader.read_line(&mut model_line)?;
        if model_line.trim() != format!("MODEL {}", i) {
            return Err(EmulatorError::FileFormatError(format!(
                "expected \"MODEL {}\", got {:?}",
                i,
                model_line.trim()
            )));
        }

        let mut cov_line = String::new();
        reader.read_line(&mut cov_line)?;
        let tag = cov_line
            .trim()
            .strip_prefix("COVARIANCE_FUNCTION\t")
            .ok_or_else(|| {
                EmulatorError::FileFormatError(format!(
                    "expected COVARIANCE_FUNCTION line, got {:?}",
                    cov_line
                ))
            })?;
        let kernel = CovarianceKernel::from_tag(tag)?;

        let mut order_line = String::new();
        reader.read_line(&mut order_line)?;
        let order_str = order_line
            .trim()
            .strip_prefix("REGRESSION_ORDER\t")
            .ok_or_else(|| {
                EmulatorError::FileFormatError(format!(
                    "expected REGRESSION_ORDER line, got {:?}",
                    order_line
                ))
            })?;
        let regression_order: usize = order_str.parse().map_err(|_| {
            EmulatorError::FileFormatError(format!("bad regression order {:?}", order_str))
        })?;

        let mut thetas_tag = String::new();
        reader.read_line(&mut thetas_tag)?;
        if thetas_tag.trim() != "THETAS" {
            return Err(EmulatorError::FileFormatError(format!(
                "expected THETAS line, got {:?}",
                thetas_tag
            )));
        }
        let thetas = read_vector(reader)?;

        let mut end_line = String::new();
        reader.read_line(&mut end_line)?;
        if end_line.trim() != "END_OF_MODEL" {
            return Err(EmulatorError::FileFormatError(format!(
                "expected END_OF_MODEL, got {:?}",
                end_line
            )));
        }

        submodels.push(SubmodelState {
            kernel,
            regression_order,
            thetas,
        });
    }
    Ok(submodels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn emulator_state_round_trips() {
        let submodels = vec![
            SubmodelState {
                kernel: CovarianceKernel::SquareExponential,
                regression_order: 1,
                thetas: array![1.0, 1e-3, 0.5],
            },
            SubmodelState {
                kernel: CovarianceKernel::Matern32,
                regression_order: 0,
                thetas: array![1.0, 1e-3, 0.2],
            },
        ];
        let mut buffer = Vec::new();
        write(&mut buffer, &submodels).unwrap();

        let parsed = read(&mut &buffer[..]).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].kernel, CovarianceKernel::Matern32);
        assert_abs_diff_eq!(parsed[0].thetas[2], 0.5, epsilon = 1e-12);
    }
}
