//! `PCADecomposition.dat`: output means, uncertainty scales, and the
//! full (not just retained) PCA eigenvalues/eigenvectors.

use std::io::{BufRead, Write};

use ndarray::{Array1, Array2};

use crate::error::EmulatorError;

use super::{print_matrix, print_vector, read_matrix, read_vector};

#[derive(Debug, Clone)]
pub struct PcaBlock {
    pub output_means: Array1<f64>,
    pub output_uncertainty_scales: Array1<f64>,
    pub eigenvalues: Array1<f64>,
    pub eigenvectors: Array2<f64>,
}

pub fn write<W: Write>(writer: &mut W, block: &PcaBlock) -> std::io::Result<()> {
    writeln!(writer, "OUTPUT_MEANS")?;
    print_vector(writer, &block.output_means)?;
    writeln!(writer, "OUTPUT_UNCERTAINTY_SCALES")?;
    print_vector(writer, &block.output_uncertainty_scales)?;
    writeln!(writer, "OUTPUT_PCA_EIGENVALUES")?;
    print_vector(writer, &block.eigenvalues)?;
    writeln!(writer, "OUTPUT_PCA_EIGENVECTORS")?;
    print_matrix(writer, &block.eigenvectors)?;
    writeln!(writer, "END_OF_FILE")?;
    Ok(())
}

pub fn read<R: BufRead>(reader: &mut R) -> Result<PcaBlock, EmulatorError> {
    expect_tag(reader, "OUTPUT_MEANS")?;
    let output_means = read_vector(reader)?;
    expect_tag(reader, "OUTPUT_UNCERTAINTY_SCALES")?;
    let output_uncertainty_scales = read_vector(reader)?;
    expect_tag(reader, "OUTPUT_PCA_EIGENVALUES")?;
    let eigenvalues = read_vector(reader)?;
    expect_tag(reader, "OUTPUT_PCA_EIGENVECTORS")?;
    let eigenvectors = read_matrix(reader)?;
    Ok(PcaBlock {
        output_means,
        output_uncertainty_scales,
        eigenvalues,
        eigenvectors,
    })
}

fn expect_tag<R: BufRead>(reader: &mut R, tag: &str) -> Result<(), EmulatorError> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim() != tag {
        return Err(EmulatorError::FileFormatError(format!(
            "expected tag {:?}, got {:?}",
            tag,
            line.trim()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn pca_block_round_trips() {
        let block = PcaBlock {
            output_means: array![1.0, 2.0],
            output_uncertainty_scales: array![0.5, 0.5],
            eigenvalues: array![0.1, 0.9],
            eigenvectors: array![[1.0, 0.0], [0.0, 1.0]],
        };
        let mut buffer = Vec::new();
        write(&mut buffer, &block).unwrap();

        let parsed = read(&mut &buffer[..]).unwrap();
        assert_abs_diff_eq!(parsed.output_means[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(parsed.eigenvectors[[1, 1]], 1.0, epsilon = 1e-12);
    }
}
