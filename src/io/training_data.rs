//! The `model_output/run####/{parameters,results}.dat` training tree and
//! the top-level `experimental_results.dat` file.
//!
//! Values inside each file are matched against the declared parameter or
//! output names rather than relied upon to appear in a fixed column
//! order, mirroring the directory reader's name-driven lookup.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};

use crate::error::EmulatorError;

/// One run's worth of training data: a vector of parameter values (in
/// `parameter_names` order) and a vector of output values (in
/// `output_names` order).
pub struct TrainingSet {
    pub parameter_values: Array2<f64>,
    pub output_values: Array2<f64>,
}

fn parse_name_value_lines(text: &str) -> Result<Vec<(String, f64)>, EmulatorError> {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let mut fields = content.split_whitespace();
        let name = fields
            .next()
            .ok_or_else(|| EmulatorError::FileFormatError(format!("empty data line: {:?}", line)))?;
        let value: f64 = fields
            .next()
            .ok_or_else(|| {
                EmulatorError::FileFormatError(format!("line {:?} has no value", line))
            })?
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("bad float in line {:?}", line)))?;
        pairs.push((name.to_string(), value));
    }
    Ok(pairs)
}

fn fill_row_by_name(
    row: &mut ndarray::ArrayViewMut1<f64>,
    names: &[String],
    pairs: &[(String, f64)],
    source: &Path,
) -> Result<(), EmulatorError> {
    let mut remaining: BTreeSet<&str> = names.iter().map(|s| s.as_str()).collect();
    for (name, value) in pairs {
        if let Some(index) = names.iter().position(|n| n == name) {
            row[index] = *value;
            remaining.remove(name.as_str());
        }
    }
    if !remaining.is_empty() {
        return Err(EmulatorError::FileFormatError(format!(
            "{:?} is missing values for: {:?}",
            source, remaining
        )));
    }
    Ok(())
}

/// Read every `run####/` subdirectory of `model_output_directory`,
/// sorted lexicographically, into one training set.
pub fn read_model_output_directory(
    model_output_directory: &Path,
    parameter_names: &[String],
    output_names: &[String],
) -> Result<TrainingSet, EmulatorError> {
    let mut run_dirs: Vec<_> = fs::read_dir(model_output_directory)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with("run"))
                .unwrap_or(false)
        })
        .map(|entry| entry.path())
        .collect();
    run_dirs.sort();

    if run_dirs.is_empty() {
        return Err(EmulatorError::FileFormatError(format!(
            "no run directories found under {:?}",
            model_output_directory
        )));
    }

    let n = run_dirs.len();
    let mut parameter_values = Array2::<f64>::zeros((n, parameter_names.len()));
    let mut output_values = Array2::<f64>::zeros((n, output_names.len()));

    for (i, run_dir) in run_dirs.iter().enumerate() {
        let params_path = run_dir.join("parameters.dat");
        let params_text = fs::read_to_string(&params_path)?;
        let params_pairs = parse_name_value_lines(&params_text)?;
        fill_row_by_name(
            &mut parameter_values.row_mut(i),
            parameter_names,
            &params_pairs,
            &params_path,
        )?;

        let results_path = run_dir.join("results.dat");
        let results_text = fs::read_to_string(&results_path)?;
        let results_pairs = parse_name_value_lines(&results_text)?;
        fill_row_by_name(
            &mut output_values.row_mut(i),
            output_names,
            &results_pairs,
            &results_path,
        )?;
    }

    Ok(TrainingSet {
        parameter_values,
        output_values,
    })
}

/// Read `experimental_results.dat`: `<name> <value> <uncertainty>` per
/// line, in any order, matched against the declared output names.
/// Unknown names are ignored.
pub fn read_experimental_results(
    path: &Path,
    output_names: &[String],
) -> Result<(Array1<f64>, Array1<f64>), EmulatorError> {
    let text = fs::read_to_string(path)?;
    let mut observed_values = Array1::<f64>::zeros(output_names.len());
    let mut observed_uncertainties = Array1::<f64>::zeros(output_names.len());

    for line in text.lines() {
        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }
        let fields: Vec<&str> = content.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(EmulatorError::FileFormatError(format!(
                "expected <name> <value> <uncertainty>, got {:?}",
                line
            )));
        }
        let name = fields[0];
        let value: f64 = fields[1]
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("bad float in line {:?}", line)))?;
        let uncertainty: f64 = fields[2]
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("bad float in line {:?}", line)))?;
        if let Some(index) = output_names.iter().position(|n| n == name) {
            observed_values[index] = value;
            observed_uncertainties[index] = uncertainty;
        }
    }
    Ok((observed_values, observed_uncertainties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write as _;

    fn write_file(path: &Path, contents: &str) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
    }

    #[test]
    fn reads_run_directories_in_order() {
        let dir = std::env::temp_dir().join("emulator_training_data_test_run_dirs");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("run0000")).unwrap();
        fs::create_dir_all(dir.join("run0001")).unwrap();

        write_file(&dir.join("run0000/parameters.dat"), "a 1.0\nb 2.0\n");
        write_file(&dir.join("run0000/results.dat"), "y0 10.0\n");
        write_file(&dir.join("run0001/parameters.dat"), "b 4.0\na 3.0\n");
        write_file(&dir.join("run0001/results.dat"), "y0 20.0\n");

        let parameter_names = vec!["a".to_string(), "b".to_string()];
        let output_names = vec!["y0".to_string()];
        let training = read_model_output_directory(&dir, &parameter_names, &output_names).unwrap();

        assert_abs_diff_eq!(training.parameter_values[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(training.parameter_values[[1, 1]], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(training.output_values[[1, 0]], 20.0, epsilon = 1e-12);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn experimental_results_ignores_unknown_names() {
        let dir = std::env::temp_dir().join("emulator_experimental_results_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("experimental_results.dat");
        write_file(&path, "y0 5.0 0.5\nmystery 100.0 1.0\n");

        let output_names = vec!["y0".to_string()];
        let (values, uncertainties) = read_experimental_results(&path, &output_names).unwrap();
        assert_abs_diff_eq!(values[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(uncertainties[0], 0.5, epsilon = 1e-12);

        fs::remove_dir_all(&dir).unwrap();
    }
}
