//! An append-only buffer of posterior [`Sample`]s with a CSV writer and
//! reader, grounded in the original `Trace::WriteCSVFile`/`ImportCSVFile`.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use ndarray::Array1;

use crate::error::EmulatorError;
use crate::sample::Sample;

/// Number of significant digits the CSV writer guarantees per value,
/// enough for an exact round trip of an `f64`.
const CSV_PRECISION: usize = 17;

#[derive(Debug, Clone)]
pub struct Trace {
    parameter_names: Vec<String>,
    output_names: Vec<String>,
    samples: Vec<Sample>,
}

impl Trace {
    pub fn new(parameter_names: Vec<String>, output_names: Vec<String>) -> Self {
        Trace {
            parameter_names,
            output_names,
            samples: Vec::new(),
        }
    }

    pub fn add(&mut self, sample: Sample) -> Result<(), EmulatorError> {
        if sample.parameters.len() != self.parameter_names.len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "sample has {} parameters, trace expects {}",
                sample.parameters.len(),
                self.parameter_names.len()
            )));
        }
        if sample.outputs.len() != self.output_names.len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "sample has {} outputs, trace expects {}",
                sample.outputs.len(),
                self.output_names.len()
            )));
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    fn header(&self) -> String {
        let mut fields: Vec<String> = self
            .parameter_names
            .iter()
            .chain(self.output_names.iter())
            .map(|name| format!("{:?}", name))
            .collect();
        fields.push("\"LogLikelihood\"".to_string());
        fields.join(",")
    }

    /// Write every sample as one CSV row. Each float is formatted with
    /// at least 17 significant digits so the file round-trips exactly.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<(), EmulatorError> {
        writeln!(writer, "{}", self.header())?;
        for sample in &self.samples {
            let mut fields = Vec::with_capacity(
                self.parameter_names.len() + self.output_names.len() + 1,
            );
            for &v in sample.parameters.iter() {
                fields.push(format_value(v));
            }
            for &v in sample.outputs.iter() {
                fields.push(format_value(v));
            }
            fields.push(format_value(sample.log_likelihood.unwrap_or(f64::NAN)));
            writeln!(writer, "{}", fields.join(","))?;
        }
        Ok(())
    }

    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<(), EmulatorError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))
    }

    /// Parse a CSV file written by `write_csv`/`write_csv_file`. The
    /// header's column split is driven by the declared parameter and
    /// output counts rather than by name matching.
    pub fn import_csv(
        reader: impl std::io::Read,
        number_of_parameters: usize,
        number_of_outputs: usize,
    ) -> Result<Self, EmulatorError> {
        let mut lines = BufReader::new(reader).lines();
        let header = lines
            .next()
            .ok_or_else(|| EmulatorError::FileFormatError("trace CSV is empty".to_string()))??;
        let fields: Vec<&str> = header.split(',').collect();
        let expected = number_of_parameters + number_of_outputs + 1;
        if fields.len() != expected {
            return Err(EmulatorError::FileFormatError(format!(
                "trace header has {} columns, expected {}",
                fields.len(),
                expected
            )));
        }
        let parameter_names: Vec<String> = fields[..number_of_parameters]
            .iter()
            .map(|s| unquote(s))
            .collect();
        let output_names: Vec<String> = fields[number_of_parameters..number_of_parameters + number_of_outputs]
            .iter()
            .map(|s| unquote(s))
            .collect();

        let mut trace = Trace::new(parameter_names, output_names);
        for line in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let values: Result<Vec<f64>, _> = line.split(',').map(|s| s.trim().parse::<f64>()).collect();
            let values = values.map_err(|e| {
                EmulatorError::ParseFailure(format!("bad float in trace row: {}", e))
            })?;
            if values.len() != expected {
                return Err(EmulatorError::FileFormatError(format!(
                    "trace row has {} columns, expected {}",
                    values.len(),
                    expected
                )));
            }
            let parameters = Array1::from_vec(values[..number_of_parameters].to_vec());
            let outputs = Array1::from_vec(
                values[number_of_parameters..number_of_parameters + number_of_outputs].to_vec(),
            );
            let log_likelihood = values[expected - 1];
            trace.add(Sample::new(parameters, outputs).with_log_likelihood(log_likelihood))?;
        }
        Ok(trace)
    }

    pub fn import_csv_file(
        path: impl AsRef<Path>,
        number_of_parameters: usize,
        number_of_outputs: usize,
    ) -> Result<Self, EmulatorError> {
        let file = std::fs::File::open(path)?;
        Trace::import_csv(file, number_of_parameters, number_of_outputs)
    }
}

fn format_value(v: f64) -> String {
    format!("{:.*e}", CSV_PRECISION, v)
}

fn unquote(field: &str) -> String {
    field.trim().trim_matches('"').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn csv_round_trip_preserves_values_to_full_precision() {
        let mut trace = Trace::new(vec!["x".to_string()], vec!["y".to_string()]);
        trace
            .add(Sample::new(array![0.1234567890123456], array![2.718281828459045]).with_log_likelihood(-1.5))
            .unwrap();
        trace
            .add(Sample::new(array![-3.0], array![0.0]).with_log_likelihood(-0.25))
            .unwrap();

        let mut buffer = Vec::new();
        trace.write_csv(&mut buffer).unwrap();

        let parsed = Trace::import_csv(&buffer[..], 1, 1).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_abs_diff_eq!(parsed.get(0).unwrap().parameters[0], 0.1234567890123456, epsilon = 1e-15);
        assert_abs_diff_eq!(parsed.get(1).unwrap().outputs[0], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn add_rejects_mismatched_sample_shape() {
        let mut trace = Trace::new(vec!["x".to_string()], vec!["y".to_string()]);
        assert!(trace.add(Sample::new(array![1.0, 2.0], array![0.0])).is_err());
    }

    #[test]
    fn import_rejects_header_with_wrong_column_count() {
        let data = b"\"a\",\"b\",\"c\",\"d\"\n1,2,3,4\n".to_vec();
        assert!(Trace::import_csv(&data[..], 1, 1).is_err());
    }
}
