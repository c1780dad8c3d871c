//! Drives an external simulator as a child process communicating over
//! stdin/stdout, and exposes it as a [`Model`].
//!
//! Protocol (grounded in the original line-oriented handshake): on
//! startup the child writes a line with the parameter count, one line
//! per parameter name, a line with the output count, and one line per
//! output name (any leading lines starting with `#`, or blank lines,
//! are skipped first). After the handshake, each query writes one
//! `%.17f`-formatted parameter value per line and reads back one
//! whitespace-delimited floating point value per declared output.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use ndarray::Array1;

use crate::distribution::Parameter;
use crate::error::EmulatorError;
use crate::likelihood::Observable;
use crate::model::Model;

/// A running external-process simulator.
pub struct ExternalProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    number_parameters: usize,
    number_outputs: usize,
}

impl ExternalProcess {
    /// Spawn `argv[0]` with the remaining elements of `argv` as
    /// arguments, then perform the startup handshake, verifying the
    /// child reports exactly `expected_parameters` parameters and
    /// `expected_outputs` outputs.
    pub fn start(
        argv: &[String],
        expected_parameters: usize,
        expected_outputs: usize,
    ) -> Result<Self, EmulatorError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| EmulatorError::InvalidArgument("empty command line".to_string()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| EmulatorError::SpawnFailed(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EmulatorError::SpawnFailed("child has no stdin pipe".to_string()))?;
        let stdout = BufReader::new(child.stdout.take().ok_or_else(|| {
            EmulatorError::SpawnFailed("child has no stdout pipe".to_string())
        })?);

        let mut process = ExternalProcess {
            child,
            stdin,
            stdout,
            number_parameters: expected_parameters,
            number_outputs: expected_outputs,
        };
        process.handshake(expected_parameters, expected_outputs)?;
        Ok(process)
    }

    fn handshake(
        &mut self,
        expected_parameters: usize,
        expected_outputs: usize,
    ) -> Result<(), EmulatorError> {
        discard_comments(&mut self.stdout)?;
        let n = read_uint_token(&mut self.stdout)?;
        if n != expected_parameters {
            return Err(EmulatorError::HandshakeMismatch(format!(
                "external process reports {} parameters, expected {}",
                n, expected_parameters
            )));
        }
        for _ in 0..n {
            discard_line(&mut self.stdout)?;
        }

        let t = read_uint_token(&mut self.stdout)?;
        if t != expected_outputs {
            return Err(EmulatorError::HandshakeMismatch(format!(
                "external process reports {} outputs, expected {}",
                t, expected_outputs
            )));
        }
        for _ in 0..t {
            discard_line(&mut self.stdout)?;
        }
        Ok(())
    }

    /// Send `parameters` and read back the declared number of outputs.
    pub fn query(&mut self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
        if parameters.len() != self.number_parameters {
            return Err(EmulatorError::DimensionMismatch(format!(
                "query has {} parameters, expected {}",
                parameters.len(),
                self.number_parameters
            )));
        }
        for &value in parameters.iter() {
            writeln!(self.stdin, "{:.17}", value)
                .map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        }
        self.stdin
            .flush()
            .map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;

        let mut outputs = Vec::with_capacity(self.number_outputs);
        for _ in 0..self.number_outputs {
            outputs.push(read_f64_token(&mut self.stdout)?);
        }
        Ok(Array1::from_vec(outputs))
    }

    /// Terminate the child process.
    pub fn stop(&mut self) -> Result<(), EmulatorError> {
        self.child.kill().ok();
        self.child
            .wait()
            .map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        Ok(())
    }
}

impl Drop for ExternalProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn discard_comments(reader: &mut BufReader<ChildStdout>) -> Result<(), EmulatorError> {
    loop {
        let buf = reader.fill_buf().map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        if buf.is_empty() {
            return Ok(());
        }
        if buf[0] == b'#' || buf[0] == b'\n' {
            discard_line(reader)?;
        } else {
            return Ok(());
        }
    }
}

fn discard_line(reader: &mut BufReader<ChildStdout>) -> Result<(), EmulatorError> {
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
    Ok(())
}

fn read_uint_token(reader: &mut BufReader<ChildStdout>) -> Result<usize, EmulatorError> {
    skip_whitespace(reader)?;
    let mut token = String::new();
    loop {
        let buf = reader.fill_buf().map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        if buf.is_empty() || !buf[0].is_ascii_digit() {
            break;
        }
        token.push(buf[0] as char);
        reader.consume(1);
    }
    token
        .parse::<usize>()
        .map_err(|_| EmulatorError::ParseFailure(format!("expected an integer, got {:?}", token)))
}

fn read_f64_token(reader: &mut BufReader<ChildStdout>) -> Result<f64, EmulatorError> {
    skip_whitespace(reader)?;
    let mut token = String::new();
    loop {
        let buf = reader.fill_buf().map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        if buf.is_empty() {
            break;
        }
        let c = buf[0];
        if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.' | b'e' | b'E') {
            token.push(c as char);
            reader.consume(1);
        } else {
            break;
        }
    }
    // Consume exactly one trailing delimiter, mirroring the original
    // implementation's `%lf%*c` scan.
    if let Ok(buf) = reader.fill_buf() {
        if !buf.is_empty() {
            reader.consume(1);
        }
    }
    token
        .parse::<f64>()
        .map_err(|_| EmulatorError::ParseFailure(format!("expected a float, got {:?}", token)))
}

fn skip_whitespace(reader: &mut BufReader<ChildStdout>) -> Result<(), EmulatorError> {
    loop {
        let buf = reader.fill_buf().map_err(|e| EmulatorError::BrokenPipe(e.to_string()))?;
        if buf.is_empty() || !buf[0].is_ascii_whitespace() {
            return Ok(());
        }
        reader.consume(1);
    }
}

/// A [`Model`] backed by a running [`ExternalProcess`].
pub struct ExternalModel {
    process: std::cell::RefCell<ExternalProcess>,
    parameters: Vec<Parameter>,
    output_names: Vec<String>,
    observed: Observable,
}

impl ExternalModel {
    pub fn new(
        process: ExternalProcess,
        parameters: Vec<Parameter>,
        output_names: Vec<String>,
        observed: Observable,
    ) -> Result<Self, EmulatorError> {
        if observed.mean.len() != output_names.len() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "observed mean has length {}, expected {} (model outputs)",
                observed.mean.len(),
                output_names.len()
            )));
        }
        Ok(ExternalModel {
            process: std::cell::RefCell::new(process),
            parameters,
            output_names,
            observed,
        })
    }
}

impl Model for ExternalModel {
    fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn scalar_output_names(&self) -> &[String] {
        &self.output_names
    }

    fn scalar_outputs(&self, parameters: &Array1<f64>) -> Result<Array1<f64>, EmulatorError> {
        self.process.borrow_mut().query(parameters)
    }

    fn observed(&self) -> &Observable {
        &self.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Distribution;
    use approx::assert_abs_diff_eq;

    /// A trivial echo-style simulator used as the child process: reads
    /// two parameters and writes their sum, after performing the
    /// handshake this driver expects.
    fn sum_script() -> String {
        "import sys\n\
print('2')\n\
print('alpha')\n\
print('beta')\n\
print('1')\n\
print('sum')\n\
sys.stdout.flush()\n\
while True:\n\
    line1 = sys.stdin.readline()\n\
    if not line1:\n\
        break\n\
    line2 = sys.stdin.readline()\n\
    a = float(line1)\n\
    b = float(line2)\n\
    print(a + b)\n\
    sys.stdout.flush()\n"
            .to_string()
    }

    #[test]
    fn handshake_and_round_trip_query_succeed() {
        let script = sum_script();
        let argv = vec![
            "python3".to_string(),
            "-c".to_string(),
            script,
        ];
        let process = match ExternalProcess::start(&argv, 2, 1) {
            Ok(p) => p,
            Err(_) => return, // python3 not available in this environment; skip.
        };
        let parameters = vec![
            Parameter::new("alpha", Distribution::uniform(-10.0, 10.0)),
            Parameter::new("beta", Distribution::uniform(-10.0, 10.0)),
        ];
        let observed = Observable::with_independent_errors(array_f64(&[0.0]), array_f64(&[1.0]))
            .unwrap();
        let model =
            ExternalModel::new(process, parameters, vec!["sum".to_string()], observed).unwrap();
        let outputs = model.scalar_outputs(&array_f64(&[2.0, 3.0])).unwrap();
        assert_abs_diff_eq!(outputs[0], 5.0, epsilon = 1e-6);
    }

    fn array_f64(values: &[f64]) -> Array1<f64> {
        Array1::from_vec(values.to_vec())
    }
}
