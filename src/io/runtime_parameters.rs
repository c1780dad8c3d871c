//! `runtime_parameters.dat`: a flat key/value configuration file.
//!
//! Lines starting with `#` and blank lines are ignored; every other line
//! is `key value` separated by whitespace. Values are kept as strings at
//! this layer — callers parse them into the types they need, the same
//! way the original tool's `GetRuntimeParameter` helpers did per call
//! site rather than at load time.

use std::collections::BTreeMap;
use std::io::{BufRead, Write};

use crate::error::EmulatorError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeParameters {
    values: BTreeMap<String, String>,
}

impl RuntimeParameters {
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, EmulatorError> {
        self.get(key)
            .ok_or_else(|| EmulatorError::InvalidArgument(format!("missing runtime parameter {:?}", key)))?
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("runtime parameter {:?} is not a float", key)))
    }

    pub fn get_usize(&self, key: &str) -> Result<usize, EmulatorError> {
        self.get(key)
            .ok_or_else(|| EmulatorError::InvalidArgument(format!("missing runtime parameter {:?}", key)))?
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("runtime parameter {:?} is not an integer", key)))
    }

    pub fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }
}

pub fn write<W: Write>(writer: &mut W, params: &RuntimeParameters) -> std::io::Result<()> {
    for (key, value) in &params.values {
        writeln!(writer, "{} {}", key, value)?;
    }
    Ok(())
}

pub fn read<R: BufRead>(reader: &mut R) -> Result<RuntimeParameters, EmulatorError> {
    let mut params = RuntimeParameters::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut fields = trimmed.splitn(2, char::is_whitespace);
        let key = fields.next().ok_or_else(|| {
            EmulatorError::FileFormatError(format!("malformed runtime parameter line: {:?}", line))
        })?;
        let value = fields.next().ok_or_else(|| {
            EmulatorError::FileFormatError(format!("runtime parameter {:?} has no value", key))
        })?;
        params.set(key.to_string(), value.trim().to_string());
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_and_skips_comments() {
        let mut params = RuntimeParameters::new();
        params.set("output_directory", "model_output");
        params.set("number_of_samples", "1000");

        let mut buffer = Vec::new();
        write(&mut buffer, &params).unwrap();

        let text = format!("# a comment\n\n{}", String::from_utf8(buffer).unwrap());
        let parsed = read(&mut text.as_bytes()).unwrap();
        assert_eq!(parsed.get("output_directory"), Some("model_output"));
        assert_eq!(parsed.get_usize("number_of_samples").unwrap(), 1000);
    }

    #[test]
    fn missing_key_is_an_error() {
        let params = RuntimeParameters::new();
        assert!(params.get_f64("nugget").is_err());
    }
}
