//! `parameter_priors.dat`: one line per parameter, tab-separated.

use std::io::{BufRead, Write};

use crate::distribution::{Distribution, Parameter};
use crate::error::EmulatorError;

pub fn write<W: Write>(writer: &mut W, parameters: &[Parameter]) -> std::io::Result<()> {
    writeln!(writer, "{}", parameters.len())?;
    for param in parameters {
        match param.prior {
            Distribution::Uniform { min, max } => {
                writeln!(writer, "{}\tUNIFORM\t{:.17e}\t{:.17e}", param.name, min, max)?;
            }
            Distribution::Gaussian { mean, sd } => {
                writeln!(writer, "{}\tGAUSSIAN\t{:.17e}\t{:.17e}", param.name, mean, sd)?;
            }
        }
    }
    Ok(())
}

pub fn read<R: BufRead>(reader: &mut R) -> Result<Vec<Parameter>, EmulatorError> {
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let count: usize = header.trim().parse().map_err(|_| {
        EmulatorError::FileFormatError(format!("expected a parameter count, got {:?}", header))
    })?;

    let mut parameters = Vec::with_capacity(count);
    for _ in 0..count {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let fields: Vec<&str> = line.trim().split('\t').collect();
        if fields.len() != 4 {
            return Err(EmulatorError::FileFormatError(format!(
                "malformed parameter prior line: {:?}",
                line
            )));
        }
        let name = fields[0].to_string();
        let a: f64 = fields[2]
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("bad float in {:?}", line)))?;
        let b: f64 = fields[3]
            .parse()
            .map_err(|_| EmulatorError::ParseFailure(format!("bad float in {:?}", line)))?;
        let prior = match fields[1] {
            "UNIFORM" => Distribution::uniform(a, b),
            "GAUSSIAN" => Distribution::gaussian(a, b),
            other => {
                return Err(EmulatorError::FileFormatError(format!(
                    "unknown prior type {:?}",
                    other
                )))
            }
        };
        parameters.push(Parameter::new(name, prior));
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priors_round_trip() {
        let parameters = vec![
            Parameter::new("a", Distribution::uniform(0.0, 1.0)),
            Parameter::new("b", Distribution::gaussian(2.0, 0.5)),
        ];
        let mut buffer = Vec::new();
        write(&mut buffer, &parameters).unwrap();

        let parsed = read(&mut &buffer[..]).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].name, "a");
        assert_eq!(parsed[1].prior, Distribution::gaussian(2.0, 0.5));
    }
}
