//! Readers and writers for the crate's on-disk directory layout:
//! runtime parameters, parameter priors, the PCA decomposition block,
//! the trained-emulator state file, and the `model_output/` training
//! directory tree.
//!
//! This is collaborator-grade I/O — the numerical core lives in
//! [`crate::emulator`] and [`crate::single_model`] — but it is fully
//! implemented rather than stubbed, so the crate can actually persist
//! and reload its own state.

pub mod emulator_state;
pub mod pca_file;
pub mod priors;
pub mod runtime_parameters;
pub mod training_data;

pub(crate) fn print_vector<W: std::io::Write>(
    writer: &mut W,
    values: &ndarray::Array1<f64>,
) -> std::io::Result<()> {
    writeln!(writer, "{}", values.len())?;
    for &v in values.iter() {
        writeln!(writer, "{:.17e}", v)?;
    }
    Ok(())
}

pub(crate) fn print_matrix<W: std::io::Write>(
    writer: &mut W,
    m: &ndarray::Array2<f64>,
) -> std::io::Result<()> {
    writeln!(writer, "{} {}", m.nrows(), m.ncols())?;
    for row in m.rows() {
        let fields: Vec<String> = row.iter().map(|v| format!("{:.17e}", v)).collect();
        writeln!(writer, "{}", fields.join("\t"))?;
    }
    Ok(())
}

pub(crate) fn read_vector<R: std::io::BufRead>(
    reader: &mut R,
) -> Result<ndarray::Array1<f64>, crate::error::EmulatorError> {
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let n: usize = header.trim().parse().map_err(|_| {
        crate::error::EmulatorError::FileFormatError(format!(
            "expected a vector length, got {:?}",
            header
        ))
    })?;
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let v: f64 = line.trim().parse().map_err(|_| {
            crate::error::EmulatorError::FileFormatError(format!(
                "expected a float, got {:?}",
                line
            ))
        })?;
        values.push(v);
    }
    Ok(ndarray::Array1::from_vec(values))
}

pub(crate) fn read_matrix<R: std::io::BufRead>(
    reader: &mut R,
) -> Result<ndarray::Array2<f64>, crate::error::EmulatorError> {
    let mut header = String::new();
    reader.read_line(&mut header)?;
    let mut parts = header.trim().split_whitespace();
    let rows: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| crate::error::EmulatorError::FileFormatError("bad matrix header".to_string()))?;
    let cols: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| crate::error::EmulatorError::FileFormatError("bad matrix header".to_string()))?;

    let mut m = ndarray::Array2::<f64>::zeros((rows, cols));
    for r in 0..rows {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let values: Result<Vec<f64>, _> = line.trim().split('\t').map(|s| s.parse::<f64>()).collect();
        let values = values.map_err(|_| {
            crate::error::EmulatorError::FileFormatError(format!("bad matrix row: {:?}", line))
        })?;
        if values.len() != cols {
            return Err(crate::error::EmulatorError::FileFormatError(format!(
                "matrix row has {} columns, expected {}",
                values.len(),
                cols
            )));
        }
        for (c, v) in values.into_iter().enumerate() {
            m[[r, c]] = v;
        }
    }
    Ok(m)
}
