//! `pca-decompose <statistics-directory>`
//!
//! Reads the training data under `<statistics-directory>` and writes the
//! full principal-component decomposition of its (standardized) outputs
//! to `PCADecomposition.dat`. Mirrors `PCADecompose.cxx`: retention of a
//! subset of components happens later, in `basic-train`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gpemulate::emulator::Emulator;
use gpemulate::error::EmulatorError;
use gpemulate::io::pca_file::{self, PcaBlock};
use gpemulate::io::{priors, runtime_parameters, training_data};

#[derive(Parser, Debug)]
#[command(about = "Principal-component decomposition of training outputs")]
struct Args {
    /// Directory holding runtime_parameters.dat, parameter_priors.dat,
    /// observable_names.dat, and the model_output/ training tree.
    statistics_directory: PathBuf,
}

fn run(args: Args) -> Result<(), EmulatorError> {
    let dir = &args.statistics_directory;

    let runtime = runtime_parameters::read(&mut std::io::BufReader::new(File::open(
        dir.join("runtime_parameters.dat"),
    )?))?;
    let parameters = priors::read(&mut std::io::BufReader::new(File::open(
        dir.join("parameter_priors.dat"),
    )?))?;
    let output_names = read_observable_names(&dir.join("observable_names.dat"))?;

    let model_output_directory =
        dir.join(runtime.get_or("MODEL_OUTPUT_DIRECTORY", "model_output"));
    let parameter_names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    let training =
        training_data::read_model_output_directory(&model_output_directory, &parameter_names, &output_names)?;

    log::info!(
        "loaded {} training points, {} parameters, {} outputs",
        training.parameter_values.nrows(),
        parameter_names.len(),
        output_names.len()
    );

    let mut emulator = Emulator::new(
        parameters,
        output_names,
        training.parameter_values,
        training.output_values,
    )?;
    emulator.principal_component_decompose()?;

    let block = PcaBlock {
        output_means: emulator.output_means().clone(),
        output_uncertainty_scales: emulator.output_uncertainty_scales().clone(),
        eigenvalues: emulator.pca_eigenvalues().clone(),
        eigenvectors: emulator.pca_eigenvectors().clone(),
    };
    let out_path = dir.join("PCADecomposition.dat");
    let mut writer = BufWriter::new(File::create(&out_path)?);
    pca_file::write(&mut writer, &block)?;
    log::info!("wrote {}", out_path.display());

    Ok(())
}

fn read_observable_names(path: &std::path::Path) -> Result<Vec<String>, EmulatorError> {
    let text = std::fs::read_to_string(path)?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pca-decompose: {}", e);
            ExitCode::FAILURE
        }
    }
}
