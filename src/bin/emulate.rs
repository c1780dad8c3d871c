//! `emulate <statistics-directory> <parameter-value>...`
//!
//! Reloads a trained emulator from `<statistics-directory>` and prints
//! its predicted output means (and standard deviations) at the given
//! parameter point. Mirrors `emulate.cxx`.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ndarray::Array1;

use gpemulate::emulator::Emulator;
use gpemulate::error::EmulatorError;
use gpemulate::io::pca_file;
use gpemulate::io::{emulator_state, priors, runtime_parameters, training_data};

#[derive(Parser, Debug)]
#[command(about = "Evaluate a trained Gaussian-process emulator at a parameter point")]
struct Args {
    statistics_directory: PathBuf,

    /// One value per parameter, in the order declared in parameter_priors.dat
    parameter_values: Vec<f64>,
}

const DEFAULT_FRACTION_RESOLVING_POWER: f64 = 0.95;

fn run(args: Args) -> Result<(), EmulatorError> {
    let dir = &args.statistics_directory;

    let runtime = runtime_parameters::read(&mut std::io::BufReader::new(File::open(
        dir.join("runtime_parameters.dat"),
    )?))?;
    let parameters = priors::read(&mut std::io::BufReader::new(File::open(
        dir.join("parameter_priors.dat"),
    )?))?;
    let output_names = read_observable_names(&dir.join("observable_names.dat"))?;

    if args.parameter_values.len() != parameters.len() {
        return Err(EmulatorError::DimensionMismatch(format!(
            "got {} parameter values, expected {}",
            args.parameter_values.len(),
            parameters.len()
        )));
    }

    let model_output_directory =
        dir.join(runtime.get_or("MODEL_OUTPUT_DIRECTORY", "model_output"));
    let parameter_names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    let training =
        training_data::read_model_output_directory(&model_output_directory, &parameter_names, &output_names)?;

    let pca_block = pca_file::read(&mut std::io::BufReader::new(File::open(
        dir.join("PCADecomposition.dat"),
    )?))?;
    let submodels = emulator_state::read(&mut std::io::BufReader::new(File::open(
        dir.join("EmulatorState.dat"),
    )?))?;

    let fraction = runtime
        .get("PCA_FRACTION_RESOLVING_POWER")
        .map(|s| {
            s.parse().map_err(|_| {
                EmulatorError::ParseFailure(format!(
                    "PCA_FRACTION_RESOLVING_POWER is not a float: {:?}",
                    s
                ))
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_FRACTION_RESOLVING_POWER);

    let mut emulator = Emulator::new(
        parameters,
        output_names,
        training.parameter_values,
        training.output_values,
    )?;
    emulator.set_output_uncertainty_scales(pca_block.output_uncertainty_scales)?;
    emulator.principal_component_decompose()?;
    emulator.retain_principal_components(fraction)?;

    if submodels.len() != emulator.number_pca_outputs() {
        return Err(EmulatorError::DimensionMismatch(format!(
            "EmulatorState.dat has {} submodels, but retaining {} fraction of resolving power \
             yields {} components from this training data",
            submodels.len(),
            fraction,
            emulator.number_pca_outputs()
        )));
    }
    for (i, state) in submodels.into_iter().enumerate() {
        emulator.set_model_hyperparameters(i, state.kernel, state.regression_order, state.thetas)?;
    }
    emulator.make_cache(true)?;

    let point = Array1::from_vec(args.parameter_values);
    let (mean, covariance) = emulator.predict(&point)?;

    for (i, name) in emulator.output_names().iter().enumerate() {
        let stddev = covariance[[i, i]].max(0.0).sqrt();
        println!("{}\t{:.17e}\t{:.17e}", name, mean[i], stddev);
    }

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
            eprintln!("emulate: {}", e);
            ExitCode::FAILURE
        }
    }
}
