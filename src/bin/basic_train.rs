//! `basic-train <statistics-directory>`
//!
//! Loads the PCA decomposition and training data, retains enough
//! components to reach the configured resolving power, assigns default
//! hyperparameters to each retained component, builds the prediction
//! caches, and writes `EmulatorState.dat`. Mirrors `basicTrain.cxx`.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gpemulate::emulator::Emulator;
use gpemulate::error::EmulatorError;
use gpemulate::io::emulator_state::{self, SubmodelState};
use gpemulate::io::pca_file;
use gpemulate::io::{priors, runtime_parameters, training_data};
use gpemulate::kernel::CovarianceKernel;

#[derive(Parser, Debug)]
#[command(about = "Train default Gaussian-process hyperparameters for each retained component")]
struct Args {
    statistics_directory: PathBuf,
}

const DEFAULT_COVARIANCE_FUNCTION: &str = "SQUARE_EXPONENTIAL_FUNCTION";
const DEFAULT_REGRESSION_ORDER: usize = 1;
const DEFAULT_NUGGET: f64 = 1.0e-3;
const DEFAULT_AMPLITUDE: f64 = 1.0;
const DEFAULT_SCALE: f64 = 1.0e-2;
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

    let model_output_directory =
        dir.join(runtime.get_or("MODEL_OUTPUT_DIRECTORY", "model_output"));
    let parameter_names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();
    let training =
        training_data::read_model_output_directory(&model_output_directory, &parameter_names, &output_names)?;

    let pca_block = pca_file::read(&mut std::io::BufReader::new(File::open(
        dir.join("PCADecomposition.dat"),
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

    let covariance_function_name = runtime.get_or(
        "EMULATOR_COVARIANCE_FUNCTION",
        DEFAULT_COVARIANCE_FUNCTION,
    );
    let kernel = CovarianceKernel::from_tag(&covariance_function_name)?;
    let regression_order = runtime
        .get_usize("EMULATOR_REGRESSION_ORDER")
        .unwrap_or(DEFAULT_REGRESSION_ORDER);
    let nugget = runtime.get_f64("EMULATOR_NUGGET").unwrap_or(DEFAULT_NUGGET);
    let amplitude = runtime
        .get_f64("EMULATOR_AMPLITUDE")
        .unwrap_or(DEFAULT_AMPLITUDE);
    let scale = runtime.get_f64("EMULATOR_SCALE").unwrap_or(DEFAULT_SCALE);

    let mut emulator = Emulator::new(
        parameters,
        output_names,
        training.parameter_values,
        training.output_values,
    )?;
    emulator.set_output_uncertainty_scales(pca_block.output_uncertainty_scales)?;
    emulator.principal_component_decompose()?;
    emulator.retain_principal_components(fraction)?;

    log::info!(
        "retained {} of {} principal components (fraction={})",
        emulator.number_pca_outputs(),
        emulator.pca_eigenvalues().len(),
        fraction
    );

    emulator.basic_training(kernel, regression_order, nugget, amplitude, scale)?;
    emulator.make_cache(true)?;

    let submodels: Vec<SubmodelState> = emulator
        .models()
        .iter()
        .map(|model| SubmodelState {
            kernel: model.kernel,
            regression_order: model.regression_order,
            thetas: model.thetas.clone(),
        })
        .collect();
    let out_path = dir.join("EmulatorState.dat");
    let mut writer = BufWriter::new(File::create(&out_path)?);
    emulator_state::write(&mut writer, &submodels)?;
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
            eprintln!("basic-train: {}", e);
            ExitCode::FAILURE
        }
    }
}
