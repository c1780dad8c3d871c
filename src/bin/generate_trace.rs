//! `generate-trace <statistics-directory> <output-file-name>`
//!
//! Runs a sampler (Metropolis-Hastings or percentile grid, per
//! `SAMPLER` in `runtime_parameters.dat`) against either a trained
//! emulator or an external-process model, discards the configured
//! number of burn-in draws, and writes the rest to
//! `<statistics-directory>/trace/<output-file-name>`. Mirrors
//! `madai_generate_trace.cxx`.

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;

use gpemulate::emulator::Emulator;
use gpemulate::error::EmulatorError;
use gpemulate::external_process::{ExternalModel, ExternalProcess};
use gpemulate::io::{emulator_state, pca_file, priors, runtime_parameters, training_data};
use gpemulate::likelihood::Observable;
use gpemulate::model::{EmulatedModel, Model};
use gpemulate::sampler::{MetropolisHastingsSampler, PercentileGridSampler, Sampler};
use gpemulate::trace::Trace;

#[derive(Parser, Debug)]
#[command(about = "Generate a posterior sample trace from a trained emulator or external model")]
struct Args {
    statistics_directory: PathBuf,

    /// Name of the CSV file to write under <statistics-directory>/trace/
    output_file_name: String,
}

const DEFAULT_FRACTION_RESOLVING_POWER: f64 = 0.95;
const DEFAULT_SAMPLER: &str = "MetropolisHastings";
const DEFAULT_NUMBER_OF_SAMPLES: usize = 1000;
const DEFAULT_NUMBER_OF_BURN_IN_SAMPLES: usize = 0;
const DEFAULT_MCMC_STEP_SIZE: f64 = 0.1;
const DEFAULT_SEED: u64 = 1;

fn run(args: Args) -> Result<(), EmulatorError> {
    let dir = &args.statistics_directory;

    let runtime = runtime_parameters::read(&mut std::io::BufReader::new(File::open(
        dir.join("runtime_parameters.dat"),
    )?))?;
    let parameters = priors::read(&mut std::io::BufReader::new(File::open(
        dir.join("parameter_priors.dat"),
    )?))?;
    let output_names = read_observable_names(&dir.join("observable_names.dat"))?;
    let parameter_names: Vec<String> = parameters.iter().map(|p| p.name.clone()).collect();

    let experimental_results_file = dir.join(
        runtime.get_or("EXPERIMENTAL_RESULTS_FILE", "experimental_results.dat"),
    );
    let (observed_values, observed_variances) =
        training_data::read_experimental_results(&experimental_results_file, &output_names)?;
    let observed = Observable::new(observed_values, ndarray::Array2::from_diag(&observed_variances))?;

    let use_model_error = parse_bool(&runtime.get_or("MCMC_USE_MODEL_ERROR", "true"))?;

    let external_executable = runtime.get_or("EXTERNAL_MODEL_EXECUTABLE", "");

    let model: Rc<dyn Model> = if !external_executable.is_empty() {
        let mut argv = vec![external_executable];
        if let Some(extra) = runtime.get("EXTERNAL_MODEL_ARGUMENTS") {
            argv.extend(extra.split_whitespace().map(|s| s.to_string()));
        }
        let process = ExternalProcess::start(&argv, parameters.len(), output_names.len())?;
        log::info!("using external model executable '{}'", argv[0]);
        Rc::new(ExternalModel::new(
            process,
            parameters.clone(),
            output_names.clone(),
            observed,
        )?)
    } else {
        let model_output_directory =
            dir.join(runtime.get_or("MODEL_OUTPUT_DIRECTORY", "model_output"));
        let training = training_data::read_model_output_directory(
            &model_output_directory,
            &parameter_names,
            &output_names,
        )?;
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
            parameters.clone(),
            output_names.clone(),
            training.parameter_values,
            training.output_values,
        )?;
        emulator.set_output_uncertainty_scales(pca_block.output_uncertainty_scales)?;
        emulator.principal_component_decompose()?;
        emulator.retain_principal_components(fraction)?;
        if submodels.len() != emulator.number_pca_outputs() {
            return Err(EmulatorError::DimensionMismatch(format!(
                "EmulatorState.dat has {} submodels, expected {}",
                submodels.len(),
                emulator.number_pca_outputs()
            )));
        }
        for (i, state) in submodels.into_iter().enumerate() {
            emulator.set_model_hyperparameters(i, state.kernel, state.regression_order, state.thetas)?;
        }
        emulator.make_cache(true)?;
        log::info!("using trained emulator to generate trace");

        let mut emulated = EmulatedModel::new(emulator, observed)?;
        emulated.set_use_model_covariance(use_model_error);
        Rc::new(emulated)
    };

    let sampler_type = runtime.get_or("SAMPLER", DEFAULT_SAMPLER);
    let mut number_of_samples = runtime
        .get_usize("SAMPLER_NUMBER_OF_SAMPLES")
        .unwrap_or(DEFAULT_NUMBER_OF_SAMPLES);
    let mut number_of_burn_in_samples = runtime
        .get_usize("MCMC_NUMBER_OF_BURN_IN_SAMPLES")
        .unwrap_or(DEFAULT_NUMBER_OF_BURN_IN_SAMPLES);

    let mut trace = Trace::new(parameter_names, output_names);

    if sampler_type == "PercentileGrid" {
        let mut sampler = PercentileGridSampler::new(Rc::clone(&model));
        sampler.set_number_of_samples(number_of_samples)?;
        number_of_samples = sampler.number_of_samples();
        number_of_burn_in_samples = 0;
        sampler.initialize()?;
        log::info!("PercentileGridSampler: {} samples", number_of_samples);
        for _ in 0..number_of_samples {
            trace.add(sampler.next_sample()?)?;
        }
    } else {
        let mut sampler = MetropolisHastingsSampler::new(Rc::clone(&model), DEFAULT_SEED);
        let step_size = runtime
            .get_f64("MCMC_STEP_SIZE")
            .unwrap_or(DEFAULT_MCMC_STEP_SIZE);
        sampler.set_step_size(step_size);
        sampler.initialize()?;
        log::info!(
            "MetropolisHastingsSampler: {} burn-in, {} samples, step_size={}",
            number_of_burn_in_samples,
            number_of_samples,
            step_size
        );
        for _ in 0..number_of_burn_in_samples {
            sampler.next_sample()?;
        }
        for _ in 0..number_of_samples {
            trace.add(sampler.next_sample()?)?;
        }
    }

    let trace_directory = dir.join("trace");
    std::fs::create_dir_all(&trace_directory)?;
    let out_path = trace_directory.join(&args.output_file_name);
    trace.write_csv_file(&out_path)?;
    log::info!("wrote {}", out_path.display());

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool, EmulatorError> {
    match s {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(EmulatorError::ParseFailure(format!(
            "expected a boolean (true|false|1|0), got {:?}",
            other
        ))),
    }
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
            eprintln!("generate-trace: {}", e);
            ExitCode::FAILURE
        }
    }
}
