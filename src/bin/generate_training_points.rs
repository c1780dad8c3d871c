//! `generate-training-points <statistics-directory>`
//!
//! Draws a Latin-hypercube design over the parameter priors declared in
//! `parameter_priors.dat` and writes one `parameters.dat` file per
//! design point under `model_output/run####/`, for an external
//! simulator (a later, out-of-process step this tool doesn't drive) to
//! fill in the matching `results.dat`. Mirrors `generateTrainingPoints.cxx`.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use gpemulate::error::EmulatorError;
use gpemulate::io::{priors, runtime_parameters};
use gpemulate::latin_hypercube;

#[derive(Parser, Debug)]
#[command(about = "Generate a Latin-hypercube design of training points over the parameter priors")]
struct Args {
    statistics_directory: PathBuf,
}

const DEFAULT_NUMBER_OF_TRAINING_POINTS: usize = 100;
const DEFAULT_SEED: u64 = 1;

fn run(args: Args) -> Result<(), EmulatorError> {
    let dir = &args.statistics_directory;

    let runtime = runtime_parameters::read(&mut std::io::BufReader::new(File::open(
        dir.join("runtime_parameters.dat"),
    )?))?;
    let parameters = priors::read(&mut std::io::BufReader::new(File::open(
        dir.join("parameter_priors.dat"),
    )?))?;

    let number_of_training_points = runtime
        .get_usize("NUMBER_TRAINING_POINTS")
        .unwrap_or(DEFAULT_NUMBER_OF_TRAINING_POINTS);
    let seed = runtime
        .get("LATIN_HYPERCUBE_SEED")
        .map(|s| {
            s.parse().map_err(|_| {
                EmulatorError::ParseFailure(format!("LATIN_HYPERCUBE_SEED is not an integer: {:?}", s))
            })
        })
        .transpose()?
        .unwrap_or(DEFAULT_SEED);

    let design = latin_hypercube::generate(number_of_training_points, parameters.len(), seed)?;

    log::info!(
        "generated {} training points over {} parameters",
        design.nrows(),
        design.ncols()
    );

    let model_output_directory =
        dir.join(runtime.get_or("MODEL_OUTPUT_DIRECTORY", "model_output"));
    std::fs::create_dir_all(&model_output_directory)?;

    for (i, row) in design.rows().into_iter().enumerate() {
        let run_directory = model_output_directory.join(format!("run{:04}", i));
        std::fs::create_dir_all(&run_directory)?;

        let mut file = File::create(run_directory.join("parameters.dat"))?;
        for (param, &unit_value) in parameters.iter().zip(row.iter()) {
            let value = param.prior.percentile(unit_value);
            writeln!(file, "{}\t{:.17e}", param.name, value)?;
        }
    }

    log::info!("wrote training points under {}", model_output_directory.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("generate-training-points: {}", e);
            ExitCode::FAILURE
        }
    }
}
