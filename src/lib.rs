//! Gaussian-process emulator and posterior samplers for expensive
//! simulators.
//!
//! A deterministic simulator is run at a modest number of design points;
//! [`emulator::Emulator`] trains a multi-output Gaussian-process surrogate
//! over those runs (after compressing the outputs with PCA, see
//! [`single_model`] and [`kernel`]), and a [`sampler::Sampler`] then
//! explores the posterior over simulator inputs implied by the
//! [`likelihood`] of noisy experimental observations under that surrogate.
//! [`model::Model`] is the common interface samplers drive, implemented by
//! both the emulator ([`model::EmulatedModel`]) and a live subprocess
//! ([`external_process::ExternalModel`]).
//!
//! The `io` module persists the pipeline's on-disk state (priors, PCA
//! block, trained hyperparameters, training directory tree); `src/bin`
//! has thin CLI wrappers around each pipeline stage.

pub mod distribution;
pub mod emulator;
pub mod error;
pub mod external_process;
pub mod io;
pub mod kernel;
pub mod latin_hypercube;
pub mod likelihood;
pub mod linalg;
pub mod model;
pub mod sample;
pub mod sampler;
pub mod single_model;
pub mod trace;

pub use distribution::{Distribution, Parameter};
pub use emulator::{Emulator, EmulatorStatus};
pub use error::EmulatorError;
pub use likelihood::Observable;
pub use model::Model;
pub use sample::Sample;
pub use sampler::Sampler;
pub use trace::Trace;
