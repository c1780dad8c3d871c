//! The crate's single error type.

use thiserror::Error;

/// Errors produced anywhere in the emulator/sampler pipeline.
#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("invalid uncertainty: {0}")]
    InvalidUncertainty(String),

    #[error("numerically ill-conditioned: {0}")]
    NumericallyIllConditioned(String),

    #[error("emulator is not ready: {0}")]
    NotReady(String),

    #[error("ill-conditioned likelihood: {0}")]
    IllConditionedLikelihood(String),

    #[error("bad file format: {0}")]
    FileFormatError(String),

    #[error("parse failure: {0}")]
    ParseFailure(String),

    #[error("external process handshake mismatch: {0}")]
    HandshakeMismatch(String),

    #[error("failed to spawn external process: {0}")]
    SpawnFailed(String),

    #[error("broken pipe to external process: {0}")]
    BrokenPipe(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("output out of range: {0}")]
    OutputOutOfRange(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
