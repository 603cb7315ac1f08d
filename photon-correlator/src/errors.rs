use std::io;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Acquisition failed: {0}")]
    AcquisitionError(String),
    #[error("Invalid accumulator state: {0}")]
    InvalidState(String),
    #[error("Statistics undefined: {0}")]
    DivisionUndefined(String),
    #[error("File {0} does not exist.")]
    FileNotAvailable(String),
    #[error("IO error.")]
    IOError(#[from] io::Error),
    #[error("{0}")]
    InvalidHeader(String),
    #[error("Failed writing npz archive.")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),
}
