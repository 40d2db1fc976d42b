//! Errors raised by the benchmark core
//!
//! Correctness findings (mismatches, bad models, bad return codes) are not
//! errors: they are reported as data by [verify](../verify/index.html).
//! Timeouts are an expected outcome and recorded in the run records.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed DIMACS input.
    #[error("{message} at line {line} column {column}")]
    Format {
        message: String,
        line: usize,
        column: usize,
    },

    /// The first token of a solver result file is not SAT, UNSAT or INDET.
    #[error("unknown result \"{token}\" in {}", .path.display())]
    UnknownResult { path: PathBuf, token: String },

    /// A model literal in a solver result file is not an integer.
    #[error("malformed model literal \"{token}\" in {}", .path.display())]
    MalformedModel { path: PathBuf, token: String },

    /// The executable could not be started.
    #[error("failed to start \"{command}\": {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A campaign precondition does not hold.
    #[error("{0}")]
    Setup(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Attach a path to an I/O error.
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::File {
            path: path.into(),
            source,
        }
    }
}
