//! Crate-wide error type.

use crate::formula::dimacs::DimacsParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed DIMACS header or a non-integer token.
    #[error("format error: {0}")]
    Format(String),

    /// Invalid budget or step parameters.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Missing input file or solver binary.
    #[error("resource error: {0}")]
    Resource(String),

    /// The selection policy ran out of distinct candidates.
    #[error("selection exhausted: requested {requested} literals but only {available} candidates remain")]
    SelectionExhausted { requested: usize, available: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DimacsParseError> for Error {
    fn from(e: DimacsParseError) -> Self {
        match e {
            DimacsParseError::Io(e) => Error::Io(e),
            DimacsParseError::Format(msg) => Error::Format(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
