//! Error types for grid logic

use tabula_core::TabulaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("Position out of bounds: row {row}, column {col}")]
    OutOfBounds { row: usize, col: usize },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Formula error: {0}")]
    Formula(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error(transparent)]
    Core(#[from] TabulaError),
}

pub type Result<T> = std::result::Result<T, GridError>;
