//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text reader error.
    #[error("TSV read error: {0}")]
    Csv(#[from] csv::Error),

    /// Row with the wrong number of columns.
    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// Row with fewer columns than the layout reads.
    #[error("line {line}: expected at least {minimum} columns, found {found}")]
    TooFewColumns {
        line: u64,
        minimum: usize,
        found: usize,
    },

    /// Field that is not a valid number.
    #[error("line {line}, column {column}: cannot parse {value:?} as {expected}")]
    Parse {
        line: u64,
        column: usize,
        value: String,
        expected: &'static str,
    },

    /// Invalid load options.
    #[error("invalid load options: {0}")]
    InvalidOptions(String),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] rustpet_core::Error),
}
