//! Analysis error types.

use thiserror::Error;

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Analysis error types.
///
/// Fit non-convergence is not an error here; it is reported inside the
/// response as a [`crate::FitError`].
#[derive(Error, Debug)]
pub enum Error {
    /// Channel or pair filter matched no records.
    #[error("no matching data: {0}")]
    EmptySelection(String),

    /// Histogram binning is unusable.
    #[error("invalid bins: {0}")]
    InvalidBins(String),

    /// Configuration value out of range.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Configuration file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ingestion error.
    #[error("ingest error: {0}")]
    Ingest(#[from] rustpet_io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] rustpet_core::Error),
}
