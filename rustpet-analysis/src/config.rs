//! Analysis configuration.
//!
//! JSON schema (every field optional):
//!
//! ```json
//! {
//!   "time_scale": 1.0,
//!   "chunk_size": 100000,
//!   "has_header": true,
//!   "geometric_ids": false,
//!   "sigma_cut": 2.5,
//!   "fit": { "max_iterations": 200, "xtol": 1.49012e-8, "ftol": 1.49012e-8,
//!            "initial_lambda": 0.001, "lambda_up": 10.0, "lambda_down": 0.1 }
//! }
//! ```

use crate::fit::FitConfig;
use crate::{Error, Result};
use rustpet_io::LoadOptions;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Default photopeak cut distance below the peak, in sigmas.
pub const DEFAULT_SIGMA_CUT: f64 = 2.5;

/// Settings for a load-and-analyze run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Factor applied to time columns at load time.
    pub time_scale: f64,
    /// Read input in chunks of this many records.
    pub chunk_size: Option<usize>,
    /// First line of each input file is a header row.
    pub has_header: bool,
    /// Rewrite channel IDs into geometric IDs after loading.
    pub geometric_ids: bool,
    /// Photopeak cut distance below the fitted peak, in sigmas.
    pub sigma_cut: f64,
    /// Curve fit settings.
    pub fit: FitConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            chunk_size: None,
            has_header: true,
            geometric_ids: false,
            sigma_cut: DEFAULT_SIGMA_CUT,
            fit: FitConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds out-of-range values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the string is not valid JSON or holds out-of-range
    /// values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.load_options()
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        if !self.sigma_cut.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "sigma_cut must be finite, got {}",
                self.sigma_cut
            )));
        }
        self.fit.validate()
    }

    /// Ingestion options derived from this configuration.
    #[must_use]
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            time_scale: self.time_scale,
            chunk_size: self.chunk_size,
            has_header: self.has_header,
        }
    }
}
