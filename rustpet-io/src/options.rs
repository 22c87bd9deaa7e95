//! Load options for tab-separated detector files.

use crate::{Error, Result};

/// Options controlling how a detector file is read.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadOptions {
    /// Factor applied to every time column at load time (default 1.0,
    /// i.e. picoseconds as written by the acquisition software).
    pub time_scale: f64,
    /// Read the file lazily in batches of this many records.
    pub chunk_size: Option<usize>,
    /// Treat the first line as a header row (default true).
    pub has_header: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            chunk_size: None,
            has_header: true,
        }
    }
}

impl LoadOptions {
    /// Set the time scale factor.
    #[must_use]
    pub fn with_time_scale(mut self, factor: f64) -> Self {
        self.time_scale = factor;
        self
    }

    /// Read in chunks of `records` rows.
    ///
    /// Values less than 1 are clamped to 1. Use [`Self::try_with_chunk_size`]
    /// to surface invalid values as an error instead.
    #[must_use]
    pub fn with_chunk_size(mut self, records: usize) -> Self {
        self.chunk_size = Some(records.max(1));
        self
    }

    /// Fallible variant of [`Self::with_chunk_size`].
    ///
    /// # Errors
    /// Returns an error if `records` is 0.
    pub fn try_with_chunk_size(mut self, records: usize) -> Result<Self> {
        if records == 0 {
            return Err(Error::InvalidOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        self.chunk_size = Some(records);
        Ok(self)
    }

    /// Set whether the first line is a header row.
    #[must_use]
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Check the options before reading.
    ///
    /// # Errors
    /// Returns an error if the time scale is not finite or the chunk size is 0.
    pub fn validate(&self) -> Result<()> {
        if !self.time_scale.is_finite() {
            return Err(Error::InvalidOptions(format!(
                "time_scale must be finite, got {}",
                self.time_scale
            )));
        }
        if self.chunk_size == Some(0) {
            return Err(Error::InvalidOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = LoadOptions::default();
        assert!((opts.time_scale - 1.0).abs() < f64::EPSILON);
        assert_eq!(opts.chunk_size, None);
        assert!(opts.has_header);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_chunk_size_clamp_and_try() {
        assert_eq!(LoadOptions::default().with_chunk_size(0).chunk_size, Some(1));
        assert!(LoadOptions::default().try_with_chunk_size(0).is_err());
        assert_eq!(
            LoadOptions::default()
                .try_with_chunk_size(500)
                .unwrap()
                .chunk_size,
            Some(500)
        );
    }

    #[test]
    fn test_validate_rejects_nan_scale() {
        let opts = LoadOptions::default().with_time_scale(f64::NAN);
        assert!(matches!(opts.validate(), Err(Error::InvalidOptions(_))));
    }
}
