//! One-dimensional histograms of charge and time-difference samples.
#![allow(clippy::cast_precision_loss)]

use crate::{Error, Result};

/// Histogram binning.
#[derive(Debug, Clone, PartialEq)]
pub enum Bins {
    /// Explicit, strictly increasing bin edges.
    Edges(Vec<f64>),
    /// Number of equal-width bins spanning the data range.
    Count(usize),
}

impl Bins {
    /// `n` equal-width bins from `start` to `stop`.
    #[must_use]
    pub fn uniform(start: f64, stop: f64, n: usize) -> Self {
        Self::Edges(linspace(start, stop, n))
    }

    fn resolve(&self, values: &[f64]) -> Result<Vec<f64>> {
        match self {
            Bins::Edges(edges) => Ok(edges.clone()),
            Bins::Count(0) => Err(Error::InvalidBins(
                "bin count must be at least 1".to_string(),
            )),
            Bins::Count(n) => {
                let (lo, hi) = data_range(values);
                Ok(linspace(lo, hi, *n))
            }
        }
    }
}

impl From<Vec<f64>> for Bins {
    fn from(edges: Vec<f64>) -> Self {
        Bins::Edges(edges)
    }
}

impl From<usize> for Bins {
    fn from(n: usize) -> Self {
        Bins::Count(n)
    }
}

fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / n as f64;
    let mut edges: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    edges.push(stop);
    edges
}

/// Finite min/max of the data, widened to a unit interval when degenerate.
fn data_range(values: &[f64]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    }
}

fn validate_edges(edges: &[f64]) -> Result<()> {
    if edges.len() < 2 {
        return Err(Error::InvalidBins(format!(
            "need at least 2 bin edges, got {}",
            edges.len()
        )));
    }
    if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
        return Err(Error::InvalidBins(format!("non-finite bin edge {bad}")));
    }
    if let Some(w) = edges.windows(2).find(|w| w[1] <= w[0]) {
        return Err(Error::InvalidBins(format!(
            "bin edges must increase strictly ({} followed by {})",
            w[0], w[1]
        )));
    }
    Ok(())
}

/// Counts per bin over a set of edges.
///
/// Bins are half-open `[e_i, e_{i+1})` except the last, which also includes
/// its right edge. Values outside the edges and NaN are not counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
}

impl Histogram {
    /// Bins `values`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBins`] if the edges are unusable.
    pub fn new(values: &[f64], bins: &Bins) -> Result<Self> {
        let edges = bins.resolve(values)?;
        validate_edges(&edges)?;

        let mut counts = vec![0u64; edges.len() - 1];
        let first = edges[0];
        let last = edges[edges.len() - 1];
        for &v in values {
            if !(first..=last).contains(&v) {
                continue;
            }
            let bin = if v == last {
                counts.len() - 1
            } else {
                edges.partition_point(|&e| e <= v) - 1
            };
            counts[bin] += 1;
        }
        Ok(Self { edges, counts })
    }

    /// Builds a histogram from precomputed counts.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBins`] if the edges are unusable or the number
    /// of counts is not one less than the number of edges.
    pub fn from_counts(edges: Vec<f64>, counts: Vec<u64>) -> Result<Self> {
        validate_edges(&edges)?;
        if counts.len() + 1 != edges.len() {
            return Err(Error::InvalidBins(format!(
                "{} edges need {} counts, got {}",
                edges.len(),
                edges.len() - 1,
                counts.len()
            )));
        }
        Ok(Self { edges, counts })
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns true if there are no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Midpoints of consecutive edges.
    #[must_use]
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Counts as floating point, for fitting.
    #[must_use]
    pub fn counts_f64(&self) -> Vec<f64> {
        self.counts.iter().map(|&c| c as f64).collect()
    }

    /// Index of the first bin holding the maximum count.
    #[must_use]
    pub fn peak_bin(&self) -> usize {
        let max = self.max_count();
        self.counts.iter().position(|&c| c == max).unwrap_or(0)
    }

    /// Largest bin count.
    #[must_use]
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Number of samples that fell inside the edges.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
