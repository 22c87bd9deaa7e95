//! Energy and timing response of detector channels.
//!
//! Each response histograms the selected samples and fits the Gaussian model
//! of [`crate::fit`]. A failed fit does not fail the call: the response keeps
//! the histogram and carries the [`FitError`], so scans over many channels
//! run to completion. Selecting no samples at all is an error.

use crate::fit::{fit_histogram, FitConfig, FitError, GaussianFit, GaussianParams};
use crate::histogram::{Bins, Histogram};
use crate::{Error, Result};
use rayon::prelude::*;
use rustpet_core::{CoincidenceBatch, SinglesBatch};

/// Initial width guess for energy peaks.
const ENERGY_SIGMA_GUESS: f64 = 1.0;

/// Which hit of a coincidence supplied the charge samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargeSide {
    Left,
    Right,
}

/// Derived quantities of a converged energy fit.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyFit {
    /// `FWHM / mu * 100`.
    pub resolution_percent: f64,
    /// `mu - sigma_cut * |sigma|`: lowest charge still inside the photopeak.
    pub photopeak_cut: f64,
    pub fit: GaussianFit,
}

impl EnergyFit {
    fn from_fit(fit: GaussianFit, sigma_cut: f64) -> Self {
        let p = fit.params;
        Self {
            resolution_percent: fit.fwhm() / p.mu * 100.0,
            photopeak_cut: p.mu - sigma_cut * p.sigma,
            fit,
        }
    }
}

/// Charge spectrum of one channel and its photopeak fit.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyResponse {
    /// Channel analyzed.
    pub channel: u64,
    /// Coincidence side the samples came from; `None` for singles.
    pub side: Option<ChargeSide>,
    /// Number of charge samples selected.
    pub samples: usize,
    pub histogram: Histogram,
    pub fit: std::result::Result<EnergyFit, FitError>,
}

impl EnergyResponse {
    /// Energy resolution in percent, if the fit converged.
    #[must_use]
    pub fn resolution(&self) -> Option<f64> {
        self.fit.as_ref().ok().map(|f| f.resolution_percent)
    }

    /// Photopeak cut, if the fit converged.
    #[must_use]
    pub fn photopeak_cut(&self) -> Option<f64> {
        self.fit.as_ref().ok().map(|f| f.photopeak_cut)
    }

    /// Fitted parameters, if the fit converged.
    #[must_use]
    pub fn params(&self) -> Option<GaussianParams> {
        self.fit.as_ref().ok().map(|f| f.fit.params)
    }
}

fn energy_response(
    channel: u64,
    side: Option<ChargeSide>,
    charges: &[f64],
    bins: &Bins,
    sigma_cut: f64,
    config: &FitConfig,
) -> Result<EnergyResponse> {
    let histogram = Histogram::new(charges, bins)?;
    let guess = GaussianParams::from_histogram(&histogram, ENERGY_SIGMA_GUESS);
    let fit = fit_histogram(&histogram, guess, config)
        .map(|fit| EnergyFit::from_fit(fit, sigma_cut))
        .inspect_err(|e| log::warn!("energy fit failed for channel {channel}: {e}"));
    Ok(EnergyResponse {
        channel,
        side,
        samples: charges.len(),
        histogram,
        fit,
    })
}

fn select(ids: &[u64], values: &[f64], channel: u64) -> Vec<f64> {
    ids.iter()
        .zip(values)
        .filter(|&(&id, _)| id == channel)
        .map(|(_, &v)| v)
        .collect()
}

/// Charge spectrum of `channel` taken from one side of a coincidence table.
///
/// # Errors
/// Returns [`Error::EmptySelection`] if the channel never appears on that
/// side, or [`Error::InvalidBins`] for unusable bins.
pub fn channel_energy_response(
    batch: &CoincidenceBatch,
    channel: u64,
    side: ChargeSide,
    bins: &Bins,
    sigma_cut: f64,
    config: &FitConfig,
) -> Result<EnergyResponse> {
    let charges = match side {
        ChargeSide::Left => select(&batch.channel_id_l, &batch.charge_l, channel),
        ChargeSide::Right => select(&batch.channel_id_r, &batch.charge_r, channel),
    };
    if charges.is_empty() {
        return Err(Error::EmptySelection(format!(
            "channel {channel} has no {side:?} hits"
        )));
    }
    energy_response(channel, Some(side), &charges, bins, sigma_cut, config)
}

/// Charge spectrum of `channel`, taken from the left side if the channel
/// appears there and from the right side otherwise.
///
/// A channel is expected on one side only. When it appears on both, the left
/// side is used and a warning is logged.
///
/// # Errors
/// Returns [`Error::EmptySelection`] if the channel appears on neither side,
/// or [`Error::InvalidBins`] for unusable bins.
pub fn single_channel_energy_response(
    batch: &CoincidenceBatch,
    channel: u64,
    bins: &Bins,
    sigma_cut: f64,
    config: &FitConfig,
) -> Result<EnergyResponse> {
    let on_left = batch.channel_id_l.contains(&channel);
    let on_right = batch.channel_id_r.contains(&channel);
    let side = match (on_left, on_right) {
        (true, true) => {
            log::warn!("channel {channel} appears on both sides; using left charges");
            ChargeSide::Left
        }
        (true, false) => ChargeSide::Left,
        (false, true) => ChargeSide::Right,
        (false, false) => {
            return Err(Error::EmptySelection(format!(
                "channel {channel} not found on either side"
            )));
        }
    };
    channel_energy_response(batch, channel, side, bins, sigma_cut, config)
}

/// Charge spectrum of `channel` in a singles table.
///
/// # Errors
/// Returns [`Error::EmptySelection`] if the channel has no hits, or
/// [`Error::InvalidBins`] for unusable bins.
pub fn singles_energy_response(
    batch: &SinglesBatch,
    channel: u64,
    bins: &Bins,
    sigma_cut: f64,
    config: &FitConfig,
) -> Result<EnergyResponse> {
    let charges = select(&batch.channel_id, &batch.charge, channel);
    if charges.is_empty() {
        return Err(Error::EmptySelection(format!(
            "channel {channel} has no singles"
        )));
    }
    energy_response(channel, None, &charges, bins, sigma_cut, config)
}

/// Energy responses of several channels, fitted in parallel.
///
/// Results are returned in the order of `channels`; each is independent, so
/// an empty channel does not stop the others.
#[must_use]
pub fn energy_resolution_scan(
    batch: &CoincidenceBatch,
    channels: &[u64],
    bins: &Bins,
    sigma_cut: f64,
    config: &FitConfig,
) -> Vec<(u64, Result<EnergyResponse>)> {
    channels
        .par_iter()
        .map(|&channel| {
            (
                channel,
                single_channel_energy_response(batch, channel, bins, sigma_cut, config),
            )
        })
        .collect()
}

/// Minimum charges for a coincidence to count as a photopeak pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhotopeakCuts {
    pub left: f64,
    pub right: f64,
}

impl PhotopeakCuts {
    #[must_use]
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// Builds cuts from the energy responses of both channels.
    #[must_use]
    pub fn from_responses(left: &EnergyResponse, right: &EnergyResponse) -> Option<Self> {
        Some(Self::new(left.photopeak_cut()?, right.photopeak_cut()?))
    }

    #[inline]
    fn accepts(&self, charge_l: f64, charge_r: f64) -> bool {
        charge_l >= self.left && charge_r >= self.right
    }
}

/// Derived quantities of a converged timing fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingFit {
    /// Coincidence time resolution, `2.355 * |sigma|`.
    pub ctr: f64,
    pub fit: GaussianFit,
}

/// Time-difference spectrum of one channel pair.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingResponse {
    /// `TimeL - TimeR` of every selected coincidence, in file order.
    pub time_differences: Vec<f64>,
    pub histogram: Histogram,
    pub fit: std::result::Result<TimingFit, FitError>,
}

impl TimingResponse {
    /// Coincidence time resolution, if the fit converged.
    #[must_use]
    pub fn ctr(&self) -> Option<f64> {
        self.fit.as_ref().ok().map(|f| f.ctr)
    }

    /// Fitted parameters, if the fit converged.
    #[must_use]
    pub fn params(&self) -> Option<GaussianParams> {
        self.fit.as_ref().ok().map(|f| f.fit.params)
    }
}

/// Population standard deviation.
#[allow(clippy::cast_precision_loss)]
fn std_dev(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    var.sqrt()
}

/// Time differences of coincidences between `id_l` (left) and `id_r`
/// (right), optionally restricted to photopeak pairs, and their fit.
///
/// The initial width guess is the standard deviation of the differences.
///
/// # Errors
/// Returns [`Error::EmptySelection`] if no coincidence passes the filters,
/// or [`Error::InvalidBins`] for unusable bins.
pub fn coincidence_time_differences(
    batch: &CoincidenceBatch,
    id_l: u64,
    id_r: u64,
    bins: &Bins,
    cuts: Option<PhotopeakCuts>,
    config: &FitConfig,
) -> Result<TimingResponse> {
    let time_differences: Vec<f64> = batch
        .iter()
        .filter(|e| e.channel_pair() == (id_l, id_r))
        .filter(|e| cuts.map_or(true, |c| c.accepts(e.charge_l, e.charge_r)))
        .map(|e| e.time_difference())
        .collect();
    if time_differences.is_empty() {
        return Err(Error::EmptySelection(format!(
            "no coincidences between {id_l} and {id_r}{}",
            if cuts.is_some() { " above the photopeak cuts" } else { "" }
        )));
    }

    let histogram = Histogram::new(&time_differences, bins)?;
    let guess = GaussianParams::from_histogram(&histogram, std_dev(&time_differences));
    let fit = fit_histogram(&histogram, guess, config)
        .map(|fit| TimingFit {
            ctr: fit.fwhm(),
            fit,
        })
        .inspect_err(|e| log::warn!("timing fit failed for pair ({id_l}, {id_r}): {e}"));

    Ok(TimingResponse {
        time_differences,
        histogram,
        fit,
    })
}
