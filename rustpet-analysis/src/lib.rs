//! rustpet-analysis: Channel pair statistics and resolution fitting.
//!
//! This crate provides channel pair frequency counts, histogramming, the
//! Gaussian peak fit, and the energy and coincidence timing responses built
//! on them.
//!

pub mod config;
mod error;
pub mod fit;
pub mod histogram;
pub mod pairs;
pub mod pipeline;
pub mod response;

pub use config::{AnalysisConfig, DEFAULT_SIGMA_CUT};
pub use error::{Error, Result};
pub use fit::{
    fit_gaussian, fit_histogram, gaussian, FitConfig, FitError, GaussianFit, GaussianParams,
    FWHM_PER_SIGMA,
};
pub use histogram::{Bins, Histogram};
pub use pairs::{
    count_channel_pairs_in, frequent_channel_pairs, frequent_channel_pairs_in, ChannelPair,
    ChannelPairCounts,
};
pub use pipeline::{load_coincidence_table, scan_channel_pairs};
pub use response::{
    channel_energy_response, coincidence_time_differences, energy_resolution_scan,
    single_channel_energy_response, singles_energy_response, ChargeSide, EnergyFit,
    EnergyResponse, PhotopeakCuts, TimingFit, TimingResponse,
};
