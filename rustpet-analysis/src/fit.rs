//! Gaussian peak fitting.
//!
//! Fits `f(x) = A * exp(-((x - mu) / sigma)^2)` to `(x, y)` samples with a
//! Levenberg-Marquardt loop. The exponent deliberately has no factor of 2:
//! resolution values computed downstream rely on this parameterization.
//!
//! Each iteration solves the damped normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr` and accepts the step if it lowers χ².
//! Convergence follows the usual relative χ² / relative step tests.
#![allow(clippy::cast_precision_loss)]

use crate::histogram::Histogram;
use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// FWHM of a Gaussian in units of its width parameter.
pub const FWHM_PER_SIGMA: f64 = 2.355;

/// Half-width, in sigmas, of the range sampled by [`GaussianFit::curve`].
pub const CURVE_HALF_WIDTH: f64 = 2.5;

const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;

/// Evaluates `amplitude * exp(-((x - mu) / sigma)^2)`.
#[inline]
#[must_use]
pub fn gaussian(x: f64, amplitude: f64, mu: f64, sigma: f64) -> f64 {
    let u = (x - mu) / sigma;
    amplitude * (-u * u).exp()
}

/// Gaussian model parameters `[A, mu, sigma]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    pub amplitude: f64,
    pub mu: f64,
    pub sigma: f64,
}

impl GaussianParams {
    #[must_use]
    pub fn new(amplitude: f64, mu: f64, sigma: f64) -> Self {
        Self {
            amplitude,
            mu,
            sigma,
        }
    }

    /// Seeds a fit from a histogram: the maximum count, the left edge of the
    /// first maximal bin, and the given width.
    #[must_use]
    pub fn from_histogram(histogram: &Histogram, sigma: f64) -> Self {
        let peak = histogram.peak_bin();
        Self {
            amplitude: histogram.max_count() as f64,
            mu: histogram.edges()[peak],
            sigma,
        }
    }

    /// Model value at `x`.
    #[inline]
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        gaussian(x, self.amplitude, self.mu, self.sigma)
    }

    /// Full width at half maximum, `2.355 * |sigma|`.
    #[inline]
    #[must_use]
    pub fn fwhm(&self) -> f64 {
        FWHM_PER_SIGMA * self.sigma.abs()
    }

    fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.amplitude, self.mu, self.sigma)
    }

    fn from_vector(v: &Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    fn is_finite(&self) -> bool {
        self.amplitude.is_finite() && self.mu.is_finite() && self.sigma.is_finite()
    }
}

/// Levenberg-Marquardt settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Maximum number of iterations (accepted plus rejected steps).
    pub max_iterations: usize,
    /// Relative step size below which the fit has converged.
    pub xtol: f64,
    /// Relative χ² decrease below which the fit has converged.
    pub ftol: f64,
    /// Initial damping.
    pub initial_lambda: f64,
    /// Damping multiplier after a rejected step.
    pub lambda_up: f64,
    /// Damping multiplier after an accepted step.
    pub lambda_down: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            xtol: 1.490_12e-8,
            ftol: 1.490_12e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

impl FitConfig {
    /// Checks the settings.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for zero iterations, non-positive
    /// tolerances, or damping factors on the wrong side of 1.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig(
                "fit.max_iterations must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("fit.xtol", self.xtol),
            ("fit.ftol", self.ftol),
            ("fit.initial_lambda", self.initial_lambda),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.lambda_up > 1.0) {
            return Err(Error::InvalidConfig(format!(
                "fit.lambda_up must exceed 1, got {}",
                self.lambda_up
            )));
        }
        if !(self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "fit.lambda_down must be in (0, 1), got {}",
                self.lambda_down
            )));
        }
        Ok(())
    }
}

/// Why a fit produced no parameters.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    /// x and y samples differ in length.
    #[error("x and y differ in length ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },

    /// Fewer samples than parameters.
    #[error("need at least 3 samples, got {0}")]
    TooFewPoints(usize),

    /// No positive counts to fit.
    #[error("histogram has no positive counts")]
    DegenerateData,

    /// Unusable starting point.
    #[error("invalid initial guess: {0}")]
    InvalidGuess(String),

    /// Iteration budget exhausted.
    #[error("fit did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },

    /// Parameters or χ² became NaN or infinite.
    #[error("fit produced non-finite values")]
    NonFinite,
}

/// A converged Gaussian fit.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianFit {
    /// Fitted parameters; `sigma` is reported as a non-negative width.
    pub params: GaussianParams,
    /// Parameter covariance scaled by the residual variance. `None` when
    /// there are no degrees of freedom or `JᵀJ` is singular.
    pub covariance: Option<Matrix3<f64>>,
    /// Sum of squared residuals at the solution.
    pub chi2: f64,
    /// Iterations used.
    pub iterations: usize,
}

impl GaussianFit {
    /// Full width at half maximum.
    #[must_use]
    pub fn fwhm(&self) -> f64 {
        self.params.fwhm()
    }

    /// One-sigma parameter uncertainties `[A, mu, sigma]`.
    #[must_use]
    pub fn std_errors(&self) -> Option<[f64; 3]> {
        self.covariance
            .map(|c| [c[(0, 0)].sqrt(), c[(1, 1)].sqrt(), c[(2, 2)].sqrt()])
    }

    /// `n` evenly spaced `[x, f(x)]` samples over `mu ± 2.5 sigma`, for
    /// overlaying the fit on a rendered histogram.
    #[must_use]
    pub fn curve(&self, n: usize) -> Vec<[f64; 2]> {
        let p = self.params;
        let start = p.mu - CURVE_HALF_WIDTH * p.sigma;
        let stop = p.mu + CURVE_HALF_WIDTH * p.sigma;
        let step = if n > 1 {
            (stop - start) / (n - 1) as f64
        } else {
            0.0
        };
        (0..n)
            .map(|i| {
                let x = start + step * i as f64;
                [x, p.eval(x)]
            })
            .collect()
    }
}

fn chi2(x: &[f64], y: &[f64], p: &Vector3<f64>) -> f64 {
    x.iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - gaussian(xi, p[0], p[1], p[2]);
            r * r
        })
        .sum()
}

/// Accumulates `JᵀJ` and `Jᵀr` for the current parameters.
fn normal_equations(x: &[f64], y: &[f64], p: &Vector3<f64>) -> (Matrix3<f64>, Vector3<f64>) {
    let (amp, mu, sigma) = (p[0], p[1], p[2]);
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (&xi, &yi) in x.iter().zip(y) {
        let u = (xi - mu) / sigma;
        let e = (-u * u).exp();
        let f = amp * e;
        // d/dA = e, d/dmu = 2 f u / sigma, d/dsigma = 2 f u^2 / sigma
        let j = Vector3::new(e, 2.0 * f * u / sigma, 2.0 * f * u * u / sigma);
        jtj += j * j.transpose();
        jtr += j * (yi - f);
    }
    (jtj, jtr)
}

fn finish(
    x: &[f64],
    y: &[f64],
    p: &Vector3<f64>,
    chi2: f64,
    iterations: usize,
) -> std::result::Result<GaussianFit, FitError> {
    let mut params = GaussianParams::from_vector(p);
    if !params.is_finite() || !chi2.is_finite() {
        return Err(FitError::NonFinite);
    }
    params.sigma = params.sigma.abs();
    let dof = x.len().saturating_sub(3);
    let covariance = if dof > 0 {
        let (jtj, _) = normal_equations(x, y, p);
        jtj.try_inverse().map(|inv| inv * (chi2 / dof as f64))
    } else {
        None
    };
    Ok(GaussianFit {
        params,
        covariance,
        chi2,
        iterations,
    })
}

/// Fits the Gaussian model to `(x, y)` starting from `guess`.
///
/// # Errors
/// Returns a [`FitError`] when the data cannot support a fit or the
/// iteration does not converge.
pub fn fit_gaussian(
    x: &[f64],
    y: &[f64],
    guess: GaussianParams,
    config: &FitConfig,
) -> std::result::Result<GaussianFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < 3 {
        return Err(FitError::TooFewPoints(x.len()));
    }
    if !y.iter().any(|&v| v > 0.0) {
        return Err(FitError::DegenerateData);
    }
    if !guess.is_finite() || guess.sigma == 0.0 {
        return Err(FitError::InvalidGuess(format!(
            "A={}, mu={}, sigma={}",
            guess.amplitude, guess.mu, guess.sigma
        )));
    }

    let mut p = guess.as_vector();
    let mut current = chi2(x, y, &p);
    if !current.is_finite() {
        return Err(FitError::NonFinite);
    }
    let mut lambda = config.initial_lambda;
    let mut steps_taken = 0usize;

    for iteration in 1..=config.max_iterations {
        if current == 0.0 {
            return finish(x, y, &p, current, iteration - 1);
        }

        let (jtj, jtr) = normal_equations(x, y, &p);
        let mut damped = jtj;
        for i in 0..3 {
            damped[(i, i)] *= 1.0 + lambda;
        }

        let step = damped.lu().solve(&jtr);
        let trial = step.map(|delta| (delta, p + delta));
        let accepted = trial.and_then(|(delta, candidate)| {
            let value = chi2(x, y, &candidate);
            (value.is_finite() && value <= current).then_some((delta, candidate, value))
        });

        match accepted {
            Some((delta, candidate, value)) => {
                let scale = jtj.diagonal().map(|d| d.max(0.0).sqrt());
                let step_norm = scale.component_mul(&delta).norm();
                let param_norm = scale.component_mul(&p).norm();
                let drop = (current - value) / current;
                let damped_step = lambda > 1.0;

                p = candidate;
                current = value;
                steps_taken += 1;
                lambda = (lambda * config.lambda_down).max(LAMBDA_MIN);

                if !damped_step
                    && (drop <= config.ftol || step_norm <= config.xtol * param_norm)
                {
                    return finish(x, y, &p, current, iteration);
                }
            }
            None => {
                lambda *= config.lambda_up;
                // No descent even along a vanishing gradient step. A stall
                // at the untouched guess means the model never saw the data.
                if lambda > LAMBDA_MAX {
                    if steps_taken == 0 {
                        return Err(FitError::NotConverged {
                            iterations: iteration,
                        });
                    }
                    return finish(x, y, &p, current, iteration);
                }
            }
        }
    }

    Err(FitError::NotConverged {
        iterations: config.max_iterations,
    })
}

/// Fits the Gaussian model to histogram `(bin center, count)` pairs.
///
/// # Errors
/// See [`fit_gaussian`].
pub fn fit_histogram(
    histogram: &Histogram,
    guess: GaussianParams,
    config: &FitConfig,
) -> std::result::Result<GaussianFit, FitError> {
    fit_gaussian(&histogram.centers(), &histogram.counts_f64(), guess, config)
}
