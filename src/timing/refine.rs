// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fitting a model, and the zap-then-fit refinement loop.

use log::info;
use strum_macros::Display;

use super::{zap_toas, FitError, FitResult, TimingFitter, TimingModel};
use crate::{
    constants::{DEFAULT_MAX_UNCERTAINTY_US, DEFAULT_N_SIGMA},
    toas::ToaMeasurement,
};

/// Fit the spin frequency and spin-down of `model` to the TOAs with
/// uncertainties of at most `max_err_us`. The TOAs that were used are returned
/// alongside the fit.
///
/// `model` itself isn't touched; the fitted model (with F0 and F1 free) is in
/// the [`FitResult`].
pub fn fit_model<F>(
    model: &TimingModel,
    toas: &[ToaMeasurement],
    max_err_us: f64,
    fitter: &F,
) -> Result<(Vec<ToaMeasurement>, FitResult), FitError>
where
    F: TimingFitter + ?Sized,
{
    let mut model = model.clone();
    model.thaw_spin();

    let good: Vec<ToaMeasurement> = toas
        .iter()
        .filter(|t| t.uncertainty_us <= max_err_us)
        .cloned()
        .collect();
    if good.is_empty() {
        return Err(FitError::NoToasBelowUncertainty {
            num_toas: toas.len(),
            max_err_us,
        });
    }
    if good.len() < toas.len() {
        info!(
            "Using {} of {} TOAs (uncertainty <= {max_err_us} us)",
            good.len(),
            toas.len()
        );
    }

    let fit = fitter.fit_toas(&good, &model)?;
    info!("Best fit has reduced chi^2 of {}", fit.chi2_reduced);
    info!("RMS in phase is {}", fit.phase_rms_cycles);
    info!("RMS in time is {} us", fit.time_rms_us);
    Ok((good, fit))
}

/// Settings for [`refine`].
#[derive(Debug, Clone)]
pub struct RefineSettings {
    /// The zap threshold, in trimmed standard deviations.
    pub n_sigma: f64,

    /// A threshold for the first zap only. A poor starting model needs a
    /// looser one.
    pub first_n_sigma: Option<f64>,

    /// TOAs with larger uncertainties \[us\] aren't fit.
    pub max_err_us: f64,

    /// Stop after this many zap-and-fit passes.
    pub max_iterations: usize,

    /// Stop when the RMS of the time residuals improves by less than this
    /// \[us\].
    pub min_improvement_us: Option<f64>,

    /// Zap before fitting?
    pub zap: bool,
}

impl Default for RefineSettings {
    fn default() -> Self {
        RefineSettings {
            n_sigma: DEFAULT_N_SIGMA,
            first_n_sigma: None,
            max_err_us: DEFAULT_MAX_UNCERTAINTY_US,
            max_iterations: 1,
            min_improvement_us: None,
            zap: true,
        }
    }
}

/// What happened in one pass of the refinement loop.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    /// Starting at 1.
    pub iteration: usize,
    pub num_zapped: usize,
    /// The number of TOAs that went into the fit.
    pub num_fit: usize,
    pub chi2_reduced: f64,
    pub time_rms_us: f64,
    /// How much the time RMS dropped compared to the previous pass.
    pub improvement_us: Option<f64>,
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    #[strum(serialize = "reached the maximum number of iterations")]
    MaxIterations,

    #[strum(serialize = "the residuals stopped improving")]
    Converged,

    #[strum(serialize = "there was nothing left to zap")]
    NothingZapped,

    #[strum(serialize = "the caller asked to stop")]
    Requested,
}

/// The outcome of [`refine`].
#[derive(Debug, Clone)]
pub struct Refinement {
    /// The TOAs used in the last fit.
    pub toas: Vec<ToaMeasurement>,
    pub fit: FitResult,
    pub reports: Vec<IterationReport>,
    pub stop_reason: StopReason,
}

/// Repeatedly zap outliers and refit. Each pass zaps the TOAs used by the
/// previous fit using the previous fit's model.
pub fn refine<F>(
    model: &TimingModel,
    toas: Vec<ToaMeasurement>,
    settings: &RefineSettings,
    fitter: &F,
) -> Result<Refinement, FitError>
where
    F: TimingFitter + ?Sized,
{
    refine_until(model, toas, settings, fitter, |_| false)
}

/// As [`refine`], but `should_stop` is also consulted after each pass.
pub fn refine_until<F, P>(
    model: &TimingModel,
    mut toas: Vec<ToaMeasurement>,
    settings: &RefineSettings,
    fitter: &F,
    mut should_stop: P,
) -> Result<Refinement, FitError>
where
    F: TimingFitter + ?Sized,
    P: FnMut(&IterationReport) -> bool,
{
    let max_iterations = settings.max_iterations.max(1);
    let mut model = model.clone();
    let mut reports = vec![];
    let mut previous_rms_us: Option<f64> = None;

    let mut iteration = 0;
    loop {
        iteration += 1;
        info!("Refinement pass {iteration}");
        let n_sigma = match (iteration, settings.first_n_sigma) {
            (1, Some(first)) => first,
            _ => settings.n_sigma,
        };
        let kept = if settings.zap {
            zap_toas(&toas, &model, fitter, n_sigma)?
        } else {
            toas.clone()
        };
        let num_zapped = toas.len() - kept.len();

        let (fit_toas, fit) = fit_model(&model, &kept, settings.max_err_us, fitter)?;
        let report = IterationReport {
            iteration,
            num_zapped,
            num_fit: fit_toas.len(),
            chi2_reduced: fit.chi2_reduced,
            time_rms_us: fit.time_rms_us,
            improvement_us: previous_rms_us.map(|prev| prev - fit.time_rms_us),
        };

        let stop_reason = match (report.improvement_us, settings.min_improvement_us) {
            (Some(improvement), Some(min)) if improvement < min => Some(StopReason::Converged),
            _ if settings.zap && iteration > 1 && num_zapped == 0 => {
                Some(StopReason::NothingZapped)
            }
            _ if should_stop(&report) => Some(StopReason::Requested),
            _ if iteration >= max_iterations => Some(StopReason::MaxIterations),
            _ => None,
        };
        reports.push(report);

        if let Some(stop_reason) = stop_reason {
            info!("Stopping after {iteration} passes: {stop_reason}");
            return Ok(Refinement {
                toas: fit_toas,
                fit,
                reports,
                stop_reason,
            });
        }

        previous_rms_us = Some(fit.time_rms_us);
        model = fit.model;
        toas = fit_toas;
    }
}
