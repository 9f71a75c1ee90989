// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sigma clipping of TOAs.

use log::info;

use super::{spin::std_dev, FitError, TimingFitter, TimingModel};
use crate::{
    cli::Warn,
    constants::{MIN_ZAP_SAMPLE, ZAP_TRIM_FRACTION},
    toas::ToaMeasurement,
};

/// Remove TOAs whose residual against `model` is further than `n_sigma` times
/// the standard deviation of the central 80% of residuals from the mean of
/// that central sample. The remaining TOAs keep their order.
///
/// If there are fewer than [`MIN_ZAP_SAMPLE`] TOAs, or the trimmed residuals
/// have no spread, nothing is zapped. A zap never removes every TOA; if the
/// threshold would, only the TOAs closest to the centre are kept.
pub fn zap_toas<F>(
    toas: &[ToaMeasurement],
    model: &TimingModel,
    fitter: &F,
    n_sigma: f64,
) -> Result<Vec<ToaMeasurement>, FitError>
where
    F: TimingFitter + ?Sized,
{
    let residuals = fitter.residuals(toas, model)?;
    let keep = zap_mask(&residuals, n_sigma);
    let num_zapped = keep.iter().filter(|&&k| !k).count();
    info!("Zapped {num_zapped} of {} TOAs", toas.len());

    Ok(toas
        .iter()
        .zip(keep)
        .filter(|(_, keep)| *keep)
        .map(|(toa, _)| toa.clone())
        .collect())
}

/// The range of residuals that survive a zap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ClipBounds {
    /// The mean of the central residuals \[us\].
    pub(crate) centre: f64,

    /// The largest distance from `centre` that is kept \[us\].
    pub(crate) threshold: f64,
}

impl ClipBounds {
    fn distance(&self, residual: f64) -> f64 {
        (residual - self.centre).abs()
    }
}

/// For each residual, should it be kept?
pub(crate) fn zap_mask(residuals: &[f64], n_sigma: f64) -> Vec<bool> {
    let bounds = match clip_bounds(residuals, n_sigma) {
        Some(bounds) => bounds,
        None => return vec![true; residuals.len()],
    };

    let distances: Vec<f64> = residuals.iter().map(|&r| bounds.distance(r)).collect();
    let mask: Vec<bool> = distances.iter().map(|&d| d <= bounds.threshold).collect();
    if mask.iter().any(|&k| k) {
        return mask;
    }

    // Keep the TOAs closest to the centre rather than none at all.
    let closest = distances.iter().copied().fold(f64::INFINITY, f64::min);
    format!(
        "A {n_sigma} sigma zap would remove all {} TOAs; keeping the closest to the centre",
        residuals.len()
    )
    .warn();
    distances.iter().map(|&d| d <= closest).collect()
}

/// Where the residuals between the 10th and 90th percentiles are centred, and
/// `n_sigma` times their standard deviation, or `None` if that can't be
/// trusted.
pub(crate) fn clip_bounds(residuals: &[f64], n_sigma: f64) -> Option<ClipBounds> {
    let n = residuals.len();
    if n < MIN_ZAP_SAMPLE {
        format!("Only {n} TOAs; need at least {MIN_ZAP_SAMPLE} to zap outliers, so none were zapped")
            .warn();
        return None;
    }

    let mut sorted = residuals.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let lo = (ZAP_TRIM_FRACTION * n as f64) as usize;
    let hi = ((1.0 - ZAP_TRIM_FRACTION) * n as f64) as usize;
    let central = &sorted[lo..hi];
    // The fitter centres residuals on the mean of every TOA, so one big
    // outlier can drag the good ones well away from zero.
    let centre = central.iter().sum::<f64>() / central.len() as f64;
    let sigma = std_dev(central);

    // A zero sigma would zap everything that isn't exactly on the model.
    let scale = sorted.iter().fold(0.0_f64, |acc, r| acc.max(r.abs()));
    if sigma.is_nan() || sigma <= f64::EPSILON * scale {
        "The central residuals have no spread; no TOAs were zapped".warn();
        return None;
    }

    let threshold = n_sigma * sigma;
    info!("Zap threshold: {threshold:.3} us ({n_sigma} x {sigma:.3} us) around {centre:.3} us");
    Some(ClipBounds { centre, threshold })
}
