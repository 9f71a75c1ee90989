// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A least-squares fitter for the spin-down model.
//!
//! Residuals are taken against the nearest pulse. The fit solves for a phase
//! offset and corrections to the free parameters; because the model is linear
//! in them, each iteration is one linear solve, and iterating only matters
//! when the pulse numbering changes.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use strum_macros::{Display, EnumIter, EnumString};

use super::{FitError, FitResult, TimingFitter, TimingModel};
use crate::{
    constants::{FIT_CONVERGENCE_TOLERANCE, MAX_FIT_ITERATIONS},
    toas::ToaMeasurement,
};

/// Singular values smaller than this (relative to the largest) make the fit
/// degenerate.
const SVD_TOLERANCE: f64 = 1e-12;

/// How TOAs are weighted in a fit.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq, Default)]
#[strum(serialize_all = "lowercase")]
pub enum Weighting {
    /// Weighted if every TOA has a positive uncertainty, otherwise unweighted.
    #[default]
    Auto,

    /// Weight by 1/σ².
    Weighted,

    /// Every TOA has the same weight; residuals are compared against a 1 us
    /// uncertainty for χ².
    Unweighted,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SpinFitter {
    weighting: Weighting,
}

impl SpinFitter {
    pub fn new(weighting: Weighting) -> SpinFitter {
        SpinFitter { weighting }
    }

    /// Choose the weighting based on the TOAs being fit.
    pub fn auto() -> SpinFitter {
        SpinFitter::new(Weighting::Auto)
    }

    fn use_weights(&self, toas: &[ToaMeasurement]) -> bool {
        match self.weighting {
            Weighting::Weighted => true,
            Weighting::Unweighted => false,
            Weighting::Auto => toas.iter().all(|t| t.uncertainty_us > 0.0),
        }
    }
}

impl TimingFitter for SpinFitter {
    fn residuals(&self, toas: &[ToaMeasurement], model: &TimingModel) -> Result<Vec<f64>, FitError> {
        check_model(model)?;
        let weights = time_weights(toas, self.use_weights(toas));
        let phase = phase_residuals(toas, model)?;
        Ok(subtract_mean(&phase, &weights)
            .into_iter()
            .map(|r| r / model.f0.value * 1e6)
            .collect())
    }

    fn fit_toas(&self, toas: &[ToaMeasurement], model: &TimingModel) -> Result<FitResult, FitError> {
        check_model(model)?;
        let weighted = self.use_weights(toas);
        let free = model.free_params();
        let num_params = free.len() + 1;
        if toas.len() <= num_params {
            return Err(FitError::TooFewToas {
                num_toas: toas.len(),
                num_params,
            });
        }
        debug!(
            "Fitting {} TOAs for {num_params} parameters ({})",
            toas.len(),
            if weighted { "weighted" } else { "unweighted" }
        );

        let dts: Vec<f64> = toas.iter().map(|t| model.dt(t.epoch)).collect();
        // [us]; the same for every TOA when unweighted.
        let sigmas_us: Vec<f64> = toas
            .iter()
            .map(|t| if weighted { t.uncertainty_us } else { 1.0 })
            .collect();

        let mut fitted = model.clone();
        let mut prev_chi2: Option<f64> = None;
        for iteration in 1..=MAX_FIT_ITERATIONS {
            let resids = phase_residuals(toas, &fitted)?;
            // Work in phase units; each row is scaled by 1/σ.
            let sigmas: Vec<f64> = sigmas_us
                .iter()
                .map(|s| s * 1e-6 * fitted.f0.value)
                .collect();
            let design = DMatrix::from_fn(toas.len(), num_params, |i, j| {
                let d = match j {
                    0 => 1.0,
                    _ => free[j - 1].phase_derivative(dts[i]),
                };
                d / sigmas[i]
            });
            let rhs = DVector::from_fn(toas.len(), |i, _| -resids[i] / sigmas[i]);
            let chi2: f64 = rhs.norm_squared();

            let (step, covariance) = solve_least_squares(design.clone(), &rhs)?;
            let post_fit = &design * &step - &rhs;
            let post_chi2 = post_fit.norm_squared();
            // Without weights, the uncertainties come from the scatter of the
            // residuals.
            let cov_scale = if weighted {
                1.0
            } else {
                post_chi2 / (toas.len() - num_params) as f64
            };

            let mut negligible = true;
            for (i_param, &p) in free.iter().enumerate() {
                let delta = step[i_param + 1];
                let sigma = (covariance[(i_param + 1, i_param + 1)] * cov_scale).sqrt();
                let param = fitted.param_mut(p);
                param.value += delta;
                param.uncertainty = Some(sigma);
                if delta.abs() > 1e-3 * sigma {
                    negligible = false;
                }
            }
            trace!("Fit iteration {iteration}: χ² {chi2:.6e} -> {post_chi2:.6e}");

            let chi2_settled = match prev_chi2 {
                Some(prev) => (prev - chi2).abs() <= FIT_CONVERGENCE_TOLERANCE * prev.max(f64::MIN_POSITIVE),
                None => false,
            };
            if negligible || chi2_settled || post_chi2 == 0.0 {
                debug!("Fit converged after {iteration} iterations");
                break;
            }
            prev_chi2 = Some(chi2);
        }

        fit_statistics(toas, fitted, &sigmas_us, weighted, num_params)
    }
}

fn check_model(model: &TimingModel) -> Result<(), FitError> {
    if !(model.f0.value.is_finite() && model.f0.value > 0.0) {
        return Err(FitError::BadModel {
            name: model.name.clone(),
            reason: "F0 must be positive",
        });
    }
    if !model.f1.value.is_finite() {
        return Err(FitError::BadModel {
            name: model.name.clone(),
            reason: "F1 must be finite",
        });
    }
    Ok(())
}

/// Phase residuals \[turns\] against the nearest pulse, in [-0.5, 0.5].
fn phase_residuals(toas: &[ToaMeasurement], model: &TimingModel) -> Result<Vec<f64>, FitError> {
    toas.iter()
        .map(|t| {
            let phase = model.phase(model.dt(t.epoch));
            let r = phase - phase.round();
            if r.is_finite() {
                Ok(r)
            } else {
                Err(FitError::NonFiniteResidual(t.toa.to_string()))
            }
        })
        .collect()
}

/// Relative weights of the TOAs (1/σ², or all equal).
fn time_weights(toas: &[ToaMeasurement], weighted: bool) -> Vec<f64> {
    toas.iter()
        .map(|t| {
            if weighted {
                t.uncertainty_us.powi(-2)
            } else {
                1.0
            }
        })
        .collect()
}

fn subtract_mean(values: &[f64], weights: &[f64]) -> Vec<f64> {
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum <= 0.0 {
        return values.to_vec();
    }
    let mean = values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / weight_sum;
    values.iter().map(|v| v - mean).collect()
}

/// The population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn fit_statistics(
    toas: &[ToaMeasurement],
    model: TimingModel,
    sigmas_us: &[f64],
    weighted: bool,
    num_params: usize,
) -> Result<FitResult, FitError> {
    let weights = time_weights(toas, weighted);
    let phase = subtract_mean(&phase_residuals(toas, &model)?, &weights);
    let time_us: Vec<f64> = phase.iter().map(|r| r / model.f0.value * 1e6).collect();
    let chi2: f64 = time_us
        .iter()
        .zip(sigmas_us)
        .map(|(r, s)| (r / s).powi(2))
        .sum();
    let dof = toas.len() - num_params;

    Ok(FitResult {
        chi2_reduced: chi2 / dof as f64,
        phase_rms_cycles: std_dev(&phase),
        time_rms_us: std_dev(&time_us),
        num_toas: toas.len(),
        model,
    })
}

/// Solve the least-squares problem `design * x = rhs` with an SVD, returning
/// `x` and the unscaled covariance matrix `(AᵀA)⁻¹`. Columns are normalised
/// first; the spin-down column is many orders of magnitude larger than the
/// others.
fn solve_least_squares(
    mut design: DMatrix<f64>,
    rhs: &DVector<f64>,
) -> Result<(DVector<f64>, DMatrix<f64>), FitError> {
    let scales: Vec<f64> = design
        .column_iter()
        .map(|c| c.amax())
        .map(|m| if m > 0.0 { m } else { 1.0 })
        .collect();
    for (j, &s) in scales.iter().enumerate() {
        design.column_mut(j).scale_mut(1.0 / s);
    }

    let svd = design.clone().svd(true, true);
    let max_sv = svd.singular_values.max();
    if svd.rank(SVD_TOLERANCE * max_sv) < design.ncols() {
        return Err(FitError::Singular);
    }
    let mut x = svd
        .solve(rhs, SVD_TOLERANCE * max_sv)
        .map_err(|_| FitError::Singular)?;
    let mut covariance = (design.transpose() * &design)
        .try_inverse()
        .ok_or(FitError::Singular)?;

    for (j, &sj) in scales.iter().enumerate() {
        x[j] /= sj;
        for (k, &sk) in scales.iter().enumerate() {
            covariance[(j, k)] /= sj * sk;
        }
    }
    Ok((x, covariance))
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_solve_least_squares() {
        // y = 2 + 3x on x = [0, 1, 2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let (beta, cov) = solve_least_squares(x, &y).unwrap();
        assert_abs_diff_eq!(beta[0], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(beta[1], 3.0, epsilon = 1e-10);
        // (XᵀX)⁻¹ for this design.
        assert_abs_diff_eq!(cov[(0, 0)], 5.0 / 6.0, epsilon = 1e-10);
        assert_abs_diff_eq!(cov[(1, 1)], 0.5, epsilon = 1e-10);
    }

    #[test]
    fn test_degenerate_design() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 5.0, 1.0, 5.0, 1.0, 5.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        assert!(matches!(
            solve_least_squares(x, &y),
            Err(FitError::Singular)
        ));
    }

    #[test]
    fn test_std_dev() {
        assert_abs_diff_eq!(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_abs_diff_eq!(std_dev(&[]), 0.0);
    }
}
