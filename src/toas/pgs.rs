// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Template matching of pulse profiles.
//!
//! The shift of a profile `p` relative to a standard `s` is found by
//! maximising
//!
//! C(τ) = Σ_k |P_k| |S_k| cos(φ_k - θ_k + 2πkτ)
//!
//! over the harmonics `k` of their discrete Fourier transforms (Taylor 1992).
//! The search is started from the peak of the circular cross-correlation,
//! which is also computed with FFTs.

use std::{f64::consts::TAU, sync::Arc};

use log::trace;
use ndarray::prelude::*;
use realfft::{num_complex::Complex, ComplexToReal, RealFftPlanner, RealToComplex};

use super::{
    format_mjd, ArrivalTimeEstimator, EstimatorError, ShiftEstimator, Toa, ToaFormat,
};
use crate::archive::SignalArchive;

/// The number of bisection steps used to refine the phase-gradient shift.
const NUM_BISECTIONS: usize = 60;

#[derive(Debug, Clone, Copy)]
pub struct PhaseGradientEstimator {
    shift_estimator: ShiftEstimator,
    format: ToaFormat,
}

impl Default for PhaseGradientEstimator {
    fn default() -> Self {
        Self {
            shift_estimator: ShiftEstimator::Pgs,
            format: ToaFormat::Tempo2,
        }
    }
}

/// A measured shift of a profile relative to the standard, in turns of phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Shift {
    /// In [-0.5, 0.5).
    pub(crate) phase: f64,
    pub(crate) uncertainty: f64,
}

impl ArrivalTimeEstimator for PhaseGradientEstimator {
    fn set_shift_estimator(&mut self, estimator: ShiftEstimator) -> Result<(), EstimatorError> {
        self.shift_estimator = estimator;
        Ok(())
    }

    fn set_format(&mut self, format: ToaFormat) -> Result<(), EstimatorError> {
        self.format = format;
        Ok(())
    }

    fn get_toas(
        &self,
        standard: &dyn SignalArchive,
        observation: &dyn SignalArchive,
    ) -> Result<Vec<Toa>, EstimatorError> {
        if standard.num_pols() != 1 || standard.num_chans() != 1 {
            return Err(EstimatorError::StandardNotScrunched {
                file: standard.filename().to_path_buf(),
                num_pols: standard.num_pols(),
                num_chans: standard.num_chans(),
            });
        }
        if observation.num_pols() != 1 || observation.num_chans() != 1 {
            return Err(EstimatorError::ObservationNotScrunched {
                file: observation.filename().to_path_buf(),
                num_pols: observation.num_pols(),
                num_chans: observation.num_chans(),
            });
        }
        let num_bins = observation.num_bins();
        if standard.num_bins() != num_bins {
            return Err(EstimatorError::BinMismatch {
                file: observation.filename().to_path_buf(),
                standard: standard.num_bins(),
                observation: num_bins,
            });
        }
        if num_bins < 4 {
            return Err(EstimatorError::TooFewBins {
                file: observation.filename().to_path_buf(),
                num_bins,
            });
        }

        let fft = ProfileFft::new(num_bins);

        // Use the time-averaged standard.
        let std_profile: Vec<f64> = standard
            .data()
            .slice(s![.., 0, 0, ..])
            .mean_axis(Axis(0))
            .ok_or_else(|| EstimatorError::FlatStandard(standard.filename().to_path_buf()))?
            .iter()
            .map(|&v| f64::from(v))
            .collect();
        let std_spectrum = fft.spectrum(&std_profile).map_err(|reason| {
            EstimatorError::StandardTransform {
                file: standard.filename().to_path_buf(),
                reason,
            }
        })?;
        let std_harmonics = harmonics(&std_spectrum, num_bins);
        // Parseval: a profile with structure has a non-negligible share of
        // its power outside the DC term.
        let std_power: f64 = std_harmonics.iter().map(|(amp, _)| amp * amp).sum();
        let total_power: f64 =
            std_profile.iter().map(|v| v * v).sum::<f64>() * std_profile.len() as f64;
        if std_power <= 1e-12 * total_power {
            return Err(EstimatorError::FlatStandard(
                standard.filename().to_path_buf(),
            ));
        }

        let file_name = observation
            .filename()
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| observation.filename().display().to_string());
        let freq = observation
            .frequencies()
            .first()
            .copied()
            .unwrap_or_else(|| observation.centre_frequency());
        let period_s = observation.folding_period();

        let data = observation.data();
        let mut toas = Vec::with_capacity(observation.num_subints());
        for (i_sub, profile) in data.slice(s![.., 0, 0, ..]).outer_iter().enumerate() {
            let profile: Vec<f64> = profile.iter().map(|&v| f64::from(v)).collect();
            let shift = measure_shift(self.shift_estimator, &fft, &std_spectrum, &profile)
                .map_err(|reason| EstimatorError::NoShift {
                    file: observation.filename().to_path_buf(),
                    subint: i_sub,
                    reason,
                })?;
            let mid = observation
                .subint_epochs()
                .get(i_sub)
                .copied()
                .ok_or_else(|| EstimatorError::NoShift {
                    file: observation.filename().to_path_buf(),
                    subint: i_sub,
                    reason: "the subint has no epoch",
                })?;
            let epoch = mid + hifitime::Duration::from_seconds(shift.phase * period_s);
            let uncertainty_us = shift.uncertainty * period_s * 1e6;
            trace!("subint {i_sub}: shift {:.6} +- {:.6} turns", shift.phase, shift.uncertainty);

            toas.push(Toa::new(format!(
                "{file_name} {freq:.6} {} {uncertainty_us:.3} {}",
                format_mjd(epoch),
                observation.telescope()
            )));
        }

        Ok(toas)
    }
}

/// Real-to-complex and complex-to-real FFTs for profiles of one length.
pub(crate) struct ProfileFft {
    len: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
}

impl ProfileFft {
    pub(crate) fn new(len: usize) -> ProfileFft {
        let mut planner = RealFftPlanner::new();
        ProfileFft {
            len,
            forward: planner.plan_fft_forward(len),
            inverse: planner.plan_fft_inverse(len),
        }
    }

    /// The non-negative frequency half of the profile's DFT.
    pub(crate) fn spectrum(&self, profile: &[f64]) -> Result<Vec<Complex<f64>>, &'static str> {
        if profile.len() != self.len {
            return Err("the profile length doesn't match the FFT");
        }
        let mut input = profile.to_vec();
        let mut output = self.forward.make_output_vec();
        self.forward
            .process(&mut input, &mut output)
            .map_err(|_| "the forward FFT failed")?;
        Ok(output)
    }

    /// The circular cross-correlation Σ_j p[j + lag] s[j] for each lag, from
    /// the spectra of `p` and `s`.
    fn cross_correlation(
        &self,
        profile: &[Complex<f64>],
        standard: &[Complex<f64>],
    ) -> Result<Vec<f64>, &'static str> {
        let num_terms = self.len / 2 + 1;
        if profile.len() != num_terms || standard.len() != num_terms {
            return Err("the spectrum length doesn't match the FFT");
        }
        let mut product: Vec<Complex<f64>> = profile
            .iter()
            .zip(standard)
            .map(|(p, s)| p * s.conj())
            .collect();
        // The DC and Nyquist terms of a real signal are real.
        product[0].im = 0.0;
        if self.len % 2 == 0 {
            product[self.len / 2].im = 0.0;
        }

        let mut output = self.inverse.make_output_vec();
        self.inverse
            .process(&mut product, &mut output)
            .map_err(|_| "the inverse FFT failed")?;
        let scale = 1.0 / self.len as f64;
        for value in output.iter_mut() {
            *value *= scale;
        }
        Ok(output)
    }
}

/// The amplitude and phase of harmonics 1 up to (but excluding) the Nyquist
/// harmonic of a `num_bins` profile with `spectrum`.
pub(crate) fn harmonics(spectrum: &[Complex<f64>], num_bins: usize) -> Vec<(f64, f64)> {
    spectrum
        .iter()
        .take((num_bins + 1) / 2)
        .skip(1)
        .map(|c| (c.norm(), c.arg()))
        .collect()
}

/// C(τ) and its first two derivatives.
fn objective(profile: &[(f64, f64)], standard: &[(f64, f64)], tau: f64) -> (f64, f64, f64) {
    profile.iter().zip(standard).enumerate().fold(
        (0.0_f64, 0.0_f64, 0.0_f64),
        |(c, dc, ddc), (i, ((p_amp, p_phase), (s_amp, s_phase)))| {
            let w = TAU * (i + 1) as f64;
            let amp = p_amp * s_amp;
            let arg = p_phase - s_phase + w * tau;
            (
                c + amp * arg.cos(),
                dc - w * amp * arg.sin(),
                ddc - w * w * amp * arg.cos(),
            )
        },
    )
}

pub(crate) fn measure_shift(
    method: ShiftEstimator,
    fft: &ProfileFft,
    std_spectrum: &[Complex<f64>],
    profile: &[f64],
) -> Result<Shift, &'static str> {
    let n = profile.len();
    let spectrum = fft.spectrum(profile)?;

    // Coarse search: circular cross-correlation.
    let ccf = fft.cross_correlation(&spectrum, std_spectrum)?;
    let peak = ccf
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .ok_or("the profile is empty")?;
    let (left, centre, right) = (ccf[(peak + n - 1) % n], ccf[peak], ccf[(peak + 1) % n]);
    let denom = left - 2.0 * centre + right;
    let offset = if denom < 0.0 {
        0.5 * (left - right) / denom
    } else {
        0.0
    };
    let ccf_tau = (peak as f64 + offset) / n as f64;

    let std_harmonics = harmonics(std_spectrum, n);
    let prof_harmonics = harmonics(&spectrum, n);
    let tau = match method {
        ShiftEstimator::Ccf => ccf_tau,
        ShiftEstimator::Pgs => {
            // The maximum of C is within a bin of the CCF peak; bisect on
            // the gradient.
            let mut lo = (peak as f64 - 1.0) / n as f64;
            let mut hi = (peak as f64 + 1.0) / n as f64;
            let grad = |tau| objective(&prof_harmonics, &std_harmonics, tau).1;
            if grad(lo) > 0.0 && grad(hi) < 0.0 {
                for _ in 0..NUM_BISECTIONS {
                    let mid = 0.5 * (lo + hi);
                    if grad(mid) > 0.0 {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                0.5 * (lo + hi)
            } else {
                ccf_tau
            }
        }
    };

    let (c, _, ddc) = objective(&prof_harmonics, &std_harmonics, tau);
    let std_power: f64 = std_harmonics.iter().map(|(amp, _)| amp * amp).sum();
    let prof_power: f64 = prof_harmonics.iter().map(|(amp, _)| amp * amp).sum();
    let scale = c / std_power;
    if scale <= 0.0 || ddc >= 0.0 {
        return Err("the profile doesn't resemble the standard");
    }

    let num_dof = (2 * prof_harmonics.len()).saturating_sub(2).max(1);
    let residual_power = (prof_power - 2.0 * scale * c + scale * scale * std_power).max(0.0);
    let noise_var = residual_power / num_dof as f64;
    let uncertainty = (noise_var / (-scale * ddc)).sqrt();

    let phase = tau - (tau + 0.5).floor();
    Ok(Shift { phase, uncertainty })
}
