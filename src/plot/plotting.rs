// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Drawing dynamic spectra with plotters.

use std::{fmt::Display, ops::Range, path::Path};

use log::trace;
use plotters::prelude::*;

use super::{DynamicSpectrum, PlotError};

/// The number of X pixels on the plots.
const X_PIXELS: u32 = 1800;
/// The number of Y pixels on the plots.
const Y_PIXELS: u32 = 1350;

/// The profile sits above the dynamic spectrum, the spectrum to its right,
/// and the labels in the top-right corner.
pub(super) fn draw_dynamic_spectrum(
    spectrum: &DynamicSpectrum,
    path: &Path,
) -> Result<(), PlotError> {
    let (num_chans, num_bins) = spectrum.intensities.dim();
    trace!("Drawing {num_chans} channels x {num_bins} bins to {}", path.display());

    let root = BitMapBackend::new(path, (X_PIXELS, Y_PIXELS)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| draw_err(path, e))?;
    let (top, bottom) = root.split_vertically(Y_PIXELS / 3);
    let (profile_area, label_area) = top.split_horizontally(X_PIXELS * 2 / 3);
    let (dspec_area, spectrum_area) = bottom.split_horizontally(X_PIXELS * 2 / 3);

    let bin_width = 1.0 / num_bins as f64;
    let phases = (0..num_bins).map(|i| (i as f64 + 0.5) * bin_width);
    let freq_range = band_range(spectrum);

    // Profile.
    let mut chart = ChartBuilder::on(&profile_area)
        .margin(15)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, padded_range(spectrum.profile.iter().copied()))
        .map_err(|e| draw_err(path, e))?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("S/N")
        .draw()
        .map_err(|e| draw_err(path, e))?;
    chart
        .draw_series(LineSeries::new(
            phases.clone().zip(spectrum.profile.iter().copied()),
            &BLUE,
        ))
        .map_err(|e| draw_err(path, e))?;

    // Dynamic spectrum.
    let mut chart = ChartBuilder::on(&dspec_area)
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(70)
        .build_cartesian_2d(0.0..1.0, freq_range.clone())
        .map_err(|e| draw_err(path, e))?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("Pulse phase")
        .y_desc("Frequency (MHz)")
        .draw()
        .map_err(|e| draw_err(path, e))?;
    let chan_width = (freq_range.end - freq_range.start) / num_chans as f64;
    let (lo, hi) = min_max(spectrum.intensities.iter().map(|&v| f64::from(v)));
    chart
        .draw_series(
            spectrum
                .intensities
                .indexed_iter()
                .map(|((i_chan, i_bin), &v)| {
                    let freq = spectrum.freqs_mhz[i_chan];
                    let x = i_bin as f64 * bin_width;
                    Rectangle::new(
                        [
                            (x, freq - chan_width / 2.0),
                            (x + bin_width, freq + chan_width / 2.0),
                        ],
                        grey(f64::from(v), lo, hi).filled(),
                    )
                }),
        )
        .map_err(|e| draw_err(path, e))?;

    // Spectrum.
    let mut chart = ChartBuilder::on(&spectrum_area)
        .margin(15)
        .x_label_area_size(60)
        .build_cartesian_2d(
            padded_range(spectrum.spectrum.iter().copied()),
            freq_range,
        )
        .map_err(|e| draw_err(path, e))?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("On-pulse intensity")
        .draw()
        .map_err(|e| draw_err(path, e))?;
    chart
        .draw_series(LineSeries::new(
            spectrum
                .spectrum
                .iter()
                .copied()
                .zip(spectrum.freqs_mhz.iter().copied()),
            &BLUE,
        ))
        .map_err(|e| draw_err(path, e))?;

    let label_style = ("sans-serif", 34).into_font().color(&BLACK);
    for (i, label) in spectrum.labels.iter().enumerate() {
        label_area
            .draw_text(label, &label_style, (60, 60 + 50 * i as i32))
            .map_err(|e| draw_err(path, e))?;
    }

    root.present().map_err(|e| draw_err(path, e))?;
    Ok(())
}

fn draw_err(path: &Path, e: impl Display) -> PlotError {
    PlotError::Draw {
        file: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        })
}

/// The range of the values with 5% padding. Plotters needs a non-empty range.
fn padded_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = min_max(values);
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    let pad = if hi > lo { 0.05 * (hi - lo) } else { 1.0 };
    lo - pad..hi + pad
}

fn band_range(spectrum: &DynamicSpectrum) -> Range<f64> {
    let (lo, hi) = spectrum.band_mhz;
    if hi > lo {
        lo..hi
    } else {
        padded_range(spectrum.freqs_mhz.iter().copied())
    }
}

/// Brighter is darker.
fn grey(v: f64, lo: f64, hi: f64) -> RGBColor {
    let frac = if hi > lo {
        ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let level = (255.0 * (1.0 - frac)).round() as u8;
    RGBColor(level, level, level)
}
