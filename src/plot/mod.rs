// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Diagnostic plots of archives.
//!
//! A plot is only made if its file doesn't already exist; the check is on the
//! file name alone, so a plot of an archive that has since changed is not
//! remade.

mod error;
#[cfg(feature = "plotting")]
mod plotting;
#[cfg(test)]
mod tests;

pub use error::PlotError;

use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use log::{debug, info};
use ndarray::prelude::*;

use crate::{
    archive::{rotate_left, ArchiveError, SignalArchive},
    timing::std_dev,
};

/// Did [`plot_dynamic_spectrum`] draw anything?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotStatus {
    Rendered,

    /// The plot file was already there.
    Cached,
}

/// Something that turns a [`DynamicSpectrum`] into an image file.
pub trait PlotRenderer {
    fn render(&self, spectrum: &DynamicSpectrum, path: &Path) -> Result<(), PlotError>;
}

/// Draws PNGs with plotters.
#[derive(Debug, Default, Clone, Copy)]
pub struct BitmapRenderer;

impl PlotRenderer for BitmapRenderer {
    #[cfg(not(feature = "plotting"))]
    fn render(&self, _spectrum: &DynamicSpectrum, _path: &Path) -> Result<(), PlotError> {
        // Plotting is an optional feature, because its C dependencies can't be
        // statically compiled.
        Err(PlotError::NoPlottingFeature)
    }

    #[cfg(feature = "plotting")]
    fn render(&self, spectrum: &DynamicSpectrum, path: &Path) -> Result<(), PlotError> {
        plotting::draw_dynamic_spectrum(spectrum, path)
    }
}

/// The plot of an archive is `<plot_dir>/<archive file stem>.png`.
pub fn dynamic_spectrum_plot_path(archive_file: &Path, plot_dir: &Path) -> PathBuf {
    let stem = archive_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    plot_dir.join(format!("{stem}.png"))
}

/// Plot the dynamic spectrum of `archive` into `plot_dir`, unless it has
/// already been plotted there. `archive` itself is not modified.
pub fn plot_dynamic_spectrum<A, R>(
    archive: &A,
    plot_dir: &Path,
    renderer: &R,
) -> Result<PlotStatus, PlotError>
where
    A: SignalArchive + Clone,
    R: PlotRenderer + ?Sized,
{
    let path = dynamic_spectrum_plot_path(archive.filename(), plot_dir);
    if path.is_file() {
        info!("Plot already exists: {}; skipping", path.display());
        return Ok(PlotStatus::Cached);
    }

    std::fs::create_dir_all(plot_dir).map_err(|err| PlotError::Directory {
        dir: plot_dir.to_path_buf(),
        err,
    })?;
    debug!("Reducing {} for plotting", archive.filename().display());
    let spectrum = DynamicSpectrum::from_archive(archive)?;
    renderer.render(&spectrum, &path)?;
    info!("Plotted {}", path.display());
    Ok(PlotStatus::Rendered)
}

/// Everything needed to draw a dynamic spectrum.
#[derive(Debug, Clone)]
pub struct DynamicSpectrum {
    /// Time-averaged intensities, indexed by (chan, bin). The peak of the
    /// profile is rotated to the middle bin.
    pub intensities: Array2<f32>,

    /// \[MHz\]
    pub freqs_mhz: Vec<f64>,

    /// The lowest and highest frequencies covered by the band \[MHz\].
    pub band_mhz: (f64, f64),

    /// The frequency-averaged profile, in units of its off-pulse standard
    /// deviation.
    pub profile: Vec<f64>,

    /// The bins around the peak used for `spectrum`.
    pub on_pulse: Range<usize>,

    /// The on-pulse mean intensity of each channel.
    pub spectrum: Vec<f64>,

    /// File, telescope, source, frequency and MJD.
    pub labels: Vec<String>,
}

impl DynamicSpectrum {
    /// A copy of `archive` is dedispersed, averaged to one subint and one
    /// polarisation, and has its baseline removed.
    pub fn from_archive<A>(archive: &A) -> Result<DynamicSpectrum, ArchiveError>
    where
        A: SignalArchive + Clone,
    {
        let mut reduced = archive.clone();
        reduced.dedisperse()?;
        reduced.tscrunch_to_nsub(1)?;
        reduced.pscrunch()?;
        reduced.remove_baseline();

        let mut intensities = reduced
            .data()
            .index_axis(Axis(0), 0)
            .index_axis(Axis(0), 0)
            .to_owned();
        let num_bins = intensities.len_of(Axis(1));

        let raw_profile = channel_mean(intensities.view());
        let peak = argmax(&raw_profile);
        let shift = (peak + num_bins - num_bins / 2) % num_bins;
        if shift != 0 {
            for mut chan in intensities.outer_iter_mut() {
                let rotated = rotate_left(chan.view(), shift);
                chan.assign(&rotated);
            }
        }

        let mut profile = channel_mean(intensities.view());
        let sigma = off_pulse_sigma(&profile);
        if sigma > 0.0 {
            profile.iter_mut().for_each(|p| *p /= sigma);
        }

        let on_pulse = on_pulse_window(&profile);
        let spectrum = intensities
            .outer_iter()
            .map(|chan| {
                let window = chan.slice(s![on_pulse.clone()]);
                window.iter().map(|&v| f64::from(v)).sum::<f64>() / window.len() as f64
            })
            .collect();

        let centre = archive.centre_frequency();
        let half_bw = archive.bandwidth().abs() / 2.0;
        let file_name = archive
            .filename()
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let labels = vec![
            file_name,
            archive.telescope().to_string(),
            archive.source().to_string(),
            format!("{centre:.1} MHz"),
            format!("MJD: {:.2}", archive.start_time().to_mjd_utc_days()),
        ];

        Ok(DynamicSpectrum {
            intensities,
            freqs_mhz: reduced.frequencies().to_vec(),
            band_mhz: (centre - half_bw, centre + half_bw),
            profile,
            on_pulse,
            spectrum,
            labels,
        })
    }
}

fn channel_mean(intensities: ArrayView2<f32>) -> Vec<f64> {
    let num_chans = intensities.len_of(Axis(0)) as f64;
    intensities
        .axis_iter(Axis(1))
        .map(|bin| bin.iter().map(|&v| f64::from(v)).sum::<f64>() / num_chans)
        .collect()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(i_max, max), (i, &v)| {
            if v > max {
                (i, v)
            } else {
                (i_max, max)
            }
        })
        .0
}

/// The standard deviation of the central 60% of the sorted profile.
fn off_pulse_sigma(profile: &[f64]) -> f64 {
    let mut sorted = profile.to_vec();
    sorted.sort_unstable_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;
    let lo = (0.2 * n) as usize;
    let hi = (0.8 * n) as usize;
    std_dev(&sorted[lo..hi])
}

/// The bins either side of the peak until the profile drops below 10% of the
/// peak. The whole profile is used if it never drops that low.
fn on_pulse_window(profile: &[f64]) -> Range<usize> {
    let num_bins = profile.len();
    let peak = argmax(profile);
    let cutoff = 0.1 * profile[peak];
    let lo = (0..=peak).rev().find(|&i| profile[i] <= cutoff);
    let hi = (peak..num_bins).find(|&i| profile[i] <= cutoff);
    match (lo, hi) {
        (Some(lo), Some(hi)) if hi > lo => lo..hi,
        _ => 0..num_bins,
    }
}
