// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pulsar observation archives.
//!
//! The rest of the crate only talks to archives through [`SignalArchive`] and
//! gets them through an [`ArchiveLoader`]; [`Archive`] is the in-memory
//! implementation, read from files by [`ArchiveFileLoader`].

mod error;
mod file;

pub use error::ArchiveError;
pub use file::{ArchiveFile, ArchiveFileLoader};

use std::path::{Path, PathBuf};

use hifitime::{Duration, Epoch};
use log::{debug, trace, warn};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::{
    averaging::{contiguous_blocks, plan_num_subints},
    constants::DISPERSION_CONSTANT,
};

/// The capabilities the TOA pipeline needs from an observation.
pub trait SignalArchive {
    fn filename(&self) -> &Path;

    /// The name of the pulsar.
    fn source(&self) -> &str;

    /// The observatory site code.
    fn telescope(&self) -> &str;

    fn start_time(&self) -> Epoch;

    fn end_time(&self) -> Epoch;

    /// \[MHz\]
    fn centre_frequency(&self) -> f64;

    /// \[MHz\]
    fn bandwidth(&self) -> f64;

    /// The centre frequencies of each channel \[MHz\].
    fn frequencies(&self) -> &[f64];

    /// The folding period \[seconds\].
    fn folding_period(&self) -> f64;

    /// The middle of each subintegration.
    fn subint_epochs(&self) -> &[Epoch];

    /// The intensities, indexed by (subint, pol, chan, bin).
    fn data(&self) -> ArrayView4<f32>;

    /// Average subintegrations together so that there are `num_subints` of
    /// them.
    fn tscrunch_to_nsub(&mut self, num_subints: usize) -> Result<(), ArchiveError>;

    /// Average all polarisations into total intensity.
    fn pscrunch(&mut self) -> Result<(), ArchiveError>;

    /// Average all frequency channels together.
    fn fscrunch(&mut self) -> Result<(), ArchiveError>;

    /// Remove the dispersive delay between channels.
    fn dedisperse(&mut self) -> Result<(), ArchiveError>;

    /// Subtract the off-pulse baseline from every profile.
    fn remove_baseline(&mut self);

    fn duration(&self) -> Duration {
        self.end_time() - self.start_time()
    }

    fn num_subints(&self) -> usize {
        self.data().len_of(Axis(0))
    }

    fn num_pols(&self) -> usize {
        self.data().len_of(Axis(1))
    }

    fn num_chans(&self) -> usize {
        self.data().len_of(Axis(2))
    }

    fn num_bins(&self) -> usize {
        self.data().len_of(Axis(3))
    }
}

/// Something that can produce archives from paths.
pub trait ArchiveLoader {
    type Archive: SignalArchive;

    fn load(&self, path: &Path) -> Result<Self::Archive, ArchiveError>;
}

/// Prepare an observation for timing. If `target_subint_s` is positive, the
/// observation is averaged in time so each subintegration is approximately
/// that long (but there are always at least `min_subints`). Then polarisations
/// and channels are averaged together.
///
/// The archive is modified in place.
pub fn prepare_archive<A: SignalArchive + ?Sized>(
    archive: &mut A,
    target_subint_s: f64,
    min_subints: usize,
) -> Result<(), ArchiveError> {
    let total_duration_s = archive.duration().to_seconds();
    if let Some(num_subints) = plan_num_subints(total_duration_s, target_subint_s, min_subints) {
        debug!(
            "{}: {total_duration_s:.1}s -> {num_subints} subints",
            archive.filename().display()
        );
        archive.tscrunch_to_nsub(num_subints)?;
    }

    archive.pscrunch()?;
    archive.fscrunch()?;

    Ok(())
}

#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolState {
    /// One polarisation, total intensity.
    #[default]
    Intensity,

    /// Two polarisations, the auto-correlations of each feed (AA, BB).
    #[strum(serialize = "PPQQ")]
    Ppqq,

    /// Four polarisations, AA, BB, Re(AB), Im(AB).
    Coherence,

    /// Four polarisations, I, Q, U, V.
    Stokes,
}

impl PolState {
    fn allows(self, num_pols: usize) -> bool {
        match self {
            PolState::Intensity => num_pols == 1,
            PolState::Ppqq => num_pols == 2,
            PolState::Coherence | PolState::Stokes => num_pols == 4,
        }
    }
}

/// An in-memory pulsar archive.
#[derive(Debug, Clone)]
pub struct Archive {
    filename: PathBuf,
    source: String,
    telescope: String,
    start: Epoch,
    end: Epoch,
    centre_freq_mhz: f64,
    bandwidth_mhz: f64,
    freqs_mhz: Vec<f64>,
    period_s: f64,
    dm: f64,
    dedispersed: bool,
    pol_state: PolState,
    subint_mids: Vec<Epoch>,
    data: Array4<f32>,
}

impl Archive {
    pub fn pol_state(&self) -> PolState {
        self.pol_state
    }

    pub fn dm(&self) -> f64 {
        self.dm
    }

    pub fn is_dedispersed(&self) -> bool {
        self.dedispersed
    }

    fn empty_axis(&self, axis: &'static str) -> ArchiveError {
        ArchiveError::EmptyAxis {
            file: self.filename.clone(),
            axis,
        }
    }
}

impl SignalArchive for Archive {
    fn filename(&self) -> &Path {
        &self.filename
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn telescope(&self) -> &str {
        &self.telescope
    }

    fn start_time(&self) -> Epoch {
        self.start
    }

    fn end_time(&self) -> Epoch {
        self.end
    }

    fn centre_frequency(&self) -> f64 {
        self.centre_freq_mhz
    }

    fn bandwidth(&self) -> f64 {
        self.bandwidth_mhz
    }

    fn frequencies(&self) -> &[f64] {
        &self.freqs_mhz
    }

    fn folding_period(&self) -> f64 {
        self.period_s
    }

    fn subint_epochs(&self) -> &[Epoch] {
        &self.subint_mids
    }

    fn data(&self) -> ArrayView4<f32> {
        self.data.view()
    }

    fn tscrunch_to_nsub(&mut self, num_subints: usize) -> Result<(), ArchiveError> {
        let current = self.data.len_of(Axis(0));
        if num_subints == 0 {
            return Err(ArchiveError::ZeroSubints {
                file: self.filename.clone(),
            });
        }
        // We never invent time resolution that isn't in the data.
        if num_subints > current {
            warn!(
                "{}: Asked for {num_subints} subints, but there are only {current}; not averaging in time",
                self.filename.display()
            );
            return Ok(());
        }
        if num_subints == current {
            return Ok(());
        }

        let blocks = contiguous_blocks(current, num_subints);
        let (_, num_pols, num_chans, num_bins) = self.data.dim();
        let mut averaged = Array4::zeros((num_subints, num_pols, num_chans, num_bins));
        let mut mids = Vec::with_capacity(num_subints);
        for (mut out, block) in averaged.outer_iter_mut().zip(blocks) {
            let block_data = self.data.slice(s![block.clone(), .., .., ..]);
            let mean = block_data
                .mean_axis(Axis(0))
                .ok_or_else(|| self.empty_axis("subint"))?;
            out.assign(&mean);
            mids.push(average_epoch(&self.subint_mids[block]));
        }
        trace!(
            "{}: tscrunched {current} -> {num_subints} subints",
            self.filename.display()
        );

        self.data = averaged;
        self.subint_mids = mids;
        Ok(())
    }

    fn pscrunch(&mut self) -> Result<(), ArchiveError> {
        let num_pols = self.data.len_of(Axis(1));
        if !self.pol_state.allows(num_pols) {
            return Err(ArchiveError::PolState {
                file: self.filename.clone(),
                num_pols,
                state: self.pol_state,
            });
        }

        self.data = match self.pol_state {
            PolState::Intensity => return Ok(()),
            // The first two pols are the feed auto-correlations.
            PolState::Ppqq | PolState::Coherence => self
                .data
                .slice(s![.., 0..2, .., ..])
                .mean_axis(Axis(1))
                .ok_or_else(|| self.empty_axis("polarisation"))?
                .insert_axis(Axis(1)),
            PolState::Stokes => self.data.slice(s![.., 0..1, .., ..]).to_owned(),
        };
        self.pol_state = PolState::Intensity;
        Ok(())
    }

    fn fscrunch(&mut self) -> Result<(), ArchiveError> {
        if self.data.len_of(Axis(2)) == 1 {
            return Ok(());
        }
        if !self.dedispersed {
            self.dedisperse()?;
        }

        self.data = self
            .data
            .mean_axis(Axis(2))
            .ok_or_else(|| self.empty_axis("channel"))?
            .insert_axis(Axis(2));
        let mean_freq = self.freqs_mhz.iter().sum::<f64>() / self.freqs_mhz.len() as f64;
        self.freqs_mhz = vec![mean_freq];
        Ok(())
    }

    fn dedisperse(&mut self) -> Result<(), ArchiveError> {
        if self.dedispersed {
            return Ok(());
        }
        if self.dm == 0.0 {
            self.dedispersed = true;
            return Ok(());
        }
        if self.period_s <= 0.0 || !self.period_s.is_finite() {
            return Err(ArchiveError::BadPeriod {
                file: self.filename.clone(),
                period: self.period_s,
            });
        }

        let num_bins = self.data.len_of(Axis(3));
        let reference = self.centre_freq_mhz;
        for (i_chan, &freq) in self.freqs_mhz.iter().enumerate() {
            // Lower frequencies arrive later; rotate them back to the
            // reference frequency.
            let delay_s = DISPERSION_CONSTANT * self.dm * (freq.powi(-2) - reference.powi(-2));
            let shift = (delay_s / self.period_s * num_bins as f64).round() as i64;
            let shift = shift.rem_euclid(num_bins as i64) as usize;
            if shift == 0 {
                continue;
            }
            let mut chan = self.data.slice_mut(s![.., .., i_chan, ..]);
            for mut profile in chan.lanes_mut(Axis(2)) {
                let rotated = rotate_left(profile.view(), shift);
                profile.assign(&rotated);
            }
        }

        self.dedispersed = true;
        Ok(())
    }

    fn remove_baseline(&mut self) {
        for mut profile in self.data.lanes_mut(Axis(3)) {
            let baseline = off_pulse_mean(profile.view());
            profile.mapv_inplace(|v| v - baseline);
        }
    }
}

/// The mean of the quietest window of a profile, which is assumed to be the
/// off-pulse region. The window is a tenth of the profile (at least one bin)
/// and wraps around.
pub(crate) fn off_pulse_mean(profile: ArrayView1<f32>) -> f32 {
    let num_bins = profile.len();
    if num_bins == 0 {
        return 0.0;
    }
    let width = (num_bins / 10).max(1);

    let mut sum: f64 = (0..width).map(|i| f64::from(profile[i])).sum();
    let mut min_sum = sum;
    for start in 1..num_bins {
        sum += f64::from(profile[(start + width - 1) % num_bins]) - f64::from(profile[start - 1]);
        min_sum = min_sum.min(sum);
    }
    (min_sum / width as f64) as f32
}

pub(crate) fn rotate_left(profile: ArrayView1<f32>, shift: usize) -> Array1<f32> {
    let num_bins = profile.len();
    Array1::from_shape_fn(num_bins, |i| profile[(i + shift) % num_bins])
}

fn average_epoch(epochs: &[Epoch]) -> Epoch {
    let first = epochs[0];
    let mean_offset_s = epochs
        .iter()
        .map(|&e| (e - first).to_seconds())
        .sum::<f64>()
        / epochs.len() as f64;
    first + Duration::from_seconds(mean_offset_s)
}
