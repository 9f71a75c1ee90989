// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Times of arrival.
//!
//! A [`Toa`] is produced by an [`ArrivalTimeEstimator`] as a formatted tim-file
//! line; the batch pipeline never looks inside it. Code that needs the
//! numbers (zapping, fitting) works with [`ToaMeasurement`]s parsed from those
//! lines.

mod error;
mod measurement;
mod pgs;

pub use error::EstimatorError;
pub(crate) use measurement::parse_mjd;
pub use measurement::{ToaMeasurement, ToaParseError};
pub use pgs::PhaseGradientEstimator;

use std::fmt;

use hifitime::Epoch;
use log::trace;
use strum_macros::{Display, EnumIter, EnumString};

use crate::{archive::SignalArchive, constants::SECONDS_PER_DAY};

/// One time of arrival, as a line of a tim file (without the newline).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Toa(String);

impl Toa {
    pub fn new(line: impl Into<String>) -> Toa {
        Toa(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Toa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Algorithms for measuring the phase shift between a profile and a standard.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum ShiftEstimator {
    /// Fourier-domain phase-gradient fit.
    #[strum(serialize = "PGS")]
    Pgs,

    /// Peak of the circular cross-correlation, with parabolic interpolation.
    #[strum(serialize = "CCF")]
    Ccf,
}

/// Output line formats for TOAs.
#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum ToaFormat {
    /// `<file> <freq MHz> <MJD> <uncertainty us> <site> [flags]`
    #[strum(serialize = "Tempo2")]
    Tempo2,
}

/// Measures TOAs of an observation against a standard profile.
pub trait ArrivalTimeEstimator {
    fn set_shift_estimator(&mut self, estimator: ShiftEstimator) -> Result<(), EstimatorError>;

    fn set_format(&mut self, format: ToaFormat) -> Result<(), EstimatorError>;

    /// Get one TOA for each subintegration of `observation`, in subint order.
    fn get_toas(
        &self,
        standard: &dyn SignalArchive,
        observation: &dyn SignalArchive,
    ) -> Result<Vec<Toa>, EstimatorError>;
}

/// Calculate TOAs of a prepared observation against a (prepared) template.
///
/// The estimator is configured here, so a fresh one should be supplied for
/// every observation.
pub fn get_toas_from_obs<E>(
    mut estimator: E,
    observation: &dyn SignalArchive,
    template: &dyn SignalArchive,
) -> Result<Vec<Toa>, EstimatorError>
where
    E: ArrivalTimeEstimator,
{
    estimator.set_shift_estimator(ShiftEstimator::Pgs)?;
    estimator.set_format(ToaFormat::Tempo2)?;

    let toas = estimator.get_toas(template, observation)?;
    trace!(
        "{}: {} TOAs from {} subints",
        observation.filename().display(),
        toas.len(),
        observation.num_subints()
    );
    Ok(toas)
}

/// Format an epoch as a UTC MJD with 13 decimal places (~10 ns). The day and
/// the fraction are handled separately so no precision is lost to the size of
/// the day number.
pub fn format_mjd(epoch: Epoch) -> String {
    let mut day = epoch.to_mjd_utc_days().floor();
    let mut frac = (epoch - Epoch::from_mjd_utc(day)).to_seconds() / SECONDS_PER_DAY;
    // The f64 MJD can round up past midnight.
    if frac < 0.0 {
        day -= 1.0;
        frac = (epoch - Epoch::from_mjd_utc(day)).to_seconds() / SECONDS_PER_DAY;
    }
    // Guard against the fraction rounding up to a whole day.
    if frac >= 1.0 || format!("{frac:.13}").starts_with('1') {
        day += 1.0;
        frac = 0.0;
    }
    let frac_str = format!("{frac:.13}");
    format!("{}{}", day as i64, &frac_str[1..])
}
