// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EstimatorError {
    #[error("The standard profile '{file}' must have one polarisation and one channel, but has {num_pols} and {num_chans}")]
    StandardNotScrunched {
        file: PathBuf,
        num_pols: usize,
        num_chans: usize,
    },

    #[error("The observation '{file}' must have one polarisation and one channel, but has {num_pols} and {num_chans}")]
    ObservationNotScrunched {
        file: PathBuf,
        num_pols: usize,
        num_chans: usize,
    },

    #[error("The standard has {standard} phase bins but '{file}' has {observation}")]
    BinMismatch {
        file: PathBuf,
        standard: usize,
        observation: usize,
    },

    #[error("Need at least 4 phase bins to measure a shift, but '{file}' has {num_bins}")]
    TooFewBins { file: PathBuf, num_bins: usize },

    #[error("The standard profile '{0}' has no structure to correlate against")]
    FlatStandard(PathBuf),

    #[error("Couldn't measure a shift for subint {subint} of '{file}': {reason}")]
    NoShift {
        file: PathBuf,
        subint: usize,
        reason: &'static str,
    },

    #[error("Couldn't transform the standard profile '{file}': {reason}")]
    StandardTransform {
        file: PathBuf,
        reason: &'static str,
    },
}
