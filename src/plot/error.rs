// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;

#[derive(Error, Debug)]
pub enum PlotError {
    #[cfg(not(feature = "plotting"))]
    #[error("psrtoa was not compiled with the \"plotting\" feature.\nYou need to compile psrtoa with this feature to make plots.")]
    NoPlottingFeature,

    #[error("Couldn't reduce an archive for plotting: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Couldn't create plot directory '{dir}': {err}")]
    Directory { dir: PathBuf, err: std::io::Error },

    #[cfg(feature = "plotting")]
    #[error("While plotting '{file}': {message}")]
    Draw { file: PathBuf, message: String },
}
