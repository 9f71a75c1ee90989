// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use thiserror::Error;

use super::file::ARCHIVE_FILE_EXTENSIONS;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive file '{0}' doesn't exist")]
    DoesNotExist(PathBuf),

    #[error(
        "Archive file '{0}' doesn't have a recognised extension. Supported formats: {}",
        *ARCHIVE_FILE_EXTENSIONS
    )]
    UnsupportedType(PathBuf),

    #[error("Couldn't decode archive file '{file}': {message}")]
    Decode { file: PathBuf, message: String },

    #[error("Archive '{file}' claims a data shape of {expected:?} ({} values), but has {got} values", expected.iter().product::<usize>())]
    DataShape {
        file: PathBuf,
        expected: [usize; 4],
        got: usize,
    },

    #[error("Archive '{file}' has {num_chans} channels but {num_freqs} channel frequencies")]
    InconsistentChannels {
        file: PathBuf,
        num_chans: usize,
        num_freqs: usize,
    },

    #[error("Archive '{file}' has a zero-length {axis} axis")]
    EmptyAxis { file: PathBuf, axis: &'static str },

    #[error("Archive '{file}' ends ({end}) before it starts ({start})")]
    NegativeDuration {
        file: PathBuf,
        start: hifitime::Epoch,
        end: hifitime::Epoch,
    },

    #[error("Archive '{file}' has {num_pols} polarisations, which isn't valid for pol. state {state}")]
    PolState {
        file: PathBuf,
        num_pols: usize,
        state: super::PolState,
    },

    #[error("Cannot average archive '{file}' into 0 subintegrations")]
    ZeroSubints { file: PathBuf },

    #[error("Cannot dedisperse archive '{file}': its folding period ({period}) isn't positive")]
    BadPeriod { file: PathBuf, period: f64 },

    #[error("Couldn't read archive file '{file}': {err}")]
    IO {
        file: PathBuf,
        err: std::io::Error,
    },
}

impl ArchiveError {
    /// Did this error happen while getting the archive off disk (as opposed to
    /// while reducing it)?
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ArchiveError::DoesNotExist(_)
                | ArchiveError::UnsupportedType(_)
                | ArchiveError::Decode { .. }
                | ArchiveError::DataShape { .. }
                | ArchiveError::InconsistentChannels { .. }
                | ArchiveError::EmptyAxis { .. }
                | ArchiveError::NegativeDuration { .. }
                | ArchiveError::IO { .. }
        )
    }
}
