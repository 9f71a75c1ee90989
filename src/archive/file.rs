// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading archives from serialised files.
//!
//! An archive file carries the observation's metadata and its folded
//! intensities as a flat array in (subint, pol, chan, bin) order. json and
//! yaml are supported; the type is determined by the file extension.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use hifitime::{Duration, Epoch};
use itertools::Itertools;
use log::{debug, trace};
use ndarray::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::{Archive, ArchiveError, ArchiveLoader, PolState};

#[derive(Debug, Display, EnumIter, EnumString, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArchiveFileType {
    #[strum(serialize = "json")]
    Json,
    #[strum(serialize = "yaml", serialize = "yml")]
    Yaml,
}

lazy_static::lazy_static! {
    pub(crate) static ref ARCHIVE_FILE_EXTENSIONS: String = ArchiveFileType::iter().join(", ");
}

/// The on-disk representation of an [`Archive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFile {
    /// The name of the pulsar.
    pub source: String,

    /// The observatory site code, as used in tim files.
    pub telescope: String,

    /// The start of the observation \[MJD, UTC\].
    pub start_mjd: f64,

    /// The length of the observation \[seconds\].
    pub duration_s: f64,

    /// \[MHz\]
    pub centre_freq_mhz: f64,

    /// \[MHz\]. This may be negative for flipped bands.
    pub bandwidth_mhz: f64,

    /// The centre frequency of each channel \[MHz\]. If this isn't given, the
    /// channels are assumed to evenly divide the band.
    #[serde(default)]
    pub chan_freqs_mhz: Option<Vec<f64>>,

    /// The period the data were folded at \[seconds\].
    pub period_s: f64,

    /// \[pc cm^-3\]
    #[serde(default)]
    pub dm: f64,

    #[serde(default)]
    pub dedispersed: bool,

    #[serde(default)]
    pub pol_state: PolState,

    /// (num. subints, num. pols, num. chans, num. bins).
    pub shape: [usize; 4],

    /// The intensities, flattened in row-major order.
    pub data: Vec<f32>,
}

impl ArchiveFile {
    /// Validate the contents of the file and turn them into an [`Archive`].
    pub fn into_archive(self, filename: PathBuf) -> Result<Archive, ArchiveError> {
        let ArchiveFile {
            source,
            telescope,
            start_mjd,
            duration_s,
            centre_freq_mhz,
            bandwidth_mhz,
            chan_freqs_mhz,
            period_s,
            dm,
            dedispersed,
            pol_state,
            shape,
            data,
        } = self;

        for (&len, axis) in shape
            .iter()
            .zip(["subintegration", "polarisation", "channel", "bin"])
        {
            if len == 0 {
                return Err(ArchiveError::EmptyAxis {
                    file: filename,
                    axis,
                });
            }
        }
        let [num_subints, num_pols, num_chans, num_bins] = shape;
        if !pol_state.allows(num_pols) {
            return Err(ArchiveError::PolState {
                file: filename,
                num_pols,
                state: pol_state,
            });
        }

        let got = data.len();
        let data = Array4::from_shape_vec((num_subints, num_pols, num_chans, num_bins), data)
            .map_err(|_| ArchiveError::DataShape {
                file: filename.clone(),
                expected: shape,
                got,
            })?;

        let freqs = match chan_freqs_mhz {
            Some(f) => f,
            None => {
                let chan_width = bandwidth_mhz / num_chans as f64;
                let lowest = centre_freq_mhz - bandwidth_mhz / 2.0 + chan_width / 2.0;
                (0..num_chans)
                    .map(|i_chan| lowest + i_chan as f64 * chan_width)
                    .collect()
            }
        };
        if freqs.len() != num_chans {
            return Err(ArchiveError::InconsistentChannels {
                file: filename,
                num_chans,
                num_freqs: freqs.len(),
            });
        }

        let start = Epoch::from_mjd_utc(start_mjd);
        let end = start + Duration::from_seconds(duration_s);
        if end < start {
            return Err(ArchiveError::NegativeDuration {
                file: filename,
                start,
                end,
            });
        }

        // The subints are assumed to evenly divide the observation.
        let subint_len = duration_s / num_subints as f64;
        let subint_mids = (0..num_subints)
            .map(|i_sub| start + Duration::from_seconds((i_sub as f64 + 0.5) * subint_len))
            .collect();

        Ok(Archive {
            filename,
            source,
            telescope,
            start,
            end,
            centre_freq_mhz,
            bandwidth_mhz,
            freqs_mhz: freqs,
            period_s,
            dm,
            dedispersed,
            pol_state,
            subint_mids,
            data,
        })
    }
}

/// Loads [`Archive`]s from json or yaml files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveFileLoader;

impl ArchiveLoader for ArchiveFileLoader {
    type Archive = Archive;

    fn load(&self, path: &Path) -> Result<Archive, ArchiveError> {
        debug!("Loading archive {}", path.display());
        if !path.exists() {
            return Err(ArchiveError::DoesNotExist(path.to_path_buf()));
        }

        let file_type = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .and_then(|e| ArchiveFileType::from_str(&e).ok())
            .ok_or_else(|| ArchiveError::UnsupportedType(path.to_path_buf()))?;
        trace!("{} is a {file_type} archive", path.display());

        let reader = BufReader::new(File::open(path).map_err(|err| ArchiveError::IO {
            file: path.to_path_buf(),
            err,
        })?);
        let contents: ArchiveFile = match file_type {
            ArchiveFileType::Json => {
                serde_json::from_reader(reader).map_err(|e| ArchiveError::Decode {
                    file: path.to_path_buf(),
                    message: e.to_string(),
                })?
            }
            ArchiveFileType::Yaml => {
                serde_yaml::from_reader(reader).map_err(|e| ArchiveError::Decode {
                    file: path.to_path_buf(),
                    message: e.to_string(),
                })?
            }
        };

        contents.into_archive(path.to_path_buf())
    }
}
