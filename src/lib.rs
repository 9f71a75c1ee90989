// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Reduce pulsar observation archives into times of arrival (TOAs), and refine
a spin-down timing model by zapping outliers and refitting.
 */

pub mod archive;
pub mod averaging;
mod cli;
pub mod constants;
pub mod io;
pub mod params;
pub mod plot;
pub mod timing;
pub mod toas;

// Re-exports.
pub use archive::{Archive, ArchiveError, ArchiveLoader, SignalArchive};
pub use cli::{Psrtoa, PsrtoaError};
pub use timing::{FitResult, TimingFitter, TimingModel};
pub use toas::{ArrivalTimeEstimator, Toa};

use crossbeam_utils::atomic::AtomicCell;

/// Should progress bars be drawn? This is set by the command-line interface
/// and defaults to off for library users.
pub static PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
