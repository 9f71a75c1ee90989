// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! File stuff (globs, tim files, par files).

mod glob;
mod par;
mod tim;
pub(crate) mod write;

pub use self::glob::{
    expand_path_args, get_all_matches_from_glob, get_single_match_from_glob, resolve_single_path,
    GlobError,
};
pub use par::{read_par_file, write_par_file, ParFileError};
pub use tim::{read_tim_file, write_tim_file, write_tim_measurements, TimFile, TimFileError};
pub use write::FileWriteError;
