// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all psrtoa-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use super::{get_toas::GetToasArgsError, refine::RefineArgsError};
use crate::{
    archive::ArchiveError,
    io::{FileWriteError, GlobError, ParFileError, TimFileError},
    params::{GetToasError, RefineError},
    plot::PlotError,
    timing::FitError,
    toas::EstimatorError,
};

/// The *only* publicly visible error from psrtoa. Each category carries a
/// hint of what to check, unless it's "generic".
#[derive(Error, Debug)]
pub enum PsrtoaError {
    /// Something is wrong with the supplied files or arguments.
    #[error("{0}\n\nCheck that the input files exist and are readable archives, tim files or par files.")]
    Input(String),

    /// An archive couldn't be averaged or scrunched.
    #[error("{0}\n\nThe archive's metadata may be inconsistent with its data; try a different --t-subint or --n-subint.")]
    Reduction(String),

    /// TOAs couldn't be measured from an archive.
    #[error("{0}\n\nThe template and the observations must share a pulse-phase bin count, and the template must contain a pulse.")]
    Extraction(String),

    /// The timing model couldn't be fit to the TOAs.
    #[error("{0}\n\nTry loosening --max-err-us or --n-sigma, or check the par file against the tim file.")]
    Fit(String),

    /// An output file couldn't be written.
    #[error("{0}\n\nCheck that the output directory exists and is writable.")]
    Write(String),

    /// An error related to argument files.
    #[error("{0}\n\nArgument files must be toml or json, with keys named after the long CLI flags.")]
    ArgFile(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

// Binary sub-command errors.

impl From<GetToasArgsError> for PsrtoaError {
    fn from(e: GetToasArgsError) -> Self {
        match e {
            GetToasArgsError::Glob(e) => Self::from(e),
            GetToasArgsError::Output(e) => Self::from(e),
            GetToasArgsError::NoTemplate
            | GetToasArgsError::NoOutbase
            | GetToasArgsError::BadSubintTime(_)
            | GetToasArgsError::ZeroSubints => Self::Input(e.to_string()),
            #[cfg(not(feature = "plotting"))]
            GetToasArgsError::NoPlottingFeature => Self::Input(e.to_string()),
        }
    }
}

impl From<RefineArgsError> for PsrtoaError {
    fn from(e: RefineArgsError) -> Self {
        match e {
            RefineArgsError::Glob(e) => Self::from(e),
            RefineArgsError::Output(e) => Self::from(e),
            RefineArgsError::NoPar
            | RefineArgsError::NoTim
            | RefineArgsError::BadSigma { .. }
            | RefineArgsError::BadMaxErr(_)
            | RefineArgsError::ZeroIterations
            | RefineArgsError::BadWeighting(_) => Self::Input(e.to_string()),
        }
    }
}

impl From<GetToasError> for PsrtoaError {
    fn from(e: GetToasError) -> Self {
        match e {
            GetToasError::Template(_) => Self::Input(e.to_string()),
            GetToasError::Archive(e) => Self::from(e),
            GetToasError::Estimator(e) => Self::from(e),
            GetToasError::Plot(e) => Self::from(e),
            GetToasError::TimFile(e) => Self::from(e),
        }
    }
}

impl From<RefineError> for PsrtoaError {
    fn from(e: RefineError) -> Self {
        match e {
            RefineError::NoToas(_) => Self::Input(e.to_string()),
            RefineError::ParFile(e) => Self::from(e),
            RefineError::TimFile(e) => Self::from(e),
            RefineError::Fit(e) => Self::from(e),
        }
    }
}

// Library code errors.

impl From<ArchiveError> for PsrtoaError {
    fn from(e: ArchiveError) -> Self {
        if e.is_input_error() {
            Self::Input(e.to_string())
        } else {
            Self::Reduction(e.to_string())
        }
    }
}

impl From<EstimatorError> for PsrtoaError {
    fn from(e: EstimatorError) -> Self {
        Self::Extraction(e.to_string())
    }
}

impl From<FitError> for PsrtoaError {
    fn from(e: FitError) -> Self {
        Self::Fit(e.to_string())
    }
}

impl From<TimFileError> for PsrtoaError {
    fn from(e: TimFileError) -> Self {
        match e {
            TimFileError::Write(e) => Self::from(e),
            TimFileError::Toa { .. } | TimFileError::Directive { .. } | TimFileError::IO { .. } => {
                Self::Input(e.to_string())
            }
        }
    }
}

impl From<ParFileError> for PsrtoaError {
    fn from(e: ParFileError) -> Self {
        match e {
            ParFileError::Write(e) => Self::from(e),
            ParFileError::BadValue { .. } | ParFileError::Missing { .. } | ParFileError::IO { .. } => {
                Self::Input(e.to_string())
            }
        }
    }
}

impl From<PlotError> for PsrtoaError {
    fn from(e: PlotError) -> Self {
        match e {
            PlotError::Archive(e) => Self::from(e),
            #[cfg(not(feature = "plotting"))]
            PlotError::NoPlottingFeature => Self::Input(e.to_string()),
            PlotError::Directory { .. } => Self::Write(e.to_string()),
            #[cfg(feature = "plotting")]
            PlotError::Draw { .. } => Self::Write(e.to_string()),
        }
    }
}

impl From<GlobError> for PsrtoaError {
    fn from(e: GlobError) -> Self {
        Self::Input(e.to_string())
    }
}

impl From<FileWriteError> for PsrtoaError {
    fn from(e: FileWriteError) -> Self {
        Self::Write(e.to_string())
    }
}

impl From<std::io::Error> for PsrtoaError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
