// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Need more TOAs than fit parameters, but there are {num_toas} TOAs and {num_params} parameters (including the phase offset)")]
    TooFewToas { num_toas: usize, num_params: usize },

    #[error("None of the {num_toas} TOAs have an uncertainty of at most {max_err_us} us")]
    NoToasBelowUncertainty { num_toas: usize, max_err_us: f64 },

    #[error("The fit is degenerate; are all of the TOAs at the same time?")]
    Singular,

    #[error("The timing model for {name} can't be used: {reason}")]
    BadModel { name: String, reason: &'static str },

    #[error("Got a non-finite residual for the TOA '{0}'")]
    NonFiniteResidual(String),
}
