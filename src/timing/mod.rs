// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Timing models, residuals, and refining a model with TOAs.
//!
//! Fitting goes through the [`TimingFitter`] trait; [`SpinFitter`] implements
//! it for the spin-down model. Outlier rejection ([`zap_toas`]) and the
//! zap-then-fit loop ([`refine`]) only use the trait.

mod error;
mod model;
mod refine;
mod spin;
mod zap;

pub use error::FitError;
pub use model::{Param, TimingModel};
pub use refine::{
    fit_model, refine, refine_until, IterationReport, Refinement, RefineSettings, StopReason,
};
pub(crate) use spin::std_dev;
pub use spin::{SpinFitter, Weighting};
pub use zap::zap_toas;

use crate::toas::ToaMeasurement;

/// The result of fitting a model to TOAs.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// The fitted model.
    pub model: TimingModel,

    pub chi2_reduced: f64,

    /// The standard deviation of the phase residuals \[turns\].
    pub phase_rms_cycles: f64,

    /// The standard deviation of the time residuals \[us\].
    pub time_rms_us: f64,

    /// The number of TOAs that were fit.
    pub num_toas: usize,
}

pub trait TimingFitter {
    /// Time residuals (observed minus predicted) \[us\], one for each TOA and
    /// in the same order.
    fn residuals(&self, toas: &[ToaMeasurement], model: &TimingModel)
        -> Result<Vec<f64>, FitError>;

    /// Fit the free parameters of `model` to `toas`. `model` is not modified.
    fn fit_toas(&self, toas: &[ToaMeasurement], model: &TimingModel) -> Result<FitResult, FitError>;
}
