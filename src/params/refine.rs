// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Refining a timing model with a tim file.

use std::{cmp::Ordering, path::PathBuf, time::Instant};

use log::info;
use thiserror::Error;

use crate::{
    io::{
        read_par_file, read_tim_file, write_par_file, write_tim_measurements, ParFileError,
        TimFileError,
    },
    timing::{refine, FitError, RefineSettings, Refinement, SpinFitter, Weighting},
};

pub struct RefineParams {
    pub par: PathBuf,
    pub tim: PathBuf,
    pub settings: RefineSettings,
    pub weighting: Weighting,

    /// Where to write the refined model.
    pub output_par: Option<PathBuf>,

    /// Where to write the TOAs that survived zapping.
    pub output_tim: Option<PathBuf>,
}

impl RefineParams {
    pub fn run(&self) -> Result<Refinement, RefineError> {
        let start = Instant::now();
        let model = read_par_file(&self.par)?;
        let mut toas = read_tim_file(&self.tim)?.toas;
        if toas.is_empty() {
            return Err(RefineError::NoToas(self.tim.clone()));
        }
        info!(
            "Read {} TOAs for {} from {}",
            toas.len(),
            model.name,
            self.tim.display()
        );
        // Stable, so TOAs at the same epoch keep their file order.
        toas.sort_by(|a, b| a.epoch.partial_cmp(&b.epoch).unwrap_or(Ordering::Equal));

        let fitter = SpinFitter::new(self.weighting);
        let refinement = refine(&model, toas, &self.settings, &fitter)?;
        for report in &refinement.reports {
            info!(
                "Pass {}: zapped {}, fit {} TOAs, reduced chi^2 {:.3}, RMS {:.3} us",
                report.iteration,
                report.num_zapped,
                report.num_fit,
                report.chi2_reduced,
                report.time_rms_us
            );
        }
        let fitted = &refinement.fit.model;
        info!(
            "F0 = {} +- {:e}",
            fitted.f0.value,
            fitted.f0.uncertainty.unwrap_or(0.0)
        );
        info!(
            "F1 = {:e} +- {:e}",
            fitted.f1.value,
            fitted.f1.uncertainty.unwrap_or(0.0)
        );

        if let Some(output_par) = &self.output_par {
            write_par_file(fitted, output_par)?;
            info!("Wrote the refined model to {}", output_par.display());
        }
        if let Some(output_tim) = &self.output_tim {
            write_tim_measurements(&refinement.toas, output_tim)?;
            info!(
                "Wrote {} TOAs to {}",
                refinement.toas.len(),
                output_tim.display()
            );
        }
        info!("Total time: {:.2} s", start.elapsed().as_secs_f64());

        Ok(refinement)
    }
}

#[derive(Error, Debug)]
pub enum RefineError {
    #[error("The tim file '{0}' has no TOAs")]
    NoToas(PathBuf),

    #[error(transparent)]
    ParFile(#[from] ParFileError),

    #[error(transparent)]
    TimFile(#[from] TimFileError),

    #[error(transparent)]
    Fit(#[from] FitError),
}
