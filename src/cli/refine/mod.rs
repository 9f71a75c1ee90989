// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.


use std::{path::PathBuf, str::FromStr};

use clap::Parser;
use itertools::Itertools;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use thiserror::Error;

use super::common::{display_warnings, InfoPrinter, Warn, ARG_FILE_HELP};
use crate::{
    constants::{DEFAULT_MAX_UNCERTAINTY_US, DEFAULT_N_SIGMA},
    io::{resolve_single_path, write::can_write_to_file, FileWriteError, GlobError},
    params::RefineParams,
    timing::{RefineSettings, Weighting},
    PsrtoaError,
};

lazy_static::lazy_static! {
    static ref WEIGHTING_HELP: String =
        format!("How TOAs are weighted in the fit. Supported values: {}. The default is {}", Weighting::iter().join(", "), Weighting::default());
}

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct RefineArgs {
    #[clap(long, help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// The timing model to refine. Only the spin frequency and its first
    /// derivative are fit.
    #[clap(long, help_heading = "INPUT FILES")]
    pub(super) par: Option<PathBuf>,

    /// The TOAs to fit.
    #[clap(long, help_heading = "INPUT FILES")]
    pub(super) tim: Option<PathBuf>,

    /// Where to write the refined model.
    #[clap(long, help_heading = "OUTPUT FILES")]
    pub(super) output_par: Option<PathBuf>,

    /// Where to write the TOAs that survived zapping.
    #[clap(long, help_heading = "OUTPUT FILES")]
    pub(super) output_tim: Option<PathBuf>,

    /// Zap TOAs with residuals more than this many (trimmed) standard
    /// deviations from zero. The default is 6.
    #[clap(long, help_heading = "ZAPPING")]
    pub(super) n_sigma: Option<f64>,

    /// A zap threshold for the first pass only. The default is --n-sigma.
    #[clap(long, help_heading = "ZAPPING")]
    pub(super) first_n_sigma: Option<f64>,

    /// Don't zap; only fit.
    #[clap(long, help_heading = "ZAPPING")]
    #[serde(default)]
    pub(super) no_zap: bool,

    /// TOAs with uncertainties above this [us] aren't used in the fit. The
    /// default is 3.
    #[clap(long, help_heading = "FITTING")]
    pub(super) max_err_us: Option<f64>,

    #[clap(long, help = WEIGHTING_HELP.as_str(), help_heading = "FITTING")]
    pub(super) weighting: Option<String>,

    /// The maximum number of zap-and-fit passes. The default is 1.
    #[clap(long, help_heading = "FITTING")]
    pub(super) max_iterations: Option<usize>,

    /// Stop early when the RMS of the time residuals improves by less than
    /// this [us] between passes.
    #[clap(long, help_heading = "FITTING")]
    pub(super) min_improvement_us: Option<f64>,
}

impl RefineArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<RefineArgs, PsrtoaError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let RefineArgs {
                args_file: _,
                par,
                tim,
                output_par,
                output_tim,
                n_sigma,
                first_n_sigma,
                no_zap,
                max_err_us,
                weighting,
                max_iterations,
                min_improvement_us,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(RefineArgs {
                args_file: None,
                par: cli_args.par.or(par),
                tim: cli_args.tim.or(tim),
                output_par: cli_args.output_par.or(output_par),
                output_tim: cli_args.output_tim.or(output_tim),
                n_sigma: cli_args.n_sigma.or(n_sigma),
                first_n_sigma: cli_args.first_n_sigma.or(first_n_sigma),
                no_zap: cli_args.no_zap || no_zap,
                max_err_us: cli_args.max_err_us.or(max_err_us),
                weighting: cli_args.weighting.or(weighting),
                max_iterations: cli_args.max_iterations.or(max_iterations),
                min_improvement_us: cli_args.min_improvement_us.or(min_improvement_us),
            })
        } else {
            Ok(cli_args)
        }
    }

    pub(super) fn parse(self) -> Result<RefineParams, RefineArgsError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            par,
            tim,
            output_par,
            output_tim,
            n_sigma,
            first_n_sigma,
            no_zap,
            max_err_us,
            weighting,
            max_iterations,
            min_improvement_us,
        } = self;

        let par = resolve_single_path(&par.ok_or(RefineArgsError::NoPar)?)?;
        let tim = resolve_single_path(&tim.ok_or(RefineArgsError::NoTim)?)?;

        let n_sigma = check_sigma("--n-sigma", n_sigma.unwrap_or(DEFAULT_N_SIGMA))?;
        let first_n_sigma = first_n_sigma
            .map(|s| check_sigma("--first-n-sigma", s))
            .transpose()?;
        let max_err_us = match max_err_us.unwrap_or(DEFAULT_MAX_UNCERTAINTY_US) {
            e if e > 0.0 => e,
            e => return Err(RefineArgsError::BadMaxErr(e)),
        };
        let max_iterations = match max_iterations {
            Some(0) => return Err(RefineArgsError::ZeroIterations),
            Some(n) => n,
            None => 1,
        };
        let weighting = match weighting {
            Some(w) => Weighting::from_str(&w.to_lowercase())
                .map_err(|_| RefineArgsError::BadWeighting(w))?,
            None => Weighting::default(),
        };
        if no_zap && first_n_sigma.is_some() {
            "--first-n-sigma has no effect with --no-zap".warn();
        }
        if max_iterations == 1 && min_improvement_us.is_some() {
            "--min-improvement-us has no effect with only one pass".warn();
        }
        if output_par.is_none() && output_tim.is_none() {
            "No outputs were specified; the refined model will only be logged".warn();
        }
        for output in output_par.iter().chain(output_tim.iter()) {
            can_write_to_file(output)?;
        }

        let settings = RefineSettings {
            n_sigma,
            first_n_sigma,
            max_err_us,
            max_iterations,
            min_improvement_us,
            zap: !no_zap,
        };

        let mut printer = InfoPrinter::new("Refining a timing model".into());
        printer.push_block(vec![
            format!("Model: {}", par.display()).into(),
            format!("TOAs:  {}", tim.display()).into(),
        ]);
        printer.push_block(vec![
            if settings.zap {
                match first_n_sigma {
                    Some(first) => {
                        format!("Zapping beyond {n_sigma} sigma ({first} sigma on the first pass)")
                            .into()
                    }
                    None => format!("Zapping beyond {n_sigma} sigma").into(),
                }
            } else {
                "Not zapping".into()
            },
            format!("Fitting TOAs with uncertainties below {max_err_us} us ({weighting})").into(),
            format!("At most {max_iterations} passes").into(),
        ]);
        if let Some(p) = &output_par {
            printer.push_line(format!("Writing the model to {}", p.display()).into());
        }
        if let Some(t) = &output_tim {
            printer.push_line(format!("Writing the kept TOAs to {}", t.display()).into());
        }
        printer.display();

        display_warnings();

        Ok(RefineParams {
            par,
            tim,
            settings,
            weighting,
            output_par,
            output_tim,
        })
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), PsrtoaError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = self.parse()?;

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let refinement = params.run()?;
        info!(
            "Stopped after {} passes: {}",
            refinement.reports.len(),
            refinement.stop_reason
        );
        display_warnings();
        Ok(())
    }
}

fn check_sigma(flag: &'static str, sigma: f64) -> Result<f64, RefineArgsError> {
    if sigma.is_finite() && sigma > 0.0 {
        Ok(sigma)
    } else {
        Err(RefineArgsError::BadSigma { flag, sigma })
    }
}

#[derive(Error, Debug)]
pub(super) enum RefineArgsError {
    #[error("No par file was specified")]
    NoPar,

    #[error("No tim file was specified")]
    NoTim,

    #[error("{flag} must be a positive number; got {sigma}")]
    BadSigma { flag: &'static str, sigma: f64 },

    #[error("--max-err-us must be positive; got {0}")]
    BadMaxErr(f64),

    #[error("--max-iterations must be at least 1")]
    ZeroIterations,

    #[error("Unrecognised weighting '{0}'")]
    BadWeighting(String),

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Output(#[from] FileWriteError),
}
