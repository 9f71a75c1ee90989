// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[cfg(test)]
mod tests;

use std::{borrow::Cow, path::PathBuf};

use clap::Parser;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::common::{display_warnings, InfoPrinter, ARG_FILE_HELP};
use crate::{
    constants::DEFAULT_CLOCK_OFFSET,
    io::{
        expand_path_args, resolve_single_path, write::can_write_to_file, FileWriteError,
        GlobError,
    },
    params::{FilePolicy, GetToasParams},
    PsrtoaError,
};

#[derive(Parser, Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct GetToasArgs {
    #[clap(long, help = ARG_FILE_HELP.as_str(), parse(from_os_str))]
    pub(super) args_file: Option<PathBuf>,

    /// Paths to the archives to get TOAs from. Glob patterns are expanded;
    /// TOAs are written in the order the archives are given here.
    #[clap(name = "ARCHIVE_FILES", help_heading = "INPUT FILES")]
    #[serde(default)]
    pub(super) archive_files: Vec<String>,

    /// The template (standard profile) archive. It's scrunched in
    /// polarisation and frequency before use.
    #[clap(long, alias = "temp", help_heading = "INPUT FILES")]
    pub(super) template: Option<PathBuf>,

    /// The base name of the output tim file; ".tim" is appended.
    #[clap(short = 'o', long, help_heading = "OUTPUT FILES")]
    pub(super) outbase: Option<String>,

    /// If given, plot the dynamic spectrum of each archive into this
    /// directory. Existing plots are not redrawn.
    #[clap(long, aliases = &["plot_dir", "pdir"], help_heading = "OUTPUT FILES")]
    pub(super) plot_dir: Option<PathBuf>,

    /// The clock offset [seconds] written as a TIME line at the top of the
    /// tim file. The default is +1.0.
    #[clap(long, allow_hyphen_values = true, help_heading = "OUTPUT FILES")]
    pub(super) time_offset: Option<String>,

    /// Don't write a TIME line.
    #[clap(long, conflicts_with = "time-offset", help_heading = "OUTPUT FILES")]
    #[serde(default)]
    pub(super) no_time_offset: bool,

    /// Average each archive in time to subints of about this duration
    /// [seconds]. The default (or any duration that isn't positive) is to keep
    /// the archive's own subints.
    #[clap(long, aliases = &["t_subint", "tsub"], help_heading = "AVERAGING")]
    pub(super) t_subint: Option<f64>,

    /// Don't average any archive below this many subints. The default is 1.
    #[clap(long, aliases = &["n_subint", "nsub"], help_heading = "AVERAGING")]
    pub(super) n_subint: Option<usize>,

    /// Warn about archives that can't be turned into TOAs and carry on with
    /// the rest. The default is to stop at the first bad archive.
    #[clap(long)]
    #[serde(default)]
    pub(super) skip_bad_files: bool,
}

impl GetToasArgs {
    /// Both command-line and file arguments overlap in terms of what is
    /// available; this function consolidates everything that was specified into
    /// a single struct. Where applicable, it will prefer CLI parameters over
    /// those in the file.
    ///
    /// This function should only ever merge arguments, and not try to make
    /// sense of them.
    pub(super) fn merge(self) -> Result<GetToasArgs, PsrtoaError> {
        debug!("Merging command-line arguments with the argument file");

        let cli_args = self;

        if let Some(arg_file) = cli_args.args_file {
            // Read in the file arguments. Ensure all of the file args are
            // accounted for by pattern matching.
            let GetToasArgs {
                args_file: _,
                archive_files,
                template,
                outbase,
                plot_dir,
                time_offset,
                no_time_offset,
                t_subint,
                n_subint,
                skip_bad_files,
            } = unpack_arg_file!(arg_file);

            // Merge all the arguments, preferring the CLI args when available.
            Ok(GetToasArgs {
                args_file: None,
                archive_files: if cli_args.archive_files.is_empty() {
                    archive_files
                } else {
                    cli_args.archive_files
                },
                template: cli_args.template.or(template),
                outbase: cli_args.outbase.or(outbase),
                plot_dir: cli_args.plot_dir.or(plot_dir),
                time_offset: cli_args.time_offset.or(time_offset),
                no_time_offset: cli_args.no_time_offset || no_time_offset,
                t_subint: cli_args.t_subint.or(t_subint),
                n_subint: cli_args.n_subint.or(n_subint),
                skip_bad_files: cli_args.skip_bad_files || skip_bad_files,
            })
        } else {
            Ok(cli_args)
        }
    }

    /// Make sense of the arguments. `None` means there are no archives, and so
    /// nothing to do.
    pub(super) fn parse(self) -> Result<Option<GetToasParams>, GetToasArgsError> {
        debug!("{:#?}", self);

        let Self {
            args_file: _,
            archive_files,
            template,
            outbase,
            plot_dir,
            time_offset,
            no_time_offset,
            t_subint,
            n_subint,
            skip_bad_files,
        } = self;

        let template = template.ok_or(GetToasArgsError::NoTemplate)?;
        let outbase = outbase.ok_or(GetToasArgsError::NoOutbase)?;
        #[cfg(not(feature = "plotting"))]
        if plot_dir.is_some() {
            return Err(GetToasArgsError::NoPlottingFeature);
        }
        let target_subint_s = match t_subint {
            None => 0.0,
            Some(t) if t.is_finite() => t.max(0.0),
            Some(t) => return Err(GetToasArgsError::BadSubintTime(t)),
        };
        let min_subints = match n_subint {
            Some(0) => return Err(GetToasArgsError::ZeroSubints),
            Some(n) => n,
            None => 1,
        };

        let archive_files = expand_path_args(&archive_files)?;
        if archive_files.is_empty() {
            info!("No archive files found!");
            display_warnings();
            return Ok(None);
        }
        let template = resolve_single_path(&template)?;
        let output_tim = PathBuf::from(format!("{outbase}.tim"));
        can_write_to_file(&output_tim)?;
        let clock_offset = if no_time_offset {
            None
        } else {
            Some(time_offset.unwrap_or_else(|| DEFAULT_CLOCK_OFFSET.to_string()))
        };
        let file_policy = if skip_bad_files {
            FilePolicy::Skip
        } else {
            FilePolicy::Abort
        };

        let mut printer = InfoPrinter::new("Getting TOAs".into());
        let mut block: Vec<Cow<'static, str>> = vec![format!("{} archives", archive_files.len()).into()];
        if let (Some(first), Some(last)) = (archive_files.first(), archive_files.last()) {
            block.push(format!("first: {}", first.display()).into());
            if archive_files.len() > 1 {
                block.push(format!("last:  {}", last.display()).into());
            }
        }
        printer.push_block(block);
        printer.push_line(format!("Template: {}", template.display()).into());
        printer.push_block(vec![
            if target_subint_s > 0.0 {
                format!("Averaging to subints of ~{target_subint_s} s").into()
            } else {
                "Not averaging in time".into()
            },
            format!("At least {min_subints} subints per archive").into(),
        ]);
        let mut outputs: Vec<Cow<'static, str>> = vec![format!("Writing TOAs to {}", output_tim.display()).into()];
        if let Some(offset) = &clock_offset {
            outputs.push(format!("with clock offset TIME {offset}").into());
        }
        if let Some(plot_dir) = &plot_dir {
            outputs.push(format!("Plotting dynamic spectra into {}", plot_dir.display()).into());
        }
        printer.push_block(outputs);
        printer.push_line(format!("On a bad archive: {file_policy}").into());
        printer.display();

        display_warnings();

        Ok(Some(GetToasParams {
            archive_files,
            template,
            output_tim,
            plot_dir,
            target_subint_s,
            min_subints,
            clock_offset,
            file_policy,
        }))
    }

    pub(super) fn run(self, dry_run: bool) -> Result<(), PsrtoaError> {
        debug!("Converting arguments into parameters");
        trace!("{:#?}", self);
        let params = match self.parse()? {
            Some(p) => p,
            None => return Ok(()),
        };

        if dry_run {
            info!("Dry run -- exiting now.");
            return Ok(());
        }

        let output = params.run();
        display_warnings();
        let output = output?;
        if !output.skipped.is_empty() {
            let mut printer = InfoPrinter::new("Skipped archives".into());
            printer.push_block(
                output
                    .skipped
                    .iter()
                    .map(|p| p.display().to_string().into())
                    .collect(),
            );
            printer.display();
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub(super) enum GetToasArgsError {
    #[error("No template was specified")]
    NoTemplate,

    #[error("No output base name was specified")]
    NoOutbase,

    #[error("The subint duration must be a number of seconds; got {0}")]
    BadSubintTime(f64),

    #[error("The minimum number of subints must be at least 1")]
    ZeroSubints,

    #[cfg(not(feature = "plotting"))]
    #[error("A plot directory was given, but psrtoa was not compiled with the \"plotting\" feature")]
    NoPlottingFeature,

    #[error(transparent)]
    Glob(#[from] GlobError),

    #[error(transparent)]
    Output(#[from] FileWriteError),
}
