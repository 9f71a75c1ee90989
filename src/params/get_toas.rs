// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Turning many archives into one tim file.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, info};
use strum_macros::Display;
use thiserror::Error;

use crate::{
    archive::{prepare_archive, ArchiveError, ArchiveFileLoader, ArchiveLoader, SignalArchive},
    cli::Warn,
    io::{write_tim_file, TimFileError},
    plot::{plot_dynamic_spectrum, BitmapRenderer, PlotError, PlotRenderer},
    toas::{get_toas_from_obs, ArrivalTimeEstimator, EstimatorError, PhaseGradientEstimator, Toa},
    PROGRESS_BARS,
};

/// What to do when an archive can't be turned into TOAs.
#[derive(Debug, Display, Default, Clone, Copy, PartialEq, Eq)]
pub enum FilePolicy {
    /// Stop everything.
    #[default]
    #[strum(serialize = "abort")]
    Abort,

    /// Warn about the file and carry on with the next one.
    #[strum(serialize = "skip")]
    Skip,
}

pub struct GetToasParams {
    /// The archives, in the order their TOAs should be written.
    pub archive_files: Vec<PathBuf>,

    pub template: PathBuf,

    /// `<outbase>.tim`.
    pub output_tim: PathBuf,

    /// If set, a dynamic spectrum of each archive is plotted here.
    pub plot_dir: Option<PathBuf>,

    /// The approximate subint duration to average each archive to
    /// \[seconds\]. If this isn't positive, archives aren't averaged in time.
    pub target_subint_s: f64,

    /// The minimum number of subints per archive.
    pub min_subints: usize,

    /// Written as a `TIME` line at the top of the tim file.
    pub clock_offset: Option<String>,

    pub file_policy: FilePolicy,
}

/// The TOAs from a batch of archives.
#[derive(Debug, Clone, Default)]
pub struct BatchOutput {
    /// File order, then subint order within each file.
    pub toas: Vec<Toa>,

    /// Archives that were skipped because of errors.
    pub skipped: Vec<PathBuf>,
}

impl GetToasParams {
    /// Get TOAs from all the archive files and write them to the tim file.
    pub fn run(&self) -> Result<BatchOutput, GetToasError> {
        let start = Instant::now();
        let output = self.get_toas(
            &ArchiveFileLoader,
            PhaseGradientEstimator::default,
            &BitmapRenderer,
        )?;

        write_tim_file(
            &output.toas,
            &self.output_tim,
            self.clock_offset.as_deref(),
        )?;
        info!(
            "Wrote {} TOAs to {}",
            output.toas.len(),
            self.output_tim.display()
        );
        info!("Total time: {:.2} s", start.elapsed().as_secs_f64());
        Ok(output)
    }

    /// Get TOAs from all the archive files, in order. A new estimator is made
    /// for every archive.
    pub fn get_toas<L, E, F, R>(
        &self,
        loader: &L,
        mut new_estimator: F,
        renderer: &R,
    ) -> Result<BatchOutput, GetToasError>
    where
        L: ArchiveLoader,
        L::Archive: Clone,
        E: ArrivalTimeEstimator,
        F: FnMut() -> E,
        R: PlotRenderer + ?Sized,
    {
        let start = Instant::now();

        // The template is shared by every archive and never modified again.
        let template = {
            let mut template = loader
                .load(&self.template)
                .map_err(GetToasError::Template)?;
            template.pscrunch().map_err(GetToasError::Template)?;
            template.fscrunch().map_err(GetToasError::Template)?;
            template
        };
        debug!(
            "Template {} has {} bins",
            self.template.display(),
            template.num_bins()
        );

        let pb = ProgressBar::with_draw_target(
            Some(self.archive_files.len() as u64),
            if PROGRESS_BARS.load() {
                ProgressDrawTarget::stdout()
            } else {
                ProgressDrawTarget::hidden()
            },
        )
        .with_style(
            ProgressStyle::default_bar()
                .template("{msg:17}: [{wide_bar:.blue}] {pos:3}/{len:3} archives ({elapsed_precise}<{eta_precise})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        )
        .with_message("Getting TOAs");

        let mut output = BatchOutput::default();
        for path in &self.archive_files {
            info!("Processing: {}", path.display());
            match self.process_archive(path, loader, new_estimator(), &template, renderer) {
                Ok(toas) => {
                    debug!("{}: {} TOAs", path.display(), toas.len());
                    output.toas.extend(toas);
                }
                Err(e) => match self.file_policy {
                    FilePolicy::Abort => {
                        pb.abandon();
                        return Err(e);
                    }
                    FilePolicy::Skip => {
                        format!("Skipped {}: {e}", path.display()).warn();
                        output.skipped.push(path.clone());
                    }
                },
            }
            pb.inc(1);
        }
        pb.abandon_with_message("Finished");

        if !output.skipped.is_empty() {
            info!(
                "Skipped {} of {} archives",
                output.skipped.len(),
                self.archive_files.len()
            );
        }
        info!(
            "Got {} TOAs from {} archives in {:.2} s",
            output.toas.len(),
            self.archive_files.len() - output.skipped.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(output)
    }

    fn process_archive<L, E, R>(
        &self,
        path: &Path,
        loader: &L,
        estimator: E,
        template: &L::Archive,
        renderer: &R,
    ) -> Result<Vec<Toa>, GetToasError>
    where
        L: ArchiveLoader,
        L::Archive: Clone,
        E: ArrivalTimeEstimator,
        R: PlotRenderer + ?Sized,
    {
        let mut archive = loader.load(path)?;
        if let Some(plot_dir) = &self.plot_dir {
            plot_dynamic_spectrum(&archive, plot_dir, renderer)?;
        }
        prepare_archive(&mut archive, self.target_subint_s, self.min_subints)?;
        let toas = get_toas_from_obs(estimator, &archive, template)?;
        Ok(toas)
    }
}

#[derive(Error, Debug)]
pub enum GetToasError {
    #[error("Couldn't prepare the template: {0}")]
    Template(ArchiveError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Estimator(#[from] EstimatorError),

    #[error(transparent)]
    Plot(#[from] PlotError),

    #[error(transparent)]
    TimFile(#[from] TimFileError),
}
