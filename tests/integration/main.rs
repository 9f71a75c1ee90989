// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod get_toas;
mod refine;

use std::{
    fs::File,
    path::Path,
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use psrtoa::archive::{ArchiveFile, PolState};

fn psrtoa() -> Command {
    let mut cmd = Command::cargo_bin("psrtoa").unwrap();
    cmd.arg("--no-progress-bars");
    cmd
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Write a single-channel, single-polarisation archive where every subint has
/// a Gaussian pulse at `phase`.
fn write_archive(path: &Path, duration_s: f64, num_subints: usize, phase: f64) {
    let num_bins = 128;
    let profile: Vec<f32> = (0..num_bins)
        .map(|i_bin| {
            let mut d = i_bin as f64 / num_bins as f64 - phase;
            d -= d.round();
            (-0.5 * (d / 0.02).powi(2)).exp() as f32
        })
        .collect();
    let file = ArchiveFile {
        source: "J1939+2134".to_string(),
        telescope: "gbt".to_string(),
        start_mjd: 60000.25,
        duration_s,
        centre_freq_mhz: 1400.0,
        bandwidth_mhz: 200.0,
        chan_freqs_mhz: None,
        period_s: 0.001557806,
        dm: 0.0,
        dedispersed: false,
        pol_state: PolState::Intensity,
        shape: [num_subints, 1, 1, num_bins],
        data: profile.repeat(num_subints),
    };
    serde_json::to_writer(File::create(path).unwrap(), &file).unwrap();
}
