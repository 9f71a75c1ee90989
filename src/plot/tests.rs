// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::cell::Cell;

use tempfile::TempDir;

use super::*;
use crate::archive::{tests::synthetic_archive_file, Archive};

/// Writes an empty file instead of a picture, and counts how often it's asked
/// to.
#[derive(Default)]
struct CountingRenderer {
    num_renders: Cell<usize>,
    fail: bool,
}

impl PlotRenderer for CountingRenderer {
    fn render(&self, spectrum: &DynamicSpectrum, path: &Path) -> Result<(), PlotError> {
        self.num_renders.set(self.num_renders.get() + 1);
        assert!(!spectrum.profile.is_empty());
        if self.fail {
            return Err(PlotError::Directory {
                dir: path.to_path_buf(),
                err: std::io::Error::new(std::io::ErrorKind::Other, "renderer failed"),
            });
        }
        std::fs::write(path, b"").unwrap();
        Ok(())
    }
}

fn make_archive(name: &str) -> Archive {
    synthetic_archive_file(60.0, 4, 64, 0.25)
        .into_archive(PathBuf::from("/data").join(name))
        .unwrap()
}

#[test]
fn test_plot_path() {
    assert_eq!(
        dynamic_spectrum_plot_path(Path::new("/data/2023-01-01.ar"), Path::new("plots")),
        PathBuf::from("plots/2023-01-01.png")
    );
    // Only the last extension goes.
    assert_eq!(
        dynamic_spectrum_plot_path(Path::new("obs.calib.json"), Path::new("/tmp")),
        PathBuf::from("/tmp/obs.calib.png")
    );
}

#[test]
fn test_plots_are_only_rendered_once() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let plot_dir = tmp_dir.path().join("plots");
    let renderer = CountingRenderer::default();
    let archive = make_archive("obs1.json");

    let status = plot_dynamic_spectrum(&archive, &plot_dir, &renderer).unwrap();
    assert_eq!(status, PlotStatus::Rendered);
    assert_eq!(renderer.num_renders.get(), 1);
    assert!(plot_dir.join("obs1.png").exists());

    let status = plot_dynamic_spectrum(&archive, &plot_dir, &renderer).unwrap();
    assert_eq!(status, PlotStatus::Cached);
    assert_eq!(renderer.num_renders.get(), 1);

    // A different archive gets its own plot.
    let status = plot_dynamic_spectrum(&make_archive("obs2.json"), &plot_dir, &renderer).unwrap();
    assert_eq!(status, PlotStatus::Rendered);
    assert_eq!(renderer.num_renders.get(), 2);
}

#[test]
fn test_failed_render_is_retried() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = make_archive("obs1.json");
    let failing = CountingRenderer {
        fail: true,
        ..Default::default()
    };
    assert!(plot_dynamic_spectrum(&archive, tmp_dir.path(), &failing).is_err());

    let renderer = CountingRenderer::default();
    let status = plot_dynamic_spectrum(&archive, tmp_dir.path(), &renderer).unwrap();
    assert_eq!(status, PlotStatus::Rendered);
}

#[test]
fn test_plotting_does_not_touch_the_archive() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let archive = make_archive("obs1.json");
    let before = archive.data().to_owned();
    plot_dynamic_spectrum(&archive, tmp_dir.path(), &CountingRenderer::default()).unwrap();
    assert_eq!(archive.num_subints(), 4);
    assert_eq!(archive.data(), before.view());
}

#[test]
fn test_dynamic_spectrum() {
    let spectrum = DynamicSpectrum::from_archive(&make_archive("obs1.json")).unwrap();
    assert_eq!(spectrum.intensities.dim(), (1, 64));
    assert_eq!(spectrum.freqs_mhz, vec![1400.0]);
    assert_eq!(spectrum.band_mhz, (1300.0, 1500.0));

    // The pulse was at a quarter turn; it's moved to the middle.
    assert_eq!(argmax(&spectrum.profile), 32);
    assert!(spectrum.on_pulse.contains(&32));
    assert!(spectrum.on_pulse.len() < 64);
    assert_eq!(spectrum.spectrum.len(), 1);
    assert!(spectrum.spectrum[0] > 0.0);

    assert_eq!(
        spectrum.labels,
        vec![
            "obs1.json".to_string(),
            "gbt".to_string(),
            "J1939+2134".to_string(),
            "1400.0 MHz".to_string(),
            "MJD: 60000.25".to_string(),
        ]
    );
}

#[test]
fn test_on_pulse_window() {
    let profile = [0.0, 0.0, 1.0, 5.0, 10.0, 4.0, 0.5, 0.0];
    assert_eq!(on_pulse_window(&profile), 2..6);
    // Never drops below 10% of the peak.
    assert_eq!(on_pulse_window(&[5.0, 6.0, 10.0, 7.0]), 0..4);
}
