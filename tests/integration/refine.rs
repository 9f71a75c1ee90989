// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::Path;

use hifitime::{Duration, Epoch};
use indoc::indoc;
use psrtoa::{io::read_par_file, toas::format_mjd};
use tempfile::TempDir;

use crate::{get_cmd_output, psrtoa};

const F0: f64 = 641.928_222_127_829;

/// 50 TOAs on pulses of a constant-frequency pulsar, with the 11th 400 us
/// late.
fn write_inputs(dir: &Path) {
    std::fs::write(
        dir.join("psr.par"),
        indoc! {"
            PSRJ            J1939+2134
            F0              641.928222127829          1
            F1              0                         1
            PEPOCH          60000.0000000000000
            DM              71.0227
        "},
    )
    .unwrap();

    let pepoch = Epoch::from_mjd_utc(60000.0);
    let mut tim = String::from("FORMAT 1\n");
    for i in 0..50 {
        let dt = (i as f64 / 50.0 - 0.5) * 200.0 * 86400.0 + 777.7;
        let mut t = (dt * F0).round() / F0;
        if i == 10 {
            t += 400e-6;
        }
        let epoch = pepoch + Duration::from_seconds(t);
        tim.push_str(&format!(
            "obs{i}.json 1400.000000 {} 1.000 gbt\n",
            format_mjd(epoch)
        ));
    }
    std::fs::write(dir.join("psr.tim"), tim).unwrap();
}

#[test]
fn test_refine() {
    let tmp_dir = TempDir::new().unwrap();
    write_inputs(tmp_dir.path());
    let output_par = tmp_dir.path().join("refined.par");
    let output_tim = tmp_dir.path().join("refined.tim");

    let result = psrtoa()
        .args([
            "refine",
            "--par",
            &tmp_dir.path().join("psr.par").display().to_string(),
            "--tim",
            &tmp_dir.path().join("psr.tim").display().to_string(),
            "--output-par",
            &output_par.display().to_string(),
            "--output-tim",
            &output_tim.display().to_string(),
            "--max-iterations",
            "3",
        ])
        .ok();
    assert!(result.is_ok(), "{:?}", get_cmd_output(result));

    let model = read_par_file(&output_par).unwrap();
    assert!((model.f0.value - F0).abs() < 1e-9);
    assert!(model.f0.uncertainty.is_some());
    // Lines the fit doesn't understand survive.
    assert!(model.other_lines.iter().any(|l| l.starts_with("DM")));

    let tim = std::fs::read_to_string(&output_tim).unwrap();
    assert_eq!(tim.lines().count(), 1 + 49);
    assert!(!tim.contains("obs10.json"));
}

#[test]
fn test_refine_missing_tim() {
    let tmp_dir = TempDir::new().unwrap();
    write_inputs(tmp_dir.path());
    let result = psrtoa()
        .args([
            "refine",
            "--par",
            &tmp_dir.path().join("psr.par").display().to_string(),
            "--tim",
            &tmp_dir.path().join("nope.tim").display().to_string(),
        ])
        .ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("nope.tim"), "{stderr}");
}
