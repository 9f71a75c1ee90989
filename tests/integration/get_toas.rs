// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use tempfile::TempDir;

use crate::{get_cmd_output, psrtoa, write_archive};

#[test]
fn test_no_archives_exits_cleanly() {
    let tmp_dir = TempDir::new().unwrap();
    let outbase = tmp_dir.path().join("out");
    let result = psrtoa()
        .args([
            "get-toas",
            "--template",
            "std.json",
            "-o",
            &outbase.display().to_string(),
        ])
        .ok();
    let ok = result.is_ok();
    let (stdout, stderr) = get_cmd_output(result);
    assert!(ok, "{stdout}\n{stderr}");
    assert!(stdout.contains("No archive files found!"), "{stdout}");
    assert!(!tmp_dir.path().join("out.tim").exists());
}

#[test]
fn test_missing_template_flag() {
    let result = psrtoa().args(["get-toas", "-o", "out", "a.json"]).ok();
    assert!(result.is_err());
    let (_, stderr) = get_cmd_output(result);
    assert!(stderr.contains("No template was specified"), "{stderr}");
}

#[test]
fn test_get_toas() {
    let tmp_dir = TempDir::new().unwrap();
    let template = tmp_dir.path().join("template.std.json");
    write_archive(&template, 60.0, 1, 0.5);
    let obs1 = tmp_dir.path().join("2023-05-01.json");
    let obs2 = tmp_dir.path().join("2023-06-01.json");
    write_archive(&obs1, 120.0, 12, 0.3);
    write_archive(&obs2, 60.0, 6, 0.3);
    let outbase = tmp_dir.path().join("J1939");

    // obs2 first; the tim file keeps the order given.
    let result = psrtoa()
        .args([
            "get-toas",
            "--temp",
            &template.display().to_string(),
            "-o",
            &outbase.display().to_string(),
            "--tsub",
            "30",
            &obs2.display().to_string(),
            &obs1.display().to_string(),
        ])
        .ok();
    assert!(result.is_ok(), "{:?}", get_cmd_output(result));

    let contents = std::fs::read_to_string(tmp_dir.path().join("J1939.tim")).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines[0], "FORMAT 1");
    assert_eq!(lines[1], "TIME +1.0");
    // 60 s -> 2 subints, 120 s -> 4 subints.
    assert_eq!(lines.len(), 2 + 2 + 4);
    assert!(lines[2..4].iter().all(|l| l.starts_with("2023-06-01.json ")));
    assert!(lines[4..].iter().all(|l| l.starts_with("2023-05-01.json ")));
    for line in &lines[2..] {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[1], "1400.000000");
        assert!(tokens[2].starts_with("60000."));
        assert!(tokens[3].parse::<f64>().unwrap() > 0.0);
        assert_eq!(tokens[4], "gbt");
    }
}

#[test]
fn test_get_toas_dry_run_and_save_toml() {
    let tmp_dir = TempDir::new().unwrap();
    let template = tmp_dir.path().join("template.std.json");
    write_archive(&template, 60.0, 1, 0.5);
    let obs = tmp_dir.path().join("obs.json");
    write_archive(&obs, 60.0, 6, 0.3);
    let outbase = tmp_dir.path().join("out");
    let toml = tmp_dir.path().join("args.toml");

    let result = psrtoa()
        .args([
            "get-toas",
            "--dry-run",
            "--save-toml",
            &toml.display().to_string(),
            "--template",
            &template.display().to_string(),
            "-o",
            &outbase.display().to_string(),
            &obs.display().to_string(),
        ])
        .ok();
    assert!(result.is_ok(), "{:?}", get_cmd_output(result));
    assert!(!tmp_dir.path().join("out.tim").exists());

    // The saved arguments reproduce the run.
    let result = psrtoa()
        .args(["get-toas", "--args-file", &toml.display().to_string()])
        .ok();
    assert!(result.is_ok(), "{:?}", get_cmd_output(result));
    let contents = std::fs::read_to_string(tmp_dir.path().join("out.tim")).unwrap();
    assert_eq!(contents.lines().count(), 2 + 6);
}
