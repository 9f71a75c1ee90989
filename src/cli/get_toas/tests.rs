// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fs::File, path::Path};

use clap::Parser;
use indoc::indoc;
use tempfile::TempDir;

use super::*;
use crate::archive::tests::synthetic_archive_file;

fn write_archive(path: &Path, duration_s: f64, num_subints: usize) {
    let file = synthetic_archive_file(duration_s, num_subints, 64, 0.25);
    serde_json::to_writer(File::create(path).unwrap(), &file).unwrap();
}

/// Two archives in `<tmp>/obs` and a template in `<tmp>/std`.
fn setup() -> (TempDir, GetToasArgs) {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    std::fs::create_dir(tmp_dir.path().join("obs")).unwrap();
    std::fs::create_dir(tmp_dir.path().join("std")).unwrap();
    write_archive(&tmp_dir.path().join("obs/b.json"), 60.0, 4);
    write_archive(&tmp_dir.path().join("obs/a.json"), 30.0, 2);
    write_archive(&tmp_dir.path().join("std/template.json"), 60.0, 1);

    let args = GetToasArgs {
        archive_files: vec![tmp_dir
            .path()
            .join("obs/*.json")
            .display()
            .to_string()],
        template: Some(tmp_dir.path().join("std/template.json")),
        outbase: Some(tmp_dir.path().join("out").display().to_string()),
        ..Default::default()
    };
    (tmp_dir, args)
}

#[test]
fn test_clap_aliases() {
    let args = GetToasArgs::try_parse_from([
        "get-toas",
        "--temp",
        "std.json",
        "--tsub",
        "30",
        "--nsub",
        "2",
        "--pdir",
        "plots",
        "-o",
        "out",
        "--time-offset",
        "-0.5",
        "a.json",
        "b.json",
    ])
    .unwrap();
    assert_eq!(args.template, Some(PathBuf::from("std.json")));
    assert_eq!(args.t_subint, Some(30.0));
    assert_eq!(args.n_subint, Some(2));
    assert_eq!(args.plot_dir, Some(PathBuf::from("plots")));
    assert_eq!(args.outbase.as_deref(), Some("out"));
    assert_eq!(args.time_offset.as_deref(), Some("-0.5"));
    assert_eq!(
        args.archive_files,
        vec!["a.json".to_string(), "b.json".to_string()]
    );

    let args = GetToasArgs::try_parse_from(["get-toas", "--plot_dir", "p", "--t_subint", "5"])
        .unwrap();
    assert_eq!(args.plot_dir, Some(PathBuf::from("p")));
    assert_eq!(args.t_subint, Some(5.0));
    assert!(args.archive_files.is_empty());
}

#[test]
fn test_time_offset_flags_conflict() {
    let result = GetToasArgs::try_parse_from([
        "get-toas",
        "--time-offset",
        "+2.0",
        "--no-time-offset",
    ]);
    assert_eq!(
        result.unwrap_err().kind(),
        clap::ErrorKind::ArgumentConflict
    );

    let args = GetToasArgs::try_parse_from(["get-toas", "--no-time-offset", "a.json"]).unwrap();
    assert!(args.no_time_offset);
    assert_eq!(args.archive_files, vec!["a.json".to_string()]);
}

#[test]
fn test_cli_accepts_get_toas() {
    use crate::Psrtoa;

    let psrtoa = Psrtoa::try_parse_from([
        "psrtoa",
        "get-toas",
        "--template",
        "std.json",
        "-o",
        "out",
        "--no-time-offset",
        "a.json",
    ])
    .unwrap();
    assert!(format!("{psrtoa:?}").contains("a.json"));
}

#[test]
fn test_merge_prefers_cli_args() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let arg_file = tmp_dir.path().join("args.toml");
    std::fs::write(
        &arg_file,
        indoc! {r#"
            archive_files = ["x.json", "y.json"]
            template = "file_template.json"
            outbase = "file_out"
            n_subint = 3
            skip_bad_files = true
        "#},
    )
    .unwrap();

    let args = GetToasArgs {
        args_file: Some(arg_file),
        outbase: Some("cli_out".to_string()),
        t_subint: Some(10.0),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert!(args.args_file.is_none());
    assert_eq!(
        args.archive_files,
        vec!["x.json".to_string(), "y.json".to_string()]
    );
    assert_eq!(args.template, Some(PathBuf::from("file_template.json")));
    assert_eq!(args.outbase.as_deref(), Some("cli_out"));
    assert_eq!(args.t_subint, Some(10.0));
    assert_eq!(args.n_subint, Some(3));
    assert!(args.skip_bad_files);
    assert!(!args.no_time_offset);
}

#[test]
fn test_json_arg_file() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let arg_file = tmp_dir.path().join("args.json");
    std::fs::write(
        &arg_file,
        r#"{"template": "t.json", "outbase": "o", "no_time_offset": true}"#,
    )
    .unwrap();

    let args = GetToasArgs {
        args_file: Some(arg_file),
        ..Default::default()
    }
    .merge()
    .unwrap();
    assert_eq!(args.template, Some(PathBuf::from("t.json")));
    assert_eq!(args.outbase.as_deref(), Some("o"));
    assert!(args.no_time_offset);
}

#[test]
fn test_bad_arg_files() {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let arg_file = tmp_dir.path().join("args.yaml");
    std::fs::write(&arg_file, "template: t.json").unwrap();
    let result = GetToasArgs {
        args_file: Some(arg_file),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(PsrtoaError::ArgFile(_))));

    let arg_file = tmp_dir.path().join("args.toml");
    std::fs::write(&arg_file, "template = [").unwrap();
    let result = GetToasArgs {
        args_file: Some(arg_file),
        ..Default::default()
    }
    .merge();
    assert!(matches!(result, Err(PsrtoaError::ArgFile(_))));
}

#[test]
fn test_template_and_outbase_are_required() {
    let (_tmp_dir, args) = setup();
    let result = GetToasArgs {
        template: None,
        ..args.clone()
    }
    .parse();
    assert!(matches!(result, Err(GetToasArgsError::NoTemplate)));

    let result = GetToasArgs {
        outbase: None,
        ..args
    }
    .parse();
    assert!(matches!(result, Err(GetToasArgsError::NoOutbase)));
}

#[test]
fn test_no_archives_is_not_an_error() {
    let (tmp_dir, args) = setup();
    let args = GetToasArgs {
        archive_files: vec![],
        ..args
    };
    assert!(args.clone().parse().unwrap().is_none());
    args.run(false).unwrap();
    assert!(!tmp_dir.path().join("out.tim").exists());
}

#[test]
fn test_unmatched_glob_is_an_error() {
    let (tmp_dir, args) = setup();
    let result = GetToasArgs {
        archive_files: vec![tmp_dir
            .path()
            .join("obs/*.ar")
            .display()
            .to_string()],
        ..args
    }
    .parse();
    assert!(matches!(
        result,
        Err(GetToasArgsError::Glob(GlobError::NoMatches { .. }))
    ));
}

#[test]
fn test_parse_defaults() {
    let (tmp_dir, args) = setup();
    let params = args.parse().unwrap().unwrap();
    // Glob matches are sorted.
    assert_eq!(
        params.archive_files,
        vec![
            tmp_dir.path().join("obs/a.json"),
            tmp_dir.path().join("obs/b.json")
        ]
    );
    assert_eq!(params.output_tim, tmp_dir.path().join("out.tim"));
    assert_eq!(params.clock_offset.as_deref(), Some("+1.0"));
    assert_eq!(params.target_subint_s, 0.0);
    assert_eq!(params.min_subints, 1);
    assert_eq!(params.file_policy, FilePolicy::Abort);
    assert!(params.plot_dir.is_none());
}

#[test]
fn test_parse_options() {
    let (_tmp_dir, args) = setup();
    let params = GetToasArgs {
        no_time_offset: true,
        t_subint: Some(30.0),
        n_subint: Some(2),
        skip_bad_files: true,
        ..args.clone()
    }
    .parse()
    .unwrap()
    .unwrap();
    assert!(params.clock_offset.is_none());
    assert_eq!(params.target_subint_s, 30.0);
    assert_eq!(params.min_subints, 2);
    assert_eq!(params.file_policy, FilePolicy::Skip);

    let params = GetToasArgs {
        time_offset: Some("-0.5".to_string()),
        ..args.clone()
    }
    .parse()
    .unwrap()
    .unwrap();
    assert_eq!(params.clock_offset.as_deref(), Some("-0.5"));

    // Durations that aren't positive mean no time averaging.
    let params = GetToasArgs {
        t_subint: Some(-1.0),
        ..args.clone()
    }
    .parse()
    .unwrap()
    .unwrap();
    assert_eq!(params.target_subint_s, 0.0);

    let result = GetToasArgs {
        t_subint: Some(f64::NAN),
        ..args.clone()
    }
    .parse();
    assert!(matches!(result, Err(GetToasArgsError::BadSubintTime(_))));

    let result = GetToasArgs {
        n_subint: Some(0),
        ..args
    }
    .parse();
    assert!(matches!(result, Err(GetToasArgsError::ZeroSubints)));
}

#[test]
fn test_dry_run_writes_nothing() {
    let (tmp_dir, args) = setup();
    args.run(true).unwrap();
    assert!(!tmp_dir.path().join("out.tim").exists());
}

#[test]
fn test_run() {
    let (tmp_dir, args) = setup();
    args.run(false).unwrap();
    let contents = std::fs::read_to_string(tmp_dir.path().join("out.tim")).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 2 + 2 + 4);
    assert_eq!(lines[0], "FORMAT 1");
    assert_eq!(lines[1], "TIME +1.0");
    // a.json's TOAs come first.
    assert!(lines[2].starts_with("a.json "));
    assert!(lines[3].starts_with("a.json "));
    assert!(lines[4].starts_with("b.json "));
    assert!(lines[7].starts_with("b.json "));
}

#[test]
fn test_bad_archive_policies() {
    let (tmp_dir, args) = setup();
    std::fs::write(tmp_dir.path().join("obs/c.json"), "not an archive").unwrap();

    let result = args.clone().run(false);
    assert!(matches!(result, Err(PsrtoaError::Input(_))));
    assert!(!tmp_dir.path().join("out.tim").exists());

    GetToasArgs {
        skip_bad_files: true,
        ..args
    }
    .run(false)
    .unwrap();
    let contents = std::fs::read_to_string(tmp_dir.path().join("out.tim")).unwrap();
    assert_eq!(contents.lines().count(), 2 + 2 + 4);
}
