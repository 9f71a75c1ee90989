// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing Tempo2 tim files.
//!
//! A tim file starts with a `FORMAT 1` line, optionally followed by a `TIME`
//! directive (a clock offset in seconds applied to all following TOAs) and
//! then has one TOA per line.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

use super::write::{write_via_temp_file, FileWriteError};
use crate::{
    cli::Warn,
    constants::TIM_FORMAT_MARKER,
    toas::{Toa, ToaMeasurement, ToaParseError},
};

/// The contents of a tim file.
#[derive(Debug, Clone, Default)]
pub struct TimFile {
    /// The argument of the first `TIME` directive, verbatim.
    pub clock_offset: Option<String>,

    /// The TOAs, in file order, with any `TIME` offsets applied.
    pub toas: Vec<ToaMeasurement>,
}

/// Write TOAs to a tim file. If `clock_offset` is given (e.g. "+1.0"), a
/// `TIME` directive carrying it verbatim follows the format line. TOAs are
/// written in the order given.
///
/// Any existing file at `path` is only replaced once everything has been
/// written.
pub fn write_tim_file(
    toas: &[Toa],
    path: &Path,
    clock_offset: Option<&str>,
) -> Result<(), TimFileError> {
    debug!("Writing {} TOAs to {}", toas.len(), path.display());
    write_via_temp_file(path, |w| {
        writeln!(w, "{TIM_FORMAT_MARKER}")?;
        if let Some(offset) = clock_offset {
            writeln!(w, "TIME {offset}")?;
        }
        for toa in toas {
            writeln!(w, "{toa}")?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Write parsed TOAs back out. Each TOA line is written verbatim, and `TIME`
/// directives are emitted wherever the clock offset applied to the TOAs
/// changes, so reading the file back gives the same epochs.
pub fn write_tim_measurements(toas: &[ToaMeasurement], path: &Path) -> Result<(), TimFileError> {
    debug!("Writing {} TOAs to {}", toas.len(), path.display());
    write_via_temp_file(path, |w| {
        writeln!(w, "{TIM_FORMAT_MARKER}")?;
        let mut current_offset_s = 0.0;
        for toa in toas {
            if toa.time_offset_s != current_offset_s {
                writeln!(w, "TIME {:+}", toa.time_offset_s - current_offset_s)?;
                current_offset_s = toa.time_offset_s;
            }
            writeln!(w, "{}", toa.toa)?;
        }
        Ok(())
    })?;
    Ok(())
}

/// Read a tim file. `TIME` offsets accumulate and apply to every following
/// TOA. Comments (`C` or `#`) and blank lines are skipped, as are TOAs
/// between `SKIP` and `NOSKIP`; reading stops at `END`. Other directives are
/// ignored with a warning.
pub fn read_tim_file(path: &Path) -> Result<TimFile, TimFileError> {
    debug!("Reading tim file {}", path.display());
    let io_err = |err| TimFileError::IO {
        file: path.to_path_buf(),
        err,
    };
    let reader = BufReader::new(File::open(path).map_err(io_err)?);

    let mut tim = TimFile::default();
    let mut offset_s = 0.0;
    let mut skipping = false;
    for (i_line, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        let line = line.trim();
        let line_num = i_line + 1;
        if line.is_empty() || line.starts_with('#') || line == "C" || line.starts_with("C ") {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        match first {
            "FORMAT" => {
                trace!("{}: {line}", path.display());
            }
            "TIME" => {
                let value = tokens.next().ok_or_else(|| TimFileError::Directive {
                    file: path.to_path_buf(),
                    line_num,
                    line: line.to_string(),
                })?;
                let dt: f64 = value.parse().map_err(|_| TimFileError::Directive {
                    file: path.to_path_buf(),
                    line_num,
                    line: line.to_string(),
                })?;
                if tim.clock_offset.is_none() {
                    tim.clock_offset = Some(value.to_string());
                }
                offset_s += dt;
            }
            "SKIP" => skipping = true,
            "NOSKIP" => skipping = false,
            "END" => break,
            _ if skipping => (),
            _ if is_directive(first) => {
                format!(
                    "{}:{line_num}: Ignoring the unsupported tim directive '{first}'",
                    path.display()
                )
                .warn();
            }
            _ => {
                let toa: ToaMeasurement = line.parse().map_err(|err| TimFileError::Toa {
                    file: path.to_path_buf(),
                    line_num,
                    err,
                })?;
                tim.toas.push(if offset_s != 0.0 {
                    toa.with_time_offset(offset_s)
                } else {
                    toa
                });
            }
        }
    }

    debug!("Read {} TOAs from {}", tim.toas.len(), path.display());
    Ok(tim)
}

/// Tim-file directives are all-caps words. A TOA line starts with a file
/// name, which could also be all caps, so only words Tempo2 knows are
/// treated as directives.
fn is_directive(word: &str) -> bool {
    matches!(
        word,
        "MODE"
            | "EFAC"
            | "EQUAD"
            | "EMIN"
            | "EMAX"
            | "FMIN"
            | "FMAX"
            | "JUMP"
            | "PHASE"
            | "INCLUDE"
            | "INFO"
            | "SIGMA"
            | "TRACK"
    )
}

#[derive(Error, Debug)]
pub enum TimFileError {
    #[error("{file}:{line_num}: {err}")]
    Toa {
        file: PathBuf,
        line_num: usize,
        err: ToaParseError,
    },

    #[error("{file}:{line_num}: Couldn't understand the directive '{line}'")]
    Directive {
        file: PathBuf,
        line_num: usize,
        line: String,
    },

    #[error("Couldn't read '{file}': {err}")]
    IO { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Write(#[from] FileWriteError),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;

    fn toas() -> Vec<Toa> {
        vec![
            Toa::new("b.json 1400.000000 60000.2500000000000 0.512 gbt"),
            Toa::new("a.json 1400.000000 59000.2500000000000 1.024 gbt"),
            Toa::new("a.json 1400.000000 59000.2600000000000 2.048 gbt"),
        ]
    }

    #[test]
    fn test_write_with_clock_offset() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("out.tim");
        let toas = toas();
        write_tim_file(&toas, &path, Some("+1.0")).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2 + toas.len());
        assert_eq!(lines[0], TIM_FORMAT_MARKER);
        assert!(lines[1].contains("+1.0"));
        // Order is unchanged.
        for (line, toa) in lines[2..].iter().zip(&toas) {
            assert_eq!(*line, toa.as_str());
        }
        assert!(contents.ends_with('\n'));
        assert!(!contents.ends_with("\n\n"));
    }

    #[test]
    fn test_write_without_clock_offset() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("out.tim");
        let toas = toas();
        write_tim_file(&toas, &path, None).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1 + toas.len());
        assert_eq!(lines[0], TIM_FORMAT_MARKER);
    }

    #[test]
    fn test_write_overwrites() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("out.tim");
        std::fs::write(&path, "a much longer file than the one that replaces it\n".repeat(20))
            .unwrap();
        write_tim_file(&[], &path, None).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            format!("{TIM_FORMAT_MARKER}\n")
        );
    }

    #[test]
    fn test_read_tim_file() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("in.tim");
        std::fs::write(
            &path,
            indoc! {"
                FORMAT 1
                TIME +1.0
                # A comment
                C a.json 1400.0 59999.0 1.0 gbt
                a.json 1400.000000 60000.0000000000000 0.500 gbt -be GUPPI

                MODE 1
                SKIP
                b.json 1400.000000 60001.0000000000000 0.500 gbt
                NOSKIP
                TIME -0.5
                c.json 1400.000000 60002.0000000000000 0.500 gbt
                END
                d.json 1400.000000 60003.0000000000000 0.500 gbt
            "},
        )
        .unwrap();

        let tim = read_tim_file(&path).unwrap();
        assert_eq!(tim.clock_offset.as_deref(), Some("+1.0"));
        assert_eq!(tim.toas.len(), 2);
        assert_eq!(tim.toas[0].file, "a.json");
        assert_eq!(tim.toas[0].flag("be"), Some("GUPPI"));
        assert_abs_diff_eq!(tim.toas[0].time_offset_s, 1.0);
        assert_eq!(tim.toas[1].file, "c.json");
        assert_abs_diff_eq!(tim.toas[1].time_offset_s, 0.5);
        // The original line is kept.
        assert_eq!(
            tim.toas[0].toa.as_str(),
            "a.json 1400.000000 60000.0000000000000 0.500 gbt -be GUPPI"
        );
    }

    #[test]
    fn test_measurements_round_trip() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let first = tmp_dir.path().join("first.tim");
        std::fs::write(
            &first,
            indoc! {"
                FORMAT 1
                a.json 1400.000000 60000.0000000000000 0.500 gbt
                TIME +1.0
                b.json 1400.000000 60001.0000000000000 0.500 gbt
            "},
        )
        .unwrap();
        let tim = read_tim_file(&first).unwrap();

        let second = tmp_dir.path().join("second.tim");
        write_tim_measurements(&tim.toas, &second).unwrap();
        let reread = read_tim_file(&second).unwrap();
        assert_eq!(reread.toas.len(), 2);
        for (a, b) in tim.toas.iter().zip(&reread.toas) {
            assert_eq!(a.toa, b.toa);
            assert_eq!(a.epoch, b.epoch);
        }
    }

    #[test]
    fn test_read_bad_tim_files() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("bad.tim");

        std::fs::write(&path, "FORMAT 1\na.json 1400.0 60000.0\n").unwrap();
        assert!(matches!(
            read_tim_file(&path),
            Err(TimFileError::Toa { line_num: 2, .. })
        ));

        std::fs::write(&path, "FORMAT 1\nTIME soon\n").unwrap();
        assert!(matches!(
            read_tim_file(&path),
            Err(TimFileError::Directive { line_num: 2, .. })
        ));

        assert!(matches!(
            read_tim_file(&tmp_dir.path().join("missing.tim")),
            Err(TimFileError::IO { .. })
        ));
    }
}
