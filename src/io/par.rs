// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Reading and writing Tempo2 par files.
//!
//! Only the spin-down model is understood (`PSR`/`PSRJ`, `F0`, `F1`,
//! `PEPOCH`); every other line is kept verbatim and written back out after
//! them.

use std::{
    fs::File,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};
use thiserror::Error;

use super::write::{write_via_temp_file, FileWriteError};
use crate::{
    timing::{Param, TimingModel},
    toas::{format_mjd, parse_mjd},
};

pub fn read_par_file(path: &Path) -> Result<TimingModel, ParFileError> {
    debug!("Reading par file {}", path.display());
    let reader = BufReader::new(File::open(path).map_err(|err| ParFileError::IO {
        file: path.to_path_buf(),
        err,
    })?);

    let mut name = None;
    let mut f0 = None;
    let mut f1 = None;
    let mut pepoch = None;
    let mut other_lines = vec![];
    for (i_line, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| ParFileError::IO {
            file: path.to_path_buf(),
            err,
        })?;
        let line_num = i_line + 1;
        let bad_value = |key: &str| ParFileError::BadValue {
            file: path.to_path_buf(),
            line_num,
            key: key.to_string(),
        };

        let mut tokens = line.split_whitespace();
        match tokens.next() {
            None => (),
            Some(key @ ("PSR" | "PSRJ" | "PSRB")) => {
                name = Some(tokens.next().ok_or_else(|| bad_value(key))?.to_string());
            }
            Some(key @ ("F0" | "F1")) => {
                let value = tokens
                    .next()
                    .and_then(parse_fortran_float)
                    .ok_or_else(|| bad_value(key))?;
                let free = match tokens.next() {
                    None => false,
                    Some("1") => true,
                    Some("0") => false,
                    Some(_) => return Err(bad_value(key)),
                };
                let uncertainty = match tokens.next() {
                    None => None,
                    Some(s) => Some(parse_fortran_float(s).ok_or_else(|| bad_value(key))?),
                };
                let param = Param {
                    value,
                    uncertainty,
                    free,
                };
                trace!("{key}: {param:?}");
                if key == "F0" {
                    f0 = Some(param);
                } else {
                    f1 = Some(param);
                }
            }
            Some(key @ "PEPOCH") => {
                let mjd = tokens.next().ok_or_else(|| bad_value(key))?;
                pepoch = Some(parse_mjd(&line, mjd).map_err(|_| bad_value(key))?);
            }
            Some(_) => other_lines.push(line.trim_end().to_string()),
        }
    }

    let missing = |key: &'static str| ParFileError::Missing {
        file: path.to_path_buf(),
        key,
    };
    let mut model = TimingModel::new(
        name.ok_or_else(|| missing("PSRJ"))?,
        f0.ok_or_else(|| missing("F0"))?,
        f1.unwrap_or_else(|| Param::frozen(0.0)),
        pepoch.ok_or_else(|| missing("PEPOCH"))?,
    );
    model.other_lines = other_lines;
    Ok(model)
}

/// Write a model to a par file. The spin parameters come first, then any
/// other lines from the par file the model was read from.
pub fn write_par_file(model: &TimingModel, path: &Path) -> Result<(), ParFileError> {
    debug!("Writing par file {}", path.display());
    let name_key = if model.name.starts_with('B') {
        "PSR"
    } else {
        "PSRJ"
    };
    write_via_temp_file(path, |w| {
        writeln!(w, "{name_key:<15} {}", model.name)?;
        write_param(w, "F0", &model.f0, format!("{}", model.f0.value))?;
        write_param(w, "F1", &model.f1, format!("{:e}", model.f1.value))?;
        writeln!(w, "{:<15} {}", "PEPOCH", format_mjd(model.pepoch))?;
        for line in &model.other_lines {
            writeln!(w, "{line}")?;
        }
        Ok(())
    })?;
    Ok(())
}

fn write_param(w: &mut dyn Write, key: &str, param: &Param, value: String) -> std::io::Result<()> {
    write!(w, "{key:<15} {value:<25} {}", u8::from(param.free))?;
    if let Some(u) = param.uncertainty {
        write!(w, " {u:e}")?;
    }
    writeln!(w)
}

/// Par files may use Fortran exponents, e.g. `1.5D-15`.
fn parse_fortran_float(s: &str) -> Option<f64> {
    s.replace(|c: char| c == 'D' || c == 'd', "e").parse().ok()
}

#[derive(Error, Debug)]
pub enum ParFileError {
    #[error("{file}:{line_num}: Couldn't parse the value of {key}")]
    BadValue {
        file: PathBuf,
        line_num: usize,
        key: String,
    },

    #[error("The par file '{file}' doesn't have {key}")]
    Missing { file: PathBuf, key: &'static str },

    #[error("Couldn't read '{file}': {err}")]
    IO { file: PathBuf, err: std::io::Error },

    #[error(transparent)]
    Write(#[from] FileWriteError),
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use hifitime::Epoch;
    use indoc::indoc;
    use tempfile::TempDir;

    use super::*;

    const PAR: &str = indoc! {"
        PSRJ           J1939+2134
        RAJ             19:39:38.561224          1  0.00000133
        DECJ           +21:34:59.12570           1  0.0000253
        F0             641.92822212782900        1  1.2D-12
        F1             -4.3312D-14               0
        PEPOCH         60000.5
        DM             71.0227
        # a comment
        CLK            TT(BIPM2019)
    "};

    #[test]
    fn test_read_par_file() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("psr.par");
        std::fs::write(&path, PAR).unwrap();

        let model = read_par_file(&path).unwrap();
        assert_eq!(model.name, "J1939+2134");
        assert_abs_diff_eq!(model.f0.value, 641.928222127829);
        assert!(model.f0.free);
        assert_abs_diff_eq!(model.f0.uncertainty.unwrap(), 1.2e-12);
        assert_abs_diff_eq!(model.f1.value, -4.3312e-14);
        assert!(!model.f1.free);
        assert_eq!(model.f1.uncertainty, None);
        assert_abs_diff_eq!(
            (model.pepoch - Epoch::from_mjd_utc(60000.0)).to_seconds(),
            43200.0,
            epsilon = 1e-6
        );
        assert_eq!(model.other_lines.len(), 5);
        assert_eq!(model.other_lines[4], "CLK            TT(BIPM2019)");
    }

    #[test]
    fn test_par_round_trip() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("psr.par");
        std::fs::write(&path, PAR).unwrap();
        let mut model = read_par_file(&path).unwrap();
        model.f1.free = true;
        model.f1.uncertainty = Some(2.5e-20);

        let out = tmp_dir.path().join("out").join("psr.par");
        write_par_file(&model, &out).unwrap();
        let reread = read_par_file(&out).unwrap();
        assert_eq!(reread, model);
    }

    #[test]
    fn test_bad_par_files() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let path = tmp_dir.path().join("psr.par");

        std::fs::write(&path, "PSRJ J0000+0000\nPEPOCH 60000\n").unwrap();
        assert!(matches!(
            read_par_file(&path),
            Err(ParFileError::Missing { key: "F0", .. })
        ));

        std::fs::write(&path, "PSRJ J0000+0000\nF0 fast\nPEPOCH 60000\n").unwrap();
        assert!(matches!(
            read_par_file(&path),
            Err(ParFileError::BadValue { line_num: 2, .. })
        ));

        std::fs::write(&path, "PSRJ J0000+0000\nF0 100.0 2\nPEPOCH 60000\n").unwrap();
        assert!(matches!(
            read_par_file(&path),
            Err(ParFileError::BadValue { line_num: 2, .. })
        ));

        // F1 is optional.
        std::fs::write(&path, "PSRJ J0000+0000\nF0 100.0\nPEPOCH 60000\n").unwrap();
        let model = read_par_file(&path).unwrap();
        assert_eq!(model.f1, Param::frozen(0.0));
    }
}
