// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The numbers inside a Tempo2-format TOA line.

use std::str::FromStr;

use hifitime::{Duration, Epoch};
use thiserror::Error;

use super::Toa;
use crate::constants::SECONDS_PER_DAY;

/// A TOA with its fields parsed out. The original line is kept so that the
/// TOA can be written out again exactly as it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct ToaMeasurement {
    pub toa: Toa,

    /// The archive the TOA was measured from.
    pub file: String,

    /// \[MHz\]
    pub freq_mhz: f64,

    /// The arrival time, including any clock offset that applied to it.
    pub epoch: Epoch,

    /// The clock offset that has been applied to `epoch` \[seconds\].
    pub time_offset_s: f64,

    /// \[us\]
    pub uncertainty_us: f64,

    /// The observatory site code.
    pub site: String,

    /// Any `-flag value` pairs following the site.
    pub flags: Vec<(String, String)>,
}

impl ToaMeasurement {
    /// Shift the arrival time by `offset_s` seconds (e.g. from a tim-file
    /// `TIME` directive).
    pub fn with_time_offset(mut self, offset_s: f64) -> ToaMeasurement {
        self.epoch = self.epoch + Duration::from_seconds(offset_s);
        self.time_offset_s += offset_s;
        self
    }

    pub fn flag(&self, key: &str) -> Option<&str> {
        self.flags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl FromStr for ToaMeasurement {
    type Err = ToaParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let mut next = |field: &'static str| {
            tokens.next().ok_or_else(|| ToaParseError::MissingField {
                line: line.to_string(),
                field,
            })
        };

        let file = next("file")?.to_string();
        let freq_mhz = parse_float(line, "frequency", next("frequency")?)?;
        let epoch = parse_mjd(line, next("MJD")?)?;
        let uncertainty_us = parse_float(line, "uncertainty", next("uncertainty")?)?;
        let site = next("site")?.to_string();

        let rest: Vec<&str> = tokens.collect();
        if rest.len() % 2 != 0 {
            return Err(ToaParseError::UnpairedFlag(line.to_string()));
        }
        let flags = rest
            .chunks_exact(2)
            .map(|kv| (kv[0].trim_start_matches('-').to_string(), kv[1].to_string()))
            .collect();

        Ok(ToaMeasurement {
            toa: Toa::new(line.trim()),
            file,
            freq_mhz,
            epoch,
            time_offset_s: 0.0,
            uncertainty_us,
            site,
            flags,
        })
    }
}

fn parse_float(line: &str, field: &'static str, s: &str) -> Result<f64, ToaParseError> {
    s.parse().map_err(|_| ToaParseError::BadNumber {
        line: line.to_string(),
        field,
        value: s.to_string(),
    })
}

/// Parse an MJD string, keeping the integer day and the fraction apart so that
/// nanosecond precision survives.
pub(crate) fn parse_mjd(line: &str, s: &str) -> Result<Epoch, ToaParseError> {
    let bad = || ToaParseError::BadNumber {
        line: line.to_string(),
        field: "MJD",
        value: s.to_string(),
    };

    let (day, frac) = match s.split_once('.') {
        Some((day, frac)) => (day, frac),
        None => (s, ""),
    };
    let day: i64 = day.parse().map_err(|_| bad())?;
    let frac: f64 = if frac.is_empty() {
        0.0
    } else {
        format!("0.{frac}").parse().map_err(|_| bad())?
    };

    Ok(Epoch::from_mjd_utc(day as f64) + Duration::from_seconds(frac * SECONDS_PER_DAY))
}

#[derive(Error, Debug, PartialEq)]
pub enum ToaParseError {
    #[error("TOA line '{line}' is missing its {field}")]
    MissingField { line: String, field: &'static str },

    #[error("Couldn't parse the {field} '{value}' in TOA line '{line}'")]
    BadNumber {
        line: String,
        field: &'static str,
        value: String,
    },

    #[error("TOA line '{0}' has a flag without a value")]
    UnpairedFlag(String),
}
