//! Pressure Stall Information (`cpu.pressure`, `memory.pressure`, `io.pressure`).
//!
//! Each file holds up to two lines:
//!
//! ```text
//! some avg10=0.00 avg60=0.12 avg300=0.05 total=1234567
//! full avg10=0.00 avg60=0.00 avg300=0.00 total=7654
//! ```
//!
//! The `avg*` values are percentages of wall time, `total` is the accumulated
//! stall time in microseconds. The `full` line is missing for CPU pressure on
//! kernels older than 5.13.

use std::io::{self, BufRead};
use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::fsutil::{self, FileReadError};
use crate::parser::{StatParseError, parse_u64};

/// Stall figures for one line of a pressure file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PressureLine {
    /// Share of wall time stalled over the last 10 seconds, in percent.
    pub avg10: f64,
    /// Share of wall time stalled over the last 60 seconds, in percent.
    pub avg60: f64,
    /// Share of wall time stalled over the last 300 seconds, in percent.
    pub avg300: f64,
    /// Total stall time since the cgroup was created.
    pub total: Duration,
}

/// Parsed content of a `*.pressure` file.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pressure {
    /// At least one task was stalled on the resource.
    pub some: PressureLine,
    /// All non-idle tasks were stalled at once. Absent on older kernels for CPU.
    pub full: Option<PressureLine>,
}

impl Pressure {
    /// Parses a pressure file.
    ///
    /// # Errors
    ///
    /// - [`StatParseError::UnexpectedFormat`] for lines that are neither `some` nor `full`.
    /// - [`StatParseError::InvalidFloat`] / [`StatParseError::InvalidKeyValue`] for bad values.
    /// - [`StatParseError::MissingField`] if the `some` line is absent.
    pub fn from_reader<R: BufRead>(buf: &mut R) -> io::Result<Self> {
        let mut some = None;
        let mut full = None;
        let mut line = String::new();
        let mut lineno = 0;

        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            let mut parts = line.split_whitespace();
            let slot = match parts.next() {
                Some("some") => &mut some,
                Some("full") => &mut full,
                None => {
                    line.clear();
                    continue;
                }
                Some(_) => {
                    return Err(StatParseError::UnexpectedFormat {
                        content: line.trim_end().to_string(),
                        line: lineno,
                    }
                    .into());
                }
            };
            *slot = Some(parse_pressure_line(parts, lineno)?);
            line.clear();
        }

        let some = some.ok_or(StatParseError::MissingField { field: "some" })?;
        Ok(Pressure { some, full })
    }
}

fn parse_pressure_line<'a>(
    parts: impl Iterator<Item = &'a str>,
    lineno: usize,
) -> Result<PressureLine, StatParseError> {
    let mut stall = PressureLine::default();

    for part in parts {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let avg = |value: &str| {
            value
                .parse::<f64>()
                .map_err(|source| StatParseError::InvalidFloat {
                    key: key.to_string(),
                    value: value.to_string(),
                    line: lineno,
                    source,
                })
        };
        match key {
            "avg10" => stall.avg10 = avg(value)?,
            "avg60" => stall.avg60 = avg(value)?,
            "avg300" => stall.avg300 = avg(value)?,
            "total" => stall.total = Duration::from_micros(parse_u64(value, lineno)?),
            _ => {}
        }
    }

    Ok(stall)
}

/// Reads a pressure file if the kernel exposes one.
///
/// Returns `Ok(None)` when the file does not exist or PSI was disabled at boot
/// (the file then exists but reading it fails with `EOPNOTSUPP`).
pub fn read_pressure(path: impl AsRef<Path>) -> Result<Option<Pressure>, FileReadError> {
    match fsutil::read_optional_file_with(path.as_ref(), Pressure::from_reader) {
        Err(err) if err.source.raw_os_error() == Some(libc::EOPNOTSUPP) => {
            log::debug!("pressure accounting disabled, skipping {}", err.path.display());
            Ok(None)
        }
        Ok(None) => {
            log::debug!("{} does not exist. Skipping.", path.as_ref().display());
            Ok(None)
        }
        other => other,
    }
}
