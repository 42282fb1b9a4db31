//! Parser for cgroup v2 `io.stat` files.
//!
//! Each line names one or more block devices by `major:minor` followed by
//! `key=value` counters:
//!
//! ```text
//! 8:0 rbytes=1024 wbytes=2048 rios=12 wios=24 dbytes=0 dios=0
//! 7:7 7:6 7:5 7:4 rbytes=556032 wbytes=0 rios=78 wios=0 dbytes=0 dios=0
//! 7:3 7:2
//! ```
//!
//! The kernel coalesces devices with identical counters onto one line, so every
//! listed device gets its own entry with the same counters. Lines listing
//! devices without any counters are skipped.
//!
//! # Example
//!
//! ```rust
//! use host_telemetry::cgroup::stats::v2::parse_io_stat;
//!
//! let data = "7:7 7:6 rbytes=556032 wbytes=0 rios=78 wios=0\n";
//! let stats = parse_io_stat(&mut data.as_bytes(), |_, _, raw| raw.to_owned()).unwrap();
//! assert_eq!(stats.len(), 2);
//! assert_eq!(stats["7:6"].read.bytes, 556032);
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;

use crate::cgroup::devices::DeviceNames;
use crate::cgroup::stats::pressure::{Pressure, read_pressure};
use crate::fsutil::{self, FileReadError};
use crate::parser::StatParseError;

/// Byte and operation counts for one direction of I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IoMetric {
    pub bytes: u64,
    pub ios: u64,
}

/// Counters for a single block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IoDeviceStat {
    pub read: IoMetric,
    pub write: IoMetric,
    pub discarded: IoMetric,
}

/// Parses `io.stat` into a map keyed by device name.
///
/// `name_of` receives the major and minor number plus the raw token and
/// returns the key to use; see [`DeviceNames::name_or_id`].
///
/// # Errors
///
/// - [`StatParseError::InvalidDevice`] for a device token that is not `major:minor`.
/// - [`StatParseError::InvalidKeyValue`] for a counter that is not a `u64`.
pub fn parse_io_stat<R, F>(buf: &mut R, name_of: F) -> std::io::Result<BTreeMap<String, IoDeviceStat>>
where
    R: BufRead,
    F: Fn(u32, u32, &str) -> String,
{
    let mut stats = BTreeMap::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let mut devices = Vec::new();
        let mut counters = IoDeviceStat::default();
        let mut found_counters = false;

        for token in line.split_whitespace() {
            if let Some((key, value)) = token.split_once('=') {
                found_counters = true;
                let counter =
                    value
                        .parse::<u64>()
                        .map_err(|source| StatParseError::InvalidKeyValue {
                            key: key.to_string(),
                            value: value.to_string(),
                            line: lineno,
                            source,
                        })?;
                match key {
                    "rbytes" => counters.read.bytes = counter,
                    "wbytes" => counters.write.bytes = counter,
                    "rios" => counters.read.ios = counter,
                    "wios" => counters.write.ios = counter,
                    "dbytes" => counters.discarded.bytes = counter,
                    "dios" => counters.discarded.ios = counter,
                    _ => {}
                }
            } else if let Some((major, minor)) = token.split_once(':') {
                let invalid = || StatParseError::InvalidDevice {
                    value: token.to_string(),
                    line: lineno,
                };
                let major = major.parse::<u32>().map_err(|_| invalid())?;
                let minor = minor.parse::<u32>().map_err(|_| invalid())?;
                devices.push(name_of(major, minor, token));
            }
        }

        if found_counters {
            for device in devices {
                stats.insert(device, counters);
            }
        }
        line.clear();
    }

    Ok(stats)
}

/// Everything the v2 `io` controller reports for a cgroup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IoController {
    /// Per-device counters keyed by device name, or `major:minor` if unresolved.
    pub stats: BTreeMap<String, IoDeviceStat>,
    pub pressure: Option<Pressure>,
}

impl IoController {
    pub fn read(dir: &Path, names: &DeviceNames) -> Result<Self, FileReadError> {
        let stats = fsutil::read_file_with(dir.join("io.stat"), |buf| {
            parse_io_stat(buf, |major, minor, raw| names.name_or_id(major, minor, raw))
        })?;
        Ok(IoController {
            stats,
            pressure: read_pressure(dir.join("io.pressure"))?,
        })
    }
}
