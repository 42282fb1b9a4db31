//! Parser for the v1 `blkio` throttle files.
//!
//! `blkio.throttle.io_service_bytes` and `blkio.throttle.io_serviced` share
//! one layout, an operation per line and a grand total at the end:
//!
//! ```text
//! 8:0 Read 1024
//! 8:0 Write 2048
//! 8:0 Sync 3072
//! 8:0 Async 0
//! 8:0 Discard 0
//! 8:0 Total 3072
//! Total 3072
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::Serialize;

use crate::cgroup::devices::DeviceNames;
use crate::cgroup::stats::v2::IoMetric;
use crate::fsutil::{self, FileReadError};
use crate::parser::{StatParseError, parse_u64};

/// Values of one throttle file for a single device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct DeviceOps {
    read: u64,
    write: u64,
    total: u64,
}

fn parse_throttle_file<R: BufRead>(
    buf: &mut R,
    names: &DeviceNames,
) -> std::io::Result<BTreeMap<String, DeviceOps>> {
    let mut devices: BTreeMap<String, DeviceOps> = BTreeMap::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] | ["Total", _] => {}
            [device, op, value] => {
                let invalid = || StatParseError::InvalidDevice {
                    value: device.to_string(),
                    line: lineno,
                };
                let (major, minor) = device.split_once(':').ok_or_else(invalid)?;
                let major = major.parse::<u32>().map_err(|_| invalid())?;
                let minor = minor.parse::<u32>().map_err(|_| invalid())?;
                let value = parse_u64(value, lineno)?;

                let ops = devices
                    .entry(names.name_or_id(major, minor, device))
                    .or_default();
                match *op {
                    "Read" => ops.read = value,
                    "Write" => ops.write = value,
                    "Total" => ops.total = value,
                    _ => {}
                }
            }
            _ => {
                return Err(StatParseError::UnexpectedFormat {
                    content: line.trim_end().to_string(),
                    line: lineno,
                }
                .into());
            }
        }
        line.clear();
    }

    Ok(devices)
}

/// Throttled I/O of one block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BlkioDeviceStat {
    pub read: IoMetric,
    pub write: IoMetric,
    pub total: IoMetric,
}

/// The v1 `blkio` subsystem of a cgroup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BlkioController {
    /// Sum over all devices.
    pub total: IoMetric,
    pub devices: BTreeMap<String, BlkioDeviceStat>,
}

impl BlkioController {
    /// Reads `blkio.throttle.io_service_bytes` and `blkio.throttle.io_serviced`.
    pub fn read(dir: &Path, names: &DeviceNames) -> Result<Self, FileReadError> {
        let bytes = fsutil::read_file_with(dir.join("blkio.throttle.io_service_bytes"), |buf| {
            parse_throttle_file(buf, names)
        })?;
        let ios = fsutil::read_file_with(dir.join("blkio.throttle.io_serviced"), |buf| {
            parse_throttle_file(buf, names)
        })?;

        let mut blkio = BlkioController::default();
        for (device, ops) in bytes {
            let entry = blkio.devices.entry(device).or_default();
            entry.read.bytes = ops.read;
            entry.write.bytes = ops.write;
            entry.total.bytes = ops.total;
        }
        for (device, ops) in ios {
            let entry = blkio.devices.entry(device).or_default();
            entry.read.ios = ops.read;
            entry.write.ios = ops.write;
            entry.total.ios = ops.total;
        }
        for device in blkio.devices.values() {
            blkio.total.bytes += device.total.bytes;
            blkio.total.ios += device.total.ios;
        }

        Ok(blkio)
    }
}
