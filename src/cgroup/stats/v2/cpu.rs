//! Parsers for the cgroup v2 `cpu` controller.
//!
//! - `cpu.stat` holds whitespace separated `key value` lines, with times in
//!   microseconds. It exists in every cgroup, even without the `cpu` controller
//!   enabled, in which case only the `usage_usec`, `user_usec` and `system_usec`
//!   keys are present.
//! - `cpu.max` holds a single `<quota> <period>` line where the quota may be `max`.
//! - `cpu.weight` holds a single integer in `[1, 10000]`.
//!
//! All times are converted to [`Duration`] while parsing.
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use host_telemetry::cgroup::stats::v2::{CpuLimit, CpuStat};
//! use host_telemetry::parser::{KeyValueStat, SingleLineStat};
//!
//! let data = "usage_usec 1000000\nuser_usec 600000\nsystem_usec 400000\n";
//! let cpu_stat = CpuStat::from_reader(&mut data.as_bytes()).unwrap();
//! assert_eq!(cpu_stat.usage, Duration::from_secs(1));
//!
//! let cpu_limit = CpuLimit::from_reader(&mut "max 100000\n".as_bytes()).unwrap();
//! assert_eq!(cpu_limit.quota, None);
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;

use crate::cgroup::stats::pressure::{Pressure, read_pressure};
use crate::fsutil::{self, FileReadError};
use crate::parser::{self, Handler, KeyValueStat, SingleLineStat, parse_limit, parse_u64};

/// Parsed `cpu.stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CpuStat {
    /// CPU time consumed by the cgroup (user + system).
    pub usage: Duration,
    /// CPU time spent in user space.
    pub user: Duration,
    /// CPU time spent in kernel space.
    pub system: Duration,
    /// Number of enforcement periods that have elapsed.
    pub nr_periods: u64,
    /// Number of periods in which the cgroup was throttled.
    pub nr_throttled: u64,
    /// Total time the cgroup was throttled.
    pub throttled: Duration,
    /// Number of periods in which a burst occurred.
    pub nr_bursts: u64,
    /// Total time spent bursting beyond the quota.
    pub burst: Duration,
}

static HANDLERS: LazyLock<HashMap<&'static str, Handler<CpuStat>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler<CpuStat>> = HashMap::with_capacity(8);

    m.insert("usage_usec", |s, v| s.usage = Duration::from_micros(v));
    m.insert("user_usec", |s, v| s.user = Duration::from_micros(v));
    m.insert("system_usec", |s, v| s.system = Duration::from_micros(v));
    m.insert("nr_periods", |s, v| s.nr_periods = v);
    m.insert("nr_throttled", |s, v| s.nr_throttled = v);
    m.insert("throttled_usec", |s, v| s.throttled = Duration::from_micros(v));
    m.insert("nr_bursts", |s, v| s.nr_bursts = v);
    m.insert("burst_usec", |s, v| s.burst = Duration::from_micros(v));

    m
});

impl KeyValueStat for CpuStat {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &HANDLERS
    }
}

/// Bandwidth limit from `cpu.max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuLimit {
    /// Maximum CPU time per period, `None` when unlimited (`max`).
    pub quota: Option<Duration>,
    /// Length of each enforcement period. Defaults to 100ms if omitted.
    pub period: Duration,
}

const DEFAULT_PERIOD: Duration = Duration::from_micros(100_000);

impl Default for CpuLimit {
    fn default() -> Self {
        Self {
            quota: None,
            period: DEFAULT_PERIOD,
        }
    }
}

impl SingleLineStat for CpuLimit {
    /// Parses a `cpu.max` line of the form `<quota|max> [period]`.
    ///
    /// An empty file yields the kernel default (no quota, 100ms period).
    ///
    /// # Errors
    ///
    /// [`parser::StatParseError::InvalidValue`] if the quota or period is not a number.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let mut parts = line.split_whitespace();

        let quota = parts
            .next()
            .map(|quota| parse_limit(quota, 1))
            .transpose()?
            .flatten()
            .map(Duration::from_micros);
        let period = parts
            .next()
            .map(|period| parse_u64(period, 1))
            .transpose()?
            .map_or(DEFAULT_PERIOD, Duration::from_micros);

        Ok(CpuLimit { quota, period })
    }
}

/// Everything the v2 `cpu` controller reports for a cgroup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuController {
    pub stats: CpuStat,
    /// `None` if the `cpu` controller is not enabled for the cgroup.
    pub limit: Option<CpuLimit>,
    /// Relative share (`cpu.weight`).
    pub weight: Option<u64>,
    pub pressure: Option<Pressure>,
}

impl CpuController {
    /// Reads `cpu.stat` and the optional `cpu.max`, `cpu.weight` and `cpu.pressure`.
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        Ok(CpuController {
            stats: fsutil::read_file_with(dir.join("cpu.stat"), CpuStat::from_reader)?,
            limit: fsutil::read_optional_file_with(dir.join("cpu.max"), CpuLimit::from_reader)?,
            weight: fsutil::read_optional_file_with(dir.join("cpu.weight"), parser::read_u64)?,
            pressure: read_pressure(dir.join("cpu.pressure"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{StatParseError, extract_stat_parse_error};

    #[test]
    fn test_parse_empty_cpu_stat() {
        let stat = CpuStat::from_reader(&mut "".as_bytes()).unwrap();
        assert_eq!(stat, CpuStat::default());
    }

    #[test]
    fn test_parse_complete_cpu_stat() {
        let data = "\
usage_usec 623932088000
user_usec 421230248000
system_usec 202701840000
nr_periods 10
nr_throttled 2
throttled_usec 50000
nr_bursts 0
burst_usec 0
";
        let stat = CpuStat::from_reader(&mut data.as_bytes()).unwrap();

        assert_eq!(stat.usage, Duration::from_micros(623_932_088_000));
        assert_eq!(stat.user, Duration::from_micros(421_230_248_000));
        assert_eq!(stat.system, Duration::from_micros(202_701_840_000));
        assert_eq!(stat.nr_periods, 10);
        assert_eq!(stat.nr_throttled, 2);
        assert_eq!(stat.throttled, Duration::from_millis(50));
    }

    #[test]
    fn test_parse_invalid_cpu_stat() {
        let data = "\
invalid_line
usage_usec abc
user_usec 42
";
        let err = CpuStat::from_reader(&mut data.as_bytes()).unwrap_err();

        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidKeyValue {
                key, value, line, ..
            } => {
                assert_eq!(key, "usage_usec");
                assert_eq!(value, "abc");
                assert_eq!(*line, 2);
            }
            _ => panic!("Expected InvalidKeyValue error"),
        }
    }

    #[test]
    fn test_duplicate_field_errors() {
        let data = "usage_usec 100\nusage_usec 200\n";
        let err = CpuStat::from_reader(&mut data.as_bytes()).unwrap_err();
        match extract_stat_parse_error(&err) {
            StatParseError::DuplicateField { field, line } => {
                assert_eq!(field, "usage_usec");
                assert_eq!(*line, 2);
            }
            _ => panic!("Expected DuplicateField error"),
        }
    }

    #[test]
    fn test_parse_cpu_limit() {
        let limit = CpuLimit::from_reader(&mut "50000 100000\n".as_bytes()).unwrap();
        assert_eq!(limit.quota, Some(Duration::from_millis(50)));
        assert_eq!(limit.period, Duration::from_millis(100));

        let limit = CpuLimit::from_reader(&mut "max 250000".as_bytes()).unwrap();
        assert_eq!(limit.quota, None);
        assert_eq!(limit.period, Duration::from_millis(250));
    }

    #[test]
    fn test_parse_cpu_limit_defaults() {
        assert_eq!(
            CpuLimit::from_reader(&mut "".as_bytes()).unwrap(),
            CpuLimit::default()
        );
        let limit = CpuLimit::from_reader(&mut "max".as_bytes()).unwrap();
        assert_eq!(limit.period, DEFAULT_PERIOD);
    }

    #[test]
    fn test_parse_cpu_limit_garbage() {
        let err = CpuLimit::from_reader(&mut "lots 100000".as_bytes()).unwrap_err();
        assert!(matches!(
            extract_stat_parse_error(&err),
            StatParseError::InvalidValue { .. }
        ));
    }

    #[test]
    fn test_read_controller_without_cpu_enabled() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("cpu.stat"),
            "usage_usec 10\nuser_usec 6\nsystem_usec 4\n",
        )
        .unwrap();

        let cpu = CpuController::read(dir.path()).unwrap();
        assert_eq!(cpu.stats.usage, Duration::from_micros(10));
        assert!(cpu.limit.is_none());
        assert!(cpu.weight.is_none());
        assert!(cpu.pressure.is_none());
    }
}
