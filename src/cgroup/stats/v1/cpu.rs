use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;

use crate::fsutil::{self, FileReadError};
use crate::parser::{self, Handler, KeyValueStat};

/// Completely Fair Scheduler settings of a v1 `cpu` cgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CfsStats {
    /// Enforcement period (`cpu.cfs_period_us`).
    pub period: Option<Duration>,
    /// CPU time allowed per period (`cpu.cfs_quota_us`), `None` when unlimited (`-1`).
    pub quota: Option<Duration>,
    /// Relative share (`cpu.shares`).
    pub shares: u64,
}

/// Throttling counters from a v1 `cpu.stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ThrottleStats {
    pub nr_periods: u64,
    pub nr_throttled: u64,
    /// Total time the cgroup was throttled (`throttled_time`, nanoseconds).
    pub throttled: Duration,
}

static THROTTLE_HANDLERS: LazyLock<HashMap<&'static str, Handler<ThrottleStats>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Handler<ThrottleStats>> = HashMap::with_capacity(3);
        m.insert("nr_periods", |s, v| s.nr_periods = v);
        m.insert("nr_throttled", |s, v| s.nr_throttled = v);
        m.insert("throttled_time", |s, v| s.throttled = Duration::from_nanos(v));
        m
    });

impl KeyValueStat for ThrottleStats {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &THROTTLE_HANDLERS
    }
}

/// The v1 `cpu` subsystem of a cgroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuController {
    pub cfs: CfsStats,
    pub throttling: Option<ThrottleStats>,
}

impl CpuController {
    /// Reads `cpu.shares` plus the optional CFS bandwidth files and `cpu.stat`.
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        let shares = fsutil::read_file_with(dir.join("cpu.shares"), parser::read_u64)?;
        let period =
            fsutil::read_optional_file_with(dir.join("cpu.cfs_period_us"), parser::read_u64)?;
        let quota =
            fsutil::read_optional_file_with(dir.join("cpu.cfs_quota_us"), parser::read_i64)?;
        let throttling =
            fsutil::read_optional_file_with(dir.join("cpu.stat"), ThrottleStats::from_reader)?;

        Ok(CpuController {
            cfs: CfsStats {
                period: period.map(Duration::from_micros),
                quota: quota
                    .and_then(|quota| u64::try_from(quota).ok())
                    .map(Duration::from_micros),
                shares,
            },
            throttling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_throttle_stats() {
        let data = "nr_periods 120\nnr_throttled 7\nthrottled_time 1500000000\n";
        let stats = ThrottleStats::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(stats.nr_periods, 120);
        assert_eq!(stats.nr_throttled, 7);
        assert_eq!(stats.throttled, Duration::from_millis(1500));
    }

    #[test]
    fn test_read_unlimited_quota() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.shares"), "1024\n").unwrap();
        std::fs::write(dir.path().join("cpu.cfs_period_us"), "100000\n").unwrap();
        std::fs::write(dir.path().join("cpu.cfs_quota_us"), "-1\n").unwrap();

        let cpu = CpuController::read(dir.path()).unwrap();
        assert_eq!(cpu.cfs.shares, 1024);
        assert_eq!(cpu.cfs.period, Some(Duration::from_millis(100)));
        assert_eq!(cpu.cfs.quota, None);
        assert!(cpu.throttling.is_none());
    }

    #[test]
    fn test_read_quota() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpu.shares"), "512\n").unwrap();
        std::fs::write(dir.path().join("cpu.cfs_quota_us"), "50000\n").unwrap();

        let cpu = CpuController::read(dir.path()).unwrap();
        assert_eq!(cpu.cfs.quota, Some(Duration::from_millis(50)));
        assert_eq!(cpu.cfs.period, None);
    }
}
