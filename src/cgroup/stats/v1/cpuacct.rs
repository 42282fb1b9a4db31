//! Parsers for the v1 `cpuacct` subsystem.
//!
//! `cpuacct.usage` and `cpuacct.usage_percpu` report nanoseconds,
//! `cpuacct.stat` reports `user` and `system` in clock ticks.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use serde::Serialize;

use crate::fsutil::{self, FileReadError};
use crate::host::ticks_to_duration;
use crate::parser::{self, Handler, KeyValueStat, SingleLineStat, parse_u64};

/// User and system split from `cpuacct.stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CpuacctStat {
    pub user: Duration,
    pub system: Duration,
}

static STAT_HANDLERS: LazyLock<HashMap<&'static str, Handler<CpuacctStat>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Handler<CpuacctStat>> = HashMap::with_capacity(2);
        m.insert("user", |s, v| s.user = ticks_to_duration(v));
        m.insert("system", |s, v| s.system = ticks_to_duration(v));
        m
    });

impl KeyValueStat for CpuacctStat {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &STAT_HANDLERS
    }
}

/// Per-CPU usage from `cpuacct.usage_percpu`, indexed by CPU number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PerCpuUsage(pub Vec<Duration>);

impl SingleLineStat for PerCpuUsage {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let usage = line
            .split_whitespace()
            .map(|ns| parse_u64(ns, 1).map(Duration::from_nanos))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PerCpuUsage(usage))
    }
}

/// The v1 `cpuacct` subsystem of a cgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CpuacctController {
    /// Total CPU time consumed by all tasks (`cpuacct.usage`).
    pub total: Duration,
    pub stats: Option<CpuacctStat>,
    pub per_cpu: Option<PerCpuUsage>,
}

impl CpuacctController {
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        let total = fsutil::read_file_with(dir.join("cpuacct.usage"), parser::read_u64)?;
        Ok(CpuacctController {
            total: Duration::from_nanos(total),
            stats: fsutil::read_optional_file_with(
                dir.join("cpuacct.stat"),
                CpuacctStat::from_reader,
            )?,
            per_cpu: fsutil::read_optional_file_with(
                dir.join("cpuacct.usage_percpu"),
                PerCpuUsage::from_reader,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CLOCK_TICKS;
    use crate::parser::{StatParseError, extract_stat_parse_error};

    #[test]
    fn test_parse_per_cpu_usage() {
        let data = "26772846 1000000000 0 \n";
        let usage = PerCpuUsage::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(
            usage.0,
            vec![
                Duration::from_nanos(26_772_846),
                Duration::from_secs(1),
                Duration::ZERO
            ]
        );
    }

    #[test]
    fn test_parse_invalid_per_cpu_usage() {
        let err = PerCpuUsage::from_reader(&mut "12 x 3\n".as_bytes()).unwrap_err();
        match extract_stat_parse_error(&err) {
            StatParseError::InvalidValue { value, .. } => assert_eq!(value, "x"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_read_controller() {
        let hz = *CLOCK_TICKS;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cpuacct.usage"), "2000000000\n").unwrap();
        std::fs::write(
            dir.path().join("cpuacct.stat"),
            format!("user {}\nsystem {}\n", hz * 2, hz),
        )
        .unwrap();

        let cpuacct = CpuacctController::read(dir.path()).unwrap();
        assert_eq!(cpuacct.total, Duration::from_secs(2));
        let stats = cpuacct.stats.unwrap();
        assert_eq!(stats.user, Duration::from_secs(2));
        assert_eq!(stats.system, Duration::from_secs(1));
        assert!(cpuacct.per_cpu.is_none());
    }
}
