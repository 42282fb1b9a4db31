//! Host-wide facts needed to turn raw counters into percentages.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::fsutil::{self, FileReadError};
use crate::parser::{Handler, KeyValueStat, StatParseError};

fn sysconf(name: libc::c_int, fallback: u64) -> u64 {
    // SAFETY: sysconf has no preconditions and returns -1 for unknown names.
    let value = unsafe { libc::sysconf(name) };
    u64::try_from(value).ok().filter(|v| *v > 0).unwrap_or(fallback)
}

/// Kernel clock ticks per second (`USER_HZ`), the unit of `/proc/<pid>/stat` times.
pub static CLOCK_TICKS: LazyLock<u64> = LazyLock::new(|| sysconf(libc::_SC_CLK_TCK, 100));

/// Size of a memory page in bytes, the unit of `/proc/<pid>/statm`.
pub static PAGE_SIZE: LazyLock<u64> = LazyLock::new(|| sysconf(libc::_SC_PAGESIZE, 4096));

/// Converts a count of clock ticks into a [`Duration`].
pub fn ticks_to_duration(ticks: u64) -> Duration {
    let hz = *CLOCK_TICKS;
    let secs = ticks / hz;
    let rem = ticks % hz;
    Duration::from_secs(secs) + Duration::from_nanos(rem * 1_000_000_000 / hz)
}

/// The subset of `/proc/meminfo` this crate uses. Values are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfo {
    pub total: u64,
    pub available: u64,
}

static MEMINFO_HANDLERS: LazyLock<HashMap<&'static str, Handler<MemInfo>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Handler<MemInfo>> = HashMap::with_capacity(2);
        m.insert("MemTotal:", |s, v| s.total = v.saturating_mul(1024));
        m.insert("MemAvailable:", |s, v| s.available = v.saturating_mul(1024));
        m
    });

impl KeyValueStat for MemInfo {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &MEMINFO_HANDLERS
    }
}

/// Reads total physical memory in bytes from `<rootfs>/proc/meminfo`.
pub fn read_mem_total(rootfs: &Path) -> Result<u64, FileReadError> {
    let path = fsutil::host_path(rootfs, "/proc/meminfo");
    fsutil::read_file_with(&path, |buf| {
        let info = MemInfo::from_reader(buf)?;
        if info.total == 0 {
            return Err(StatParseError::MissingField { field: "MemTotal" }.into());
        }
        Ok(info.total)
    })
}

/// Counts the `cpuN` lines of `/proc/stat`.
fn count_cpus<R: BufRead>(buf: &mut R) -> std::io::Result<usize> {
    let mut count = 0;
    for line in buf.lines() {
        let line = line?;
        let Some(rest) = line.strip_prefix("cpu") else {
            continue;
        };
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            count += 1;
        }
    }
    if count == 0 {
        return Err(StatParseError::MissingField { field: "cpu0" }.into());
    }
    Ok(count)
}

/// Reads the number of online CPUs from `<rootfs>/proc/stat`.
pub fn read_num_cpus(rootfs: &Path) -> Result<usize, FileReadError> {
    fsutil::read_file_with(fsutil::host_path(rootfs, "/proc/stat"), count_cpus)
}
