use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use super::net::NetworkCounters;
use crate::cgroup::CgroupSnapshot;
use crate::parser::{Handler, KeyValueStat};

/// Scheduling state of a process, the third field of `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Running,
    Sleeping,
    DiskSleep,
    Zombie,
    Stopped,
    TracingStop,
    Dead,
    Idle,
    Parked,
    Unknown(char),
}

impl From<char> for ProcessState {
    fn from(c: char) -> Self {
        match c {
            'R' => ProcessState::Running,
            'S' => ProcessState::Sleeping,
            'D' => ProcessState::DiskSleep,
            'Z' => ProcessState::Zombie,
            'T' => ProcessState::Stopped,
            't' => ProcessState::TracingStop,
            'X' | 'x' => ProcessState::Dead,
            'I' => ProcessState::Idle,
            'P' => ProcessState::Parked,
            other => ProcessState::Unknown(other),
        }
    }
}

/// The cheap part of a process' description, enough to evaluate name filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    /// Command name (`comm`), at most 15 bytes.
    pub name: String,
    pub state: ProcessState,
    pub ppid: u32,
    pub pgid: u32,
    pub num_threads: u64,
    /// Start time in clock ticks after boot. Together with `pid` it tells
    /// a process apart from a later one reusing its PID.
    pub start_time: u64,
}

impl ProcessIdentity {
    /// Returns true if both describe the same process instance.
    pub fn same_process(&self, other: &ProcessIdentity) -> bool {
        self.pid == other.pid && self.start_time == other.start_time
    }
}

/// CPU time of a process, and its utilisation since the previous sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CpuUsage {
    pub user: Duration,
    pub system: Duration,
    pub total: Duration,
    /// Unset until a previous sample of the same process exists.
    pub pct: Option<f64>,
    pub norm_pct: Option<f64>,
}

/// Memory of a process in bytes, from `/proc/<pid>/statm`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MemoryUsage {
    /// Virtual memory size.
    pub size: u64,
    /// Resident set size.
    pub rss: u64,
    /// Resident pages backed by files or shared memory.
    pub share: u64,
    /// `rss` as a fraction of the host's physical memory.
    pub pct: Option<f64>,
}

/// I/O accounting from `/proc/<pid>/io`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IoCounters {
    /// Bytes passed to read-like syscalls, including page cache hits.
    pub rchar: u64,
    pub wchar: u64,
    pub syscr: u64,
    pub syscw: u64,
    /// Bytes fetched from the storage layer.
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub cancelled_write_bytes: u64,
}

static IO_HANDLERS: LazyLock<HashMap<&'static str, Handler<IoCounters>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler<IoCounters>> = HashMap::with_capacity(7);
    m.insert("rchar:", |s, v| s.rchar = v);
    m.insert("wchar:", |s, v| s.wchar = v);
    m.insert("syscr:", |s, v| s.syscr = v);
    m.insert("syscw:", |s, v| s.syscw = v);
    m.insert("read_bytes:", |s, v| s.read_bytes = v);
    m.insert("write_bytes:", |s, v| s.write_bytes = v);
    m.insert("cancelled_write_bytes:", |s, v| s.cancelled_write_bytes = v);
    m
});

impl KeyValueStat for IoCounters {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &IO_HANDLERS
    }
}

/// Storage throughput since the previous sample, from the `read_bytes` and
/// `write_bytes` counters of `/proc/<pid>/io`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IoRate {
    /// Bytes per second.
    pub read_bytes: f64,
    /// Bytes per second.
    pub write_bytes: f64,
}

/// Everything beyond the identity that a platform source reports for a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedMetrics {
    /// Start time read together with the counters, to detect PID reuse
    /// between the identity and extended reads.
    pub start_time: u64,
    pub uid: Option<u32>,
    pub cpu: CpuUsage,
    pub memory: MemoryUsage,
    pub io: Option<IoCounters>,
    pub network: Option<NetworkCounters>,
}

/// One observation of a process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSample {
    #[serde(flatten)]
    pub identity: ProcessIdentity,
    pub uid: Option<u32>,
    pub cpu: CpuUsage,
    pub memory: MemoryUsage,
    /// Command line arguments, possibly carried over from the previous sample.
    pub args: Vec<String>,
    /// `args` joined by spaces.
    pub cmdline: String,
    /// Whitelisted environment variables.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    pub io: Option<IoCounters>,
    pub io_rate: Option<IoRate>,
    pub network: Option<NetworkCounters>,
    pub cgroup: Option<CgroupSnapshot>,
    pub sample_time: SystemTime,
}
