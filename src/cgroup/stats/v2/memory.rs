//! Parsers for the cgroup v2 `memory` controller.
//!
//! - `memory.stat`: `key value` lines with byte counts and event counters.
//! - `memory.events`: `key value` lines counting limit breaches.
//! - `memory.current`, `memory.swap.current`: a single byte count.
//! - `memory.max`, `memory.high`, `memory.swap.max`: a byte count or `max`.
//!
//! # Examples
//!
//! ```rust
//! use host_telemetry::cgroup::stats::v2::MemoryStat;
//! use host_telemetry::parser::KeyValueStat;
//!
//! let stat = MemoryStat::from_reader(&mut "anon 1000\nfile 2000\n".as_bytes()).unwrap();
//! assert_eq!(stat.anon, 1000);
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::Serialize;

use crate::cgroup::stats::pressure::{Pressure, read_pressure};
use crate::fsutil::{self, FileReadError};
use crate::parser::{self, Handler, KeyValueStat};

/// Parsed `memory.stat`. Sizes are in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MemoryStat {
    /// Anonymous memory.
    pub anon: u64,
    /// File-backed memory, including tmpfs and shared memory.
    pub file: u64,
    /// Kernel stack memory.
    pub kernel_stack: u64,
    /// Page tables.
    pub pagetables: u64,
    /// Slab memory (used for kernel object caches).
    pub slab: u64,
    /// Socket memory usage.
    pub sock: u64,
    /// Shared memory.
    pub shmem: u64,
    /// Mapped file memory.
    pub file_mapped: u64,
    /// File memory that is modified but not yet written back.
    pub file_dirty: u64,
    /// File memory currently being written back.
    pub file_writeback: u64,
    pub active_anon: u64,
    pub inactive_anon: u64,
    pub active_file: u64,
    pub inactive_file: u64,
    pub unevictable: u64,
    /// Total page faults.
    pub pgfault: u64,
    /// Page faults that required disk I/O.
    pub pgmajfault: u64,
}

impl MemoryStat {
    fn set_anon(&mut self, v: u64) {
        self.anon = v;
    }

    fn set_file(&mut self, v: u64) {
        self.file = v;
    }

    fn set_kernel_stack(&mut self, v: u64) {
        self.kernel_stack = v;
    }

    fn set_pagetables(&mut self, v: u64) {
        self.pagetables = v;
    }

    fn set_slab(&mut self, v: u64) {
        self.slab = v;
    }

    fn set_sock(&mut self, v: u64) {
        self.sock = v;
    }

    fn set_shmem(&mut self, v: u64) {
        self.shmem = v;
    }

    fn set_file_mapped(&mut self, v: u64) {
        self.file_mapped = v;
    }

    fn set_file_dirty(&mut self, v: u64) {
        self.file_dirty = v;
    }

    fn set_file_writeback(&mut self, v: u64) {
        self.file_writeback = v;
    }
}

static SETTERS: LazyLock<HashMap<&'static str, Handler<MemoryStat>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler<MemoryStat>> = HashMap::with_capacity(17);

    m.insert("anon", MemoryStat::set_anon);
    m.insert("file", MemoryStat::set_file);
    m.insert("kernel_stack", MemoryStat::set_kernel_stack);
    m.insert("pagetables", MemoryStat::set_pagetables);
    m.insert("slab", MemoryStat::set_slab);
    m.insert("sock", MemoryStat::set_sock);
    m.insert("shmem", MemoryStat::set_shmem);
    m.insert("file_mapped", MemoryStat::set_file_mapped);
    m.insert("file_dirty", MemoryStat::set_file_dirty);
    m.insert("file_writeback", MemoryStat::set_file_writeback);
    m.insert("active_anon", |s, v| s.active_anon = v);
    m.insert("inactive_anon", |s, v| s.inactive_anon = v);
    m.insert("active_file", |s, v| s.active_file = v);
    m.insert("inactive_file", |s, v| s.inactive_file = v);
    m.insert("unevictable", |s, v| s.unevictable = v);
    m.insert("pgfault", |s, v| s.pgfault = v);
    m.insert("pgmajfault", |s, v| s.pgmajfault = v);

    m
});

impl KeyValueStat for MemoryStat {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &SETTERS
    }
}

/// Parsed `memory.events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryEvents {
    /// Times usage fell under `memory.low` protection while reclaiming.
    pub low: u64,
    /// Times usage exceeded `memory.high` and the cgroup was throttled.
    pub high: u64,
    /// Times usage was about to exceed `memory.max`.
    pub max: u64,
    /// Times the OOM killer was invoked.
    pub oom: u64,
    /// Processes killed by the OOM killer.
    pub oom_kill: u64,
}

static EVENT_HANDLERS: LazyLock<HashMap<&'static str, Handler<MemoryEvents>>> =
    LazyLock::new(|| {
        let mut m: HashMap<&'static str, Handler<MemoryEvents>> = HashMap::with_capacity(5);
        m.insert("low", |s, v| s.low = v);
        m.insert("high", |s, v| s.high = v);
        m.insert("max", |s, v| s.max = v);
        m.insert("oom", |s, v| s.oom = v);
        m.insert("oom_kill", |s, v| s.oom_kill = v);
        m
    });

impl KeyValueStat for MemoryEvents {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &EVENT_HANDLERS
    }
}

/// Everything the v2 `memory` controller reports for a cgroup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryController {
    /// Current usage in bytes (`memory.current`).
    pub usage: u64,
    /// Hard limit (`memory.max`), `None` when unlimited.
    pub limit: Option<u64>,
    /// Throttling threshold (`memory.high`), `None` when unlimited.
    pub high: Option<u64>,
    /// Swap usage (`memory.swap.current`), absent without swap accounting.
    pub swap_usage: Option<u64>,
    /// Swap limit (`memory.swap.max`), `None` when unlimited or not accounted.
    pub swap_limit: Option<u64>,
    pub stats: MemoryStat,
    pub events: Option<MemoryEvents>,
    pub pressure: Option<Pressure>,
}

impl MemoryController {
    /// Reads the memory controller files of a cgroup directory.
    ///
    /// `memory.current` and `memory.stat` are required; the rest is optional.
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        let usage = fsutil::read_file_with(dir.join("memory.current"), parser::read_u64)?;
        let stats = fsutil::read_file_with(dir.join("memory.stat"), MemoryStat::from_reader)?;
        let limit = fsutil::read_optional_file_with(dir.join("memory.max"), parser::read_limit)?;
        let high = fsutil::read_optional_file_with(dir.join("memory.high"), parser::read_limit)?;
        let swap_usage =
            fsutil::read_optional_file_with(dir.join("memory.swap.current"), parser::read_u64)?;
        let swap_limit =
            fsutil::read_optional_file_with(dir.join("memory.swap.max"), parser::read_limit)?;
        let events =
            fsutil::read_optional_file_with(dir.join("memory.events"), MemoryEvents::from_reader)?;

        Ok(MemoryController {
            usage,
            limit: limit.flatten(),
            high: high.flatten(),
            swap_usage,
            swap_limit: swap_limit.flatten(),
            stats,
            events,
            pressure: read_pressure(dir.join("memory.pressure"))?,
        })
    }
}
