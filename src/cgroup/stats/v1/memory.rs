use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use serde::Serialize;

use crate::fsutil::{self, FileReadError};
use crate::parser::{self, Handler, KeyValueStat};

/// Usage counters shared by the `memory`, `memory.memsw` and `memory.kmem`
/// file families. All values in bytes except `failcnt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MemoryCounters {
    pub usage: u64,
    pub max_usage: Option<u64>,
    /// The kernel reports a page-aligned `i64::MAX` when no limit is set.
    pub limit: Option<u64>,
    pub failcnt: Option<u64>,
}

impl MemoryCounters {
    /// Reads `<prefix>.usage_in_bytes` and its siblings. Returns `Ok(None)` if
    /// the family is not accounted (e.g. swap accounting disabled).
    fn read(dir: &Path, prefix: &str) -> Result<Option<Self>, FileReadError> {
        let file = |name: &str| dir.join(format!("{prefix}.{name}"));

        let Some(usage) = fsutil::read_optional_file_with(file("usage_in_bytes"), parser::read_u64)?
        else {
            return Ok(None);
        };
        Ok(Some(MemoryCounters {
            usage,
            max_usage: fsutil::read_optional_file_with(
                file("max_usage_in_bytes"),
                parser::read_u64,
            )?,
            limit: fsutil::read_optional_file_with(file("limit_in_bytes"), parser::read_u64)?,
            failcnt: fsutil::read_optional_file_with(file("failcnt"), parser::read_u64)?,
        }))
    }
}

/// Parsed v1 `memory.stat`. Page counts for `pgfault`/`pgmajfault`, bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MemoryStat {
    pub cache: u64,
    pub rss: u64,
    pub rss_huge: u64,
    pub shmem: u64,
    pub mapped_file: u64,
    pub dirty: u64,
    pub writeback: u64,
    pub swap: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub active_anon: u64,
    pub inactive_anon: u64,
    pub active_file: u64,
    pub inactive_file: u64,
    pub unevictable: u64,
    pub hierarchical_memory_limit: u64,
    /// `total_*` values include all descendant cgroups.
    pub total_cache: u64,
    pub total_rss: u64,
}

static HANDLERS: LazyLock<HashMap<&'static str, Handler<MemoryStat>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler<MemoryStat>> = HashMap::with_capacity(18);

    m.insert("cache", |s, v| s.cache = v);
    m.insert("rss", |s, v| s.rss = v);
    m.insert("rss_huge", |s, v| s.rss_huge = v);
    m.insert("shmem", |s, v| s.shmem = v);
    m.insert("mapped_file", |s, v| s.mapped_file = v);
    m.insert("dirty", |s, v| s.dirty = v);
    m.insert("writeback", |s, v| s.writeback = v);
    m.insert("swap", |s, v| s.swap = v);
    m.insert("pgfault", |s, v| s.pgfault = v);
    m.insert("pgmajfault", |s, v| s.pgmajfault = v);
    m.insert("active_anon", |s, v| s.active_anon = v);
    m.insert("inactive_anon", |s, v| s.inactive_anon = v);
    m.insert("active_file", |s, v| s.active_file = v);
    m.insert("inactive_file", |s, v| s.inactive_file = v);
    m.insert("unevictable", |s, v| s.unevictable = v);
    m.insert("hierarchical_memory_limit", |s, v| {
        s.hierarchical_memory_limit = v
    });
    m.insert("total_cache", |s, v| s.total_cache = v);
    m.insert("total_rss", |s, v| s.total_rss = v);

    m
});

impl KeyValueStat for MemoryStat {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &HANDLERS
    }
}

/// The v1 `memory` subsystem of a cgroup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryController {
    pub mem: MemoryCounters,
    /// Memory plus swap, present with swap accounting enabled.
    pub memsw: Option<MemoryCounters>,
    /// Kernel memory, absent on kernels that dropped `kmem` accounting.
    pub kmem: Option<MemoryCounters>,
    pub stats: MemoryStat,
}

impl MemoryController {
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        let mem = MemoryCounters::read(dir, "memory")?.ok_or_else(|| FileReadError {
            path: dir.join("memory.usage_in_bytes"),
            source: std::io::ErrorKind::NotFound.into(),
        })?;
        Ok(MemoryController {
            mem,
            memsw: MemoryCounters::read(dir, "memory.memsw")?,
            kmem: MemoryCounters::read(dir, "memory.kmem")?,
            stats: fsutil::read_file_with(dir.join("memory.stat"), MemoryStat::from_reader)?,
        })
    }
}
