use std::time::Duration;

use serde::Serialize;

use super::CgroupVersion;
use super::stats::{PidsStats, v1, v2};
use crate::delta::{self, CpuPercent};

/// Controllers read from the v1 subsystem hierarchies. A subsystem that is not
/// mounted, not joined, or failed to read is `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct V1Controllers {
    pub cpu: Option<v1::CpuController>,
    pub cpuacct: Option<v1::CpuacctController>,
    pub memory: Option<v1::MemoryController>,
    pub blkio: Option<v1::BlkioController>,
    pub pids: Option<PidsStats>,
}

/// Controllers read from a cgroup directory of the unified hierarchy.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct V2Controllers {
    pub cpu: Option<v2::CpuController>,
    pub memory: Option<v2::MemoryController>,
    pub io: Option<v2::IoController>,
    pub pids: Option<PidsStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Controllers {
    V1(V1Controllers),
    V2(V2Controllers),
}

/// Accounting data of the cgroup a process belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CgroupSnapshot {
    /// Last component of `path`, e.g. a container ID. Empty for the root cgroup.
    pub id: String,
    /// Path of the cgroup relative to its hierarchy's root.
    pub path: String,
    pub version: CgroupVersion,
    pub controllers: Controllers,
    /// CPU utilisation of the whole cgroup since the previous sample.
    pub cpu_usage: Option<CpuPercent>,
}

impl CgroupSnapshot {
    pub fn new(path: String, controllers: Controllers) -> Self {
        let version = match controllers {
            Controllers::V1(_) => CgroupVersion::V1,
            Controllers::V2(_) => CgroupVersion::V2,
        };
        Self {
            id: super::resolver::cgroup_id(&path).to_owned(),
            path,
            version,
            controllers,
            cpu_usage: None,
        }
    }

    /// Cumulative CPU time of the cgroup: `cpuacct.usage` on v1, the
    /// `usage_usec` of `cpu.stat` on v2.
    pub fn cpu_time(&self) -> Option<Duration> {
        match &self.controllers {
            Controllers::V1(c) => c.cpuacct.as_ref().map(|acct| acct.total),
            Controllers::V2(c) => c.cpu.as_ref().map(|cpu| cpu.stats.usage),
        }
    }

    /// Fills [`CgroupSnapshot::cpu_usage`] from an earlier snapshot of the same cgroup.
    ///
    /// Nothing is filled if `previous` belongs to a different cgroup or either
    /// snapshot lacks CPU accounting.
    pub fn fill_cpu_usage(&mut self, previous: &CgroupSnapshot, elapsed: Duration, num_cpus: usize) {
        if previous.path != self.path || previous.version != self.version {
            return;
        }
        if let (Some(prev), Some(cur)) = (previous.cpu_time(), self.cpu_time()) {
            self.cpu_usage = delta::cpu_percent(prev, cur, elapsed, num_cpus);
        }
    }
}
