use std::collections::BTreeMap;

use super::Result;
use super::filter::ProcessFilter;
use super::types::{ExtendedMetrics, ProcessIdentity};

/// Operating system specific access to the process table.
///
/// The sampler only talks to this trait, so one implementation per target
/// platform can be chosen at startup. [`super::ProcfsSource`] is the Linux one.
pub trait PlatformProcessSource {
    /// Lists the IDs of all running processes.
    fn list_pids(&self) -> Result<Vec<u32>>;

    /// Reads the minimal description of `pid` needed to evaluate filters.
    ///
    /// Fails with [`super::Error::ProcessNotFound`] if the process is gone.
    fn identity(&self, pid: u32) -> Result<ProcessIdentity>;

    /// Reads CPU, memory, I/O and, if `network` is set, network counters.
    fn extended(
        &self,
        pid: u32,
        identity: &ProcessIdentity,
        network: bool,
    ) -> Result<ExtendedMetrics>;

    /// Reads the command line arguments of `pid`. Empty if they are not
    /// readable or the process is a kernel thread.
    fn args(&self, pid: u32) -> Result<Vec<String>>;

    /// Reads the environment variables of `pid` whose name matches `whitelist`.
    fn environ(&self, pid: u32, whitelist: &ProcessFilter) -> Result<BTreeMap<String, String>>;

    /// The PID of the calling process as seen by this source.
    fn self_pid(&self) -> Result<u32>;

    /// Total physical memory of the host in bytes.
    fn host_memory_total(&self) -> Result<u64>;

    /// Number of online CPUs.
    fn num_cpus(&self) -> Result<usize>;
}
