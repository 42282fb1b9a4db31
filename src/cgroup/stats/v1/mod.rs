//! Controller files of the per-subsystem cgroup v1 hierarchies.

mod blkio;
mod cpu;
mod cpuacct;
mod memory;

pub use blkio::{BlkioController, BlkioDeviceStat};
pub use cpu::{CfsStats, CpuController, ThrottleStats};
pub use cpuacct::{CpuacctController, CpuacctStat, PerCpuUsage};
pub use memory::{MemoryController, MemoryCounters, MemoryStat};
