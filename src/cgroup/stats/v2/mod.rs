//! Controller files of the cgroup v2 unified hierarchy.

mod cpu;
mod io;
mod memory;

pub use cpu::{CpuController, CpuLimit, CpuStat};
pub use io::{IoController, IoDeviceStat, IoMetric, parse_io_stat};
pub use memory::{MemoryController, MemoryEvents, MemoryStat};
