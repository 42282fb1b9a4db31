//! Per-process cgroup accounting for cgroup v1 and v2 hosts.
//!
//! Given a process ID, the [`Reader`] looks up the process' cgroup membership
//! in `/proc/<pid>/cgroup`, maps it onto the cgroup mounts found in
//! `/proc/1/mountinfo` and parses the controller files of the resulting
//! directories into a [`CgroupSnapshot`].
//!
//! # Versions
//!
//! - **v1**: one hierarchy per subsystem (`/sys/fs/cgroup/cpu,cpuacct`,
//!   `/sys/fs/cgroup/memory`, ...). The `cpu`, `cpuacct`, `memory`, `blkio` and
//!   `pids` subsystems are read.
//! - **v2**: a single unified hierarchy. `cpu.stat`, `cpu.max`, `memory.*`,
//!   `io.stat`, `pids.*` and the `*.pressure` files are read.
//! - **hybrid**: processes using resource controllers in both hierarchies
//!   are rejected with [`Error::HybridUnsupported`]. A unified hierarchy
//!   without controllers next to v1 (systemd's hybrid layout) is read as v1.
//!
//! # Failure handling
//!
//! Missing or malformed controller files only drop that controller from the
//! snapshot. Failing to read `/proc/<pid>/cgroup` fails the whole read with
//! [`Error::PathResolution`], see [`Error::is_process_gone`].
//!
//! # Example
//!
//! ```no_run
//! use host_telemetry::cgroup::{Reader, ReaderConfig};
//!
//! let reader = Reader::new(ReaderConfig::default()).unwrap();
//! let snapshot = reader.get_stats_for_pid(std::process::id()).unwrap();
//! println!("{} ({:?})", snapshot.path, snapshot.version);
//! ```

mod config;
mod devices;
mod error;
mod membership;
mod reader;
mod resolver;
mod snapshot;
pub mod stats;

use serde::Serialize;

pub use config::ReaderConfig;
pub use devices::DeviceNames;
pub use error::{Error, Result};
pub use membership::{CgroupEntry, parse_cgroup_file};
pub use reader::Reader;
pub use resolver::{CgroupPaths, ControllerPath, cgroup_id};
pub use snapshot::{CgroupSnapshot, Controllers, V1Controllers, V2Controllers};

/// Cgroup hierarchy layout governing a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupVersion {
    V1,
    V2,
    /// Resource controllers split across v1 and v2. Not supported.
    Hybrid,
}
