//! Parsers for the kernel files of individual cgroup controllers.
//!
//! Every controller type exposes a `read(dir)` constructor that reads the
//! files it needs from a cgroup directory. Required files that are missing or
//! malformed fail the whole controller; optional ones leave their field `None`.
//!
//! - [`v1`]: `cpu`, `cpuacct`, `memory` and `blkio` subsystems.
//! - [`v2`]: `cpu`, `memory` and `io` controllers of the unified hierarchy.
//! - [`PidsStats`]: the `pids` controller, identical in both versions.
//! - [`Pressure`]: PSI files, v2 only.

mod pids;
mod pressure;
pub mod v1;
pub mod v2;

pub use pids::PidsStats;
pub use pressure::{Pressure, PressureLine, read_pressure};
