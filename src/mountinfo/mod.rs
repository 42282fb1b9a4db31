//! Discovery of cgroup filesystem mounts from `/proc/<pid>/mountinfo`.
mod detect;
mod error;
mod parser;

pub use detect::{CgroupMount, CgroupMounts, detect_cgroup_mounts};
pub use error::{Error, Result};
pub use parser::{MountInfo, ParseError, parse_mount_info_line};
