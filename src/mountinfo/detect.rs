use crate::fsutil;

use super::parser::parse_mount_info_line;
use super::{Error, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Superblock options of a v1 cgroup mount that do not name a subsystem.
const NON_SUBSYSTEM_OPTIONS: [&str; 6] = [
    "rw",
    "ro",
    "noprefix",
    "xattr",
    "clone_children",
    "cpuset_v2_mode",
];

/// A single cgroup filesystem mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupMount {
    /// Mount point, already resolved below the configured rootfs.
    pub mount_point: PathBuf,
    /// Root of the mount inside the cgroup hierarchy. Not `/` when the mount
    /// was made from inside a cgroup namespace.
    pub root: String,
}

/// Every cgroup mount found in a mountinfo file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CgroupMounts {
    /// The cgroup v2 unified hierarchy, if mounted.
    pub unified: Option<CgroupMount>,
    /// cgroup v1 hierarchies keyed by subsystem name (`cpu`, `memory`, `name=systemd`, ...).
    pub subsystems: HashMap<String, CgroupMount>,
}

impl CgroupMounts {
    /// Returns the v1 mount for `subsystem`.
    pub fn subsystem(&self, subsystem: &str) -> Option<&CgroupMount> {
        self.subsystems.get(subsystem)
    }

    /// Returns true if neither a v1 nor a v2 hierarchy is mounted.
    pub fn is_empty(&self) -> bool {
        self.unified.is_none() && self.subsystems.is_empty()
    }
}

/// Detects all cgroup v1 and v2 mounts by parsing the given `mountinfo` file.
///
/// Mount points are interpreted relative to `rootfs`, so a host mountinfo read
/// through `/rootfs/proc/1/mountinfo` yields paths below `/rootfs`. If several
/// mounts bind the same subsystem, the first one wins.
///
/// # Errors
///
/// - [`Error::FileOpen`] if the file can't be opened.
/// - [`Error::ReadLine`] if reading from the file fails.
/// - [`Error::Parse`] if parsing any line fails.
/// - [`Error::MissingCgroupMounts`] if no cgroup filesystem is mounted.
///
/// # Example
///
/// ```no_run
/// use host_telemetry::mountinfo::detect_cgroup_mounts;
///
/// let mounts = detect_cgroup_mounts("/proc/self/mountinfo", "/").unwrap();
/// println!("unified hierarchy: {:?}", mounts.unified);
/// ```
pub fn detect_cgroup_mounts(
    path: impl AsRef<Path>,
    rootfs: impl AsRef<Path>,
) -> Result<CgroupMounts> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path)?;

    detect_cgroup_mounts_from_reader(buf, path, rootfs.as_ref())
}

fn detect_cgroup_mounts_from_reader<R: BufRead>(
    mut reader: R,
    origin: &Path,
    rootfs: &Path,
) -> Result<CgroupMounts> {
    let mut line = String::with_capacity(256);
    let mut mounts = CgroupMounts::default();

    while reader
        .read_line(&mut line)
        .map_err(|source| Error::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?
        != 0
    {
        if line.trim().is_empty() {
            line.clear();
            continue;
        }
        let mount_info = parse_mount_info_line(line.trim_end()).map_err(|source| Error::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        let mount = || CgroupMount {
            mount_point: fsutil::host_path(rootfs, &*mount_info.mount_point()),
            root: mount_info.root().into_owned(),
        };

        match mount_info.fs_type {
            "cgroup2" if mounts.unified.is_none() => {
                log::debug!(
                    "Found `cgroup2` mount point with root `{}`: {}",
                    mount_info.root,
                    mount_info.mount_point
                );
                mounts.unified = Some(mount());
            }
            "cgroup" => {
                for subsystem in mount_info
                    .super_option_list()
                    .filter(|opt| !NON_SUBSYSTEM_OPTIONS.contains(opt))
                    .filter(|opt| !opt.contains('=') || opt.starts_with("name="))
                {
                    mounts
                        .subsystems
                        .entry(subsystem.to_owned())
                        .or_insert_with(mount);
                }
            }
            _ => {}
        }

        line.clear();
    }

    if mounts.is_empty() {
        return Err(Error::MissingCgroupMounts {
            path: origin.to_path_buf(),
        });
    }
    Ok(mounts)
}
