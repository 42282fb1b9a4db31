use std::fs;
use std::path::Path;

use super::{Error, Result};
use crate::cgroup::parse_cgroup_file;
use crate::fsutil;

const CONTAINER_RUNTIMES: [&str; 4] = ["docker", "kubepods", "containerd", "libpod"];

/// Returns true if the given rootfs path contains a mounted `/proc`.
///
/// # Errors
///
/// Returns [`Error::ExistenceCheck`] if checking the existence of the `/proc` directory fails.
pub fn contains_proc_mount(rootfs: &Path) -> Result<bool> {
    let path = rootfs.join("proc");

    path.try_exists()
        .map_err(|source| Error::ExistenceCheck { path, source })
}

/// Returns true if init's PID namespace in `rootfs` differs from the one of
/// the current process, as seen through `own_root`.
///
/// # Errors
///
/// Returns [`Error::ReadSymlink`] if reading either namespace link fails.
pub fn is_pid_namespace_isolated(own_root: &Path, rootfs: &Path) -> Result<bool> {
    let read_ns = |path: &Path| {
        fs::read_link(path).map_err(|source| Error::ReadSymlink {
            path: path.to_path_buf(),
            source,
        })
    };
    let self_ns = read_ns(&fsutil::host_path(own_root, "/proc/self/ns/pid"))?;
    let root_ns = read_ns(&fsutil::host_path(rootfs, "/proc/1/ns/pid"))?;

    Ok(self_ns != root_ns)
}

/// Returns true if the cgroup of the current process looks like one created
/// by a container runtime: it names a runtime, or holds a component with a
/// hex encoded container ID.
///
/// # Errors
///
/// [`Error::Read`] if `/proc/self/cgroup` below `own_root` can't be read or parsed.
pub fn matches_container_cgroup(own_root: &Path) -> Result<bool> {
    let path = fsutil::host_path(own_root, "/proc/self/cgroup");
    let entries = fsutil::read_file_with(&path, parse_cgroup_file)?;

    Ok(entries.iter().any(|entry| {
        CONTAINER_RUNTIMES
            .iter()
            .any(|runtime| entry.path.contains(runtime))
            || entry
                .path
                .split(['/', '-', '.'])
                .any(|part| part.len() >= 32 && is_non_empty_hex_string(part))
    }))
}

/// Returns true if marker files below `own_root` or the `container`
/// environment variable suggest a containerized environment.
pub fn has_container_indicators(own_root: &Path) -> bool {
    fsutil::host_path(own_root, "/.dockerenv").exists()
        || fsutil::host_path(own_root, "/run/.containerenv").exists()
        || std::env::var_os("container").is_some()
}

/// Returns true if the input string is not empty and contains only ASCII hex digits.
pub fn is_non_empty_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
