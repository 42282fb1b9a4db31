use std::path::Path;

use super::checks::{
    contains_proc_mount, has_container_indicators, is_pid_namespace_isolated,
    matches_container_cgroup,
};

/// Where the host's root filesystem is expected inside a container.
pub const CONTAINER_ROOTFS: &str = "/rootfs";

/// Available runtime environments for the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Running directly on the host.
    Host,
    /// Running inside a containerized environment (e.g., Docker, Kubernetes, Podman).
    Container,
}

/// Detects whether the current process runs in a container or on the host.
///
/// The checks run in order and the first positive one wins:
///
/// 1. `/proc` exists in `rootfs` and init's PID namespace differs from ours.
/// 2. `/proc/self/cgroup` contains container-related patterns.
/// 3. Known container marker files or environment variables exist.
///
/// Failing checks are logged as warnings and count as negative.
pub fn detect_runtime_environment(rootfs: impl AsRef<Path>) -> RuntimeEnvironment {
    detect_with(Path::new("/"), rootfs.as_ref())
}

fn detect_with(own_root: &Path, rootfs: &Path) -> RuntimeEnvironment {
    match contains_proc_mount(rootfs) {
        Ok(true) => match is_pid_namespace_isolated(own_root, rootfs) {
            Ok(true) => return RuntimeEnvironment::Container,
            Ok(false) => {}
            Err(err) => log::warn!(
                "Namespace check failed when detecting runtime environment: {}",
                err
            ),
        },
        Ok(false) => {}
        Err(err) => log::warn!("Failed to determine presence of /proc in rootfs: {}", err),
    }

    match matches_container_cgroup(own_root) {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("Cgroup analysis failed during runtime detection: {}", err),
    }

    if has_container_indicators(own_root) {
        return RuntimeEnvironment::Container;
    }

    RuntimeEnvironment::Host
}
