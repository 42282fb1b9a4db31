use std::path::Path;

use super::devices::DeviceNames;
use super::resolver::{CgroupPaths, ControllerPath, Resolver};
use super::snapshot::{CgroupSnapshot, Controllers, V1Controllers, V2Controllers};
use super::stats::{PidsStats, v1, v2};
use super::{CgroupVersion, Error, ReaderConfig, Result};
use crate::fsutil::{self, FileReadError};
use crate::mountinfo::{self, CgroupMounts};

/// Reads the cgroup accounting of processes.
///
/// Construct it once with [`Reader::new`]; it discovers the cgroup mounts
/// below the configured rootfs and can then be used for any number of
/// processes. All methods take `&self` and open their own files.
#[derive(Debug, Clone)]
pub struct Reader {
    resolver: Resolver,
    devices: DeviceNames,
}

impl Reader {
    /// Creates a reader bound to `config.rootfs`.
    ///
    /// Mounts are read from `<rootfs>/proc/1/mountinfo`, falling back to
    /// `<rootfs>/proc/self/mountinfo` if init's mount table is not accessible.
    ///
    /// # Errors
    ///
    /// - [`Error::RootfsUnreadable`] if the rootfs can't be accessed.
    /// - [`Error::Mount`] if no mountinfo could be read or it holds no cgroup mounts.
    pub fn new(config: ReaderConfig) -> Result<Self> {
        let rootfs = config.rootfs;
        std::fs::read_dir(&rootfs).map_err(|source| Error::RootfsUnreadable {
            path: rootfs.clone(),
            source,
        })?;

        let mounts = detect_mounts(&rootfs)?;
        let unified_has_controllers = mounts
            .unified
            .as_ref()
            .is_some_and(|unified| has_enabled_controllers(&unified.mount_point));
        let hierarchy_override = config
            .hierarchy_override
            .map(|path| path.to_string_lossy().into_owned());

        Ok(Reader {
            devices: DeviceNames::new(&rootfs, config.resolve_device_names),
            resolver: Resolver {
                rootfs,
                mounts,
                ignore_root_cgroups: config.ignore_root_cgroups,
                hierarchy_override,
                unified_has_controllers,
            },
        })
    }

    /// The cgroup mounts this reader resolves against.
    pub fn mounts(&self) -> &CgroupMounts {
        &self.resolver.mounts
    }

    /// Determines which cgroup version governs `pid`.
    pub fn cgroup_version(&self, pid: u32) -> Result<CgroupVersion> {
        self.resolver.membership(pid).map(|(version, _)| version)
    }

    /// Resolves the cgroup directories of `pid`.
    ///
    /// # Errors
    ///
    /// - [`Error::PathResolution`] if `/proc/<pid>/cgroup` can't be read,
    ///   typically because the process exited.
    /// - [`Error::NotApplicable`] if the process is in a root cgroup and root
    ///   cgroups are ignored.
    /// - [`Error::HybridUnsupported`] for processes split across v1 and v2.
    /// - [`Error::MissingMount`] if none of the process' hierarchies is mounted.
    pub fn resolve_cgroup_paths(&self, pid: u32) -> Result<CgroupPaths> {
        self.resolver.resolve(pid)
    }

    /// Reads the cgroup accounting of `pid`.
    ///
    /// Controllers are read independently; one that is missing or malformed is
    /// left out of the snapshot without affecting the others.
    ///
    /// # Errors
    ///
    /// Same as [`Reader::resolve_cgroup_paths`].
    pub fn get_stats_for_pid(&self, pid: u32) -> Result<CgroupSnapshot> {
        let paths = self.resolve_cgroup_paths(pid)?;
        let snapshot = match &paths {
            CgroupPaths::V1(_) => self.read_v1_stats(&paths),
            CgroupPaths::V2(path) => self.read_v2_stats(path),
        };
        log::trace!("read {:?} cgroup `{}` of process {pid}", snapshot.version, snapshot.path);
        Ok(snapshot)
    }

    /// Reads every known v1 subsystem present in `paths`.
    pub fn read_v1_stats(&self, paths: &CgroupPaths) -> CgroupSnapshot {
        let dir = |name: &str| paths.subsystem(name).map(ControllerPath::full_path);

        let controllers = V1Controllers {
            cpu: dir("cpu").and_then(|d| soft(v1::CpuController::read(&d))),
            cpuacct: dir("cpuacct").and_then(|d| soft(v1::CpuacctController::read(&d))),
            memory: dir("memory").and_then(|d| soft(v1::MemoryController::read(&d))),
            blkio: dir("blkio").and_then(|d| soft(v1::BlkioController::read(&d, &self.devices))),
            pids: dir("pids").and_then(|d| soft(PidsStats::read(&d))),
        };
        CgroupSnapshot::new(paths.cgroup_path().to_owned(), Controllers::V1(controllers))
    }

    /// Reads the controllers of a unified hierarchy cgroup directory.
    pub fn read_v2_stats(&self, path: &ControllerPath) -> CgroupSnapshot {
        let dir = path.full_path();

        let controllers = V2Controllers {
            cpu: soft(v2::CpuController::read(&dir)),
            memory: soft(v2::MemoryController::read(&dir)),
            io: soft(v2::IoController::read(&dir, &self.devices)),
            pids: soft(PidsStats::read(&dir)),
        };
        CgroupSnapshot::new(path.cgroup_path.clone(), Controllers::V2(controllers))
    }
}

/// Turns a controller read failure into an omitted controller.
fn soft<T>(result: std::result::Result<T, FileReadError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_not_found() => {
            log::debug!("{} does not exist. Skipping controller.", err.path.display());
            None
        }
        Err(err) => {
            log::warn!("dropping cgroup controller: {err}");
            None
        }
    }
}

fn detect_mounts(rootfs: &Path) -> Result<CgroupMounts> {
    let init = fsutil::host_path(rootfs, "/proc/1/mountinfo");
    match mountinfo::detect_cgroup_mounts(&init, rootfs) {
        Ok(mounts) => Ok(mounts),
        Err(mountinfo::Error::FileOpen(err)) => {
            log::debug!("{err}, falling back to the reader's own mount table");
            let own = fsutil::host_path(rootfs, "/proc/self/mountinfo");
            Ok(mountinfo::detect_cgroup_mounts(own, rootfs)?)
        }
        Err(err) => Err(err.into()),
    }
}

/// Checks `cgroup.controllers` at the root of the unified mount.
fn has_enabled_controllers(mount_point: &Path) -> bool {
    std::fs::read_to_string(mount_point.join("cgroup.controllers"))
        .is_ok_and(|controllers| !controllers.trim().is_empty())
}
