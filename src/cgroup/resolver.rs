//! Maps a process to the cgroup directories holding its accounting files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::membership::{CgroupEntry, parse_cgroup_file};
use super::{CgroupVersion, Error, Result};
use crate::fsutil;
use crate::mountinfo::{CgroupMount, CgroupMounts};

/// A cgroup of one hierarchy, located below that hierarchy's mount point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerPath {
    /// Mount point of the hierarchy, below the configured rootfs.
    pub mount_point: PathBuf,
    /// Path of the cgroup relative to the mount point, always starting with `/`.
    pub cgroup_path: String,
}

impl ControllerPath {
    /// Absolute directory of the cgroup.
    pub fn full_path(&self) -> PathBuf {
        fsutil::host_path(&self.mount_point, &self.cgroup_path)
    }
}

/// Resolved cgroup directories of a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CgroupPaths {
    /// Directory per v1 subsystem, keyed by subsystem name.
    V1(BTreeMap<String, ControllerPath>),
    /// The single directory in the unified hierarchy.
    V2(ControllerPath),
}

impl CgroupPaths {
    pub fn version(&self) -> CgroupVersion {
        match self {
            CgroupPaths::V1(_) => CgroupVersion::V1,
            CgroupPaths::V2(_) => CgroupVersion::V2,
        }
    }

    /// The cgroup path used to identify the process' cgroup.
    ///
    /// For v1 the path of the `cpu` or `memory` subsystem is preferred, since
    /// container runtimes always place those and named hierarchies may differ.
    pub fn cgroup_path(&self) -> &str {
        match self {
            CgroupPaths::V2(path) => &path.cgroup_path,
            CgroupPaths::V1(controllers) => ["cpu", "memory"]
                .iter()
                .find_map(|name| controllers.get(*name))
                .or_else(|| controllers.values().next())
                .map_or("/", |path| path.cgroup_path.as_str()),
        }
    }

    /// Directory of a v1 subsystem.
    pub fn subsystem(&self, name: &str) -> Option<&ControllerPath> {
        match self {
            CgroupPaths::V1(controllers) => controllers.get(name),
            CgroupPaths::V2(_) => None,
        }
    }
}

/// Resolves `/proc/<pid>/cgroup` entries against the discovered mounts.
#[derive(Debug, Clone)]
pub(crate) struct Resolver {
    pub(crate) rootfs: PathBuf,
    pub(crate) mounts: CgroupMounts,
    pub(crate) ignore_root_cgroups: bool,
    pub(crate) hierarchy_override: Option<String>,
    /// Whether the unified hierarchy has resource controllers enabled. A
    /// controller-less unified mount next to v1 (systemd's hybrid layout) only
    /// tracks processes, so such hosts are read as v1.
    pub(crate) unified_has_controllers: bool,
}

impl Resolver {
    /// Reads the cgroup membership of `pid` and determines its version.
    pub(crate) fn membership(&self, pid: u32) -> Result<(CgroupVersion, Vec<CgroupEntry>)> {
        let path = fsutil::host_path(&self.rootfs, format!("/proc/{pid}/cgroup"));
        let entries = fsutil::read_file_with(&path, parse_cgroup_file)
            .map_err(|source| Error::PathResolution { pid, source })?;

        let unified = entries.iter().any(CgroupEntry::is_unified);
        let legacy = entries
            .iter()
            .any(|e| !e.is_unified() && e.has_resource_controllers());

        let version = match (unified, legacy) {
            (true, true) if self.unified_has_controllers => CgroupVersion::Hybrid,
            (true, false) => CgroupVersion::V2,
            _ => CgroupVersion::V1,
        };
        Ok((version, entries))
    }

    pub(crate) fn resolve(&self, pid: u32) -> Result<CgroupPaths> {
        let (version, entries) = self.membership(pid)?;
        match version {
            CgroupVersion::Hybrid => Err(Error::HybridUnsupported { pid }),
            CgroupVersion::V2 => self.resolve_v2(pid, &entries),
            CgroupVersion::V1 => self.resolve_v1(pid, &entries),
        }
    }

    fn resolve_v2(&self, pid: u32, entries: &[CgroupEntry]) -> Result<CgroupPaths> {
        let mount = self.mounts.unified.as_ref().ok_or_else(|| Error::MissingMount {
            controller: "cgroup2".to_string(),
        })?;
        let path = entries
            .iter()
            .find(|e| e.is_unified())
            .map_or("/", |e| e.path.as_str());

        let controller = self.controller_path(mount, path);
        if self.ignore_root_cgroups && controller.cgroup_path == "/" {
            return Err(Error::NotApplicable {
                pid,
                path: controller.cgroup_path,
            });
        }
        Ok(CgroupPaths::V2(controller))
    }

    fn resolve_v1(&self, pid: u32, entries: &[CgroupEntry]) -> Result<CgroupPaths> {
        let mut controllers = BTreeMap::new();
        let mut skipped_root = false;

        for entry in entries.iter().filter(|e| !e.is_unified()) {
            for name in &entry.controllers {
                let Some(mount) = self.mounts.subsystem(name) else {
                    log::debug!("no mount point for cgroup subsystem `{name}`, skipping");
                    continue;
                };
                let controller = self.controller_path(mount, &entry.path);
                if self.ignore_root_cgroups && controller.cgroup_path == "/" {
                    skipped_root = true;
                    continue;
                }
                controllers.insert(name.clone(), controller);
            }
        }

        if controllers.is_empty() {
            if skipped_root {
                return Err(Error::NotApplicable {
                    pid,
                    path: "/".to_string(),
                });
            }
            return Err(Error::MissingMount {
                controller: "cgroup".to_string(),
            });
        }
        Ok(CgroupPaths::V1(controllers))
    }

    /// Applies the hierarchy override or strips the mount's root from the
    /// kernel-reported path, then pins the result to the mount point.
    fn controller_path(&self, mount: &CgroupMount, path: &str) -> ControllerPath {
        let relative = match &self.hierarchy_override {
            Some(path) => path.as_str(),
            None => strip_mount_root(path, &mount.root),
        };
        ControllerPath {
            mount_point: mount.mount_point.clone(),
            cgroup_path: normalize(relative),
        }
    }
}

/// Strips `root` from `path` when the hierarchy was mounted from a sub-cgroup,
/// as seen from inside a cgroup namespace.
fn strip_mount_root<'a>(path: &'a str, root: &str) -> &'a str {
    if root == "/" {
        return path;
    }
    match path.strip_prefix(root.trim_end_matches('/')) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}

/// Ensures a single leading `/` and no trailing one, so `""` and `"/"` both mean root.
fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

/// The last component of a cgroup path, empty for the root cgroup.
pub fn cgroup_id(path: &str) -> &str {
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn mount(point: &str, root: &str) -> CgroupMount {
        CgroupMount {
            mount_point: PathBuf::from(point),
            root: root.to_string(),
        }
    }

    fn resolver(rootfs: &Path, mounts: CgroupMounts) -> Resolver {
        Resolver {
            rootfs: rootfs.to_path_buf(),
            mounts,
            ignore_root_cgroups: true,
            hierarchy_override: None,
            unified_has_controllers: true,
        }
    }

    fn write_membership(rootfs: &Path, pid: u32, content: &str) {
        let dir = rootfs.join(format!("proc/{pid}"));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cgroup"), content).unwrap();
    }

    fn v1_mounts() -> CgroupMounts {
        let mut subsystems = HashMap::new();
        subsystems.insert("cpu".to_string(), mount("/cg/cpu,cpuacct", "/"));
        subsystems.insert("cpuacct".to_string(), mount("/cg/cpu,cpuacct", "/"));
        subsystems.insert("memory".to_string(), mount("/cg/memory", "/"));
        CgroupMounts {
            unified: None,
            subsystems,
        }
    }

    fn v2_mounts(root: &str) -> CgroupMounts {
        CgroupMounts {
            unified: Some(mount("/cg", root)),
            subsystems: HashMap::new(),
        }
    }

    #[test]
    fn test_resolve_v2() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 312, "0::/system.slice/docker-1c8f.scope\n");

        let paths = resolver(rootfs.path(), v2_mounts("/")).resolve(312).unwrap();
        assert_eq!(paths.version(), CgroupVersion::V2);
        assert_eq!(paths.cgroup_path(), "/system.slice/docker-1c8f.scope");
        match paths {
            CgroupPaths::V2(path) => assert_eq!(
                path.full_path(),
                PathBuf::from("/cg/system.slice/docker-1c8f.scope")
            ),
            other => panic!("unexpected paths: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_v1_skips_unmounted_subsystems() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(
            rootfs.path(),
            985,
            "12:pids:/docker/abc\n4:cpu,cpuacct:/docker/abc\n3:memory:/docker/abc\n1:name=systemd:/docker/abc\n",
        );

        let paths = resolver(rootfs.path(), v1_mounts()).resolve(985).unwrap();
        assert_eq!(paths.version(), CgroupVersion::V1);
        assert_eq!(paths.cgroup_path(), "/docker/abc");
        assert_eq!(
            paths.subsystem("cpuacct").unwrap().full_path(),
            PathBuf::from("/cg/cpu,cpuacct/docker/abc")
        );
        assert!(paths.subsystem("pids").is_none());
        assert!(paths.subsystem("name=systemd").is_none());
    }

    #[test]
    fn test_root_cgroup_not_applicable() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 1, "0::/\n");

        let err = resolver(rootfs.path(), v2_mounts("/")).resolve(1).unwrap_err();
        match err {
            Error::NotApplicable { pid, path } => {
                assert_eq!(pid, 1);
                assert_eq!(path, "/");
            }
            other => panic!("Expected NotApplicable, got {other}"),
        }

        let mut keep_root = resolver(rootfs.path(), v2_mounts("/"));
        keep_root.ignore_root_cgroups = false;
        assert_eq!(keep_root.resolve(1).unwrap().cgroup_path(), "/");
    }

    #[test]
    fn test_v1_root_cgroups_not_applicable() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 1, "4:cpu,cpuacct:/\n3:memory:/\n");

        let err = resolver(rootfs.path(), v1_mounts()).resolve(1).unwrap_err();
        assert!(matches!(err, Error::NotApplicable { pid: 1, .. }));
    }

    #[test]
    fn test_hierarchy_override() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 312, "0::/docker/in-container\n");

        let mut r = resolver(rootfs.path(), v2_mounts("/"));
        r.hierarchy_override = Some("/system.slice/".to_string());
        assert_eq!(r.resolve(312).unwrap().cgroup_path(), "/system.slice");
    }

    #[test]
    fn test_mount_root_is_stripped() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 7, "0::/kubepods/pod1/ctr/app\n");

        let paths = resolver(rootfs.path(), v2_mounts("/kubepods/pod1/ctr"))
            .resolve(7)
            .unwrap();
        assert_eq!(paths.cgroup_path(), "/app");
    }

    #[test]
    fn test_hybrid_unsupported() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 9, "4:memory:/user.slice\n0::/user.slice\n");

        let mut mounts = v1_mounts();
        mounts.unified = Some(mount("/cg/unified", "/"));
        let err = resolver(rootfs.path(), mounts.clone()).resolve(9).unwrap_err();
        assert!(matches!(err, Error::HybridUnsupported { pid: 9 }));

        let mut tracking_only = resolver(rootfs.path(), mounts);
        tracking_only.unified_has_controllers = false;
        let paths = tracking_only.resolve(9).unwrap();
        assert_eq!(paths.version(), CgroupVersion::V1);
        assert_eq!(paths.cgroup_path(), "/user.slice");
    }

    #[test]
    fn test_named_hierarchy_next_to_unified_is_v2() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 5, "1:name=systemd:/a\n0::/a\n");

        let paths = resolver(rootfs.path(), v2_mounts("/")).resolve(5).unwrap();
        assert_eq!(paths.version(), CgroupVersion::V2);
    }

    #[test]
    fn test_vanished_process() {
        let rootfs = tempfile::tempdir().unwrap();
        let err = resolver(rootfs.path(), v2_mounts("/"))
            .resolve(4242)
            .unwrap_err();
        assert!(err.is_process_gone());
        assert!(matches!(err, Error::PathResolution { pid: 4242, .. }));
    }

    #[test]
    fn test_missing_unified_mount() {
        let rootfs = tempfile::tempdir().unwrap();
        write_membership(rootfs.path(), 3, "0::/a\n");

        let err = resolver(rootfs.path(), v1_mounts()).resolve(3).unwrap_err();
        match err {
            Error::MissingMount { controller } => assert_eq!(controller, "cgroup2"),
            other => panic!("Expected MissingMount, got {other}"),
        }
    }

    #[test]
    fn test_cgroup_id() {
        assert_eq!(cgroup_id("/system.slice/docker-1c8f.scope"), "docker-1c8f.scope");
        assert_eq!(cgroup_id("/"), "");
    }
}
