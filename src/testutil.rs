//! Fake root filesystems for tests.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::cgroup::ReaderConfig;

const V2_MOUNTINFO: &str = "\
25 1 0:24 / /proc rw,relatime - proc proc rw
42 35 0:39 / /sys/fs/cgroup rw,nosuid,nodev,noexec,relatime - cgroup2 cgroup2 rw,nsdelegate
";

const V1_MOUNTINFO: &str = "\
25 1 0:24 / /proc rw,relatime - proc proc rw
31 25 0:27 / /sys/fs/cgroup/systemd rw - cgroup cgroup rw,xattr,name=systemd
32 25 0:28 / /sys/fs/cgroup/cpu,cpuacct rw - cgroup cgroup rw,cpu,cpuacct
33 25 0:29 / /sys/fs/cgroup/memory rw - cgroup cgroup rw,memory
34 25 0:30 / /sys/fs/cgroup/blkio rw - cgroup cgroup rw,blkio
35 25 0:31 / /sys/fs/cgroup/pids rw - cgroup cgroup rw,pids
";

/// A directory inside a [`FakeRoot`].
pub(crate) struct FakeDir(PathBuf);

impl FakeDir {
    pub(crate) fn write(&self, name: &str, content: &str) {
        let path = self.0.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub(crate) fn path(&self) -> &Path {
        &self.0
    }
}

/// A temporary directory laid out like a host root with `/proc` and `/sys/fs/cgroup`.
pub(crate) struct FakeRoot {
    dir: TempDir,
}

impl FakeRoot {
    /// An empty root without any mounts.
    pub(crate) fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// A root with only the unified hierarchy mounted at `/sys/fs/cgroup`.
    pub(crate) fn v2() -> Self {
        let root = Self::empty();
        root.file("proc/1/mountinfo", V2_MOUNTINFO);
        root.file("sys/fs/cgroup/cgroup.controllers", "cpuset cpu io memory pids\n");
        root
    }

    /// A root with the `cpu,cpuacct`, `memory`, `blkio` and `pids` v1 hierarchies.
    pub(crate) fn v1() -> Self {
        let root = Self::empty();
        root.file("proc/1/mountinfo", V1_MOUNTINFO);
        root
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn config(&self) -> ReaderConfig {
        ReaderConfig::default().with_rootfs(self.path())
    }

    /// Writes a file at `rel`, relative to the root.
    pub(crate) fn file(&self, rel: &str, content: &str) {
        FakeDir(self.path().to_path_buf()).write(rel, content);
    }

    /// `/proc/<pid>`.
    pub(crate) fn process(&self, pid: u32) -> FakeDir {
        let dir = self.path().join(format!("proc/{pid}"));
        fs::create_dir_all(&dir).unwrap();
        FakeDir(dir)
    }

    /// Writes `/proc/<pid>/cgroup`.
    pub(crate) fn membership(&self, pid: u32, content: &str) {
        self.process(pid).write("cgroup", content);
    }

    /// A cgroup directory in the unified hierarchy.
    pub(crate) fn cgroup_v2(&self, cgroup: &str) -> FakeDir {
        self.cgroup_dir("sys/fs/cgroup", cgroup)
    }

    /// A cgroup directory in the v1 hierarchy mounted at `/sys/fs/cgroup/<hierarchy>`.
    pub(crate) fn cgroup_v1(&self, hierarchy: &str, cgroup: &str) -> FakeDir {
        self.cgroup_dir(&format!("sys/fs/cgroup/{hierarchy}"), cgroup)
    }

    fn cgroup_dir(&self, mount: &str, cgroup: &str) -> FakeDir {
        let dir = self
            .path()
            .join(mount)
            .join(cgroup.trim_start_matches('/'));
        fs::create_dir_all(&dir).unwrap();
        FakeDir(dir)
    }
}
