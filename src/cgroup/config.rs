use std::path::PathBuf;

/// Settings of a cgroup [`Reader`](super::Reader).
///
/// Built by the caller and handed to [`Reader::new`](super::Reader::new) by value.
///
/// ```
/// use host_telemetry::cgroup::ReaderConfig;
///
/// let config = ReaderConfig::default()
///     .with_rootfs("/rootfs")
///     .with_ignore_root_cgroups(false);
/// assert_eq!(config.rootfs.to_str(), Some("/rootfs"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Where the host's root filesystem is visible. `/proc` and the cgroup
    /// mount points are looked up below it.
    pub rootfs: PathBuf,
    /// Report processes in a root cgroup as not applicable instead of
    /// returning machine-wide totals for them.
    pub ignore_root_cgroups: bool,
    /// Replaces the cgroup path read from `/proc/<pid>/cgroup`. Used when the
    /// reader runs in a container whose cgroup paths differ from the host's.
    pub hierarchy_override: Option<PathBuf>,
    /// Key `io.stat` devices by name instead of `major:minor`.
    pub resolve_device_names: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            ignore_root_cgroups: true,
            hierarchy_override: None,
            resolve_device_names: true,
        }
    }
}

impl ReaderConfig {
    pub fn with_rootfs(mut self, rootfs: impl Into<PathBuf>) -> Self {
        self.rootfs = rootfs.into();
        self
    }

    pub fn with_ignore_root_cgroups(mut self, ignore: bool) -> Self {
        self.ignore_root_cgroups = ignore;
        self
    }

    pub fn with_hierarchy_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.hierarchy_override = Some(path.into());
        self
    }

    pub fn with_resolve_device_names(mut self, resolve: bool) -> Self {
        self.resolve_device_names = resolve;
        self
    }
}
