use std::fs;
use std::path::{Path, PathBuf};

use crate::fsutil;

/// Best-effort lookup of block device names (`sda`, `nvme0n1`) from their
/// `major:minor` numbers through `/sys/dev/block`.
#[derive(Debug, Clone)]
pub struct DeviceNames {
    /// `None` disables resolution, every device is keyed by `major:minor`.
    sys_dev_block: Option<PathBuf>,
}

impl DeviceNames {
    pub fn new(rootfs: &Path, enabled: bool) -> Self {
        Self {
            sys_dev_block: enabled.then(|| fsutil::host_path(rootfs, "/sys/dev/block")),
        }
    }

    /// A resolver that never looks anything up.
    pub fn disabled() -> Self {
        Self {
            sys_dev_block: None,
        }
    }

    /// Returns the name of the device, or `None` if it can't be determined.
    ///
    /// Tries `DEVNAME=` from the device's `uevent` first and falls back to the
    /// file name of the `/sys/dev/block/<major>:<minor>` symlink target.
    pub fn resolve(&self, major: u32, minor: u32) -> Option<String> {
        let dir = self.sys_dev_block.as_ref()?.join(format!("{major}:{minor}"));

        if let Ok(uevent) = fs::read_to_string(dir.join("uevent")) {
            let name = uevent
                .lines()
                .find_map(|line| line.strip_prefix("DEVNAME="))
                .map(str::trim)
                .filter(|name| !name.is_empty());
            if let Some(name) = name {
                return Some(name.to_owned());
            }
        }

        let target = fs::read_link(&dir).ok()?;
        let name = target.file_name()?.to_str()?.to_owned();
        Some(name)
    }

    /// Returns the device name, or the raw `major:minor` token when unresolvable.
    pub fn name_or_id(&self, major: u32, minor: u32, raw: &str) -> String {
        self.resolve(major, minor).unwrap_or_else(|| {
            log::trace!("could not resolve name of block device {raw}");
            raw.to_owned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_from_uevent() {
        let root = tempfile::tempdir().unwrap();
        let dev = root.path().join("sys/dev/block/8:0");
        fs::create_dir_all(&dev).unwrap();
        fs::write(dev.join("uevent"), "MAJOR=8\nMINOR=0\nDEVNAME=sda\nDEVTYPE=disk\n").unwrap();

        let names = DeviceNames::new(root.path(), true);
        assert_eq!(names.resolve(8, 0).as_deref(), Some("sda"));
        assert_eq!(names.name_or_id(8, 0, "8:0"), "sda");
    }

    #[test]
    fn test_resolve_from_symlink_target() {
        let root = tempfile::tempdir().unwrap();
        let devices = root.path().join("sys/devices/virtual/block/loop7");
        let block = root.path().join("sys/dev/block");
        fs::create_dir_all(&devices).unwrap();
        fs::create_dir_all(&block).unwrap();
        std::os::unix::fs::symlink(&devices, block.join("7:7")).unwrap();

        let names = DeviceNames::new(root.path(), true);
        assert_eq!(names.resolve(7, 7).as_deref(), Some("loop7"));
    }

    #[test]
    fn test_unresolvable_falls_back_to_id() {
        let root = tempfile::tempdir().unwrap();
        let names = DeviceNames::new(root.path(), true);
        assert_eq!(names.resolve(253, 1), None);
        assert_eq!(names.name_or_id(253, 1, "253:1"), "253:1");
    }

    #[test]
    fn test_disabled_resolution() {
        assert_eq!(DeviceNames::disabled().name_or_id(8, 0, "8:0"), "8:0");
    }
}
