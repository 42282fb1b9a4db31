//! Mountinfo line parser for Linux systems.
//!
//! Parses lines in `/proc/[pid]/mountinfo` format. See
//! [`proc_pid_mountinfo(5)`](https://man7.org/linux/man-pages/man5/proc_pid_mountinfo.5.html)
//! for details on the structure.

use std::borrow::Cow;

/// Represents a parsed mountinfo line.
#[derive(Debug, PartialEq, Eq)]
pub struct MountInfo<'a> {
    /// Mount ID field.
    pub mount_id: &'a str,
    /// Parent mount ID field.
    pub parent_id: &'a str,
    /// Major:Minor device identifier.
    pub major_minor: &'a str,
    /// Root of the mount within the filesystem.
    pub root: &'a str,
    /// Mount point relative to the process's root.
    pub mount_point: &'a str,
    /// Per-mount options followed by the optional fields (can be empty).
    pub optional_fields: Vec<&'a str>,
    /// Filesystem type (e.g., `ext4`, `cgroup2`).
    pub fs_type: &'a str,
    /// Source of the mount (e.g., device).
    pub source: &'a str,
    /// Superblock options. For cgroup v1 mounts this lists the bound subsystems.
    pub super_options: &'a str,
}

impl MountInfo<'_> {
    /// Mount root with the kernel's octal escapes (`\040` for a space) decoded.
    pub fn root(&self) -> Cow<'_, str> {
        unescape(self.root)
    }

    /// Mount point with the kernel's octal escapes decoded.
    pub fn mount_point(&self) -> Cow<'_, str> {
        unescape(self.mount_point)
    }

    /// Superblock options as individual tokens, e.g. `["rw", "cpu", "cpuacct"]`.
    pub fn super_option_list(&self) -> impl Iterator<Item = &str> {
        self.super_options.split(',').filter(|opt| !opt.is_empty())
    }
}

/// Decodes the `\ooo` escapes the kernel uses for space, tab, newline and backslash.
fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\\') {
        return Cow::Borrowed(raw);
    }

    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    Cow::Owned(String::from_utf8_lossy(&out).into_owned())
}

/// Named fields in a mountinfo line.
#[derive(Debug)]
pub enum MountInfoField {
    MountId,
    ParentId,
    MajorMinor,
    Root,
    MountPoint,
    FsType,
    Source,
    SuperOptions,
}

impl std::fmt::Display for MountInfoField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MountInfoField::MountId => "mount_id",
            MountInfoField::ParentId => "parent_id",
            MountInfoField::MajorMinor => "major:minor",
            MountInfoField::Root => "root",
            MountInfoField::MountPoint => "mount_point",
            MountInfoField::FsType => "fs_type",
            MountInfoField::Source => "source",
            MountInfoField::SuperOptions => "super_options",
        };
        write!(f, "{name}")
    }
}

/// Errors that may occur when parsing a mountinfo line.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum ParseError {
    #[error("missing separator ` - ` in line: `{0}`")]
    MissingSeparator(String),

    #[error("missing `{field}` in pre-separator section of line: `{line}`")]
    MissingPreSeparatorField { field: MountInfoField, line: String },

    #[error("missing `{field}` in post-separator section of line: `{line}`")]
    MissingPostSeparatorField { field: MountInfoField, line: String },
}

/// Parses a single line of mountinfo data.
///
/// Fields borrow from `line`; only the optional field list allocates.
///
/// # Errors
///
/// Returns [`ParseError`] variants for missing separator or required fields.
pub fn parse_mount_info_line(line: &str) -> Result<MountInfo<'_>, ParseError> {
    let (pre, post) = line
        .split_once(" - ")
        .ok_or_else(|| ParseError::MissingSeparator(line.to_owned()))?;

    let pre_missing = |field| ParseError::MissingPreSeparatorField {
        field,
        line: line.to_owned(),
    };
    let post_missing = |field| ParseError::MissingPostSeparatorField {
        field,
        line: line.to_owned(),
    };

    let mut pre_fields = pre.split_whitespace();
    let mount_id = pre_fields
        .next()
        .ok_or_else(|| pre_missing(MountInfoField::MountId))?;
    let parent_id = pre_fields
        .next()
        .ok_or_else(|| pre_missing(MountInfoField::ParentId))?;
    let major_minor = pre_fields
        .next()
        .ok_or_else(|| pre_missing(MountInfoField::MajorMinor))?;
    let root = pre_fields
        .next()
        .ok_or_else(|| pre_missing(MountInfoField::Root))?;
    let mount_point = pre_fields
        .next()
        .ok_or_else(|| pre_missing(MountInfoField::MountPoint))?;
    let optional_fields: Vec<&str> = pre_fields.collect();

    let mut post_fields = post.split_whitespace();
    let fs_type = post_fields
        .next()
        .ok_or_else(|| post_missing(MountInfoField::FsType))?;
    let source = post_fields
        .next()
        .ok_or_else(|| post_missing(MountInfoField::Source))?;
    let super_options = post_fields
        .next()
        .ok_or_else(|| post_missing(MountInfoField::SuperOptions))?;

    Ok(MountInfo {
        mount_id,
        parent_id,
        major_minor,
        root,
        mount_point,
        optional_fields,
        fs_type,
        source,
        super_options,
    })
}
