//! Parser for `/proc/<pid>/cgroup`.
//!
//! Every line has the form `hierarchy-ID:controller-list:cgroup-path`:
//!
//! ```text
//! 12:pids:/docker/b29faf21b7ef
//! 4:cpu,cpuacct:/docker/b29faf21b7ef
//! 1:name=systemd:/docker/b29faf21b7ef
//! 0::/system.slice/docker.service
//! ```
//!
//! The cgroup v2 hierarchy always appears as hierarchy `0` with an empty
//! controller list. See `cgroups(7)`.

use std::io::BufRead;

use crate::parser::{StatParseError, parse_u64};

/// One line of `/proc/<pid>/cgroup`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CgroupEntry {
    pub hierarchy_id: u64,
    /// Controllers bound to the hierarchy, including named ones like `name=systemd`.
    pub controllers: Vec<String>,
    /// Path of the process' cgroup relative to the hierarchy's root.
    pub path: String,
}

impl CgroupEntry {
    /// Returns true for the `0::<path>` line of the unified hierarchy.
    pub fn is_unified(&self) -> bool {
        self.hierarchy_id == 0 && self.controllers.is_empty()
    }

    /// Returns true if the hierarchy has at least one real resource controller,
    /// as opposed to only named hierarchies used for process tracking.
    pub fn has_resource_controllers(&self) -> bool {
        self.controllers.iter().any(|c| !c.starts_with("name="))
    }
}

/// Parses the content of a `/proc/<pid>/cgroup` file.
///
/// # Errors
///
/// - [`StatParseError::UnexpectedFormat`] if a line has fewer than three fields.
/// - [`StatParseError::InvalidValue`] if the hierarchy ID is not a number.
pub fn parse_cgroup_file<R: BufRead>(buf: &mut R) -> std::io::Result<Vec<CgroupEntry>> {
    let mut entries = Vec::new();
    let mut line = String::new();
    let mut lineno = 0;

    while buf.read_line(&mut line)? != 0 {
        lineno += 1;
        let trimmed = line.trim_end_matches('\n');
        if trimmed.is_empty() {
            line.clear();
            continue;
        }

        let mut fields = trimmed.splitn(3, ':');
        let (Some(id), Some(controllers), Some(path)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(StatParseError::UnexpectedFormat {
                content: trimmed.to_string(),
                line: lineno,
            }
            .into());
        };

        entries.push(CgroupEntry {
            hierarchy_id: parse_u64(id, lineno)?,
            controllers: controllers
                .split(',')
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect(),
            path: path.to_owned(),
        });
        line.clear();
    }

    Ok(entries)
}
