use std::path::Path;

use serde::Serialize;

use crate::fsutil::{self, FileReadError};
use crate::parser;

/// Task accounting of the `pids` controller, identical in v1 and v2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PidsStats {
    /// Number of tasks currently in the cgroup (`pids.current`).
    pub current: u64,
    /// Task limit (`pids.max`), `None` when set to `max`.
    pub limit: Option<u64>,
}

impl PidsStats {
    /// Reads `pids.current` and, if present, `pids.max` from a cgroup directory.
    pub fn read(dir: &Path) -> Result<Self, FileReadError> {
        let current = fsutil::read_file_with(dir.join("pids.current"), parser::read_u64)?;
        let limit = fsutil::read_optional_file_with(dir.join("pids.max"), parser::read_limit)?
            .flatten();
        Ok(PidsStats { current, limit })
    }
}
