use std::path::PathBuf;

use crate::{fsutil, mountinfo};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process sits in the root cgroup and root cgroups are ignored.
    /// An expected outcome, not a failure.
    #[error("process {pid} is in the root cgroup `{path}`")]
    NotApplicable { pid: u32, path: String },
    #[error("failed to resolve cgroup paths of process {pid}: {source}")]
    PathResolution {
        pid: u32,
        #[source]
        source: fsutil::FileReadError,
    },
    #[error("process {pid} uses controllers in both the v1 and v2 hierarchies")]
    HybridUnsupported { pid: u32 },
    #[error("no mount point found for cgroup controller `{controller}`")]
    MissingMount { controller: String },
    #[error(transparent)]
    Mount(#[from] mountinfo::Error),
    #[error("root filesystem `{path}` is not readable: {source}")]
    RootfsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns true if the error means the process exited while being read.
    pub fn is_process_gone(&self) -> bool {
        match self {
            Error::PathResolution { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
