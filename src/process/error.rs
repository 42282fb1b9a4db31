use std::path::PathBuf;

use crate::cgroup;
use crate::fsutil::FileReadError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process does not exist, or exited while it was being read.
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    #[error(transparent)]
    Read(FileReadError),

    #[error("malformed `{path}`: {reason}")]
    MalformedStat { path: PathBuf, reason: String },

    #[error("failed to read cgroup accounting: {0}")]
    Cgroup(#[source] cgroup::Error),

    #[error("invalid process pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to list processes in `{path}`: {source}")]
    Enumerate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Classifies a failed read of one of `pid`'s procfs files.
    pub(crate) fn read(pid: u32, err: FileReadError) -> Self {
        if err.is_not_found() {
            Error::ProcessNotFound { pid }
        } else {
            Error::Read(err)
        }
    }

    /// Classifies a failed cgroup read of `pid`.
    pub(crate) fn from_cgroup(pid: u32, err: cgroup::Error) -> Self {
        if err.is_process_gone() {
            Error::ProcessNotFound { pid }
        } else {
            Error::Cgroup(err)
        }
    }

    /// Returns true if the process raced with the caller and is gone.
    pub fn is_process_not_found(&self) -> bool {
        matches!(self, Error::ProcessNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
