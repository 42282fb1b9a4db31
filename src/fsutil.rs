use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use crate::parser::{self, StatParseError};

/// Error that occurs when opening a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to open file `{path}`: {source}")]
pub struct FileOpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Error that occurs when opening, reading or parsing a file fails.
#[derive(Debug, thiserror::Error)]
#[error("failed to read file `{path}`: {source}")]
pub struct FileReadError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl FileReadError {
    /// Returns true if the file (or the process directory holding it) does not exist.
    pub fn is_not_found(&self) -> bool {
        is_vanished(&self.source)
    }

    /// Returns the parse error if the file existed but its content was malformed.
    pub fn parse_error(&self) -> Option<&StatParseError> {
        parser::downcast(&self.source)
    }
}

impl From<FileOpenError> for FileReadError {
    fn from(err: FileOpenError) -> Self {
        Self {
            path: err.path,
            source: err.source,
        }
    }
}

/// Returns true if `err` means the file is gone: `ENOENT`, or `ESRCH` which procfs
/// reports for files of a process that exited while being read.
pub fn is_vanished(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound || err.raw_os_error() == Some(libc::ESRCH)
}

/// Opens a file at the given path and wraps it in a [`BufReader`].
///
/// # Errors
///
/// Returns a [`FileOpenError`] if the file cannot be opened.
///
/// # Example
/// ```no_run
/// # use host_telemetry::fsutil;
/// let reader = fsutil::open_file_reader("/proc/self/stat")?;
/// # Ok::<(), fsutil::FileOpenError>(())
/// ```
pub fn open_file_reader(path: impl AsRef<Path>) -> Result<BufReader<File>, FileOpenError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FileOpenError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Opens `path` and applies `reader` to it, attaching the path to any failure.
pub fn read_file_with<T>(
    path: impl AsRef<Path>,
    reader: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
) -> Result<T, FileReadError> {
    let path = path.as_ref();
    let mut buf = open_file_reader(path)?;
    reader(&mut buf).map_err(|source| FileReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`read_file_with`], but a missing file yields `Ok(None)`.
pub fn read_optional_file_with<T>(
    path: impl AsRef<Path>,
    reader: impl FnOnce(&mut BufReader<File>) -> io::Result<T>,
) -> Result<Option<T>, FileReadError> {
    match read_file_with(path, reader) {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.source.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Resolves an absolute path as seen from the host into a path below `rootfs`.
///
/// ```
/// # use std::path::{Path, PathBuf};
/// # use host_telemetry::fsutil::host_path;
/// assert_eq!(host_path("/rootfs", "/proc/1/cgroup"), PathBuf::from("/rootfs/proc/1/cgroup"));
/// assert_eq!(host_path("/", "/proc/1/cgroup"), PathBuf::from("/proc/1/cgroup"));
/// ```
pub fn host_path(rootfs: impl AsRef<Path>, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    rootfs
        .as_ref()
        .join(path.strip_prefix("/").unwrap_or(path))
}
