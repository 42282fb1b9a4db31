use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::filter::ProcessFilter;
use super::net::NetworkCounters;
use super::procfs::{self, Statm, Status};
use super::source::PlatformProcessSource;
use super::types::{CpuUsage, ExtendedMetrics, IoCounters, MemoryUsage, ProcessIdentity};
use super::{Error, Result};
use crate::fsutil::{self, FileReadError};
use crate::host;
use crate::parser::{KeyValueStat, SingleLineStat};

/// Reads processes from a procfs mounted below a root filesystem.
#[derive(Debug, Clone)]
pub struct ProcfsSource {
    rootfs: PathBuf,
    proc: PathBuf,
}

impl ProcfsSource {
    pub fn new(rootfs: impl Into<PathBuf>) -> Self {
        let rootfs = rootfs.into();
        let proc = fsutil::host_path(&rootfs, "/proc");
        Self { rootfs, proc }
    }

    fn file(&self, pid: u32, name: &str) -> PathBuf {
        self.proc.join(pid.to_string()).join(name)
    }

    fn read_stat(&self, pid: u32) -> Result<procfs::ProcStat> {
        let path = self.file(pid, "stat");
        let content = fsutil::read_file_with(&path, |buf| {
            let mut content = String::new();
            buf.read_to_string(&mut content)?;
            Ok(content)
        })
        .map_err(|err| Error::read(pid, err))?;
        procfs::parse_stat(&content).map_err(|err| Error::MalformedStat {
            path,
            reason: err.to_string(),
        })
    }

    /// Reads an optional per-process file. A missing or unreadable file is
    /// logged and yields `None`; one with malformed content is an error.
    fn read_soft<T>(
        &self,
        pid: u32,
        result: std::result::Result<T, FileReadError>,
    ) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() && !self.proc.join(pid.to_string()).exists() => {
                Err(Error::ProcessNotFound { pid })
            }
            Err(err) if err.parse_error().is_some() => Err(Error::Read(err)),
            Err(err) => {
                log::debug!("skipping optional metric of process {pid}: {err}");
                Ok(None)
            }
        }
    }
}

fn read_bytes(path: &Path) -> std::result::Result<Vec<u8>, FileReadError> {
    fsutil::read_file_with(path, |buf| {
        let mut bytes = Vec::new();
        buf.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn is_pid_dir(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

fn list_pids_in(proc: &Path) -> Result<Vec<u32>> {
    let enumerate = |source| Error::Enumerate {
        path: proc.to_path_buf(),
        source,
    };
    let mut pids = Vec::new();
    for entry in std::fs::read_dir(proc).map_err(enumerate)? {
        let entry = entry.map_err(enumerate)?;
        if let Some(pid) = entry.file_name().to_str().and_then(is_pid_dir) {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

impl PlatformProcessSource for ProcfsSource {
    fn list_pids(&self) -> Result<Vec<u32>> {
        list_pids_in(&self.proc)
    }

    fn identity(&self, pid: u32) -> Result<ProcessIdentity> {
        let stat = self.read_stat(pid)?;
        Ok(ProcessIdentity {
            pid,
            name: stat.name,
            state: stat.state,
            ppid: stat.ppid,
            pgid: stat.pgid,
            num_threads: stat.num_threads,
            start_time: stat.start_time,
        })
    }

    fn extended(
        &self,
        pid: u32,
        identity: &ProcessIdentity,
        network: bool,
    ) -> Result<ExtendedMetrics> {
        let stat = self.read_stat(pid)?;
        if stat.start_time != identity.start_time {
            log::debug!("pid {pid} was reused while being sampled");
            return Err(Error::ProcessNotFound { pid });
        }

        let statm = fsutil::read_file_with(self.file(pid, "statm"), Statm::from_reader)
            .map_err(|err| Error::read(pid, err))?;
        let status = fsutil::read_file_with(self.file(pid, "status"), Status::from_reader);
        let status = self.read_soft(pid, status)?.unwrap_or_default();
        let io = fsutil::read_file_with(self.file(pid, "io"), IoCounters::from_reader);
        let io = self.read_soft(pid, io)?;
        let network = if network {
            let counters =
                fsutil::read_file_with(self.file(pid, "net/dev"), NetworkCounters::from_reader);
            self.read_soft(pid, counters)?
        } else {
            None
        };

        let user = host::ticks_to_duration(stat.utime);
        let system = host::ticks_to_duration(stat.stime);
        Ok(ExtendedMetrics {
            start_time: stat.start_time,
            uid: status.uid,
            cpu: CpuUsage {
                user,
                system,
                total: user + system,
                pct: None,
                norm_pct: None,
            },
            memory: MemoryUsage {
                size: statm.size,
                rss: statm.resident,
                share: statm.shared,
                pct: None,
            },
            io,
            network,
        })
    }

    fn args(&self, pid: u32) -> Result<Vec<String>> {
        let raw = self.read_soft(pid, read_bytes(&self.file(pid, "cmdline")))?;
        Ok(raw.map(|raw| procfs::parse_cmdline(&raw)).unwrap_or_default())
    }

    fn environ(&self, pid: u32, whitelist: &ProcessFilter) -> Result<BTreeMap<String, String>> {
        let raw = self.read_soft(pid, read_bytes(&self.file(pid, "environ")))?;
        Ok(raw
            .map(|raw| procfs::parse_environ(&raw, |key| whitelist.matches(key)))
            .unwrap_or_default())
    }

    /// Resolves `<proc>/self`, which names the caller in the PID namespace of
    /// the mounted procfs rather than its own.
    fn self_pid(&self) -> Result<u32> {
        let path = self.proc.join("self");
        let target = std::fs::read_link(&path).map_err(|source| {
            Error::Read(FileReadError {
                path: path.clone(),
                source,
            })
        })?;
        target
            .to_str()
            .and_then(is_pid_dir)
            .ok_or_else(|| Error::MalformedStat {
                reason: format!("unexpected link target `{}`", target.display()),
                path,
            })
    }

    fn host_memory_total(&self) -> Result<u64> {
        host::read_mem_total(&self.rootfs).map_err(Error::Read)
    }

    fn num_cpus(&self) -> Result<usize> {
        host::read_num_cpus(&self.rootfs).map_err(Error::Read)
    }
}
