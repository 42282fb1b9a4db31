use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use super::filter::ProcessFilter;
use super::history::ProcessHistory;
use super::linux::ProcfsSource;
use super::source::PlatformProcessSource;
use super::top::{IncludeTop, select_top};
use super::types::{IoRate, ProcessIdentity, ProcessSample, ProcessState};
use super::{Error, Result};
use crate::cgroup::{self, ReaderConfig};
use crate::delta;
use crate::error::ResultOkLogExt;

/// Settings of a [`Sampler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Root filesystem holding the host's `/proc` and `/sys`.
    pub rootfs: PathBuf,
    /// Attach the cgroup accounting of each sampled process.
    pub enable_cgroups: bool,
    /// Read per-process network counters.
    pub enable_network: bool,
    /// Reuse the command line of the previous sample of the same process
    /// instead of reading it again.
    pub cache_cmdline: bool,
    /// Patterns selecting the environment variables to collect. Empty
    /// collects none.
    pub env_whitelist: Vec<String>,
    /// Cgroup reader settings. Its `rootfs` is replaced by [`SamplerConfig::rootfs`].
    pub cgroup: ReaderConfig,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            rootfs: PathBuf::from("/"),
            enable_cgroups: true,
            enable_network: false,
            cache_cmdline: true,
            env_whitelist: Vec::new(),
            cgroup: ReaderConfig::default(),
        }
    }
}

impl SamplerConfig {
    pub fn with_rootfs(mut self, rootfs: impl Into<PathBuf>) -> Self {
        self.rootfs = rootfs.into();
        self
    }

    pub fn with_cgroups(mut self, enable: bool) -> Self {
        self.enable_cgroups = enable;
        self
    }

    pub fn with_network(mut self, enable: bool) -> Self {
        self.enable_network = enable;
        self
    }

    pub fn with_cmdline_cache(mut self, enable: bool) -> Self {
        self.cache_cmdline = enable;
        self
    }

    pub fn with_env_whitelist<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env_whitelist = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cgroup_config(mut self, cgroup: ReaderConfig) -> Self {
        self.cgroup = cgroup;
        self
    }
}

/// Outcome of [`Sampler::sample`].
#[derive(Debug, Clone, PartialEq)]
pub enum Sampled {
    Matched(ProcessSample),
    /// The name failed the filter. Only the identity was read.
    Filtered(ProcessIdentity),
}

/// Host facts shared by all samples of one call.
#[derive(Debug, Clone, Copy)]
struct HostFacts {
    mem_total: Option<u64>,
    num_cpus: usize,
}

/// Samples processes and derives their utilisation from the previous sample.
///
/// Every call is synchronous and opens its own files. The only state carried
/// between calls is the [`ProcessHistory`] passed in by the caller.
#[derive(Debug)]
pub struct Sampler<S = ProcfsSource> {
    source: S,
    cgroups: Option<cgroup::Reader>,
    enable_network: bool,
    cache_cmdline: bool,
    env_whitelist: ProcessFilter,
}

impl Sampler<ProcfsSource> {
    /// Creates a sampler reading `<rootfs>/proc`.
    ///
    /// # Errors
    ///
    /// - [`Error::Cgroup`] if cgroups are enabled and the cgroup mounts can't
    ///   be discovered.
    /// - [`Error::InvalidPattern`] for a bad environment whitelist pattern.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        let source = ProcfsSource::new(&config.rootfs);
        Self::with_source(source, config)
    }
}

impl<S: PlatformProcessSource> Sampler<S> {
    pub fn with_source(source: S, config: SamplerConfig) -> Result<Self> {
        let env_whitelist = ProcessFilter::new(&config.env_whitelist)?;
        let cgroups = if config.enable_cgroups {
            let reader_config = config.cgroup.with_rootfs(config.rootfs);
            Some(cgroup::Reader::new(reader_config).map_err(Error::Cgroup)?)
        } else {
            None
        };
        Ok(Self {
            source,
            cgroups,
            enable_network: config.enable_network,
            cache_cmdline: config.cache_cmdline,
            env_whitelist,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Samples `pid`, updating its entry in `history`.
    ///
    /// With a `filter`, the identity is read first and a process whose name
    /// does not match is returned as [`Sampled::Filtered`] without reading
    /// anything else.
    ///
    /// # Errors
    ///
    /// - [`Error::ProcessNotFound`] if the process exited or its PID was reused
    ///   while sampling.
    /// - [`Error::Cgroup`] if cgroups are enabled and the process' cgroup
    ///   can't be resolved. A process in an ignored root cgroup is sampled
    ///   without cgroup data instead.
    pub fn sample(
        &self,
        pid: u32,
        history: &ProcessHistory,
        filter: Option<&ProcessFilter>,
    ) -> Result<Sampled> {
        self.sample_at(pid, history, filter, self.host_facts(), SystemTime::now())
    }

    /// Samples `pid` regardless of its name.
    pub fn sample_one(&self, pid: u32, history: &ProcessHistory) -> Result<ProcessSample> {
        let identity = self.source.identity(pid)?;
        self.collect(identity, history, self.host_facts(), SystemTime::now())
    }

    /// Samples the calling process.
    pub fn sample_self(&self, history: &ProcessHistory) -> Result<ProcessSample> {
        let pid = self.source.self_pid()?;
        self.sample_one(pid, history)
    }

    /// Samples every process whose name matches `filter`, then applies `top`.
    ///
    /// Processes that fail to sample are skipped. Only failing to list the
    /// process table fails the call.
    pub fn sample_all(
        &self,
        filter: &ProcessFilter,
        history: &ProcessHistory,
        top: Option<IncludeTop>,
    ) -> Result<Vec<ProcessSample>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let pids = self.source.list_pids()?;
        let facts = self.host_facts();

        let mut samples = Vec::new();
        for pid in pids {
            match self.sample_at(pid, history, Some(filter), facts, SystemTime::now()) {
                Err(err) if err.is_process_not_found() => {
                    log::debug!("process {pid} exited while being sampled");
                }
                result => {
                    if let Some(Sampled::Matched(sample)) = result.ok_log() {
                        samples.push(sample);
                    }
                }
            }
        }
        log::trace!("sampled {} processes", samples.len());

        Ok(match top {
            Some(top) => select_top(samples, top),
            None => samples,
        })
    }

    /// Lists the identities of processes whose name matches `filter`.
    pub fn list_processes(&self, filter: &ProcessFilter) -> Result<Vec<ProcessIdentity>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let mut processes = Vec::new();
        for pid in self.source.list_pids()? {
            match self.source.identity(pid) {
                Ok(identity) if filter.matches(&identity.name) => processes.push(identity),
                Ok(_) => {}
                Err(err) if err.is_process_not_found() => {
                    log::debug!("process {pid} exited while being listed");
                }
                Err(err) => {
                    log::error!("{err}");
                }
            }
        }
        Ok(processes)
    }

    /// Returns the scheduling state of `pid`.
    pub fn pid_state(&self, pid: u32) -> Result<ProcessState> {
        self.source.identity(pid).map(|identity| identity.state)
    }

    fn sample_at(
        &self,
        pid: u32,
        history: &ProcessHistory,
        filter: Option<&ProcessFilter>,
        facts: HostFacts,
        now: SystemTime,
    ) -> Result<Sampled> {
        let identity = self.source.identity(pid)?;
        if filter.is_some_and(|filter| !filter.matches(&identity.name)) {
            return Ok(Sampled::Filtered(identity));
        }
        self.collect(identity, history, facts, now)
            .map(Sampled::Matched)
    }

    /// Reads extended metrics, the command line and environment, then cgroup
    /// accounting, then computes deltas against `history` and records the
    /// result there.
    fn collect(
        &self,
        identity: ProcessIdentity,
        history: &ProcessHistory,
        facts: HostFacts,
        now: SystemTime,
    ) -> Result<ProcessSample> {
        let pid = identity.pid;
        let previous = history
            .get(pid)
            .filter(|prev| prev.identity.same_process(&identity));
        let metrics = self.source.extended(pid, &identity, self.enable_network)?;

        let args = match &previous {
            Some(prev) if self.cache_cmdline && !prev.args.is_empty() => prev.args.clone(),
            _ => self.source.args(pid)?,
        };
        let env = match &previous {
            _ if self.env_whitelist.is_empty() => BTreeMap::new(),
            Some(prev) => prev.env.clone(),
            None => self.source.environ(pid, &self.env_whitelist)?,
        };

        let cgroup = match &self.cgroups {
            Some(reader) => match reader.get_stats_for_pid(pid) {
                Ok(snapshot) => Some(snapshot),
                Err(cgroup::Error::NotApplicable { .. }) => None,
                Err(err) => return Err(Error::from_cgroup(pid, err)),
            },
            None => None,
        };

        let mut sample = ProcessSample {
            identity,
            uid: metrics.uid,
            cpu: metrics.cpu,
            memory: metrics.memory,
            cmdline: args.join(" "),
            args,
            env,
            io: metrics.io,
            io_rate: None,
            network: metrics.network,
            cgroup,
            sample_time: now,
        };
        apply_deltas(&mut sample, previous.as_ref(), facts);
        history.insert(sample.clone());
        Ok(sample)
    }

    fn host_facts(&self) -> HostFacts {
        HostFacts {
            mem_total: self.source.host_memory_total().ok_log(),
            num_cpus: self.source.num_cpus().ok_log().unwrap_or(1),
        }
    }
}

/// Fills the derived percentages of `sample`.
///
/// CPU percentages need a `previous` sample of the same process instance; a
/// PID reused by a new process starts over without them.
fn apply_deltas(sample: &mut ProcessSample, previous: Option<&ProcessSample>, facts: HostFacts) {
    sample.memory.pct = facts
        .mem_total
        .and_then(|total| delta::ratio(sample.memory.rss, total));

    let Some(previous) = previous.filter(|prev| prev.identity.same_process(&sample.identity))
    else {
        return;
    };
    let Ok(elapsed) = sample.sample_time.duration_since(previous.sample_time) else {
        return;
    };

    if let Some(cpu) =
        delta::cpu_percent(previous.cpu.total, sample.cpu.total, elapsed, facts.num_cpus)
    {
        sample.cpu.pct = Some(cpu.pct);
        sample.cpu.norm_pct = Some(cpu.norm_pct);
    }
    if let (Some(current), Some(prev)) = (sample.io, previous.io) {
        let read = delta::rate(prev.read_bytes, current.read_bytes, elapsed);
        let write = delta::rate(prev.write_bytes, current.write_bytes, elapsed);
        if let (Some(read_bytes), Some(write_bytes)) = (read, write) {
            sample.io_rate = Some(IoRate {
                read_bytes,
                write_bytes,
            });
        }
    }
    if let (Some(current), Some(prev)) = (sample.cgroup.as_mut(), previous.cgroup.as_ref()) {
        current.fill_cpu_usage(prev, elapsed, facts.num_cpus);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::{CpuUsage, ExtendedMetrics, IoCounters, MemoryUsage};
    use crate::testutil::FakeRoot;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FakeSource {
        processes: Mutex<HashMap<u32, (ProcessIdentity, ExtendedMetrics)>>,
        args: Mutex<HashMap<u32, Vec<String>>>,
        environ: Mutex<HashMap<u32, BTreeMap<String, String>>>,
        identity_calls: AtomicUsize,
        extended_calls: AtomicUsize,
        args_calls: AtomicUsize,
        environ_calls: AtomicUsize,
    }

    impl FakeSource {
        fn add(&self, pid: u32, name: &str, start_time: u64, cpu_secs: u64, rss: u64) {
            let identity = ProcessIdentity {
                pid,
                name: name.to_string(),
                state: ProcessState::Sleeping,
                ppid: 1,
                pgid: pid,
                num_threads: 1,
                start_time,
            };
            let metrics = ExtendedMetrics {
                start_time,
                uid: Some(1000),
                cpu: CpuUsage {
                    total: Duration::from_secs(cpu_secs),
                    ..Default::default()
                },
                memory: MemoryUsage {
                    rss,
                    ..Default::default()
                },
                io: None,
                network: None,
            };
            self.processes.lock().unwrap().insert(pid, (identity, metrics));
        }

        fn set_args(&self, pid: u32, args: &[&str]) {
            let args = args.iter().map(|arg| arg.to_string()).collect();
            self.args.lock().unwrap().insert(pid, args);
        }

        fn set_environ(&self, pid: u32, vars: &[(&str, &str)]) {
            let vars = vars
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            self.environ.lock().unwrap().insert(pid, vars);
        }

        fn set_io(&self, pid: u32, read_bytes: u64, write_bytes: u64) {
            let mut processes = self.processes.lock().unwrap();
            let (_, metrics) = processes.get_mut(&pid).unwrap();
            metrics.io = Some(IoCounters {
                read_bytes,
                write_bytes,
                ..Default::default()
            });
        }

        fn remove(&self, pid: u32) {
            self.processes.lock().unwrap().remove(&pid);
        }
    }

    impl PlatformProcessSource for FakeSource {
        fn list_pids(&self) -> Result<Vec<u32>> {
            let mut pids: Vec<u32> = self.processes.lock().unwrap().keys().copied().collect();
            pids.sort_unstable();
            Ok(pids)
        }

        fn identity(&self, pid: u32) -> Result<ProcessIdentity> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            let processes = self.processes.lock().unwrap();
            let (identity, _) = processes.get(&pid).ok_or(Error::ProcessNotFound { pid })?;
            Ok(identity.clone())
        }

        fn extended(
            &self,
            pid: u32,
            _identity: &ProcessIdentity,
            _network: bool,
        ) -> Result<ExtendedMetrics> {
            self.extended_calls.fetch_add(1, Ordering::SeqCst);
            let processes = self.processes.lock().unwrap();
            let (_, metrics) = processes.get(&pid).ok_or(Error::ProcessNotFound { pid })?;
            Ok(metrics.clone())
        }

        fn args(&self, pid: u32) -> Result<Vec<String>> {
            self.args_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.args.lock().unwrap().get(&pid).cloned().unwrap_or_default())
        }

        fn environ(
            &self,
            pid: u32,
            whitelist: &ProcessFilter,
        ) -> Result<BTreeMap<String, String>> {
            self.environ_calls.fetch_add(1, Ordering::SeqCst);
            let environ = self.environ.lock().unwrap();
            Ok(environ
                .get(&pid)
                .into_iter()
                .flatten()
                .filter(|(key, _)| whitelist.matches(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect())
        }

        fn self_pid(&self) -> Result<u32> {
            Ok(std::process::id())
        }

        fn host_memory_total(&self) -> Result<u64> {
            Ok(1000)
        }

        fn num_cpus(&self) -> Result<usize> {
            Ok(4)
        }
    }

    fn sampler() -> Sampler<FakeSource> {
        Sampler::with_source(FakeSource::default(), SamplerConfig::default().with_cgroups(false))
            .unwrap()
    }

    fn facts() -> HostFacts {
        HostFacts {
            mem_total: Some(1000),
            num_cpus: 4,
        }
    }

    fn matched(sampled: Sampled) -> ProcessSample {
        match sampled {
            Sampled::Matched(sample) => sample,
            Sampled::Filtered(identity) => panic!("Expected {} to match", identity.name),
        }
    }

    #[test]
    fn test_filter_short_circuits_extended_fetch() {
        let sampler = sampler();
        sampler.source().add(10, "redis-server", 1, 5, 100);
        let filter = ProcessFilter::new(["^nginx"]).unwrap();
        let history = ProcessHistory::new();

        let sampled = sampler.sample(10, &history, Some(&filter)).unwrap();
        assert!(matches!(sampled, Sampled::Filtered(ref identity) if identity.pid == 10));
        assert_eq!(sampler.source().identity_calls.load(Ordering::SeqCst), 1);
        assert_eq!(sampler.source().extended_calls.load(Ordering::SeqCst), 0);
        assert_eq!(sampler.source().args_calls.load(Ordering::SeqCst), 0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_first_sample_has_no_cpu_percent() {
        let sampler = sampler();
        sampler.source().add(10, "nginx", 1, 5, 250);
        let history = ProcessHistory::new();

        let sample = sampler.sample_one(10, &history).unwrap();
        assert_eq!(sample.cpu.pct, None);
        assert_eq!(sample.cpu.norm_pct, None);
        assert_eq!(sample.memory.pct, Some(0.25));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_cpu_percent_from_previous_sample() {
        let sampler = sampler();
        let history = ProcessHistory::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        sampler.source().add(10, "nginx", 1, 5, 100);
        sampler.sample_at(10, &history, None, facts(), t0).unwrap();
        sampler.source().add(10, "nginx", 1, 9, 100);
        let sample = matched(
            sampler
                .sample_at(10, &history, None, facts(), t0 + Duration::from_secs(2))
                .unwrap(),
        );

        assert_eq!(sample.cpu.pct, Some(2.0));
        assert_eq!(sample.cpu.norm_pct, Some(0.5));
        assert_eq!(history.get(10).unwrap().sample_time, t0 + Duration::from_secs(2));
    }

    #[test]
    fn test_pid_reuse_resets_delta() {
        let sampler = sampler();
        let history = ProcessHistory::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        sampler.source().add(10, "nginx", 1, 50, 100);
        sampler.sample_at(10, &history, None, facts(), t0).unwrap();
        sampler.source().add(10, "nginx", 77, 1, 100);
        let sample = matched(
            sampler
                .sample_at(10, &history, None, facts(), t0 + Duration::from_secs(2))
                .unwrap(),
        );

        assert_eq!(sample.cpu.pct, None);
        assert_eq!(history.get(10).unwrap().identity.start_time, 77);
    }

    #[test]
    fn test_cmdline_reused_from_previous_sample() {
        let sampler = sampler();
        sampler.source().add(10, "nginx", 1, 5, 100);
        sampler.source().set_args(10, &["nginx", "-g", "daemon off;"]);
        let history = ProcessHistory::new();

        let first = sampler.sample_one(10, &history).unwrap();
        assert_eq!(first.cmdline, "nginx -g daemon off;");
        sampler.source().set_args(10, &["changed"]);
        let second = sampler.sample_one(10, &history).unwrap();

        assert_eq!(second.args, vec!["nginx", "-g", "daemon off;"]);
        assert_eq!(second.cmdline, first.cmdline);
        assert_eq!(sampler.source().args_calls.load(Ordering::SeqCst), 1);

        sampler.source().add(10, "nginx", 99, 5, 100);
        let reused = sampler.sample_one(10, &history).unwrap();
        assert_eq!(reused.args, vec!["changed"]);
        assert_eq!(sampler.source().args_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cmdline_read_every_time_without_cache() {
        let sampler = Sampler::with_source(
            FakeSource::default(),
            SamplerConfig::default()
                .with_cgroups(false)
                .with_cmdline_cache(false),
        )
        .unwrap();
        sampler.source().add(10, "nginx", 1, 5, 100);
        sampler.source().set_args(10, &["nginx"]);
        let history = ProcessHistory::new();

        sampler.sample_one(10, &history).unwrap();
        sampler.source().set_args(10, &["nginx", "-s", "reload"]);
        let second = sampler.sample_one(10, &history).unwrap();
        assert_eq!(second.cmdline, "nginx -s reload");
        assert_eq!(sampler.source().args_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_env_whitelist() {
        let sampler = Sampler::with_source(
            FakeSource::default(),
            SamplerConfig::default()
                .with_cgroups(false)
                .with_env_whitelist(["^JAVA_"]),
        )
        .unwrap();
        sampler.source().add(10, "java", 1, 5, 100);
        sampler
            .source()
            .set_environ(10, &[("JAVA_HOME", "/opt/jdk"), ("AWS_SECRET", "x")]);
        let history = ProcessHistory::new();

        let first = sampler.sample_one(10, &history).unwrap();
        assert_eq!(first.env.len(), 1);
        assert_eq!(first.env["JAVA_HOME"], "/opt/jdk");
        let second = sampler.sample_one(10, &history).unwrap();
        assert_eq!(second.env, first.env);
        assert_eq!(sampler.source().environ_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_env_not_collected_without_whitelist() {
        let sampler = sampler();
        sampler.source().add(10, "java", 1, 5, 100);
        sampler.source().set_environ(10, &[("JAVA_HOME", "/opt/jdk")]);

        let sample = sampler.sample_one(10, &ProcessHistory::new()).unwrap();
        assert!(sample.env.is_empty());
        assert_eq!(sampler.source().environ_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_env_whitelist() {
        let config = SamplerConfig::default()
            .with_cgroups(false)
            .with_env_whitelist(["("]);
        match Sampler::with_source(FakeSource::default(), config).unwrap_err() {
            Error::InvalidPattern { pattern, .. } => assert_eq!(pattern, "("),
            _ => panic!("Expected InvalidPattern error"),
        }
    }

    #[test]
    fn test_io_rate_from_previous_sample() {
        let sampler = sampler();
        let history = ProcessHistory::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        sampler.source().add(10, "postgres", 1, 5, 100);
        sampler.source().set_io(10, 100, 4096);
        let first = matched(sampler.sample_at(10, &history, None, facts(), t0).unwrap());
        assert!(first.io_rate.is_none());

        sampler.source().set_io(10, 200, 12288);
        let second = matched(
            sampler
                .sample_at(10, &history, None, facts(), t0 + Duration::from_secs(2))
                .unwrap(),
        );
        let rate = second.io_rate.unwrap();
        assert_eq!(rate.read_bytes, 50.0);
        assert_eq!(rate.write_bytes, 4096.0);
    }

    #[test]
    fn test_sample_self() {
        let sampler = sampler();
        let pid = std::process::id();
        sampler.source().add(pid, "host-telemetry", 1, 1, 10);
        let history = ProcessHistory::new();

        let sample = sampler.sample_self(&history).unwrap();
        assert_eq!(sample.identity.pid, pid);
        assert!(history.get(pid).is_some());
    }

    #[test]
    fn test_sample_all_skips_vanished_and_filtered() {
        let sampler = sampler();
        sampler.source().add(1, "systemd", 1, 1, 10);
        sampler.source().add(2, "nginx", 1, 1, 10);
        sampler.source().add(3, "nginx", 1, 1, 20);
        let filter = ProcessFilter::new(["nginx"]).unwrap();
        let history = ProcessHistory::new();

        let samples = sampler.sample_all(&filter, &history, None).unwrap();
        let pids: Vec<u32> = samples.iter().map(|s| s.identity.pid).collect();
        assert_eq!(pids, vec![2, 3]);

        sampler.source().remove(2);
        let samples = sampler.sample_all(&filter, &history, None).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(history.len(), 2, "vanished PIDs stay until removed");
    }

    #[test]
    fn test_sample_all_with_top() {
        let sampler = sampler();
        sampler.source().add(1, "worker", 1, 1, 10);
        sampler.source().add(2, "worker", 1, 1, 30);
        sampler.source().add(3, "worker", 1, 1, 20);
        let filter = ProcessFilter::new(["worker"]).unwrap();
        let top = IncludeTop {
            by_cpu: 0,
            by_memory: 2,
        };

        let samples = sampler
            .sample_all(&filter, &ProcessHistory::new(), Some(top))
            .unwrap();
        let pids: Vec<u32> = samples.iter().map(|s| s.identity.pid).collect();
        assert_eq!(pids, vec![2, 3]);
    }

    #[test]
    fn test_empty_filter_lists_nothing() {
        let sampler = sampler();
        sampler.source().add(1, "systemd", 1, 1, 10);
        let filter = ProcessFilter::default();

        assert!(sampler.list_processes(&filter).unwrap().is_empty());
        assert!(
            sampler
                .sample_all(&filter, &ProcessHistory::new(), None)
                .unwrap()
                .is_empty()
        );
        assert_eq!(sampler.source().identity_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_list_processes_and_pid_state() {
        let sampler = sampler();
        sampler.source().add(1, "systemd", 1, 1, 10);
        sampler.source().add(2, "sshd", 1, 1, 10);
        let filter = ProcessFilter::new(["^s"]).unwrap();

        let names: Vec<String> = sampler
            .list_processes(&filter)
            .unwrap()
            .into_iter()
            .map(|identity| identity.name)
            .collect();
        assert_eq!(names, vec!["systemd", "sshd"]);
        assert_eq!(sampler.pid_state(2).unwrap(), ProcessState::Sleeping);
        assert!(sampler.pid_state(99).unwrap_err().is_process_not_found());
    }

    fn cgroup_sampler(root: &FakeRoot) -> Sampler<FakeSource> {
        let config = SamplerConfig::default().with_rootfs(root.path());
        Sampler::with_source(FakeSource::default(), config).unwrap()
    }

    #[test]
    fn test_cgroup_snapshot_and_cpu_usage() {
        let root = FakeRoot::v2();
        root.membership(10, "0::/system.slice/nginx.service\n");
        let cg = root.cgroup_v2("/system.slice/nginx.service");
        cg.write("cpu.stat", "usage_usec 1000000\n");
        let sampler = cgroup_sampler(&root);
        sampler.source().add(10, "nginx", 1, 1, 10);
        let history = ProcessHistory::new();
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let first = matched(sampler.sample_at(10, &history, None, facts(), t0).unwrap());
        let snapshot = first.cgroup.unwrap();
        assert_eq!(snapshot.id, "nginx.service");
        assert!(snapshot.cpu_usage.is_none());

        cg.write("cpu.stat", "usage_usec 3000000\n");
        let second = matched(
            sampler
                .sample_at(10, &history, None, facts(), t0 + Duration::from_secs(4))
                .unwrap(),
        );
        let usage = second.cgroup.unwrap().cpu_usage.unwrap();
        assert_eq!(usage.pct, 0.5);
        assert_eq!(usage.norm_pct, 0.125);
    }

    #[test]
    fn test_root_cgroup_sampled_without_cgroup() {
        let root = FakeRoot::v2();
        root.membership(1, "0::/\n");
        let sampler = cgroup_sampler(&root);
        sampler.source().add(1, "systemd", 1, 1, 10);

        let sample = sampler.sample_one(1, &ProcessHistory::new()).unwrap();
        assert!(sample.cgroup.is_none());
    }

    #[test]
    fn test_vanished_cgroup_membership_is_process_not_found() {
        let root = FakeRoot::v2();
        let sampler = cgroup_sampler(&root);
        sampler.source().add(5, "short-lived", 1, 1, 10);
        let history = ProcessHistory::new();

        let err = sampler.sample_one(5, &history).unwrap_err();
        assert!(err.is_process_not_found());
        assert!(history.is_empty());
    }

    #[test]
    fn test_new_fails_without_cgroup_mounts() {
        let root = FakeRoot::empty();
        let config = SamplerConfig::default().with_rootfs(root.path());
        match Sampler::with_source(FakeSource::default(), config).unwrap_err() {
            Error::Cgroup(cgroup::Error::Mount(_)) => {}
            _ => panic!("Expected Cgroup mount error"),
        }
    }
}
