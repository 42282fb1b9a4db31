//! Host Telemetry: per-process resource accounting from `/proc` and cgroups.
//!
//! The library samples processes, attaches the cgroup v1 or v2 accounting of
//! each one and turns cumulative counters into percentages across sampling
//! ticks. Scheduling and shipping the samples are left to the caller.

use std::path::PathBuf;
use std::time::Instant;

use environment::RuntimeEnvironment;
use process::{ProcessFilter, ProcessHistory, Sampler, SamplerConfig};

pub mod cgroup;
pub mod config;
pub mod delta;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod host;
pub mod mountinfo;
pub mod parser;
pub mod process;

#[cfg(test)]
mod testutil;

/// Runs the demonstration agent: two sampling ticks, the second printed as JSON.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid environment variables (see [`config::AgentConfig`]).
/// - A container runtime environment without the host root mounted.
/// - Missing cgroup mounts while cgroup accounting is enabled.
/// - Failure to list `/proc`.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::AgentConfig::from_env()?;
    let rootfs = match config.rootfs {
        Some(rootfs) => rootfs,
        None => detect_rootfs()?,
    };
    log::debug!("Final rootfs: {}", rootfs.display());

    let filter = ProcessFilter::new(&config.patterns)?;
    let sampler = Sampler::new(
        SamplerConfig::default()
            .with_rootfs(rootfs)
            .with_cgroups(config.enable_cgroups)
            .with_network(config.enable_network)
            .with_cmdline_cache(config.cache_cmdline)
            .with_env_whitelist(config.env_whitelist),
    )?;
    let history = ProcessHistory::new();

    sampler.sample_all(&filter, &history, None)?;
    std::thread::sleep(config.interval);

    let before = Instant::now();
    let samples = sampler.sample_all(&filter, &history, Some(config.top))?;
    log::trace!("sample_all() took {} nanoseconds", before.elapsed().as_nanos());

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &samples)?;
    std::io::Write::write_all(&mut stdout, b"\n")?;
    Ok(())
}

fn detect_rootfs() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let rootfs = PathBuf::from(environment::CONTAINER_ROOTFS);
    match environment::detect_runtime_environment(&rootfs) {
        RuntimeEnvironment::Container if !rootfs.exists() => Err(format!(
            "Detected container runtime environment, but missing host root mount at `{}`!",
            rootfs.display()
        )
        .into()),
        RuntimeEnvironment::Container => Ok(rootfs),
        RuntimeEnvironment::Host => Ok(PathBuf::from("/")),
    }
}
