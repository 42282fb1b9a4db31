//! Environment based configuration of the demonstration agent.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::process::IncludeTop;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{name}`: expected {expected}")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Settings read from `ROOTFS_MOUNT_PATH`, `PROCESS_PATTERNS`, `ENABLE_CGROUPS`,
/// `ENABLE_NETWORK`, `CACHE_CMDLINE`, `ENV_WHITELIST`, `TOP_BY_CPU`,
/// `TOP_BY_MEMORY` and `SAMPLE_INTERVAL_MS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// `None` lets the runtime environment decide.
    pub rootfs: Option<PathBuf>,
    /// Comma separated name patterns. Defaults to every process.
    pub patterns: Vec<String>,
    pub enable_cgroups: bool,
    pub enable_network: bool,
    pub cache_cmdline: bool,
    /// Comma separated patterns of environment variable names to report.
    pub env_whitelist: Vec<String>,
    pub top: IncludeTop,
    /// Time between the two sampling ticks.
    pub interval: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            rootfs: None,
            patterns: vec![".*".to_string()],
            enable_cgroups: true,
            enable_network: false,
            cache_cmdline: true,
            env_whitelist: Vec::new(),
            top: IncludeTop::default(),
            interval: Duration::from_secs(1),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let patterns = var("PROCESS_PATTERNS")
            .map(|value| split_list(&value))
            .unwrap_or(defaults.patterns);
        let env_whitelist = var("ENV_WHITELIST")
            .map(|value| split_list(&value))
            .unwrap_or(defaults.env_whitelist);

        Ok(Self {
            rootfs: var("ROOTFS_MOUNT_PATH").map(PathBuf::from),
            patterns,
            enable_cgroups: parse_flag("ENABLE_CGROUPS", var("ENABLE_CGROUPS"))?
                .unwrap_or(defaults.enable_cgroups),
            enable_network: parse_flag("ENABLE_NETWORK", var("ENABLE_NETWORK"))?
                .unwrap_or(defaults.enable_network),
            cache_cmdline: parse_flag("CACHE_CMDLINE", var("CACHE_CMDLINE"))?
                .unwrap_or(defaults.cache_cmdline),
            env_whitelist,
            top: IncludeTop {
                by_cpu: parse_number("TOP_BY_CPU", var("TOP_BY_CPU"))?.unwrap_or(0),
                by_memory: parse_number("TOP_BY_MEMORY", var("TOP_BY_MEMORY"))?.unwrap_or(0),
            },
            interval: parse_number("SAMPLE_INTERVAL_MS", var("SAMPLE_INTERVAL_MS"))?
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(name: &'static str, value: Option<String>) -> Result<Option<bool>> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::InvalidValue {
            name,
            value,
            expected: "a boolean",
        }),
    }
}

fn parse_number<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>> {
    value
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| Error::InvalidValue {
                name,
                value,
                expected: "a non-negative integer",
            })
        })
        .transpose()
}
