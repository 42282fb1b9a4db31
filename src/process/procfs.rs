//! Parsers for the per-process files below `/proc/<pid>`.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::host;
use crate::parser::{Handler, KeyValueStat, SingleLineStat, StatParseError, parse_u64};

use super::types::ProcessState;

/// Fields of `/proc/<pid>/stat` used by the sampler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProcStat {
    pub name: String,
    pub state: ProcessState,
    pub ppid: u32,
    pub pgid: u32,
    /// User time in clock ticks.
    pub utime: u64,
    /// System time in clock ticks.
    pub stime: u64,
    pub num_threads: u64,
    pub start_time: u64,
}

// Indices into the fields following the closing parenthesis of `comm`.
const STATE: usize = 0;
const PPID: usize = 1;
const PGRP: usize = 2;
const UTIME: usize = 11;
const STIME: usize = 12;
const NUM_THREADS: usize = 17;
const STARTTIME: usize = 19;

/// Parses the content of `/proc/<pid>/stat`.
///
/// `comm` may contain spaces and parentheses, so it spans from the first `(`
/// to the last `)`.
pub(crate) fn parse_stat(content: &str) -> Result<ProcStat, StatParseError> {
    let content = content.trim_end();
    let unexpected = || StatParseError::UnexpectedFormat {
        content: content.to_string(),
        line: 1,
    };

    let open = content.find('(').ok_or_else(unexpected)?;
    let close = content.rfind(')').ok_or_else(unexpected)?;
    if close < open {
        return Err(unexpected());
    }
    let name = content[open + 1..close].to_string();
    let fields: Vec<&str> = content[close + 1..].split_whitespace().collect();
    if fields.len() <= STARTTIME {
        return Err(unexpected());
    }

    let state = fields[STATE].chars().next().ok_or_else(unexpected)?;
    Ok(ProcStat {
        name,
        state: ProcessState::from(state),
        ppid: parse_field(fields[PPID])?,
        pgid: parse_field(fields[PGRP])?,
        utime: parse_u64(fields[UTIME], 1)?,
        stime: parse_u64(fields[STIME], 1)?,
        num_threads: parse_u64(fields[NUM_THREADS], 1)?,
        start_time: parse_u64(fields[STARTTIME], 1)?,
    })
}

fn parse_field<T>(value: &str) -> Result<T, StatParseError>
where
    T: FromStr<Err = std::num::ParseIntError>,
{
    value.parse::<T>().map_err(|source| StatParseError::InvalidValue {
        value: value.to_string(),
        line: 1,
        source,
    })
}

/// `/proc/<pid>/statm`, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Statm {
    pub size: u64,
    pub resident: u64,
    pub shared: u64,
}

impl SingleLineStat for Statm {
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut line = String::new();
        buf.read_line(&mut line)?;
        let pages = line
            .split_whitespace()
            .take(3)
            .map(|value| parse_u64(value, 1))
            .collect::<Result<Vec<_>, _>>()?;
        let [size, resident, shared] = pages[..] else {
            return Err(StatParseError::UnexpectedFormat {
                content: line.trim().to_string(),
                line: 1,
            }
            .into());
        };
        let page_size = *host::PAGE_SIZE;
        Ok(Statm {
            size: size.saturating_mul(page_size),
            resident: resident.saturating_mul(page_size),
            shared: shared.saturating_mul(page_size),
        })
    }
}

/// The subset of `/proc/<pid>/status` not covered by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Status {
    /// Real user ID, the first value of the `Uid:` line.
    pub uid: Option<u32>,
}

static STATUS_HANDLERS: LazyLock<HashMap<&'static str, Handler<Status>>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Handler<Status>> = HashMap::with_capacity(1);
    m.insert("Uid:", |s, v| s.uid = u32::try_from(v).ok());
    m
});

impl KeyValueStat for Status {
    const SPLIT_CHAR: Option<char> = None;
    const SKIP_LINES: usize = 0;
    const SKIP_VALUES: usize = 0;
    const ALLOW_DUPLICATE_KEYS: bool = false;
    const ALLOW_MULTIPLE_KV_PER_LINE: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
        &STATUS_HANDLERS
    }
}

/// Splits the NUL separated `/proc/<pid>/cmdline` into arguments.
///
/// Kernel threads have an empty command line and yield no arguments.
pub(crate) fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    raw.split(|&b| b == 0)
        .filter(|arg| !arg.is_empty())
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Collects the `KEY=VALUE` entries of `/proc/<pid>/environ` whose key passes `keep`.
pub(crate) fn parse_environ(raw: &[u8], keep: impl Fn(&str) -> bool) -> BTreeMap<String, String> {
    raw.split(|&b| b == 0)
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (key, value) = entry.split_once('=')?;
            keep(key).then(|| (key.to_string(), value.to_string()))
        })
        .collect()
}
