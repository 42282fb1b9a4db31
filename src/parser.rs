//! Generic parsing building blocks for Linux kernel accounting files.
//!
//! Most files under `/sys/fs/cgroup` and `/proc` fall into a handful of shapes:
//!
//! - multi-line `key value` or `key=value` listings (`cpu.stat`, `memory.stat`,
//!   `/proc/meminfo`, `/proc/<pid>/io`), handled by [`KeyValueStat`];
//! - a single line holding one or a few values (`cpu.max`, `cpuacct.usage_percpu`),
//!   handled by [`SingleLineStat`];
//! - a single scalar, possibly the keyword `max` (`memory.current`, `pids.max`),
//!   handled by [`read_u64`], [`read_i64`] and [`read_limit`].
//!
//! Every parse failure is reported as a [`StatParseError`] wrapped in an
//! [`std::io::Error`] of kind `InvalidData`.
//!
//! # Example: Implementing `KeyValueStat`
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::LazyLock;
//! use host_telemetry::parser::{Handler, KeyValueStat};
//!
//! #[derive(Default)]
//! struct MyStat {
//!     foo: u64,
//! }
//!
//! static HANDLERS: LazyLock<HashMap<&'static str, Handler<MyStat>>> = LazyLock::new(|| {
//!     let mut m: HashMap<&'static str, Handler<MyStat>> = HashMap::new();
//!     m.insert("foo", |s, v| s.foo = v);
//!     m
//! });
//!
//! impl KeyValueStat for MyStat {
//!     const SPLIT_CHAR: Option<char> = Some('=');
//!     const SKIP_LINES: usize = 0;
//!     const SKIP_VALUES: usize = 0;
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!     const ALLOW_MULTIPLE_KV_PER_LINE: bool = true;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>> {
//!         &HANDLERS
//!     }
//! }
//!
//! let stat = MyStat::from_reader(&mut "foo=42 bar=1\n".as_bytes()).unwrap();
//! assert_eq!(stat.foo, 42);
//! ```

mod error;

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

pub use error::{StatParseError, downcast};

#[cfg(test)]
pub(crate) use error::extract_stat_parse_error;

/// Applies a parsed value to one field of a stat struct.
pub type Handler<T> = fn(&mut T, u64);

/// A trait for parsing structured key-value style files such as `cpu.stat`,
/// `memory.stat` or `/proc/meminfo`.
///
/// Implementors define a set of known keys and how to apply values for them.
/// Unknown keys are ignored unless [`KeyValueStat::on_unknown_key`] is overridden.
pub trait KeyValueStat: Default
where
    Self: 'static,
{
    /// If set to `Some(char)`, each key-value pair is expected to be joined by that character
    /// (`rbytes=1024`). If `None`, keys and values are separate whitespace tokens (`anon 1024`).
    const SPLIT_CHAR: Option<char>;

    /// The number of lines at the start of the file to skip before parsing begins.
    const SKIP_LINES: usize;

    /// The number of whitespace-separated values to skip at the start of *each line*.
    const SKIP_VALUES: usize;

    /// If `false`, encountering the same key more than once is an error.
    const ALLOW_DUPLICATE_KEYS: bool;

    /// If `false`, only the first key-value pair on each line is parsed.
    const ALLOW_MULTIPLE_KV_PER_LINE: bool;

    /// Known field names and the handlers applying their values.
    fn field_handlers() -> &'static HashMap<&'static str, Handler<Self>>;

    /// Parses a key-value formatted buffer.
    ///
    /// # Errors
    /// Returns an `io::Error` if reading fails, or a [`StatParseError`] wrapped in an
    /// `io::Error` if a known key carries an unparsable value or is duplicated.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let field_count = handlers.len();
        let mut seen_keys = HashSet::with_capacity(field_count);

        let mut line = String::new();
        let mut lineno = 0;
        for _ in 0..Self::SKIP_LINES {
            buf.read_line(&mut line)?;
            line.clear();
        }

        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            Self::parse_line(&mut stat, &line, lineno, handlers, &mut seen_keys)?;
            if !Self::ALLOW_DUPLICATE_KEYS && seen_keys.len() == field_count {
                break;
            }

            line.clear();
        }

        Ok(stat)
    }

    /// Parses a single line into one or more key-value pairs.
    fn parse_line(
        stat: &mut Self,
        line: &str,
        lineno: usize,
        handlers: &HashMap<&'static str, Handler<Self>>,
        seen_keys: &mut HashSet<&'static str>,
    ) -> std::io::Result<()> {
        let mut parts = line.split_whitespace().skip(Self::SKIP_VALUES);

        match Self::SPLIT_CHAR {
            Some(split_char) => {
                for part in parts {
                    if let Some((key, val)) = part.split_once(split_char) {
                        Self::parse_and_set(key, val, stat, lineno, handlers, seen_keys)?;
                    }
                    if !Self::ALLOW_MULTIPLE_KV_PER_LINE {
                        break;
                    }
                }
            }
            None => {
                while let (Some(key), Some(val)) = (parts.next(), parts.next()) {
                    Self::parse_and_set(key, val, stat, lineno, handlers, seen_keys)?;
                    if !Self::ALLOW_MULTIPLE_KV_PER_LINE {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Parses a single key-value pair and applies it through the field handler.
    ///
    /// # Errors
    /// [`StatParseError::InvalidKeyValue`] if the value is not a `u64`,
    /// [`StatParseError::DuplicateField`] if the key repeats and duplicates are disallowed.
    fn parse_and_set(
        key: &str,
        val: &str,
        stat: &mut Self,
        lineno: usize,
        handlers: &HashMap<&'static str, Handler<Self>>,
        seen_keys: &mut HashSet<&'static str>,
    ) -> std::io::Result<()> {
        let Some((k, handler)) = handlers.get_key_value(key) else {
            return Self::on_unknown_key(key, val, lineno);
        };
        let parsed = val
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidKeyValue {
                key: key.to_string(),
                value: val.to_string(),
                line: lineno,
                source,
            })?;
        if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(k) {
            return Err(StatParseError::DuplicateField {
                field: key.to_string(),
                line: lineno,
            }
            .into());
        }
        handler(stat, parsed);
        Ok(())
    }

    /// Called for keys missing from [`KeyValueStat::field_handlers`]. Ignores them by default.
    #[inline]
    fn on_unknown_key(_key: &str, _val: &str, _lineno: usize) -> std::io::Result<()> {
        Ok(())
    }
}

/// A trait for parsing single-line statistics such as `cpu.max` or
/// `cpuacct.usage_percpu`.
pub trait SingleLineStat: Sized {
    /// Parses the statistic from the provided buffered reader.
    fn from_reader<R: BufRead>(buf: &mut R) -> std::io::Result<Self>;
}

/// Reads the first line of `buf`, without its trailing newline.
fn first_line<R: BufRead>(buf: &mut R) -> std::io::Result<String> {
    let mut line = String::new();
    buf.read_line(&mut line)?;
    line.truncate(line.trim_end().len());
    Ok(line)
}

/// Parses a file holding a single unsigned integer (`memory.current`, `cpu.shares`).
///
/// # Errors
/// [`StatParseError::InvalidValue`] if the content is not a `u64`, including an empty file.
pub fn read_u64<R: BufRead>(buf: &mut R) -> std::io::Result<u64> {
    let line = first_line(buf)?;
    let value = line.trim();
    Ok(parse_u64(value, 1)?)
}

/// Parses a file holding a single signed integer (`cpu.cfs_quota_us`, which uses `-1`).
pub fn read_i64<R: BufRead>(buf: &mut R) -> std::io::Result<i64> {
    let line = first_line(buf)?;
    let value = line.trim();
    value.parse::<i64>().map_err(|source| {
        StatParseError::InvalidValue {
            value: value.to_string(),
            line: 1,
            source,
        }
        .into()
    })
}

/// Parses a limit file that holds either a number or the keyword `max`
/// (`memory.max`, `pids.max`). `max` becomes `None`.
pub fn read_limit<R: BufRead>(buf: &mut R) -> std::io::Result<Option<u64>> {
    let line = first_line(buf)?;
    Ok(parse_limit(line.trim(), 1)?)
}

/// Parses `value` as a `u64`, attributing failures to `line`.
pub fn parse_u64(value: &str, line: usize) -> Result<u64, StatParseError> {
    value
        .parse::<u64>()
        .map_err(|source| StatParseError::InvalidValue {
            value: value.to_string(),
            line,
            source,
        })
}

/// Parses a number-or-`max` token.
pub fn parse_limit(value: &str, line: usize) -> Result<Option<u64>, StatParseError> {
    match value {
        "max" => Ok(None),
        value => parse_u64(value, line).map(Some),
    }
}
