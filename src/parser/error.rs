//! Structured errors for kernel stat file parsing.
//!
//! [`StatParseError`] converts into [`std::io::Error`] with kind
//! [`std::io::ErrorKind::InvalidData`], so parsers compose with `BufRead`
//! based readers. The typed error can be recovered with [`downcast`].

use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatParseError {
    #[error("duplicate field '{field}' at line {line}")]
    DuplicateField { field: String, line: usize },

    #[error("invalid value for '{key}' at line {line}: '{value}': {source}")]
    InvalidKeyValue {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid value at line {line}: '{value}': {source}")]
    InvalidValue {
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid decimal for '{key}' at line {line}: '{value}': {source}")]
    InvalidFloat {
        key: String,
        value: String,
        line: usize,
        #[source]
        source: ParseFloatError,
    },

    #[error("invalid device id at line {line}: '{value}'")]
    InvalidDevice { value: String, line: usize },

    #[error("missing field '{field}'")]
    MissingField { field: &'static str },

    #[error("unexpected format at line {line}: '{content}'")]
    UnexpectedFormat { content: String, line: usize },

    #[error("error during I/O: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StatParseError> for std::io::Error {
    fn from(err: StatParseError) -> Self {
        match err {
            StatParseError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}

/// Recovers the [`StatParseError`] wrapped in an I/O error, if there is one.
pub fn downcast(err: &std::io::Error) -> Option<&StatParseError> {
    err.get_ref()
        .and_then(|e| e.downcast_ref::<StatParseError>())
}

/// Extracts a `StatParseError` from an `std::io::Error` assuming it was wrapped.
///
/// Panics if the inner error is not a `StatParseError`. Intended for use in test assertions only.
#[cfg(test)]
pub(crate) fn extract_stat_parse_error(err: &std::io::Error) -> &StatParseError {
    downcast(err).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_errors_become_invalid_data() {
        let err: std::io::Error = StatParseError::MissingField { field: "some" }.into();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        match extract_stat_parse_error(&err) {
            StatParseError::MissingField { field } => assert_eq!(*field, "some"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_io_errors_pass_through() {
        let inner = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: std::io::Error = StatParseError::Io(inner).into();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        assert!(downcast(&err).is_none());
    }
}
