use regex::Regex;

use super::{Error, Result};

/// Name filter built from user supplied regular expressions.
///
/// A name matches if any pattern matches. A filter without patterns matches
/// nothing: listing processes with it yields an empty list.
#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    patterns: Vec<Regex>,
}

impl ProcessFilter {
    /// Compiles `patterns` in order.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidPattern`] for the first pattern that does not compile.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern).map_err(|source| Error::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(name))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
