//! Filename allow/deny policy
//!
//! Patterns are unanchored regular expressions compiled once when the
//! handler is built. A name matching any deny pattern is rejected even when
//! an allow pattern also matches it.

use regex::RegexSet;

use crate::error::ConfigError;

use super::types::DEFAULT_ALLOW_PATTERN;

#[derive(Debug, Clone)]
pub struct FilenameFilter {
    allowed: RegexSet,
    disallowed: RegexSet,
}

impl FilenameFilter {
    /// Compile both pattern lists
    ///
    /// An empty allow list is replaced by the catch-all pattern.
    pub fn new<S: AsRef<str>>(allowed: &[S], disallowed: &[S]) -> Result<Self, ConfigError> {
        let allowed: Vec<&str> = if allowed.is_empty() {
            vec![DEFAULT_ALLOW_PATTERN]
        } else {
            allowed.iter().map(AsRef::as_ref).collect()
        };
        let disallowed: Vec<&str> = disallowed.iter().map(AsRef::as_ref).collect();

        Ok(Self {
            allowed: compile(&allowed)?,
            disallowed: compile(&disallowed)?,
        })
    }

    pub fn is_permitted(&self, filename: &str) -> bool {
        if self.disallowed.is_match(filename) {
            return false;
        }
        self.allowed.is_match(filename)
    }
}

/// Compile a pattern list, naming the offending pattern on failure
fn compile(patterns: &[&str]) -> Result<RegexSet, ConfigError> {
    // RegexSet reports errors without saying which pattern failed
    for pattern in patterns {
        if let Err(source) = regex::Regex::new(pattern) {
            return Err(ConfigError::Pattern {
                pattern: pattern.to_string(),
                source,
            });
        }
    }
    RegexSet::new(patterns).map_err(|source| ConfigError::Pattern {
        pattern: patterns.join(" | "),
        source,
    })
}
