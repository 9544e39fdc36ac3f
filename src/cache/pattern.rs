//! Key Pattern Module
//!
//! Substring or regular-expression matchers over serialized cache keys.

use std::fmt;

use regex::Regex;

use crate::error::{CacheError, Result};

/// Textual marker distinguishing a regex from a plain substring.
pub const REGEX_PREFIX: &str = "re:";

/// Matcher used by pattern invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Key contains the given text
    Substring(String),
    /// Key matches the regular expression anywhere
    Regex(Regex),
}

impl KeyPattern {
    pub fn substring(text: impl Into<String>) -> Self {
        KeyPattern::Substring(text.into())
    }

    /// Compiles a regular expression, failing with `InvalidPattern`.
    pub fn regex(source: &str) -> Result<Self> {
        Regex::new(source)
            .map(KeyPattern::Regex)
            .map_err(|e| CacheError::InvalidPattern(format!("{}: {}", source, e)))
    }

    /// Parses `re:<expr>` as a regex and anything else as a substring.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.strip_prefix(REGEX_PREFIX) {
            Some(source) => Self::regex(source),
            None => Ok(Self::substring(raw)),
        }
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Substring(text) => key.contains(text.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }

    /// Canonical textual form, the inverse of `parse`.
    pub fn as_source(&self) -> String {
        match self {
            KeyPattern::Substring(text) => text.clone(),
            KeyPattern::Regex(re) => format!("{}{}", REGEX_PREFIX, re.as_str()),
        }
    }
}

impl PartialEq for KeyPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KeyPattern::Substring(a), KeyPattern::Substring(b)) => a == b,
            (KeyPattern::Regex(a), KeyPattern::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_source())
    }
}

impl From<&str> for KeyPattern {
    fn from(text: &str) -> Self {
        KeyPattern::substring(text)
    }
}

impl From<String> for KeyPattern {
    fn from(text: String) -> Self {
        KeyPattern::Substring(text)
    }
}
