//! URL inclusion and exclusion patterns.
//!
//! Patterns are written as strings in source configuration. A bare string is
//! a shell-style glob matched against the *whole* URL (so `*technische-daten*`
//! matches anywhere, but `technische-daten` only matches that exact string).
//! Prefixes select the other forms:
//!
//! | Prefix      | Form                               |
//! |-------------|------------------------------------|
//! | `glob:`     | glob (the default)                 |
//! | `contains:` | plain substring                    |
//! | `re:`       | regular expression, unanchored     |

use crate::error::{Error, ErrorKind, Result};
use derive_more::Display;
use exn::ResultExt;
use regex::Regex;
use std::str::FromStr;

#[derive(Debug, Display, Clone)]
pub enum Pattern {
    #[display("contains:{_0}")]
    Contains(String),
    #[display("glob:{source}")]
    Glob { source: String, pattern: glob::Pattern },
    #[display("re:{_0}")]
    Regex(Regex),
}

impl Pattern {
    pub fn contains(needle: impl Into<String>) -> Self {
        Self::Contains(needle.into())
    }

    pub fn glob(pattern: &str) -> Result<Self> {
        let compiled =
            glob::Pattern::new(&prepare(pattern)).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
        Ok(Self::Glob { source: pattern.to_string(), pattern: compiled })
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).or_raise(|| ErrorKind::InvalidPattern(pattern.to_string()))?;
        Ok(Self::Regex(regex))
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            Self::Contains(needle) => url.contains(needle.as_str()),
            // Default options: `*` and `?` cross `/`, matching is case-sensitive.
            Self::Glob { pattern, .. } => pattern.matches(url),
            Self::Regex(regex) => regex.is_match(url),
        }
    }
}

impl FromStr for Pattern {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        if let Some(rest) = s.strip_prefix("re:") {
            Self::regex(rest)
        } else if let Some(rest) = s.strip_prefix("contains:") {
            Ok(Self::contains(rest))
        } else {
            Self::glob(s.strip_prefix("glob:").unwrap_or(s))
        }
    }
}

/// Rewrite a shell-style glob so [`glob::Pattern`] reads it the way
/// `fnmatch` does: runs of `*` are one star (the crate reserves `**` for
/// whole path components) and a `[` without a closing `]` is literal.
fn prepare(pattern: &str) -> String {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => {
                while chars.get(i + 1) == Some(&'*') {
                    i += 1;
                }
                out.push('*');
            },
            '[' => {
                // A `]` straight after `[` or `[!` is part of the set.
                let mut j = i + 1;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                match chars[j.min(chars.len())..].iter().position(|&c| c == ']') {
                    Some(offset) => {
                        let end = j + offset;
                        out.extend(&chars[i..=end]);
                        i = end;
                    },
                    None => out.push_str("[[]"),
                }
            },
            c => out.push(c),
        }
        i += 1;
    }
    out
}

fn parse_all<S: AsRef<str>>(patterns: impl IntoIterator<Item = S>) -> Result<Vec<Pattern>> {
    patterns.into_iter().map(|p| p.as_ref().parse::<Pattern>()).collect()
}

/// Inclusion/exclusion predicate for one source.
///
/// An empty inclusion list matches nothing: a source without patterns can be
/// crawled, but it will not discover anything.
#[derive(Debug, Clone, Default)]
pub struct UrlMatcher {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl UrlMatcher {
    pub fn new(include: Vec<Pattern>, exclude: Vec<Pattern>) -> Self {
        Self { include, exclude }
    }

    /// Parse both lists from their configuration strings.
    pub fn parse<I, E>(include: I, exclude: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Ok(Self {
            include: parse_all(include)?,
            exclude: parse_all(exclude)?,
        })
    }

    pub fn include(&self) -> &[Pattern] {
        &self.include
    }

    pub fn exclude(&self) -> &[Pattern] {
        &self.exclude
    }

    pub fn matches_inclusion(&self, url: &str) -> bool {
        self.include.iter().any(|p| p.is_match(url))
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclude.iter().any(|p| p.is_match(url))
    }

    /// Matches an inclusion pattern and no exclusion pattern.
    pub fn accepts(&self, url: &str) -> bool {
        self.matches_inclusion(url) && !self.is_excluded(url)
    }
}
