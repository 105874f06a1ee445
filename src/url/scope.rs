//! Crawl scope policy
//!
//! Decides whether a discovered URL may be fetched. Rules, in order:
//!
//! 1. A URL matching the exclude pattern is never followed.
//! 2. With an include pattern, a URL is followed iff it matches it.
//! 3. Otherwise a URL is followed iff it shares the seed's origin.
//!
//! Patterns are regular expressions anchored at the start of the URL only: a
//! pattern matching a prefix of the URL counts as a match, so
//! `http://example.com` also matches `http://example.com.evil.com/`.

use crate::url::origin::{is_same_origin, origin_of};
use crate::ConfigError;
use regex::Regex;
use url::Origin;

/// Compiled scope rules for one crawl
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    seed_origin: Origin,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl ScopeFilter {
    /// Builds a scope filter for a crawl starting at `seed_url`
    ///
    /// # Returns
    ///
    /// * `Ok(ScopeFilter)` - Seed parsed and patterns compiled
    /// * `Err(ConfigError)` - Unparseable seed or invalid pattern
    pub fn new(
        seed_url: &str,
        include_pattern: Option<&str>,
        exclude_pattern: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let seed_origin = origin_of(seed_url)
            .filter(Origin::is_tuple)
            .ok_or_else(|| ConfigError::InvalidUrl(format!("Invalid seed URL '{}'", seed_url)))?;

        Ok(Self {
            seed_origin,
            include: include_pattern.map(compile_anchored).transpose()?,
            exclude: exclude_pattern.map(compile_anchored).transpose()?,
        })
    }

    /// Returns true if `url` is inside the crawl scope
    pub fn should_follow(&self, url: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(url) {
                return false;
            }
        }

        match &self.include {
            Some(include) => include.is_match(url),
            None => is_same_origin(url, &self.seed_origin),
        }
    }

    pub fn seed_origin(&self) -> &Origin {
        &self.seed_origin
    }
}

/// Compiles `pattern` so that it only matches at the start of the input
pub fn compile_anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})", pattern))
        .map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", pattern, e)))
}
