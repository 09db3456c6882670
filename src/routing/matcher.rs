//! Route matching logic.
//!
//! # Design Decisions
//! - Path matching is a literal, case-sensitive prefix test
//! - No globbing and no regex: "/ws" also matches "/wsx"
//! - Prefix validity is checked once, at construction

use crate::error::RouteError;

/// Matches the request path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    ///
    /// The prefix must be non-empty and start with `/`.
    pub fn new(prefix: impl Into<String>) -> Result<Self, RouteError> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(RouteError::EmptyPrefix);
        }
        if !prefix.starts_with('/') {
            return Err(RouteError::PrefixWithoutSlash(prefix));
        }
        Ok(Self { prefix })
    }

    /// Returns true if `path` starts with this prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
