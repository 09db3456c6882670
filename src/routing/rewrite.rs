//! Path rewrite strategies.
//!
//! A rewrite runs once, on the path component only, after the rule matched.
//! Every strategy touches at most the first occurrence of what it looks for.

use std::fmt;
use std::sync::Arc;

use axum::http::uri::PathAndQuery;
use regex::Regex;

use crate::error::{RewriteError, RouteError};

type RewriteFn = dyn Fn(&str) -> String + Send + Sync;

/// How a matched path is transformed before forwarding.
#[derive(Clone)]
pub enum PathRewrite {
    /// Remove `prefix` when the path starts with it.
    StripPrefix(String),
    /// Replace the first match of `pattern` with `replacement` (`$1` style captures).
    Regex { pattern: Regex, replacement: String },
    /// Arbitrary pure function.
    Custom(Arc<RewriteFn>),
}

impl PathRewrite {
    pub fn strip_prefix(prefix: impl Into<String>) -> Self {
        PathRewrite::StripPrefix(prefix.into())
    }

    pub fn regex(pattern: &str, replacement: impl Into<String>) -> Result<Self, RouteError> {
        Ok(PathRewrite::Regex {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        PathRewrite::Custom(Arc::new(f))
    }

    /// Apply the rewrite and check the result is still a forwardable path.
    pub fn apply(&self, path: &str) -> Result<String, RewriteError> {
        let rewritten = match self {
            PathRewrite::StripPrefix(prefix) => match path.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.to_string(),
                None => path.to_string(),
            },
            PathRewrite::Regex { pattern, replacement } => {
                pattern.replacen(path, 1, replacement.as_str()).into_owned()
            }
            PathRewrite::Custom(f) => f(path),
        };
        normalize(rewritten)
    }
}

impl fmt::Debug for PathRewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRewrite::StripPrefix(prefix) => f.debug_tuple("StripPrefix").field(prefix).finish(),
            PathRewrite::Regex { pattern, replacement } => f
                .debug_struct("Regex")
                .field("pattern", &pattern.as_str())
                .field("replacement", replacement)
                .finish(),
            PathRewrite::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A rewrite result is always rooted: empty means the target root and a
/// relative result (`/apix` stripped to `x`) is joined under it.
fn normalize(path: String) -> Result<String, RewriteError> {
    let path = if path.starts_with('/') { path } else { format!("/{}", path) };
    // A query or fragment smuggled in by the rewrite is not a path.
    if path.contains(['?', '#']) || PathAndQuery::try_from(path.as_str()).is_err() {
        return Err(RewriteError::InvalidPath(path));
    }
    Ok(path)
}
