//! Build-time constant substitution.
//!
//! A `DefineTable` maps identifiers (or dotted identifier chains such as
//! `process.env.NODE_ENV`) to replacement expressions. It is built once from
//! configuration and applied to JavaScript served by the dev server.
//!
//! Matching works on identifier chains: a key matches a whole chain, or a
//! leading part of it that ends on a `.` boundary. Property accesses
//! (`window.global`) and longer identifiers (`globalThis`) are left alone.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::DefineError;

static KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*$").expect("static regex")
});

static CHAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*").expect("static regex")
});

/// Returns true if `key` can be used as a define key.
pub fn is_valid_key(key: &str) -> bool {
    KEY.is_match(key)
}

/// Immutable identifier → expression map.
#[derive(Debug, Clone, Default)]
pub struct DefineTable {
    /// Longest key first, so `process.env.X` wins over `process.env`.
    entries: Vec<(String, String)>,
}

impl DefineTable {
    pub fn new(defines: &BTreeMap<String, String>) -> Result<Self, DefineError> {
        let mut entries = Vec::with_capacity(defines.len());
        for (key, value) in defines {
            if !is_valid_key(key) {
                return Err(DefineError::InvalidKey(key.clone()));
            }
            entries.push((key.clone(), value.clone()));
        }
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Substitute every defined identifier in `source`.
    pub fn apply<'a>(&self, source: &'a str) -> Cow<'a, str> {
        if self.entries.is_empty() {
            return Cow::Borrowed(source);
        }

        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        let mut replaced = false;

        for chain in CHAIN.find_iter(source) {
            // Skip property accesses and identifiers glued to digits.
            let preceding = source[..chain.start()].chars().next_back();
            if matches!(preceding, Some(c) if c == '.' || c.is_ascii_digit()) {
                continue;
            }

            let text = chain.as_str();
            let Some((key, value)) = self.entries.iter().find(|(key, _)| {
                text == key || (text.starts_with(key.as_str()) && text[key.len()..].starts_with('.'))
            }) else {
                continue;
            };

            out.push_str(&source[last..chain.start()]);
            out.push_str(value);
            last = chain.start() + key.len();
            replaced = true;
        }

        if !replaced {
            return Cow::Borrowed(source);
        }
        out.push_str(&source[last..]);
        Cow::Owned(out)
    }
}
