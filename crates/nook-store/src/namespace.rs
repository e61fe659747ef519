//! Enumerable key namespaces.
//!
//! A [`Namespace`] is a `/`-separated key prefix built from validated
//! segments. Keys are always produced through a namespace, so bulk
//! operations (`scan`, `remove_all`) can enumerate exactly the keys that
//! belong to it and nothing that merely shares a string prefix.
//!
//! Valid segments:
//! - Must be non-empty
//! - Must not contain `/`, whitespace or control characters
//! - Must not be `.` or `..`

use std::fmt;

use crate::error::{StoreError, StoreResult};

const SEPARATOR: char = '/';

/// Validate a single key segment.
pub fn validate_segment(segment: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        segment: segment.to_string(),
        reason: reason.into(),
    };
    if segment.is_empty() {
        return Err(invalid("segment must not be empty"));
    }
    if segment.contains(SEPARATOR) {
        return Err(invalid("segment must not contain '/'"));
    }
    if segment.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("segment must not contain whitespace or control characters"));
    }
    if segment == "." || segment == ".." {
        return Err(invalid("segment must not be '.' or '..'"));
    }
    Ok(())
}

/// A validated key prefix such as `images/job/`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    /// Always ends with the separator.
    prefix: String,
}

impl Namespace {
    /// A top-level namespace.
    pub fn root(segment: &str) -> StoreResult<Self> {
        validate_segment(segment)?;
        Ok(Self {
            prefix: format!("{segment}{SEPARATOR}"),
        })
    }

    /// A namespace nested under this one.
    pub fn child(&self, segment: &str) -> StoreResult<Self> {
        validate_segment(segment)?;
        Ok(Self {
            prefix: format!("{}{segment}{SEPARATOR}", self.prefix),
        })
    }

    /// The full key for `leaf` inside this namespace.
    pub fn key(&self, leaf: &str) -> StoreResult<String> {
        validate_segment(leaf)?;
        Ok(format!("{}{leaf}", self.prefix))
    }

    /// Returns `true` if `key` belongs to this namespace (at any depth).
    pub fn contains(&self, key: &str) -> bool {
        key.starts_with(&self.prefix) && key.len() > self.prefix.len()
    }

    /// The part of `key` below this namespace.
    pub fn relative<'k>(&self, key: &'k str) -> Option<&'k str> {
        if !self.contains(key) {
            return None;
        }
        key.strip_prefix(self.prefix.as_str())
    }

    pub fn as_prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.prefix)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}
