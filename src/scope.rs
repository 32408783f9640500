//! Scope names - identity of grammars and points in the scope taxonomy
//!
//! Format: dot-separated segments, e.g. `source.js`, `string.quoted.double`.
//!
//! A scope name never contains whitespace or `#` (the include separator), so
//! `<scope>#<rule>` is always unambiguous.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Identifier of a grammar or of a scope inside the scope taxonomy.
///
/// Cloning is a reference-count bump, so scope names can be freely copied
/// into dependency records, seen-sets and cache keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeName(Arc<str>);

impl ScopeName {
    /// Parse and validate a scope name
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::InvalidScope("scope name is empty".to_string()));
        }
        if name.contains('#') {
            return Err(Error::InvalidScope(format!("`{}` contains `#`", name)));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(Error::InvalidScope(format!("`{}` contains whitespace", name)));
        }
        Ok(Self(Arc::from(name)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dot-separated segments of the name
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// True when `prefix` equals this name or is a prefix ending on a dot boundary.
    ///
    /// `source.js` is a prefix of `source.js.embedded` but not of `source.jsx`.
    pub fn starts_with_scope(&self, prefix: &str) -> bool {
        match self.0.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeName({})", self.0)
    }
}

impl FromStr for ScopeName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Borrow<str> for ScopeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ScopeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for ScopeName {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ScopeName {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ScopeName::parse(&s).map_err(serde::de::Error::custom)
    }
}
