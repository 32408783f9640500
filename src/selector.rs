//! Scope selectors
//!
//! A selector is a whitespace-separated path of scope prefixes, e.g.
//! `source.js string`. It matches a scope path (outermost first) when:
//! 1. every segment is a dot-boundary prefix of some scope in the path,
//! 2. the segments appear in order,
//! 3. the last segment matches the innermost scope.
//!
//! Commas separate alternative selectors.

use crate::scope::ScopeName;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeSelector {
    segments: Vec<String>,
}

impl ScopeSelector {
    /// Parse a single selector. Returns `None` for an empty selector.
    pub fn parse(selector: &str) -> Option<Self> {
        let segments: Vec<String> = selector.split_whitespace().map(str::to_string).collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Parse a comma-separated list of selectors, skipping empty entries
    pub fn parse_list(selectors: &str) -> Vec<Self> {
        selectors.split(',').filter_map(Self::parse).collect()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Check the selector against a scope path, outermost scope first
    pub fn matches(&self, path: &[&ScopeName]) -> bool {
        let Some((last, ancestors)) = self.segments.split_last() else {
            return false;
        };
        let Some((innermost, outer)) = path.split_last() else {
            return false;
        };
        if !innermost.starts_with_scope(last) {
            return false;
        }

        let mut remaining = outer.iter();
        ancestors
            .iter()
            .all(|segment| remaining.any(|scope| scope.starts_with_scope(segment)))
    }
}

impl fmt::Display for ScopeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(names: &[&str]) -> Vec<ScopeName> {
        names.iter().map(|n| ScopeName::parse(n).unwrap()).collect()
    }

    fn matches(selector: &str, names: &[&str]) -> bool {
        let scopes = path(names);
        let refs: Vec<&ScopeName> = scopes.iter().collect();
        ScopeSelector::parse(selector).unwrap().matches(&refs)
    }

    #[test]
    fn test_single_segment() {
        assert!(matches("string", &["source.js", "string.quoted.double.js"]));
        assert!(!matches("string", &["string.quoted.double.js", "punctuation.definition"]));
        assert!(!matches("str", &["source.js", "string.quoted"]));
    }

    #[test]
    fn test_descendant_path() {
        assert!(matches("source.js string", &["source.js", "meta.block", "string.quoted"]));
        assert!(!matches("source.css string", &["source.js", "string.quoted"]));
        assert!(!matches("string source.js", &["source.js", "string.quoted"]));
    }

    #[test]
    fn test_parse_list() {
        let selectors = ScopeSelector::parse_list("comment, string.regexp ,");
        assert_eq!(selectors.len(), 2);
        assert_eq!(selectors[1].to_string(), "string.regexp");
        assert!(ScopeSelector::parse("   ").is_none());
    }
}
