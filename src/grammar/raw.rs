//! Raw grammar model
//!
//! Mirrors the JSON form of a TextMate grammar closely enough for dependency
//! discovery. Every key the model does not name is preserved in `extra`, so
//! a tokenizer engine receives the full definition.

use crate::scope::ScopeName;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named rules of a grammar (or of a rule that carries its own repository)
pub type Repository = BTreeMap<String, RawRule>;

/// Capture index (`"0"`, `"1"`, ...) to the rule applied to that capture
pub type RawCaptures = BTreeMap<String, RawRule>;

/// A grammar as supplied by a loader, before any compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrammar {
    pub scope_name: ScopeName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub patterns: Vec<RawRule>,
    #[serde(default)]
    pub repository: Repository,
    /// Injection selector to rule, applied inside this grammar
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub injections: BTreeMap<String, RawRule>,
    /// Selector of the scopes this grammar injects itself into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub injection_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_line_match: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RawGrammar {
    /// Create an empty grammar for a scope
    pub fn new(scope_name: ScopeName) -> Self {
        Self {
            scope_name,
            name: None,
            patterns: Vec::new(),
            repository: Repository::new(),
            injections: BTreeMap::new(),
            injection_selector: None,
            file_types: Vec::new(),
            first_line_match: None,
            extra: BTreeMap::new(),
        }
    }

    /// Deserialize a grammar from its JSON form
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).map_err(|e| Error::InvalidGrammar(e.to_string()))
    }

    /// Add a top-level pattern
    pub fn with_pattern(mut self, rule: RawRule) -> Self {
        self.patterns.push(rule);
        self
    }

    /// Add a named repository rule
    pub fn with_rule(mut self, name: impl Into<String>, rule: RawRule) -> Self {
        self.repository.insert(name.into(), rule);
        self
    }

    /// Add an injection rule keyed by its selector
    pub fn with_injection(mut self, selector: impl Into<String>, rule: RawRule) -> Self {
        self.injections.insert(selector.into(), rule);
        self
    }

    /// Look up a top-level repository rule
    pub fn rule(&self, name: &str) -> Option<&RawRule> {
        self.repository.get(name)
    }
}

/// One rule of a grammar's rule tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_name: Option<String>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, rename = "while", skip_serializing_if = "Option::is_none")]
    pub while_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captures: Option<RawCaptures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_captures: Option<RawCaptures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_captures: Option<RawCaptures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub while_captures: Option<RawCaptures>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<Vec<RawRule>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl RawRule {
    /// A rule that only includes another rule or grammar
    pub fn include(target: impl Into<String>) -> Self {
        Self {
            include: Some(target.into()),
            ..Self::default()
        }
    }

    /// A rule grouping nested patterns
    pub fn patterns(patterns: Vec<RawRule>) -> Self {
        Self {
            patterns: Some(patterns),
            ..Self::default()
        }
    }

    /// A single-regex match rule
    pub fn matching(regex: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            match_: Some(regex.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// All capture tables of the rule, in declaration order of the fields
    pub fn capture_tables(&self) -> impl Iterator<Item = &RawCaptures> {
        [
            self.captures.as_ref(),
            self.begin_captures.as_ref(),
            self.end_captures.as_ref(),
            self.while_captures.as_ref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Parsed form of a rule's `include` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeReference<'a> {
    /// `$base`: the top level of the grammar tokenization started from
    Base,
    /// `$self`: the top level of the grammar containing the include
    SelfGrammar,
    /// `#rule`: a repository rule of the current grammar
    Relative(&'a str),
    /// `scope`: the whole grammar of another scope
    TopLevel(&'a str),
    /// `scope#rule`: one repository rule of another scope
    TopLevelRepository { scope: &'a str, rule: &'a str },
}

impl<'a> IncludeReference<'a> {
    /// Classify an include string
    pub fn parse(include: &'a str) -> Result<Self> {
        match include {
            "" => Err(Error::InvalidInclude("empty include".to_string())),
            "$base" => Ok(Self::Base),
            "$self" => Ok(Self::SelfGrammar),
            _ => match include.split_once('#') {
                None => Ok(Self::TopLevel(include)),
                Some(("", "")) => Err(Error::InvalidInclude(include.to_string())),
                Some(("", rule)) => Ok(Self::Relative(rule)),
                Some((_, "")) => Err(Error::InvalidInclude(include.to_string())),
                Some((scope, rule)) => Ok(Self::TopLevelRepository { scope, rule }),
            },
        }
    }
}
