//! Scope dependencies - what a grammar needs from another scope
//!
//! Every cross-scope reference reduces to one of two kinds:
//! - `Full`: the whole grammar of a scope (`"include": "source.css"`)
//! - `Partial`: one repository rule of a scope (`"include": "source.css#rule"`)

pub mod collector;

pub use collector::DependencyCollector;

use crate::scope::ScopeName;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A requirement on another scope discovered while scanning a grammar.
///
/// Equality and hashing are structural: dependencies are recreated on every
/// scan pass, so two records naming the same target are the same dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScopeDependency {
    /// The entire grammar must be resolvable
    Full { scope: ScopeName },
    /// Only the named repository rule must be resolvable
    Partial { scope: ScopeName, rule: String },
}

impl ScopeDependency {
    pub fn full(scope: ScopeName) -> Self {
        Self::Full { scope }
    }

    pub fn partial(scope: ScopeName, rule: impl Into<String>) -> Self {
        Self::Partial {
            scope,
            rule: rule.into(),
        }
    }

    /// The scope whose grammar has to be loaded
    pub fn scope_name(&self) -> &ScopeName {
        match self {
            Self::Full { scope } | Self::Partial { scope, .. } => scope,
        }
    }

    /// Repository rule for partial dependencies
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::Full { .. } => None,
            Self::Partial { rule, .. } => Some(rule),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full { .. })
    }

    /// Canonical dedup key: `<scope>` for full, `<scope>#<rule>` for partial
    pub fn key(&self) -> String {
        match self {
            Self::Full { scope } => scope.to_string(),
            Self::Partial { scope, rule } => format!("{}#{}", scope, rule),
        }
    }

    /// Get the string representation of the dependency kind
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Full { .. } => "full",
            Self::Partial { .. } => "partial",
        }
    }
}

impl fmt::Display for ScopeDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_str(), self.key())
    }
}
