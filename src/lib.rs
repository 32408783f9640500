//! # tmreg - TextMate grammar registry
//!
//! Orchestration core of an incremental, grammar-driven tokenizer.
//!
//! tmreg provides:
//! - Dependency discovery over TextMate grammars (`Full` and `Partial` includes)
//! - A breadth-first resolver that loads each grammar at most once
//! - Injection handling and a per-scope load cache safe under concurrency
//! - The 32-bit token metadata layout shared with renderers
//! - Theme color interning and scope attribute classification

pub mod scope;
pub mod grammar;
pub mod dependency;
pub mod metadata;
pub mod selector;
pub mod attributes;
pub mod stack;
pub mod tokenize;
pub mod store;
pub mod loader;
pub mod cache;
pub mod resolver;
pub mod registry;
pub mod config;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use attributes::{GrammarConfiguration, ScopeAttributes, ScopeAttributesProvider};
pub use dependency::{DependencyCollector, ScopeDependency};
pub use grammar::{RawGrammar, RawRule};
pub use loader::{DirectoryLoader, GrammarLoader};
pub use metadata::{FontStyle, MetadataWord, TokenAttributes, TokenType};
pub use registry::Registry;
pub use resolver::Resolution;
pub use scope::ScopeName;
pub use stack::{ScopeStack, StateStack};
pub use store::{GrammarStore, MemoryStore, RawTheme, TokenizerEngine};
pub use tokenize::{Grammar, Token, TokenizeLineResult, TokenizeLineResult2};

use std::sync::Arc;

/// Result type alias for tmreg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for tmreg operations
///
/// Cloneable: a cached load outcome is handed to every caller waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("No grammar provided for {0}")]
    MissingGrammar(ScopeName),

    #[error("Loading {scope} failed: {cause}")]
    Loader {
        scope: ScopeName,
        cause: Arc<anyhow::Error>,
    },

    #[error("Invalid scope name: {0}")]
    InvalidScope(String),

    #[error("Invalid include: {0}")]
    InvalidInclude(String),

    #[error("Invalid grammar: {0}")]
    InvalidGrammar(String),

    #[error("Language id {0} does not fit in 8 bits")]
    LanguageIdOutOfRange(u32),

    #[error("Theme error: {0}")]
    Theme(String),

    #[error("Engine error: {0}")]
    Engine(String),
}
