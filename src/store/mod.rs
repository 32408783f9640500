//! Grammar and theme store
//!
//! The store owns every registered raw grammar, the injection table and the
//! current theme. Turning raw grammars into tokenizers is delegated to a
//! `TokenizerEngine`, which also owns the regex engine it compiles with.

pub mod memory;
pub mod theme;

pub use memory::{MemoryStore, NoEngine};
pub use theme::{
    ColorMap, RawTheme, RawThemeScope, RawThemeSetting, RawThemeStyle, Theme, ThemeRule, ThemeStyle,
};

use crate::Result;
use crate::attributes::{GrammarConfiguration, ScopeAttributesProvider};
use crate::grammar::RawGrammar;
use crate::scope::ScopeName;
use crate::tokenize::Grammar;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Registered grammars and theme, as seen by the resolver
#[async_trait]
pub trait GrammarStore: Send + Sync {
    /// Register a raw grammar and the scopes injected into it. A later
    /// registration of the same scope replaces the raw definition.
    fn add_grammar(&self, grammar: RawGrammar, injections: Vec<ScopeName>) -> Arc<RawGrammar>;

    fn lookup(&self, scope: &ScopeName) -> Option<Arc<RawGrammar>>;

    /// Scopes registered as injections into `scope`
    fn injections(&self, scope: &ScopeName) -> Vec<ScopeName>;

    /// Ready-to-use grammar for a registered scope, `None` when the scope
    /// was never registered.
    async fn grammar_for_scope_name(
        &self,
        scope: &ScopeName,
        language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> Result<Option<Arc<dyn Grammar>>>;

    fn set_theme(&self, theme: &RawTheme, color_map: Option<Vec<String>>) -> Result<()>;

    /// Current color table, index 0 first
    fn color_map(&self) -> Vec<String>;
}

/// Everything an engine needs to compile one grammar
#[derive(Clone)]
pub struct GrammarSource {
    pub scope_name: ScopeName,
    pub language_id: u32,
    pub attributes: Arc<ScopeAttributesProvider>,
    /// Snapshot of every registered grammar
    pub grammars: HashMap<ScopeName, Arc<RawGrammar>>,
    /// Snapshot of the injection table
    pub injections: HashMap<ScopeName, Vec<ScopeName>>,
    pub theme: Arc<Theme>,
}

impl GrammarSource {
    /// The grammar being compiled
    pub fn root(&self) -> Option<&Arc<RawGrammar>> {
        self.grammars.get(&self.scope_name)
    }

    pub fn grammar(&self, scope: &ScopeName) -> Option<&Arc<RawGrammar>> {
        self.grammars.get(scope)
    }

    /// Grammars injected into the root scope, registered ones first, then
    /// every grammar declaring an `injectionSelector`.
    pub fn injection_grammars(&self) -> Vec<&Arc<RawGrammar>> {
        let mut found: Vec<&Arc<RawGrammar>> = self
            .injections
            .get(&self.scope_name)
            .into_iter()
            .flatten()
            .filter_map(|scope| self.grammars.get(scope))
            .collect();

        let mut selector_based: Vec<&Arc<RawGrammar>> = self
            .grammars
            .values()
            .filter(|g| g.injection_selector.is_some())
            .filter(|g| !found.iter().any(|f| f.scope_name == g.scope_name))
            .collect();
        selector_based.sort_by(|a, b| a.scope_name.cmp(&b.scope_name));
        found.extend(selector_based);
        found
    }
}

impl std::fmt::Debug for GrammarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrammarSource")
            .field("scope_name", &self.scope_name)
            .field("language_id", &self.language_id)
            .field("grammars", &self.grammars.len())
            .field("injections", &self.injections.len())
            .finish()
    }
}

/// Compiles raw grammars into tokenizers.
pub trait TokenizerEngine: Send + Sync {
    /// Name of the regex engine backing compiled grammars
    fn name(&self) -> &str {
        "tokenizer"
    }

    fn compile(&self, source: GrammarSource) -> Result<Arc<dyn Grammar>>;
}
