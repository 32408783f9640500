//! In-memory grammar store

use super::{GrammarSource, GrammarStore, TokenizerEngine};
use crate::attributes::{GrammarConfiguration, ScopeAttributesProvider};
use crate::grammar::RawGrammar;
use crate::scope::ScopeName;
use crate::store::theme::{RawTheme, Theme};
use crate::tokenize::Grammar;
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Engine used when none is configured: every compile fails.
///
/// Enough for dependency resolution, which never compiles anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEngine;

impl TokenizerEngine for NoEngine {
    fn name(&self) -> &str {
        "none"
    }

    fn compile(&self, source: GrammarSource) -> Result<Arc<dyn Grammar>> {
        Err(Error::Engine(format!(
            "no tokenizer engine configured to compile {}",
            source.scope_name
        )))
    }
}

/// Grammar store holding everything in process memory.
///
/// Compiled grammars are cached per scope name: the first configuration a
/// scope is requested with wins until the theme changes.
pub struct MemoryStore {
    engine: Arc<dyn TokenizerEngine>,
    grammars: RwLock<HashMap<ScopeName, Arc<RawGrammar>>>,
    injections: RwLock<HashMap<ScopeName, Vec<ScopeName>>>,
    compiled: RwLock<HashMap<ScopeName, Arc<dyn Grammar>>>,
    theme: RwLock<Arc<Theme>>,
}

impl MemoryStore {
    pub fn new(engine: Arc<dyn TokenizerEngine>) -> Self {
        Self {
            engine,
            grammars: RwLock::new(HashMap::new()),
            injections: RwLock::new(HashMap::new()),
            compiled: RwLock::new(HashMap::new()),
            theme: RwLock::new(Arc::new(Theme::default())),
        }
    }

    pub fn engine(&self) -> &Arc<dyn TokenizerEngine> {
        &self.engine
    }

    pub fn theme(&self) -> Arc<Theme> {
        self.theme.read().clone()
    }

    /// Registered scopes, sorted
    pub fn scopes(&self) -> Vec<ScopeName> {
        let mut scopes: Vec<ScopeName> = self.grammars.read().keys().cloned().collect();
        scopes.sort();
        scopes
    }

    pub fn grammar_count(&self) -> usize {
        self.grammars.read().len()
    }

    fn snapshot(
        &self,
        scope: &ScopeName,
        language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> Result<GrammarSource> {
        Ok(GrammarSource {
            scope_name: scope.clone(),
            language_id,
            attributes: Arc::new(ScopeAttributesProvider::new(language_id, configuration)?),
            grammars: self.grammars.read().clone(),
            injections: self.injections.read().clone(),
            theme: self.theme(),
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(NoEngine))
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("engine", &self.engine.name())
            .field("grammars", &self.grammars.read().len())
            .field("compiled", &self.compiled.read().len())
            .finish()
    }
}

#[async_trait]
impl GrammarStore for MemoryStore {
    fn add_grammar(&self, grammar: RawGrammar, injections: Vec<ScopeName>) -> Arc<RawGrammar> {
        let scope = grammar.scope_name.clone();
        let grammar = Arc::new(grammar);
        self.grammars.write().insert(scope.clone(), grammar.clone());
        if !injections.is_empty() {
            self.injections.write().insert(scope.clone(), injections);
        }
        tracing::debug!("Registered grammar {}", scope);
        grammar
    }

    fn lookup(&self, scope: &ScopeName) -> Option<Arc<RawGrammar>> {
        self.grammars.read().get(scope).cloned()
    }

    fn injections(&self, scope: &ScopeName) -> Vec<ScopeName> {
        self.injections.read().get(scope).cloned().unwrap_or_default()
    }

    async fn grammar_for_scope_name(
        &self,
        scope: &ScopeName,
        language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> Result<Option<Arc<dyn Grammar>>> {
        if let Some(compiled) = self.compiled.read().get(scope) {
            return Ok(Some(compiled.clone()));
        }
        if !self.grammars.read().contains_key(scope) {
            return Ok(None);
        }

        let source = self.snapshot(scope, language_id, configuration)?;
        let grammar = self.engine.compile(source)?;
        tracing::debug!("Compiled {} with {}", scope, self.engine.name());

        // A concurrent compile of the same scope may have finished first
        let mut compiled = self.compiled.write();
        let grammar = compiled.entry(scope.clone()).or_insert(grammar).clone();
        Ok(Some(grammar))
    }

    fn set_theme(&self, theme: &RawTheme, color_map: Option<Vec<String>>) -> Result<()> {
        let theme = Theme::from_raw(theme, color_map)?;
        *self.theme.write() = Arc::new(theme);
        self.compiled.write().clear();
        Ok(())
    }

    fn color_map(&self) -> Vec<String> {
        self.theme.read().color_map().colors().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{WholeLineEngine, scope};

    fn store() -> (MemoryStore, Arc<WholeLineEngine>) {
        let engine = Arc::new(WholeLineEngine::default());
        (MemoryStore::new(engine.clone()), engine)
    }

    #[tokio::test]
    async fn test_lookup_and_injections() {
        let (store, _) = store();
        store.add_grammar(RawGrammar::new(scope("source.c")), vec![scope("source.d")]);

        assert!(store.lookup(&scope("source.c")).is_some());
        assert!(store.lookup(&scope("source.d")).is_none());
        assert_eq!(store.injections(&scope("source.c")), vec![scope("source.d")]);
        assert!(store.injections(&scope("source.d")).is_empty());
    }

    #[tokio::test]
    async fn test_compiled_grammar_is_cached() {
        let (store, engine) = store();
        store.add_grammar(RawGrammar::new(scope("source.a")), Vec::new());
        let config = GrammarConfiguration::default();

        let first = store
            .grammar_for_scope_name(&scope("source.a"), 1, &config)
            .await
            .unwrap()
            .unwrap();
        let second = store
            .grammar_for_scope_name(&scope("source.a"), 2, &config)
            .await
            .unwrap()
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(engine.compile_count(), 1);
        assert!(store
            .grammar_for_scope_name(&scope("source.none"), 1, &config)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rejects_language_id_out_of_range() {
        let (store, _) = store();
        store.add_grammar(RawGrammar::new(scope("source.a")), Vec::new());
        let result = store
            .grammar_for_scope_name(&scope("source.a"), 256, &GrammarConfiguration::default())
            .await;
        assert!(matches!(result, Err(Error::LanguageIdOutOfRange(256))));
    }

    #[tokio::test]
    async fn test_theme_change_recompiles() {
        let (store, engine) = store();
        store.add_grammar(RawGrammar::new(scope("source.a")), Vec::new());
        let config = GrammarConfiguration::default();
        store.grammar_for_scope_name(&scope("source.a"), 1, &config).await.unwrap();

        let theme: RawTheme = serde_json::from_str(
            r##"{ "settings": [ { "scope": "comment", "settings": { "foreground": "#00FF00" } } ] }"##,
        )
        .unwrap();
        store.set_theme(&theme, None).unwrap();
        assert_eq!(store.color_map(), vec!["", "#000000", "#FFFFFF", "#00FF00"]);

        store.grammar_for_scope_name(&scope("source.a"), 1, &config).await.unwrap();
        assert_eq!(engine.compile_count(), 2);
    }

    #[tokio::test]
    async fn test_no_engine_fails_to_compile() {
        let store = MemoryStore::default();
        store.add_grammar(RawGrammar::new(scope("source.a")), Vec::new());
        let result = store
            .grammar_for_scope_name(&scope("source.a"), 1, &GrammarConfiguration::default())
            .await;
        assert!(matches!(result, Err(Error::Engine(_))));
    }
}
