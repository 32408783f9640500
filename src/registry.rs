//! Registry - public entry point
//!
//! A registry owns one store and one load cache. Every grammar it hands out
//! has had its full dependency closure loaded first. Dropping the registry
//! drops everything it cached once loads still in flight have finished.

use crate::attributes::GrammarConfiguration;
use crate::cache::GrammarLoadCache;
use crate::grammar::RawGrammar;
use crate::loader::GrammarLoader;
use crate::metadata::TokenType;
use crate::resolver::{Resolution, Resolver};
use crate::scope::ScopeName;
use crate::store::{GrammarStore, MemoryStore, RawTheme, TokenizerEngine};
use crate::tokenize::Grammar;
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub struct Registry<S: GrammarStore + 'static = MemoryStore> {
    store: Arc<S>,
    cache: GrammarLoadCache,
}

impl Registry<MemoryStore> {
    /// Registry over an in-memory store compiling with `engine`
    pub fn new(loader: Arc<dyn GrammarLoader>, engine: Arc<dyn TokenizerEngine>) -> Self {
        Self::with_store(loader, MemoryStore::new(engine))
    }
}

impl<S: GrammarStore + 'static> Registry<S> {
    pub fn with_store(loader: Arc<dyn GrammarLoader>, store: S) -> Self {
        Self {
            store: Arc::new(store),
            cache: GrammarLoadCache::new(loader),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &GrammarLoadCache {
        &self.cache
    }

    /// Load the dependency closure of `scope` without compiling anything
    pub async fn resolve(&self, scope: &ScopeName) -> Result<Resolution> {
        Resolver::new(&self.cache, &self.store).resolve(scope).await
    }

    /// Load a grammar and everything it depends on
    pub async fn load_grammar(&self, scope: &ScopeName) -> Result<Arc<dyn Grammar>> {
        self.load_grammar_with_configuration(scope, 0, &GrammarConfiguration::default())
            .await
    }

    pub async fn load_grammar_with_embedded_languages(
        &self,
        scope: &ScopeName,
        language_id: u32,
        embedded_languages: HashMap<ScopeName, u32>,
    ) -> Result<Arc<dyn Grammar>> {
        let configuration = GrammarConfiguration::with_embedded_languages(embedded_languages);
        self.load_grammar_with_configuration(scope, language_id, &configuration)
            .await
    }

    pub async fn load_grammar_with_configuration(
        &self,
        scope: &ScopeName,
        language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> Result<Arc<dyn Grammar>> {
        self.resolve(scope).await?;
        self.compiled(scope, language_id, configuration).await
    }

    /// Register a grammar directly, bypassing the loader. Its dependencies
    /// are not loaded.
    pub async fn add_grammar(
        &self,
        grammar: RawGrammar,
        injections: Vec<ScopeName>,
        language_id: u32,
        embedded_languages: HashMap<ScopeName, u32>,
    ) -> Result<Arc<dyn Grammar>> {
        let scope = grammar.scope_name.clone();
        self.store.add_grammar(grammar, injections);
        self.grammar_for_scope_name(&scope, language_id, embedded_languages, BTreeMap::new())
            .await
    }

    /// Grammar for an already registered scope
    pub async fn grammar_for_scope_name(
        &self,
        scope: &ScopeName,
        language_id: u32,
        embedded_languages: HashMap<ScopeName, u32>,
        token_types: BTreeMap<String, TokenType>,
    ) -> Result<Arc<dyn Grammar>> {
        let configuration = GrammarConfiguration {
            embedded_languages,
            token_types,
        };
        self.compiled(scope, language_id, &configuration).await
    }

    pub fn set_theme(&self, theme: &RawTheme) -> Result<()> {
        self.store.set_theme(theme, None)
    }

    /// Set a theme whose colors must all be present in `color_map`
    pub fn set_theme_with_color_map(&self, theme: &RawTheme, color_map: Vec<String>) -> Result<()> {
        self.store.set_theme(theme, Some(color_map))
    }

    pub fn color_map(&self) -> Vec<String> {
        self.store.color_map()
    }

    async fn compiled(
        &self,
        scope: &ScopeName,
        language_id: u32,
        configuration: &GrammarConfiguration,
    ) -> Result<Arc<dyn Grammar>> {
        self.store
            .grammar_for_scope_name(scope, language_id, configuration)
            .await?
            .ok_or_else(|| Error::MissingGrammar(scope.clone()))
    }
}

impl<S: GrammarStore + std::fmt::Debug + 'static> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("store", &self.store)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::RawRule;
    use crate::testing::{CountingLoader, WholeLineEngine, scope};
    use std::time::Duration;

    fn scenario_loader() -> CountingLoader {
        CountingLoader::new()
            .with_grammar(
                RawGrammar::new(scope("source.a"))
                    .with_pattern(RawRule::include("source.b"))
                    .with_pattern(RawRule::include("source.c#stringRule")),
            )
            .with_grammar(RawGrammar::new(scope("source.b")))
            .with_grammar(
                RawGrammar::new(scope("source.c"))
                    .with_rule("stringRule", RawRule::matching("'[^']*'", "string.quoted")),
            )
            .with_grammar(RawGrammar::new(scope("source.d")))
            .with_injections("source.c", &["source.d"])
    }

    fn registry(loader: CountingLoader) -> (Registry, Arc<CountingLoader>, Arc<WholeLineEngine>) {
        let loader = Arc::new(loader);
        let engine = Arc::new(WholeLineEngine::default());
        (Registry::new(loader.clone(), engine.clone()), loader, engine)
    }

    #[tokio::test]
    async fn test_load_grammar_resolves_closure() {
        let (registry, loader, _) = registry(scenario_loader());

        let grammar = registry.load_grammar(&scope("source.a")).await.unwrap();
        assert_eq!(grammar.scope_name(), &scope("source.a"));

        for name in ["source.a", "source.b", "source.c", "source.d"] {
            assert_eq!(loader.fetches(name), 1);
        }
        assert_eq!(registry.cache().fetch_count(), 4);

        let line = grammar.tokenize_line("let x = 'y'", None);
        assert_eq!(line.tokens.len(), 1);
        let next = grammar.tokenize_line("x", Some(&line.rule_stack));
        assert_eq!(next.rule_stack, line.rule_stack);
    }

    #[tokio::test]
    async fn test_overlapping_requests_share_loads() {
        let (registry, loader, _) =
            registry(scenario_loader().with_delay(Duration::from_millis(10)));

        let (a, c) = (scope("source.a"), scope("source.c"));
        let (loaded_a, loaded_c) =
            tokio::join!(registry.load_grammar(&a), registry.load_grammar(&c));
        loaded_a.unwrap();
        loaded_c.unwrap();

        assert_eq!(loader.fetches("source.c"), 1);
        assert_eq!(loader.fetches("source.d"), 1);
        assert_eq!(loader.total_fetches(), 4);
    }

    #[tokio::test]
    async fn test_language_id_reaches_metadata() {
        let (registry, _, _) = registry(scenario_loader());
        let embedded = [(scope("source.b"), 3)].into_iter().collect();

        let grammar = registry
            .load_grammar_with_embedded_languages(&scope("source.a"), 7, embedded)
            .await
            .unwrap();
        let line = grammar.tokenize_line2("abc", None);
        let (offset, metadata) = line.iter().next().unwrap();

        assert_eq!(offset, 0);
        assert_eq!(metadata.language_id(), 7);
        assert_eq!(metadata.foreground(), 1);
        assert_eq!(metadata.background(), 2);
    }

    #[tokio::test]
    async fn test_missing_scope_errors() {
        let (registry, _, _) = registry(CountingLoader::new());
        let err = registry.load_grammar(&scope("source.none")).await.err().unwrap();
        assert_eq!(err.to_string(), "No grammar provided for source.none");

        let err = registry
            .grammar_for_scope_name(&scope("source.none"), 0, HashMap::new(), BTreeMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingGrammar(_)));
    }

    #[tokio::test]
    async fn test_add_grammar_skips_loader() {
        let (registry, loader, engine) = registry(CountingLoader::new());
        let grammar =
            RawGrammar::new(scope("source.manual")).with_pattern(RawRule::include("source.other"));

        let compiled = registry
            .add_grammar(grammar, Vec::new(), 1, HashMap::new())
            .await
            .unwrap();

        assert_eq!(compiled.scope_name(), &scope("source.manual"));
        assert_eq!(loader.total_fetches(), 0);
        assert_eq!(engine.compile_count(), 1);
    }

    #[tokio::test]
    async fn test_theme_and_color_map() {
        let (registry, _, _) = registry(CountingLoader::new());
        let theme: RawTheme = serde_json::from_str(
            r##"{ "settings": [ { "scope": "string", "settings": { "foreground": "#a31515" } } ] }"##,
        )
        .unwrap();

        registry.set_theme(&theme).unwrap();
        assert_eq!(registry.color_map(), vec!["", "#000000", "#FFFFFF", "#A31515"]);

        let frozen = vec!["".to_string(), "#000000".to_string(), "#FFFFFF".to_string()];
        assert!(matches!(
            registry.set_theme_with_color_map(&theme, frozen),
            Err(Error::Theme(_))
        ));
        // The failed update left the previous theme in place
        assert_eq!(registry.color_map().len(), 4);
    }

    #[tokio::test]
    async fn test_loader_error_surfaces_through_registry() {
        let loader = CountingLoader::new()
            .with_grammar(
                RawGrammar::new(scope("source.a")).with_pattern(RawRule::include("source.bad")),
            )
            .failing_on("source.bad");
        let (registry, loader, _) = registry(loader);

        let first = registry.load_grammar(&scope("source.a")).await;
        let second = registry.load_grammar(&scope("source.a")).await;

        assert!(matches!(first, Err(Error::Loader { .. })));
        assert!(matches!(second, Err(Error::Loader { .. })));
        assert_eq!(loader.fetches("source.bad"), 1);
    }
}
