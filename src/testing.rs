//! Test doubles shared by the unit tests

use crate::Result;
use crate::grammar::RawGrammar;
use crate::loader::GrammarLoader;
use crate::scope::ScopeName;
use crate::stack::{RuleId, ScopeStack, StateStack};
use crate::store::{GrammarSource, TokenizerEngine};
use crate::tokenize::{Grammar, Token, TokenizeLineResult, TokenizeLineResult2};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn scope(name: &str) -> ScopeName {
    ScopeName::parse(name).unwrap()
}

/// Engine whose grammars emit one token per line
#[derive(Debug, Default)]
pub struct WholeLineEngine {
    compiles: AtomicUsize,
}

impl WholeLineEngine {
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }
}

impl TokenizerEngine for WholeLineEngine {
    fn name(&self) -> &str {
        "whole-line"
    }

    fn compile(&self, source: GrammarSource) -> Result<Arc<dyn Grammar>> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        let scopes = ScopeStack::root_attributed(source.scope_name.clone(), &source.attributes);
        let style = source.theme.style_for(&scopes.scope_names());
        let root_style = source.theme.defaults().to_patch();
        let scopes = ScopeStack::root(
            source.scope_name.clone(),
            scopes.metadata().apply(root_style).apply(style.to_patch()),
        );
        Ok(Arc::new(WholeLineGrammar { source, scopes }))
    }
}

pub struct WholeLineGrammar {
    source: GrammarSource,
    scopes: ScopeStack,
}

impl WholeLineGrammar {
    fn state(&self, prev_state: Option<&StateStack>) -> StateStack {
        prev_state
            .cloned()
            .unwrap_or_else(|| StateStack::root(RuleId(1), self.scopes.clone()))
    }
}

impl Grammar for WholeLineGrammar {
    fn scope_name(&self) -> &ScopeName {
        &self.source.scope_name
    }

    fn tokenize_line(&self, line: &str, prev_state: Option<&StateStack>) -> TokenizeLineResult {
        TokenizeLineResult {
            tokens: vec![Token {
                start_index: 0,
                end_index: line.len(),
                scopes: vec![self.source.scope_name.clone()],
            }],
            rule_stack: self.state(prev_state),
            stopped_early: false,
        }
    }

    fn tokenize_line2(&self, _line: &str, prev_state: Option<&StateStack>) -> TokenizeLineResult2 {
        TokenizeLineResult2 {
            tokens: vec![0, self.scopes.metadata().bits()],
            rule_stack: self.state(prev_state),
            stopped_early: false,
        }
    }
}

/// Loader over a fixed set of grammars that counts fetches per scope
#[derive(Default)]
pub struct CountingLoader {
    grammars: HashMap<ScopeName, RawGrammar>,
    injections: HashMap<ScopeName, Vec<ScopeName>>,
    failing: HashSet<ScopeName>,
    delay: Option<Duration>,
    fetches: Mutex<HashMap<ScopeName, usize>>,
    total: AtomicUsize,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grammar(mut self, grammar: RawGrammar) -> Self {
        self.grammars.insert(grammar.scope_name.clone(), grammar);
        self
    }

    pub fn with_injections(mut self, target: &str, injections: &[&str]) -> Self {
        self.injections
            .insert(scope(target), injections.iter().map(|s| scope(s)).collect());
        self
    }

    pub fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(scope(name));
        self
    }

    /// Make each fetch take a while, so concurrent callers overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetches(&self, name: &str) -> usize {
        self.fetches.lock().get(&scope(name)).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GrammarLoader for CountingLoader {
    async fn load_grammar(&self, scope: &ScopeName) -> anyhow::Result<Option<RawGrammar>> {
        *self.fetches.lock().entry(scope.clone()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(scope) {
            anyhow::bail!("backend unavailable for {}", scope);
        }
        Ok(self.grammars.get(scope).cloned())
    }

    fn injections(&self, scope: &ScopeName) -> Vec<ScopeName> {
        self.injections.get(scope).cloned().unwrap_or_default()
    }
}
