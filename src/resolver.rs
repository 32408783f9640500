//! Dependency resolver
//!
//! Breadth-first fixpoint over scope dependencies:
//! 1. Load every scope of the current layer concurrently, wait for all
//! 2. Scan each loaded grammar (whole grammar for `Full`, one rule's
//!    subtree for `Partial`) and add its registered injections
//! 3. Keep only dependencies never seen before as the next layer
//!
//! A scope seen as `Full` is never requested again in any form, and a
//! `Partial` key is requested at most once, so cycles simply stop producing
//! new work.

use crate::cache::GrammarLoadCache;
use crate::dependency::{DependencyCollector, ScopeDependency};
use crate::grammar::RawGrammar;
use crate::scope::ScopeName;
use crate::store::GrammarStore;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Report of one resolution run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Resolution {
    pub initial: Option<ScopeName>,
    /// Number of layers processed
    pub layers: usize,
    /// Scopes present in the store, in discovery order
    pub loaded: Vec<ScopeName>,
    /// Scopes processed as full dependencies
    pub full: Vec<ScopeName>,
    /// Keys (`scope#rule`) processed as partial dependencies
    pub partial: Vec<String>,
    /// Referenced scopes no grammar was found for
    pub missing: Vec<ScopeName>,
}

impl Resolution {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.initial {
            Some(initial) => writeln!(f, "Resolution of {}:", initial)?,
            None => writeln!(f, "Resolution:")?,
        }
        writeln!(f, "  Layers: {}", self.layers)?;
        writeln!(f, "  Loaded grammars: {}", self.loaded.len())?;
        writeln!(f, "  Full dependencies: {}", self.full.len())?;
        writeln!(f, "  Partial dependencies: {}", self.partial.len())?;
        write!(f, "  Missing: {}", self.missing.len())
    }
}

/// One resolution run.
///
/// Seen-sets start empty for every run; the load cache and store it works
/// against belong to the registry and outlive it.
pub struct Resolver<'a, S: GrammarStore + ?Sized + 'static> {
    cache: &'a GrammarLoadCache,
    store: &'a Arc<S>,
    seen_full: HashSet<ScopeName>,
    seen_partial: HashSet<String>,
}

impl<'a, S: GrammarStore + ?Sized + 'static> Resolver<'a, S> {
    pub fn new(cache: &'a GrammarLoadCache, store: &'a Arc<S>) -> Self {
        Self {
            cache,
            store,
            seen_full: HashSet::new(),
            seen_partial: HashSet::new(),
        }
    }

    /// Load every grammar and injection reachable from `initial`.
    ///
    /// Fails when `initial` itself has no grammar or when any loader call
    /// fails; other missing scopes are only reported.
    pub async fn resolve(mut self, initial: &ScopeName) -> Result<Resolution> {
        let mut report = Resolution {
            initial: Some(initial.clone()),
            ..Resolution::default()
        };
        let mut loaded: HashSet<ScopeName> = HashSet::new();
        let mut missing: HashSet<ScopeName> = HashSet::new();

        self.seen_full.insert(initial.clone());
        let mut frontier = vec![ScopeDependency::full(initial.clone())];
        let mut base: Option<Arc<RawGrammar>> = None;

        while !frontier.is_empty() {
            let batch = std::mem::take(&mut frontier);
            report.layers += 1;
            tracing::debug!("Resolving layer {} with {} dependencies", report.layers, batch.len());

            self.load_layer(&batch).await?;

            if base.is_none() {
                base = self.store.lookup(initial);
            }
            let Some(base_grammar) = base.as_deref() else {
                return Err(Error::MissingGrammar(initial.clone()));
            };

            // Grammars stay alive for the whole scan, the collector tracks
            // rules by address
            let grammars: Vec<(&ScopeDependency, Option<Arc<RawGrammar>>)> = batch
                .iter()
                .map(|dep| (dep, self.store.lookup(dep.scope_name())))
                .collect();

            let mut collector = DependencyCollector::new();
            for (dep, grammar) in &grammars {
                let scope = dep.scope_name();
                let Some(grammar) = grammar else {
                    if scope == initial {
                        return Err(Error::MissingGrammar(initial.clone()));
                    }
                    if missing.insert(scope.clone()) {
                        tracing::debug!("No grammar for {}, leaving {} unexpanded", scope, dep);
                        report.missing.push(scope.clone());
                    }
                    continue;
                };

                if loaded.insert(scope.clone()) {
                    report.loaded.push(scope.clone());
                }
                match dep {
                    ScopeDependency::Full { .. } => {
                        report.full.push(scope.clone());
                        collector.collect_all(base_grammar, grammar);
                    }
                    ScopeDependency::Partial { rule, .. } => {
                        report.partial.push(dep.key());
                        collector.collect_from_rule(base_grammar, grammar, rule);
                    }
                }
                collector.add_injections(self.store.injections(scope));
            }

            frontier = self.next_layer(collector.into_dependencies());
        }

        tracing::debug!(
            "Resolved {} in {} layers: {} grammars loaded, {} missing",
            initial,
            report.layers,
            report.loaded.len(),
            report.missing.len()
        );
        Ok(report)
    }

    /// Load all distinct scopes of a layer. Every load settles before the
    /// first failure, if any, is returned.
    async fn load_layer(&self, batch: &[ScopeDependency]) -> Result<()> {
        let mut scopes: Vec<&ScopeName> = Vec::new();
        for dep in batch {
            if !scopes.contains(&dep.scope_name()) {
                scopes.push(dep.scope_name());
            }
        }

        let outcomes = futures::future::join_all(
            scopes
                .iter()
                .map(|scope| self.cache.ensure_loaded(scope, self.store)),
        )
        .await;
        outcomes.into_iter().collect()
    }

    fn next_layer(&mut self, discovered: Vec<ScopeDependency>) -> Vec<ScopeDependency> {
        let mut next = Vec::new();
        for dep in discovered {
            match &dep {
                ScopeDependency::Full { scope } => {
                    if !self.seen_full.insert(scope.clone()) {
                        continue;
                    }
                }
                ScopeDependency::Partial { scope, .. } => {
                    if self.seen_full.contains(scope) || !self.seen_partial.insert(dep.key()) {
                        continue;
                    }
                }
            }
            tracing::trace!("Enqueued {}", dep);
            next.push(dep);
        }
        next
    }
}
