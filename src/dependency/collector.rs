//! Dependency collector - scans a grammar's rule tree for cross-scope includes
//!
//! Walk rules:
//! 1. Top level = `patterns` (with the grammar repository) + `injections` values
//! 2. Each rule: nested `patterns`, every capture table, then its `include`
//! 3. `$base`, `$self`, `#rule` and includes of the current or base scope are
//!    followed locally
//! 4. Any other scope is recorded as a `Full` or `Partial` dependency
//!
//! Every rule object is visited at most once per collector, which is what
//! makes self-recursive repositories terminate.

use super::ScopeDependency;
use crate::grammar::{IncludeReference, RawGrammar, RawRule, Repository};
use crate::scope::ScopeName;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Accumulates the dependencies discovered during one scan pass.
///
/// Dependencies are kept in discovery order and are not deduplicated;
/// the resolver filters them against its seen-sets. The `'g` lifetime ties
/// the collector to the grammars it scanned, since rules are tracked by
/// address.
#[derive(Debug, Default)]
pub struct DependencyCollector<'g> {
    dependencies: Vec<ScopeDependency>,
    visited_rules: HashSet<usize>,
    _grammars: PhantomData<&'g RawGrammar>,
}

/// Where a walk currently is: which grammar, and which repositories are in scope
#[derive(Clone)]
struct ScanContext<'g> {
    base: &'g RawGrammar,
    current: &'g RawGrammar,
    /// Innermost repository last
    repositories: Vec<&'g Repository>,
}

impl<'g> ScanContext<'g> {
    fn new(base: &'g RawGrammar, current: &'g RawGrammar) -> Self {
        Self {
            base,
            current,
            repositories: vec![&current.repository],
        }
    }

    fn switch_to(&self, grammar: &'g RawGrammar) -> Self {
        Self::new(self.base, grammar)
    }

    fn with_repository(&self, repository: &'g Repository) -> Self {
        let mut next = self.clone();
        next.repositories.push(repository);
        next
    }

    fn lookup(&self, name: &str) -> Option<&'g RawRule> {
        self.repositories.iter().rev().find_map(|repo| repo.get(name))
    }

    /// Grammar already in hand for a scope referenced by an include
    fn local_grammar(&self, scope: &str) -> Option<&'g RawGrammar> {
        if self.current.scope_name.as_str() == scope {
            Some(self.current)
        } else if self.base.scope_name.as_str() == scope {
            Some(self.base)
        } else {
            None
        }
    }
}

impl<'g> DependencyCollector<'g> {
    /// Create a new empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the whole grammar: used for `Full` dependencies.
    ///
    /// `base` is the grammar tokenization starts from (target of `$base`).
    pub fn collect_all(&mut self, base: &'g RawGrammar, grammar: &'g RawGrammar) {
        let ctx = ScanContext::new(base, grammar);
        self.walk_top_level(&ctx);
    }

    /// Scan only what is reachable from one repository rule: used for
    /// `Partial` dependencies.
    pub fn collect_from_rule(&mut self, base: &'g RawGrammar, grammar: &'g RawGrammar, rule: &str) {
        let ctx = ScanContext::new(base, grammar);
        self.walk_repository_rule(rule, &ctx);
    }

    /// Record a `Full` dependency on each injection scope
    pub fn add_injections(&mut self, injections: impl IntoIterator<Item = ScopeName>) {
        self.dependencies
            .extend(injections.into_iter().map(ScopeDependency::full));
    }

    /// All dependencies in discovery order
    pub fn dependencies(&self) -> &[ScopeDependency] {
        &self.dependencies
    }

    pub fn full(&self) -> impl Iterator<Item = &ScopeDependency> {
        self.dependencies.iter().filter(|d| d.is_full())
    }

    pub fn partial(&self) -> impl Iterator<Item = &ScopeDependency> {
        self.dependencies.iter().filter(|d| !d.is_full())
    }

    /// Number of distinct rules visited so far
    pub fn visited_rule_count(&self) -> usize {
        self.visited_rules.len()
    }

    pub fn into_dependencies(self) -> Vec<ScopeDependency> {
        self.dependencies
    }

    fn walk_top_level(&mut self, ctx: &ScanContext<'g>) {
        let grammar = ctx.current;
        for rule in &grammar.patterns {
            self.walk_rule(rule, ctx);
        }
        for rule in grammar.injections.values() {
            self.walk_rule(rule, ctx);
        }
    }

    fn walk_repository_rule(&mut self, name: &str, ctx: &ScanContext<'g>) {
        match ctx.lookup(name) {
            Some(rule) => self.walk_rule(rule, ctx),
            None => tracing::trace!(
                "Rule #{} not found in {}, leaving it unexpanded",
                name,
                ctx.current.scope_name
            ),
        }
    }

    fn walk_rule(&mut self, rule: &'g RawRule, ctx: &ScanContext<'g>) {
        let address = rule as *const RawRule as usize;
        if !self.visited_rules.insert(address) {
            return;
        }

        let extended;
        let ctx = match &rule.repository {
            Some(repository) => {
                extended = ctx.with_repository(repository);
                &extended
            }
            None => ctx,
        };

        if let Some(patterns) = &rule.patterns {
            for nested in patterns {
                self.walk_rule(nested, ctx);
            }
        }
        for captures in rule.capture_tables() {
            for capture in captures.values() {
                self.walk_rule(capture, ctx);
            }
        }

        let Some(include) = rule.include.as_deref() else {
            return;
        };

        match IncludeReference::parse(include) {
            Err(e) => {
                tracing::warn!("Skipping include in {}: {}", ctx.current.scope_name, e);
            }
            Ok(IncludeReference::Base) => self.walk_top_level(&ctx.switch_to(ctx.base)),
            Ok(IncludeReference::SelfGrammar) => self.walk_top_level(&ctx.switch_to(ctx.current)),
            Ok(IncludeReference::Relative(name)) => self.walk_repository_rule(name, ctx),
            Ok(IncludeReference::TopLevel(scope)) => match ctx.local_grammar(scope) {
                Some(grammar) => self.walk_top_level(&ctx.switch_to(grammar)),
                None => self.record(scope, None),
            },
            Ok(IncludeReference::TopLevelRepository { scope, rule: name }) => {
                match ctx.local_grammar(scope) {
                    Some(grammar) if std::ptr::eq(grammar, ctx.current) => {
                        self.walk_repository_rule(name, ctx)
                    }
                    Some(grammar) => self.walk_repository_rule(name, &ctx.switch_to(grammar)),
                    None => self.record(scope, Some(name)),
                }
            }
        }
    }

    fn record(&mut self, scope: &str, rule: Option<&str>) {
        let scope = match ScopeName::parse(scope) {
            Ok(scope) => scope,
            Err(e) => {
                tracing::warn!("Ignoring include target: {}", e);
                return;
            }
        };

        let dependency = match rule {
            None => ScopeDependency::full(scope),
            Some(rule) => ScopeDependency::partial(scope, rule),
        };
        tracing::trace!("Discovered dependency {}", dependency);
        self.dependencies.push(dependency);
    }
}
